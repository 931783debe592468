// File-tree endpoints: create, rename, move, list.

use axum::{extract::State, Json};
use folio_common::protocol::http::{CreateRequest, RenameRequest, SuccessResponse, TreeResponse};

use super::AppState;
use crate::error::ApiError;

pub(super) async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.store.create(&request.path, request.kind).await?;
    Ok(Json(SuccessResponse::OK))
}

pub(super) async fn rename(
    State(state): State<AppState>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.store.rename(&request.old_path, &request.new_path).await?;
    Ok(Json(SuccessResponse::OK))
}

pub(super) async fn move_to(
    State(state): State<AppState>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.store.move_to(&request.old_path, &request.new_path).await?;
    Ok(Json(SuccessResponse::OK))
}

pub(super) async fn tree(State(state): State<AppState>) -> Result<Json<TreeResponse>, ApiError> {
    let items = state.store.list().await?;
    Ok(Json(TreeResponse { items }))
}
