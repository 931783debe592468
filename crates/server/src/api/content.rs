// Document content endpoints: read, full overwrite, conditional patch, soft delete.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use folio_common::protocol::http::{
    ContentResponse, PatchRequest, PathQuery, SuccessResponse, WriteRequest, WriteResponse,
};

use super::AppState;
use crate::error::ApiError;
use crate::store::WriteOutcome;

pub(super) async fn read(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<ContentResponse>, ApiError> {
    let snapshot = state.store.read(&query.path).await?;
    Ok(Json(ContentResponse {
        content: snapshot.content,
        last_modified: snapshot.last_modified,
        fingerprint: snapshot.fingerprint,
    }))
}

pub(super) async fn full_update(
    State(state): State<AppState>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<WriteResponse>, ApiError> {
    let outcome = state.store.full_update(&request.path, &request.content).await?;
    Ok(Json(write_response(outcome)))
}

pub(super) async fn patch(
    State(state): State<AppState>,
    Json(request): Json<PatchRequest>,
) -> Result<Json<WriteResponse>, ApiError> {
    let outcome =
        state.store.patch(&request.path, &request.patch, &request.base_fingerprint).await?;
    Ok(Json(write_response(outcome)))
}

pub(super) async fn soft_delete(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.store.soft_delete(&query.path, Utc::now()).await?;
    Ok(Json(SuccessResponse::OK))
}

fn write_response(outcome: WriteOutcome) -> WriteResponse {
    WriteResponse {
        success: true,
        last_modified: outcome.last_modified,
        fingerprint: outcome.fingerprint,
    }
}
