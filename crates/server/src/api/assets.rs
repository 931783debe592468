// Asset upload endpoint. The request body is the raw file.

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use folio_common::protocol::http::{AssetUploadQuery, AssetUploadResponse};

use super::AppState;
use crate::error::ApiError;

pub(super) async fn upload(
    State(state): State<AppState>,
    Query(query): Query<AssetUploadQuery>,
    body: Bytes,
) -> Result<Json<AssetUploadResponse>, ApiError> {
    let path = state.assets.upload(&query.name, &body, Utc::now()).await?;
    Ok(Json(AssetUploadResponse { path }))
}
