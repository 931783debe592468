// Manual collector trigger. Shares the scheduler's single-flight guard, so a
// request during a scheduled pass gets 409.

use axum::{extract::State, Json};
use folio_common::protocol::http::CollectionReport;

use super::AppState;
use crate::error::ApiError;

pub(super) async fn run_collector(
    State(state): State<AppState>,
) -> Result<Json<CollectionReport>, ApiError> {
    let report = state.collector.try_run().await?;
    Ok(Json(report))
}
