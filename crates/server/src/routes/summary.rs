use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use serde::Deserialize;
use services::services::summary::ProjectSummary;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Scopes the figures to one member's assignments and recordings.
    pub user_id: Option<Uuid>,
}

pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<ResponseJson<ApiResponse<ProjectSummary>>, ApiError> {
    let summary = state
        .summary()
        .project_summary(state.pool(), query.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/summary", get(get_summary))
}
