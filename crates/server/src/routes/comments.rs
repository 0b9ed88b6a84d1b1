use axum::{
    Json, Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::task_comment::{CreateTaskComment, TaskComment};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CommentListQuery {
    pub task_id: Uuid,
}

pub async fn get_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskComment>>>, ApiError> {
    let comments = TaskComment::find_by_task_id(state.pool(), query.task_id).await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskComment>,
) -> Result<ResponseJson<ApiResponse<TaskComment>>, ApiError> {
    let comment = TaskComment::create(state.pool(), &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(comment)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/comments", get(get_comments).post(create_comment))
}
