use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, post},
};
use db::models::prerequisite::{CreatePrerequisite, Prerequisite};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub async fn create_prerequisite(
    State(state): State<AppState>,
    Json(payload): Json<CreatePrerequisite>,
) -> Result<ResponseJson<ApiResponse<Prerequisite>>, ApiError> {
    let edge = state
        .prerequisites()
        .create(state.pool(), payload.task_id, payload.prerequisite_task_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(edge)))
}

pub async fn delete_prerequisite(
    State(state): State<AppState>,
    Path((task_id, prerequisite_task_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state
        .prerequisites()
        .delete(state.pool(), task_id, prerequisite_task_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/prerequisites", post(create_prerequisite))
        .route(
            "/prerequisites/{task_id}/{prerequisite_task_id}",
            delete(delete_prerequisite),
        )
}
