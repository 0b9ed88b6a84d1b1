use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    project::{Project, ProjectError},
    work_hour::{CreateWorkHour, WorkHistoryEntry, WorkHour},
};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct WorkHourListQuery {
    pub task_id: Uuid,
}

pub async fn get_work_hours(
    State(state): State<AppState>,
    Query(query): Query<WorkHourListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<WorkHour>>>, ApiError> {
    let hours = WorkHour::find_by_task_id(state.pool(), query.task_id).await?;
    Ok(ResponseJson(ApiResponse::success(hours)))
}

pub async fn create_work_hour(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkHour>,
) -> Result<ResponseJson<ApiResponse<WorkHour>>, ApiError> {
    let entry = WorkHour::create(state.pool(), &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

pub async fn approve_work_hour(
    State(state): State<AppState>,
    Path(work_hour_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<WorkHour>>, ApiError> {
    let entry = state
        .rollup()
        .approve_work_hour(state.pool(), work_hour_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

pub async fn disapprove_work_hour(
    State(state): State<AppState>,
    Path(work_hour_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<WorkHour>>, ApiError> {
    let entry = state
        .rollup()
        .disapprove_work_hour(state.pool(), work_hour_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

pub async fn get_work_history(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<WorkHistoryEntry>>>, ApiError> {
    Project::find_by_id(state.pool(), project_id)
        .await?
        .ok_or(ProjectError::ProjectNotFound)?;
    let history = WorkHour::history_by_project(state.pool(), project_id).await?;
    Ok(ResponseJson(ApiResponse::success(history)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/work-hours", get(get_work_hours).post(create_work_hour))
        .route("/work-hours/{work_hour_id}/approve", post(approve_work_hour))
        .route(
            "/work-hours/{work_hour_id}/disapprove",
            post(disapprove_work_hour),
        )
        .route("/work-hours/history/{project_id}", get(get_work_history))
}
