use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::project::{CreateProject, Project, UpdateProject};
use serde::Deserialize;
use services::services::summary::ProjectProgress;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_project_middleware};

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub search: Option<String>,
    pub page: Option<u64>,
}

pub async fn get_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects =
        Project::find_all(state.pool(), query.search.as_deref(), query.page).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(payload): Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    tracing::debug!("Creating project '{}'", payload.name);
    let project = Project::create(state.pool(), &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

/// Name and description only. Status, total cost and the completion
/// date are derived fields owned by the rollup service.
pub async fn update_project(
    Extension(existing): Extension<Project>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::update(state.pool(), existing.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn get_project_total_cost(
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<f64>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(project.total_cost)))
}

pub async fn get_project_progress(
    Extension(project): Extension<Project>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<ProjectProgress>>, ApiError> {
    let progress = state.summary().project_progress(state.pool(), project.id).await?;
    Ok(ResponseJson(ApiResponse::success(progress)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let project_id_router = Router::new()
        .route("/", get(get_project).put(update_project))
        .route("/total-cost", get(get_project_total_cost))
        .route("/progress", get(get_project_progress))
        .layer(from_fn_with_state(state.clone(), load_project_middleware));

    let projects_router = Router::new()
        .route("/", get(get_projects).post(create_project))
        .nest("/{project_id}", project_id_router);

    Router::new().nest("/projects", projects_router)
}
