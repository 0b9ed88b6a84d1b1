use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::{
    models::{
        project::Project,
        task::{CreateTask, Task, TaskError, TaskWithAssignee, UpdateTask},
    },
    types::TaskStatus,
};
use serde::{Deserialize, Serialize};
use services::services::prerequisites::AvailableTask;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_task_middleware};

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub project_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
    pub exclude_completed: Option<bool>,
    pub page: Option<u64>,
}

/// A mutated task together with its project as re-derived afterwards,
/// so clients see the status fold without a second request.
#[derive(Debug, Serialize, TS)]
pub struct TaskMutationResponse {
    pub task: Task,
    pub project: Project,
}

pub async fn get_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskWithAssignee>>>, ApiError> {
    if let Some(project_id) = query.project_id {
        let tasks = Task::find_by_project_id(state.pool(), project_id).await?;
        return Ok(ResponseJson(ApiResponse::success(tasks)));
    }
    if let Some(assignee) = query.assigned_to {
        let tasks = Task::find_by_assignee(
            state.pool(),
            assignee,
            query.search.as_deref(),
            query.status,
            query.exclude_completed.unwrap_or(false),
            query.page,
        )
        .await?
        .into_iter()
        .map(|task| TaskWithAssignee {
            task,
            assignee_name: None,
        })
        .collect();
        return Ok(ResponseJson(ApiResponse::success(tasks)));
    }
    Err(ApiError::BadRequest(
        "Either project_id or assigned_to is required".to_string(),
    ))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<TaskWithAssignee>>, ApiError> {
    let task = Task::find_with_assignee(state.pool(), task.id)
        .await?
        .ok_or(TaskError::TaskNotFound)?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<TaskMutationResponse>>, ApiError> {
    tracing::debug!("Creating task '{}'", payload.name);
    let task = Task::create(state.pool(), &payload, Uuid::new_v4()).await?;
    let project = state
        .rollup()
        .recompute_project_status(state.pool(), task.project_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(TaskMutationResponse {
        task,
        project,
    })))
}

pub async fn update_task(
    Extension(existing): Extension<Task>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<TaskMutationResponse>>, ApiError> {
    if let Some(status) = payload.status
        && status != existing.status
        && status != TaskStatus::Pending
    {
        state
            .prerequisites()
            .ensure_prerequisites_complete(state.pool(), existing.id)
            .await?;
    }

    let task = Task::update(state.pool(), existing.id, &payload).await?;
    let project = state
        .rollup()
        .recompute_project_status(state.pool(), task.project_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(TaskMutationResponse {
        task,
        project,
    })))
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    pub status: TaskStatus,
}

/// Status transitions out of pending are gated on every direct
/// prerequisite being completed.
pub async fn update_task_status(
    Extension(existing): Extension<Task>,
    State(state): State<AppState>,
    Json(payload): Json<StatusPayload>,
) -> Result<ResponseJson<ApiResponse<TaskMutationResponse>>, ApiError> {
    if payload.status != TaskStatus::Pending && payload.status != existing.status {
        state
            .prerequisites()
            .ensure_prerequisites_complete(state.pool(), existing.id)
            .await?;
    }

    let task = Task::update_status(state.pool(), existing.id, payload.status).await?;
    let project = state
        .rollup()
        .recompute_project_status(state.pool(), task.project_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(TaskMutationResponse {
        task,
        project,
    })))
}

pub async fn get_task_prerequisites(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskWithAssignee>>>, ApiError> {
    let tasks = state.prerequisites().list(state.pool(), task.id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_incomplete_prerequisites(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskWithAssignee>>>, ApiError> {
    let tasks = state
        .prerequisites()
        .list_incomplete(state.pool(), task.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_available_prerequisites(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<AvailableTask>>>, ApiError> {
    let tasks = state.prerequisites().available(state.pool(), task.id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task))
        .route("/status", put(update_task_status))
        .route("/prerequisites", get(get_task_prerequisites))
        .route(
            "/prerequisites/incomplete",
            get(get_incomplete_prerequisites),
        )
        .route(
            "/prerequisites/available",
            get(get_available_prerequisites),
        )
        .layer(from_fn_with_state(state.clone(), load_task_middleware));

    let tasks_router = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", tasks_router)
}
