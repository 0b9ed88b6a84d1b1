use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        project::ProjectError, task::TaskError, user::UserError, work_hour::WorkHourError,
    },
};
use services::services::{PrerequisiteServiceError, RollupError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    WorkHour(#[from] WorkHourError),
    #[error(transparent)]
    Prerequisite(#[from] PrerequisiteServiceError),
    #[error(transparent)]
    Rollup(#[from] RollupError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Project(err) => match err {
                ProjectError::ProjectNotFound => (StatusCode::NOT_FOUND, "ProjectError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "ProjectError"),
            },
            ApiError::Task(err) => match err {
                TaskError::TaskNotFound => (StatusCode::NOT_FOUND, "TaskError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "TaskError"),
            },
            ApiError::User(err) => match err {
                UserError::NotFound => (StatusCode::NOT_FOUND, "UserError"),
                UserError::EmailTaken => (StatusCode::CONFLICT, "UserError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "UserError"),
            },
            ApiError::WorkHour(err) => match err {
                WorkHourError::NotFound => (StatusCode::NOT_FOUND, "WorkHourError"),
                WorkHourError::Validation(_) => (StatusCode::BAD_REQUEST, "WorkHourError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "WorkHourError"),
            },
            ApiError::Prerequisite(err) => match err {
                PrerequisiteServiceError::TaskNotFound
                | PrerequisiteServiceError::EdgeNotFound => {
                    (StatusCode::NOT_FOUND, "PrerequisiteError")
                }
                PrerequisiteServiceError::SelfReference
                | PrerequisiteServiceError::CrossProject
                | PrerequisiteServiceError::CycleDetected { .. } => {
                    (StatusCode::BAD_REQUEST, "PrerequisiteError")
                }
                PrerequisiteServiceError::DuplicateEdge
                | PrerequisiteServiceError::IncompletePrerequisites(_) => {
                    (StatusCode::CONFLICT, "PrerequisiteError")
                }
                PrerequisiteServiceError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "PrerequisiteError")
                }
            },
            ApiError::Rollup(err) => match err {
                RollupError::WorkHourNotFound
                | RollupError::TaskNotFound
                | RollupError::ProjectNotFound => (StatusCode::NOT_FOUND, "RollupError"),
                RollupError::AlreadyApproved | RollupError::NotApproved => {
                    (StatusCode::CONFLICT, "RollupError")
                }
                RollupError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RollupError"),
            },
            ApiError::Database(err) => match err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        };

        if status_code.is_server_error() {
            tracing::error!(error_type, error = %self, "request failed");
        }

        let response: ApiResponse<()> = ApiResponse::error(&self.to_string());
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn graph_violations_map_to_client_errors() {
        assert_eq!(
            status_of(ApiError::Prerequisite(
                PrerequisiteServiceError::SelfReference
            )),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Prerequisite(
                PrerequisiteServiceError::CycleDetected {
                    task_id: uuid::Uuid::new_v4(),
                    prerequisite_task_id: uuid::Uuid::new_v4(),
                }
            )),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Prerequisite(
                PrerequisiteServiceError::DuplicateEdge
            )),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Prerequisite(
                PrerequisiteServiceError::EdgeNotFound
            )),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn approval_preconditions_map_to_conflict() {
        assert_eq!(
            status_of(ApiError::Rollup(RollupError::AlreadyApproved)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Rollup(RollupError::NotApproved)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Rollup(RollupError::WorkHourNotFound)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn missing_records_map_to_not_found() {
        assert_eq!(
            status_of(ApiError::Project(ProjectError::ProjectNotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Database(DbErr::RecordNotFound(
                "Task not found".to_string()
            ))),
            StatusCode::NOT_FOUND
        );
    }
}
