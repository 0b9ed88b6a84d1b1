use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::user::{CreateUser, UpdateUser, User};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_user_middleware};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
}

pub async fn get_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = User::search(state.pool(), query.search.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn get_user(
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = User::create(state.pool(), &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// Rate edits apply to future work-hour records only; existing records
/// keep the rate snapshotted when they were created.
pub async fn update_user(
    Extension(existing): Extension<User>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = User::update(state.pool(), existing.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn delete_user(
    Extension(user): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    User::delete(state.pool(), user.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let user_id_router = Router::new()
        .route("/", get(get_user).put(update_user).delete(delete_user))
        .layer(from_fn_with_state(state.clone(), load_user_middleware));

    let users_router = Router::new()
        .route("/", get(get_users).post(create_user))
        .nest("/{user_id}", user_id_router);

    Router::new().nest("/users", users_router)
}
