use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use super::common::PageWindow;
use super::AppState;
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::users::{CreateUserRequest, UpdateUserRequest, UserListQuery, UserResponse};
use crate::{ApiResponse, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/users",
    summary = "List users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<PaginatedResponse<UserResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<UserResponse>>>, ServiceError> {
    let window = PageWindow::resolve(&state.config, query.page, query.limit)?;
    let (users, total) = state
        .services
        .users
        .list_users(&query, window.page, window.limit)
        .await?;
    Ok(Json(ApiResponse::success(window.into_response(users, total))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    summary = "Get user",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state.services.users.get_user(id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// Create a back-office account; its permissions are copied from the role
#[utoipa::path(
    post,
    path = "/api/v1/users",
    summary = "Create user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ServiceError> {
    let user = state.services.users.create_user(request).await?;
    info!(user_id = %user.id, created_by = %auth_user.id, "Account created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    summary = "Update user",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request or last administrator", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state.services.users.update_user(id, request).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// Deactivate an account
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    summary = "Delete user",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<String>),
        (status = 400, description = "Own account or last administrator", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.users.delete_user(id, auth_user.id).await?;
    Ok(Json(ApiResponse::success(
        "User deleted successfully".to_string(),
    )))
}
