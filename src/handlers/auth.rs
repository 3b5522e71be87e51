use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::AppState;
use crate::auth::{AuthError, AuthUser, TokenResponse};
use crate::errors::ServiceError;
use crate::services::users::{ChangePasswordRequest, UserResponse};
use crate::ApiResponse;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub user: UserResponse,
}

/// Exchange credentials for an access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials or deactivated account"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AuthError> {
    if request.validate().is_err() {
        return Err(AuthError::InvalidCredentials);
    }

    let (token, account) = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(ApiResponse::success(LoginResponse {
        token,
        user: account.into(),
    })))
}

/// Profile of the authenticated caller
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    summary = "Current user",
    responses(
        (status = 200, description = "Caller profile", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let profile = state.services.users.get_user(auth_user.id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/password",
    summary = "Change own password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<String>),
        (status = 400, description = "Invalid new password", body = crate::errors::ErrorResponse),
        (status = 401, description = "Current password is incorrect", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state
        .services
        .users
        .change_password(auth_user.id, request)
        .await?;
    Ok(Json(ApiResponse::success(
        "Password changed successfully".to_string(),
    )))
}
