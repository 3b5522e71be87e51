use axum::{extract::State, Json};

use super::AppState;
use crate::auth::RoleDefinition;
use crate::ApiResponse;

/// Roles and their default permission sets
#[utoipa::path(
    get,
    path = "/api/v1/roles",
    summary = "List roles",
    responses(
        (status = 200, description = "Role catalog", body = ApiResponse<Vec<RoleDefinition>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn list_roles(State(state): State<AppState>) -> Json<ApiResponse<Vec<RoleDefinition>>> {
    Json(ApiResponse::success(state.catalog.roles()))
}
