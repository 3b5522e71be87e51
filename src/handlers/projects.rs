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
use crate::services::projects::{
    CreateProjectRequest, ProjectListQuery, ProjectResponse, UpdateProgressRequest,
    UpdateProjectRequest,
};
use crate::{ApiResponse, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    summary = "List projects",
    description = "Paginated projects, newest first, searchable by project or client name",
    params(ProjectListQuery),
    responses(
        (status = 200, description = "Projects retrieved successfully", body = ApiResponse<PaginatedResponse<ProjectResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<ProjectResponse>>>, ServiceError> {
    let window = PageWindow::resolve(&state.config, query.page, query.limit)?;
    let (projects, total) = state
        .services
        .projects
        .list_projects(&query, window.page, window.limit)
        .await?;
    Ok(Json(ApiResponse::success(window.into_response(projects, total))))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    summary = "Get project",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project retrieved successfully", body = ApiResponse<ProjectResponse>),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProjectResponse>>, ServiceError> {
    let project = state.services.projects.get_project(id).await?;
    Ok(Json(ApiResponse::success(project)))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    summary = "Create project",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created successfully", body = ApiResponse<ProjectResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Client, service or employee not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProjectResponse>>), ServiceError> {
    let project = state
        .services
        .projects
        .create_project(request, auth_user.id)
        .await?;

    info!(project_id = %project.id, user_id = %auth_user.id, "Project created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(project))))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}",
    summary = "Update project",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated successfully", body = ApiResponse<ProjectResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Project or a referenced record not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<ApiResponse<ProjectResponse>>, ServiceError> {
    let project = state.services.projects.update_project(id, request).await?;
    Ok(Json(ApiResponse::success(project)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/projects/{id}/progress",
    summary = "Update project progress",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateProgressRequest,
    responses(
        (status = 200, description = "Progress recorded", body = ApiResponse<ProjectResponse>),
        (status = 400, description = "Progress outside 0 to 100, or nothing to change", body = crate::errors::ErrorResponse),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn update_project_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProgressRequest>,
) -> Result<Json<ApiResponse<ProjectResponse>>, ServiceError> {
    let project = state.services.projects.update_progress(id, request).await?;
    Ok(Json(ApiResponse::success(project)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    summary = "Delete project",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project deleted", body = ApiResponse<String>),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.projects.delete_project(id).await?;
    Ok(Json(ApiResponse::success(
        "Project deleted successfully".to_string(),
    )))
}
