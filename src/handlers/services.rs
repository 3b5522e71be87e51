use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::common::PageWindow;
use super::AppState;
use crate::errors::ServiceError;
use crate::services::service_catalog::{
    CreateServiceRequest, ServiceListQuery, ServiceResponse, UpdateServiceRequest,
};
use crate::{ApiResponse, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/services",
    summary = "List services",
    params(ServiceListQuery),
    responses(
        (status = 200, description = "Services retrieved successfully", body = ApiResponse<PaginatedResponse<ServiceResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "services"
)]
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<ServiceResponse>>>, ServiceError> {
    let window = PageWindow::resolve(&state.config, query.page, query.limit)?;
    let (services, total) = state
        .services
        .services
        .list_services(&query, window.page, window.limit)
        .await?;
    Ok(Json(ApiResponse::success(window.into_response(services, total))))
}

#[utoipa::path(
    get,
    path = "/api/v1/services/{id}",
    summary = "Get service",
    params(("id" = Uuid, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service retrieved successfully", body = ApiResponse<ServiceResponse>),
        (status = 404, description = "Service not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "services"
)]
pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ServiceResponse>>, ServiceError> {
    let service = state.services.services.get_service(id).await?;
    Ok(Json(ApiResponse::success(service)))
}

#[utoipa::path(
    post,
    path = "/api/v1/services",
    summary = "Create service",
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Service created successfully", body = ApiResponse<ServiceResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "services"
)]
pub async fn create_service(
    State(state): State<AppState>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceResponse>>), ServiceError> {
    let service = state.services.services.create_service(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(service))))
}

#[utoipa::path(
    put,
    path = "/api/v1/services/{id}",
    summary = "Update service",
    params(("id" = Uuid, Path, description = "Service ID")),
    request_body = UpdateServiceRequest,
    responses(
        (status = 200, description = "Service updated successfully", body = ApiResponse<ServiceResponse>),
        (status = 404, description = "Service not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "services"
)]
pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<ApiResponse<ServiceResponse>>, ServiceError> {
    let service = state.services.services.update_service(id, request).await?;
    Ok(Json(ApiResponse::success(service)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/services/{id}",
    summary = "Delete service",
    params(("id" = Uuid, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service deactivated", body = ApiResponse<String>),
        (status = 404, description = "Service not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "services"
)]
pub async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.services.delete_service(id).await?;
    Ok(Json(ApiResponse::success(
        "Service deleted successfully".to_string(),
    )))
}
