use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::common::PageWindow;
use super::AppState;
use crate::errors::ServiceError;
use crate::services::employees::{
    CreateEmployeeRequest, EmployeeListQuery, EmployeeResponse, UpdateEmployeeRequest,
};
use crate::{ApiResponse, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/employees",
    summary = "List employees",
    params(EmployeeListQuery),
    responses(
        (status = 200, description = "Employees retrieved successfully", body = ApiResponse<PaginatedResponse<EmployeeResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<EmployeeListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<EmployeeResponse>>>, ServiceError> {
    let window = PageWindow::resolve(&state.config, query.page, query.limit)?;
    let (employees, total) = state
        .services
        .employees
        .list_employees(&query, window.page, window.limit)
        .await?;
    Ok(Json(ApiResponse::success(window.into_response(employees, total))))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees/{id}",
    summary = "Get employee",
    params(("id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee retrieved successfully", body = ApiResponse<EmployeeResponse>),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EmployeeResponse>>, ServiceError> {
    let employee = state.services.employees.get_employee(id).await?;
    Ok(Json(ApiResponse::success(employee)))
}

#[utoipa::path(
    post,
    path = "/api/v1/employees",
    summary = "Create employee",
    request_body = CreateEmployeeRequest,
    responses(
        (status = 201, description = "Employee created successfully", body = ApiResponse<EmployeeResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn create_employee(
    State(state): State<AppState>,
    Json(request): Json<CreateEmployeeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EmployeeResponse>>), ServiceError> {
    let employee = state.services.employees.create_employee(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(employee))))
}

#[utoipa::path(
    put,
    path = "/api/v1/employees/{id}",
    summary = "Update employee",
    params(("id" = Uuid, Path, description = "Employee ID")),
    request_body = UpdateEmployeeRequest,
    responses(
        (status = 200, description = "Employee updated successfully", body = ApiResponse<EmployeeResponse>),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEmployeeRequest>,
) -> Result<Json<ApiResponse<EmployeeResponse>>, ServiceError> {
    let employee = state.services.employees.update_employee(id, request).await?;
    Ok(Json(ApiResponse::success(employee)))
}

/// Deactivate an employee with no recorded time
#[utoipa::path(
    delete,
    path = "/api/v1/employees/{id}",
    summary = "Delete employee",
    params(("id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee deleted", body = ApiResponse<String>),
        (status = 400, description = "Employee has time entries", body = crate::errors::ErrorResponse),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.employees.delete_employee(id).await?;
    Ok(Json(ApiResponse::success(
        "Employee deleted successfully".to_string(),
    )))
}
