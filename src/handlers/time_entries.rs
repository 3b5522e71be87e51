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
use crate::services::time_tracking::{
    ClockInRequest, ClockOutRequest, CreateTimeEntryRequest, EmployeeClockStatus,
    TimeEntryListQuery, TimeEntryResponse, UpdateTimeEntryRequest,
};
use crate::{ApiResponse, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/time-entries",
    summary = "List time entries",
    description = "Paginated entries, latest clock-in first, filterable by employee, status and clock-in day",
    params(TimeEntryListQuery),
    responses(
        (status = 200, description = "Time entries retrieved successfully", body = ApiResponse<PaginatedResponse<TimeEntryResponse>>),
        (status = 400, description = "start_date after end_date", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "time"
)]
pub async fn list_time_entries(
    State(state): State<AppState>,
    Query(query): Query<TimeEntryListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<TimeEntryResponse>>>, ServiceError> {
    let window = PageWindow::resolve(&state.config, query.page, query.limit)?;
    let (entries, total) = state
        .services
        .time_tracking
        .list_entries(&query, window.page, window.limit)
        .await?;
    Ok(Json(ApiResponse::success(window.into_response(entries, total))))
}

#[utoipa::path(
    get,
    path = "/api/v1/time-entries/{id}",
    summary = "Get time entry",
    params(("id" = Uuid, Path, description = "Time entry ID")),
    responses(
        (status = 200, description = "Time entry retrieved successfully", body = ApiResponse<TimeEntryResponse>),
        (status = 404, description = "Time entry not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "time"
)]
pub async fn get_time_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TimeEntryResponse>>, ServiceError> {
    let entry = state.services.time_tracking.get_entry(id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

#[utoipa::path(
    get,
    path = "/api/v1/time-entries/status/current",
    summary = "Who is clocked in",
    responses(
        (status = 200, description = "Clock status of every active employee", body = ApiResponse<Vec<EmployeeClockStatus>>),
    ),
    security(("Bearer" = [])),
    tag = "time"
)]
pub async fn current_clock_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<EmployeeClockStatus>>>, ServiceError> {
    let status = state.services.time_tracking.current_status().await?;
    Ok(Json(ApiResponse::success(status)))
}

#[utoipa::path(
    post,
    path = "/api/v1/time-entries/clock-in",
    summary = "Clock in",
    request_body = ClockInRequest,
    responses(
        (status = 201, description = "Clocked in", body = ApiResponse<TimeEntryResponse>),
        (status = 400, description = "Employee is already clocked in", body = crate::errors::ErrorResponse),
        (status = 404, description = "Employee not found or inactive", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "time"
)]
pub async fn clock_in(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<ClockInRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TimeEntryResponse>>), ServiceError> {
    let entry = state.services.time_tracking.clock_in(request).await?;
    info!(entry_id = %entry.id, recorded_by = %auth_user.id, "Clock-in recorded");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

#[utoipa::path(
    post,
    path = "/api/v1/time-entries/clock-out",
    summary = "Clock out",
    request_body = ClockOutRequest,
    responses(
        (status = 200, description = "Clocked out", body = ApiResponse<TimeEntryResponse>),
        (status = 400, description = "Employee is not clocked in", body = crate::errors::ErrorResponse),
        (status = 404, description = "Employee not found or inactive", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "time"
)]
pub async fn clock_out(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<ClockOutRequest>,
) -> Result<Json<ApiResponse<TimeEntryResponse>>, ServiceError> {
    let entry = state.services.time_tracking.clock_out(request).await?;
    info!(entry_id = %entry.id, recorded_by = %auth_user.id, "Clock-out recorded");
    Ok(Json(ApiResponse::success(entry)))
}

#[utoipa::path(
    post,
    path = "/api/v1/time-entries",
    summary = "Record a time entry",
    request_body = CreateTimeEntryRequest,
    responses(
        (status = 201, description = "Time entry recorded", body = ApiResponse<TimeEntryResponse>),
        (status = 400, description = "Invalid times or employee already clocked in", body = crate::errors::ErrorResponse),
        (status = 404, description = "Employee not found or inactive", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "time"
)]
pub async fn create_time_entry(
    State(state): State<AppState>,
    Json(request): Json<CreateTimeEntryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TimeEntryResponse>>), ServiceError> {
    let entry = state.services.time_tracking.create_entry(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

#[utoipa::path(
    put,
    path = "/api/v1/time-entries/{id}",
    summary = "Correct a time entry",
    params(("id" = Uuid, Path, description = "Time entry ID")),
    request_body = UpdateTimeEntryRequest,
    responses(
        (status = 200, description = "Time entry updated", body = ApiResponse<TimeEntryResponse>),
        (status = 400, description = "clock_out before clock_in", body = crate::errors::ErrorResponse),
        (status = 404, description = "Time entry not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "time"
)]
pub async fn update_time_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTimeEntryRequest>,
) -> Result<Json<ApiResponse<TimeEntryResponse>>, ServiceError> {
    let entry = state.services.time_tracking.update_entry(id, request).await?;
    Ok(Json(ApiResponse::success(entry)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/time-entries/{id}",
    summary = "Delete time entry",
    params(("id" = Uuid, Path, description = "Time entry ID")),
    responses(
        (status = 200, description = "Time entry deleted", body = ApiResponse<String>),
        (status = 404, description = "Time entry not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "time"
)]
pub async fn delete_time_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.time_tracking.delete_entry(id).await?;
    Ok(Json(ApiResponse::success(
        "Time entry deleted successfully".to_string(),
    )))
}
