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
use crate::services::invoices::{
    InvoiceListQuery, InvoiceRequest, InvoiceResponse, InvoiceStatusResponse, InvoiceSummary,
    UpdateInvoiceStatusRequest,
};
use crate::{ApiResponse, PaginatedResponse};

/// List invoices
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    summary = "List invoices",
    description = "Paginated invoice headers, newest first, filterable by status and client",
    params(InvoiceListQuery),
    responses(
        (status = 200, description = "Invoices retrieved successfully", body = ApiResponse<PaginatedResponse<InvoiceSummary>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoiceListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<InvoiceSummary>>>, ServiceError> {
    let window = PageWindow::resolve(&state.config, query.page, query.limit)?;
    let (invoices, total) = state
        .services
        .invoices
        .list_invoices(&query, window.page, window.limit)
        .await?;
    Ok(Json(ApiResponse::success(
        window.into_response(invoices, total),
    )))
}

/// Get invoice
#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    summary = "Get invoice",
    description = "Invoice header with its line items in entry order",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice retrieved successfully", body = ApiResponse<InvoiceResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<InvoiceResponse>>, ServiceError> {
    let invoice = state.services.invoices.get_invoice(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

/// Create invoice
#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    summary = "Create invoice",
    description = "Create a draft invoice and its line items atomically",
    request_body = InvoiceRequest,
    responses(
        (status = 201, description = "Invoice created successfully", body = ApiResponse<InvoiceResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Client not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Failed to create invoice", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<InvoiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceResponse>>), ServiceError> {
    let invoice = state
        .services
        .invoices
        .create_invoice(request, auth_user.id)
        .await?;

    info!(
        invoice_id = %invoice.invoice.id,
        invoice_number = %invoice.invoice.invoice_number,
        user_id = %auth_user.id,
        "Invoice created"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(invoice))))
}

/// Replace a draft invoice
#[utoipa::path(
    put,
    path = "/api/v1/invoices/{id}",
    summary = "Update invoice",
    description = "Replace header fields and the full set of line items of a draft invoice",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    request_body = InvoiceRequest,
    responses(
        (status = 200, description = "Invoice updated successfully", body = ApiResponse<InvoiceResponse>),
        (status = 400, description = "Invalid request data or invoice is not a draft", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Failed to update invoice", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<InvoiceRequest>,
) -> Result<Json<ApiResponse<InvoiceResponse>>, ServiceError> {
    let invoice = state.services.invoices.update_invoice(id, request).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

/// Move an invoice to another status
#[utoipa::path(
    patch,
    path = "/api/v1/invoices/{id}/status",
    summary = "Update invoice status",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    request_body = UpdateInvoiceStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<InvoiceStatusResponse>),
        (status = 400, description = "Invalid status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceStatusRequest>,
) -> Result<Json<ApiResponse<InvoiceStatusResponse>>, ServiceError> {
    let status = state
        .services
        .invoices
        .update_status(id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(status)))
}

/// Delete a draft invoice
#[utoipa::path(
    delete,
    path = "/api/v1/invoices/{id}",
    summary = "Delete invoice",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice deleted", body = ApiResponse<String>),
        (status = 400, description = "Invoice is not a draft", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.invoices.delete_invoice(id).await?;
    Ok(Json(ApiResponse::success(
        "Invoice deleted successfully".to_string(),
    )))
}
