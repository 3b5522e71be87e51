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
use crate::services::transactions::{
    CreateTransactionRequest, RefundRequest, RefundResponse, TransactionListQuery,
    TransactionResponse, TransactionStatusResponse, TransactionSummary,
    UpdateTransactionStatusRequest,
};
use crate::{ApiResponse, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    summary = "List transactions",
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = ApiResponse<PaginatedResponse<TransactionSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "transactions"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<TransactionSummary>>>, ServiceError> {
    let window = PageWindow::resolve(&state.config, query.page, query.limit)?;
    let (transactions, total) = state
        .services
        .transactions
        .list_transactions(&query, window.page, window.limit)
        .await?;
    Ok(Json(ApiResponse::success(
        window.into_response(transactions, total),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}",
    summary = "Get transaction",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction retrieved successfully", body = ApiResponse<TransactionResponse>),
        (status = 404, description = "Transaction not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "transactions"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ServiceError> {
    let transaction = state.services.transactions.get_transaction(id).await?;
    Ok(Json(ApiResponse::success(transaction)))
}

/// Record a completed sale
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    summary = "Create transaction",
    description = "Record a completed point-of-sale transaction and its line items atomically",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = ApiResponse<TransactionResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 500, description = "Failed to create transaction", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "transactions"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResponse>>), ServiceError> {
    let transaction = state
        .services
        .transactions
        .create_transaction(request, auth_user.id)
        .await?;

    info!(
        transaction_id = %transaction.transaction.id,
        user_id = %auth_user.id,
        "Transaction recorded"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(transaction))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/transactions/{id}/status",
    summary = "Update transaction status",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    request_body = UpdateTransactionStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<TransactionStatusResponse>),
        (status = 404, description = "Transaction not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "transactions"
)]
pub async fn update_transaction_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTransactionStatusRequest>,
) -> Result<Json<ApiResponse<TransactionStatusResponse>>, ServiceError> {
    let status = state
        .services
        .transactions
        .update_status(id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(status)))
}

/// Refund a completed transaction
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/refund",
    summary = "Refund transaction",
    description = "Mark a completed transaction refunded and record a negative reversal. Administrators and supervisors only.",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refund processed", body = ApiResponse<RefundResponse>),
        (status = 400, description = "Transaction cannot be refunded or amount out of range", body = crate::errors::ErrorResponse),
        (status = 403, description = "Caller is not an administrator or supervisor", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transaction not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Failed to process refund", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "transactions"
)]
pub async fn refund_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<RefundRequest>,
) -> Result<Json<ApiResponse<RefundResponse>>, ServiceError> {
    let refund = state
        .services
        .transactions
        .refund_transaction(id, request, auth_user.id)
        .await?;
    Ok(Json(ApiResponse::success(refund)))
}
