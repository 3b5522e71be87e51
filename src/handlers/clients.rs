use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::common::PageWindow;
use super::AppState;
use crate::errors::ServiceError;
use crate::services::clients::{
    ClientListQuery, ClientResponse, CreateClientRequest, UpdateClientRequest,
};
use crate::{ApiResponse, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/clients",
    summary = "List clients",
    params(ClientListQuery),
    responses(
        (status = 200, description = "Clients retrieved successfully", body = ApiResponse<PaginatedResponse<ClientResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "clients"
)]
pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ClientListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<ClientResponse>>>, ServiceError> {
    let window = PageWindow::resolve(&state.config, query.page, query.limit)?;
    let (clients, total) = state
        .services
        .clients
        .list_clients(&query, window.page, window.limit)
        .await?;
    Ok(Json(ApiResponse::success(window.into_response(clients, total))))
}

#[utoipa::path(
    get,
    path = "/api/v1/clients/{id}",
    summary = "Get client",
    params(("id" = Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client retrieved successfully", body = ApiResponse<ClientResponse>),
        (status = 404, description = "Client not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "clients"
)]
pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ClientResponse>>, ServiceError> {
    let client = state.services.clients.get_client(id).await?;
    Ok(Json(ApiResponse::success(client)))
}

#[utoipa::path(
    post,
    path = "/api/v1/clients",
    summary = "Create client",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Client created successfully", body = ApiResponse<ClientResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "clients"
)]
pub async fn create_client(
    State(state): State<AppState>,
    Json(request): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ClientResponse>>), ServiceError> {
    let client = state.services.clients.create_client(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(client))))
}

#[utoipa::path(
    put,
    path = "/api/v1/clients/{id}",
    summary = "Update client",
    params(("id" = Uuid, Path, description = "Client ID")),
    request_body = UpdateClientRequest,
    responses(
        (status = 200, description = "Client updated successfully", body = ApiResponse<ClientResponse>),
        (status = 404, description = "Client not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "clients"
)]
pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateClientRequest>,
) -> Result<Json<ApiResponse<ClientResponse>>, ServiceError> {
    let client = state.services.clients.update_client(id, request).await?;
    Ok(Json(ApiResponse::success(client)))
}

/// Deactivate a client that no document references
#[utoipa::path(
    delete,
    path = "/api/v1/clients/{id}",
    summary = "Delete client",
    params(("id" = Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client deleted", body = ApiResponse<String>),
        (status = 400, description = "Client still has invoices or transactions", body = crate::errors::ErrorResponse),
        (status = 404, description = "Client not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "clients"
)]
pub async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.clients.delete_client(id).await?;
    Ok(Json(ApiResponse::success(
        "Client deleted successfully".to_string(),
    )))
}
