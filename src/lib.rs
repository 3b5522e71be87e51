//! Agency back-office API
//!
//! Invoices, point-of-sale transactions, clients, the service catalog,
//! projects and staff time tracking, with role-based access for the people
//! who operate them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    http::HeaderValue,
    response::Json,
    routing::{delete, get, patch, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthConfig, AuthRouterExt, AuthService, PermissionCatalog, Role};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub catalog: Arc<PermissionCatalog>,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wire services around an open connection using the standard role catalog.
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let catalog = Arc::new(PermissionCatalog::standard());
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        let services = handlers::AppServices::new(db.clone(), catalog.clone(), &config);
        Self {
            db,
            config,
            catalog,
            auth,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert_eq!(response.message.as_deref(), Some("oops"));
        assert!(!response.success);
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }
}

/// Versioned API routes, each group gated by the permission it needs.
pub fn api_v1_routes() -> Router<AppState> {
    // Invoices
    let invoices_read = Router::new()
        .route("/invoices", get(handlers::invoices::list_invoices))
        .route("/invoices/:id", get(handlers::invoices::get_invoice))
        .with_permission(perm::INVOICE_READ);

    let invoices_write = Router::new()
        .route("/invoices", post(handlers::invoices::create_invoice))
        .route("/invoices/:id", put(handlers::invoices::update_invoice))
        .route(
            "/invoices/:id/status",
            patch(handlers::invoices::update_invoice_status),
        )
        .with_permission(perm::INVOICE_WRITE);

    let invoices_delete = Router::new()
        .route("/invoices/:id", delete(handlers::invoices::delete_invoice))
        .with_permission(perm::INVOICE_DELETE);

    // Transactions
    let transactions_read = Router::new()
        .route("/transactions", get(handlers::transactions::list_transactions))
        .route(
            "/transactions/:id",
            get(handlers::transactions::get_transaction),
        )
        .with_permission(perm::TRANSACTION_READ);

    let transactions_write = Router::new()
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction),
        )
        .route(
            "/transactions/:id/status",
            patch(handlers::transactions::update_transaction_status),
        )
        .with_permission(perm::TRANSACTION_WRITE);

    // Refunds are decided by role, not by the stored permission set
    let transactions_refund = Router::new()
        .route(
            "/transactions/:id/refund",
            post(handlers::transactions::refund_transaction),
        )
        .with_any_role(&[Role::Administrator, Role::Supervisor]);

    // Clients
    let clients_read = Router::new()
        .route("/clients", get(handlers::clients::list_clients))
        .route("/clients/:id", get(handlers::clients::get_client))
        .with_permission(perm::CLIENT_READ);

    let clients_write = Router::new()
        .route("/clients", post(handlers::clients::create_client))
        .route("/clients/:id", put(handlers::clients::update_client))
        .with_permission(perm::CLIENT_WRITE);

    let clients_delete = Router::new()
        .route("/clients/:id", delete(handlers::clients::delete_client))
        .with_permission(perm::CLIENT_DELETE);

    // Service catalog
    let services_read = Router::new()
        .route("/services", get(handlers::services::list_services))
        .route("/services/:id", get(handlers::services::get_service))
        .with_permission(perm::SERVICE_READ);

    let services_write = Router::new()
        .route("/services", post(handlers::services::create_service))
        .route("/services/:id", put(handlers::services::update_service))
        .with_permission(perm::SERVICE_WRITE);

    let services_delete = Router::new()
        .route("/services/:id", delete(handlers::services::delete_service))
        .with_permission(perm::SERVICE_DELETE);

    // Employees
    let employees_read = Router::new()
        .route("/employees", get(handlers::employees::list_employees))
        .route("/employees/:id", get(handlers::employees::get_employee))
        .with_permission(perm::EMPLOYEE_READ);

    let employees_write = Router::new()
        .route("/employees", post(handlers::employees::create_employee))
        .route("/employees/:id", put(handlers::employees::update_employee))
        .with_permission(perm::EMPLOYEE_WRITE);

    let employees_delete = Router::new()
        .route("/employees/:id", delete(handlers::employees::delete_employee))
        .with_permission(perm::EMPLOYEE_DELETE);

    // Projects
    let projects_read = Router::new()
        .route("/projects", get(handlers::projects::list_projects))
        .route("/projects/:id", get(handlers::projects::get_project))
        .with_permission(perm::PROJECT_READ);

    let projects_write = Router::new()
        .route("/projects", post(handlers::projects::create_project))
        .route("/projects/:id", put(handlers::projects::update_project))
        .route(
            "/projects/:id/progress",
            patch(handlers::projects::update_project_progress),
        )
        .with_permission(perm::PROJECT_WRITE);

    let projects_delete = Router::new()
        .route("/projects/:id", delete(handlers::projects::delete_project))
        .with_permission(perm::PROJECT_DELETE);

    // Time tracking: staff hold time:*, managers reach it through employee:*
    let time_read = Router::new()
        .route("/time-entries", get(handlers::time_entries::list_time_entries))
        .route("/time-entries/:id", get(handlers::time_entries::get_time_entry))
        .route(
            "/time-entries/status/current",
            get(handlers::time_entries::current_clock_status),
        )
        .with_any_permission(&[perm::TIME_READ, perm::EMPLOYEE_READ]);

    let time_clock = Router::new()
        .route("/time-entries/clock-in", post(handlers::time_entries::clock_in))
        .route("/time-entries/clock-out", post(handlers::time_entries::clock_out))
        .with_any_permission(&[perm::TIME_WRITE, perm::EMPLOYEE_WRITE]);

    let time_manage = Router::new()
        .route("/time-entries", post(handlers::time_entries::create_time_entry))
        .route(
            "/time-entries/:id",
            put(handlers::time_entries::update_time_entry)
                .delete(handlers::time_entries::delete_time_entry),
        )
        .with_any_role(&[Role::Administrator, Role::Supervisor]);

    // Users
    let users_read = Router::new()
        .route("/users", get(handlers::users::list_users))
        .route("/users/:id", get(handlers::users::get_user))
        .with_permission(perm::USER_READ);

    let users_write = Router::new()
        .route("/users", post(handlers::users::create_user))
        .route("/users/:id", put(handlers::users::update_user))
        .with_permission(perm::USER_WRITE);

    let users_delete = Router::new()
        .route("/users/:id", delete(handlers::users::delete_user))
        .with_permission(perm::USER_DELETE);

    // Any authenticated caller
    let session = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/password", put(handlers::auth::change_password))
        .route("/roles", get(handlers::roles::list_roles))
        .with_auth();

    let public = Router::new().route("/auth/login", post(handlers::auth::login));

    Router::new()
        .route("/status", get(api_status))
        .merge(public)
        .merge(session)
        .merge(invoices_read)
        .merge(invoices_write)
        .merge(invoices_delete)
        .merge(transactions_read)
        .merge(transactions_write)
        .merge(transactions_refund)
        .merge(clients_read)
        .merge(clients_write)
        .merge(clients_delete)
        .merge(services_read)
        .merge(services_write)
        .merge(services_delete)
        .merge(employees_read)
        .merge(employees_write)
        .merge(employees_delete)
        .merge(projects_read)
        .merge(projects_write)
        .merge(projects_delete)
        .merge(time_read)
        .merge(time_clock)
        .merge(time_manage)
        .merge(users_read)
        .merge(users_write)
        .merge(users_delete)
}

/// CORS from configuration: explicit origins win, otherwise permissive when allowed.
pub fn cors_layer(cfg: &config::AppConfig) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(cfg.cors_allow_credentials),
        )
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            environment = %cfg.environment,
            "Using permissive CORS because explicit origins were not configured"
        );
        Some(CorsLayer::permissive())
    } else {
        None
    }
}

/// Full application router: API, health, Swagger UI and the HTTP middleware stack.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);
    if cors.is_none() {
        ::tracing::warn!("No CORS configuration; cross-origin requests will be rejected by browsers");
    }

    let mut app = Router::new()
        .route("/", get(|| async { "agency-backoffice up" }))
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(Extension(state.auth.clone()))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout));

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app.layer(axum::middleware::from_fn(
        middleware_helpers::request_id_middleware,
    ))
    .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "agency-backoffice",
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(ApiResponse::success(json!({
        "status": db_status,
        "checks": { "database": db_status },
        "timestamp": Utc::now().to_rfc3339(),
    }))))
}
