use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Agency Back-Office API",
        version = "1.0.0",
        description = r#"
# Agency Back-Office API

Invoicing, point-of-sale transactions, clients, the service catalog, projects
and time tracking for a service agency, with role-based access for staff.

## Authentication

Obtain a token from `POST /api/v1/auth/login` and send it on every other call:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures share one body shape:

```json
{
  "error": "Bad Request",
  "message": "Invalid operation: Only draft invoices can be updated",
  "request_id": "2f0c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login and the caller's own account"),
        (name = "invoices", description = "Invoices and their line items"),
        (name = "transactions", description = "Point-of-sale transactions and refunds"),
        (name = "clients", description = "Client records"),
        (name = "services", description = "Service catalog"),
        (name = "projects", description = "Client projects and their progress"),
        (name = "employees", description = "Employee records"),
        (name = "time", description = "Clock-in, clock-out and time entries"),
        (name = "users", description = "Back-office accounts and roles")
    ),
    paths(
        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::auth::change_password,

        // Invoices
        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::create_invoice,
        crate::handlers::invoices::update_invoice,
        crate::handlers::invoices::update_invoice_status,
        crate::handlers::invoices::delete_invoice,

        // Transactions
        crate::handlers::transactions::list_transactions,
        crate::handlers::transactions::get_transaction,
        crate::handlers::transactions::create_transaction,
        crate::handlers::transactions::update_transaction_status,
        crate::handlers::transactions::refund_transaction,

        // Clients
        crate::handlers::clients::list_clients,
        crate::handlers::clients::get_client,
        crate::handlers::clients::create_client,
        crate::handlers::clients::update_client,
        crate::handlers::clients::delete_client,

        // Services
        crate::handlers::services::list_services,
        crate::handlers::services::get_service,
        crate::handlers::services::create_service,
        crate::handlers::services::update_service,
        crate::handlers::services::delete_service,

        // Projects
        crate::handlers::projects::list_projects,
        crate::handlers::projects::get_project,
        crate::handlers::projects::create_project,
        crate::handlers::projects::update_project,
        crate::handlers::projects::update_project_progress,
        crate::handlers::projects::delete_project,

        // Employees and time tracking
        crate::handlers::employees::list_employees,
        crate::handlers::employees::get_employee,
        crate::handlers::employees::create_employee,
        crate::handlers::employees::update_employee,
        crate::handlers::employees::delete_employee,
        crate::handlers::time_entries::list_time_entries,
        crate::handlers::time_entries::get_time_entry,
        crate::handlers::time_entries::current_clock_status,
        crate::handlers::time_entries::clock_in,
        crate::handlers::time_entries::clock_out,
        crate::handlers::time_entries::create_time_entry,
        crate::handlers::time_entries::update_time_entry,
        crate::handlers::time_entries::delete_time_entry,

        // Users and roles
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::create_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::roles::list_roles,
    ),
    components(
        schemas(
            // Auth
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::LoginResponse,
            crate::auth::TokenResponse,
            crate::auth::Role,
            crate::auth::RoleDefinition,

            // Documents
            crate::services::line_items::LineItemInput,
            crate::services::line_items::LineItemResponse,
            crate::services::invoices::InvoiceRequest,
            crate::services::invoices::InvoiceSummary,
            crate::services::invoices::InvoiceResponse,
            crate::services::invoices::UpdateInvoiceStatusRequest,
            crate::services::invoices::InvoiceStatusResponse,
            crate::entities::invoice::InvoiceStatus,
            crate::services::transactions::CreateTransactionRequest,
            crate::services::transactions::TransactionSummary,
            crate::services::transactions::TransactionResponse,
            crate::services::transactions::UpdateTransactionStatusRequest,
            crate::services::transactions::TransactionStatusResponse,
            crate::services::transactions::RefundRequest,
            crate::services::transactions::RefundResponse,
            crate::entities::transaction::PaymentMethod,
            crate::entities::transaction::PaymentStatus,

            // Records
            crate::services::clients::CreateClientRequest,
            crate::services::clients::UpdateClientRequest,
            crate::services::clients::ClientResponse,
            crate::services::service_catalog::CreateServiceRequest,
            crate::services::service_catalog::UpdateServiceRequest,
            crate::services::service_catalog::ServiceResponse,
            crate::services::projects::CreateProjectRequest,
            crate::services::projects::UpdateProjectRequest,
            crate::services::projects::UpdateProgressRequest,
            crate::services::projects::ProjectResponse,
            crate::entities::project::ProjectStatus,
            crate::entities::project::ProjectPriority,
            crate::services::employees::CreateEmployeeRequest,
            crate::services::employees::UpdateEmployeeRequest,
            crate::services::employees::EmployeeResponse,
            crate::entities::employee::Position,
            crate::services::time_tracking::ClockInRequest,
            crate::services::time_tracking::ClockOutRequest,
            crate::services::time_tracking::CreateTimeEntryRequest,
            crate::services::time_tracking::UpdateTimeEntryRequest,
            crate::services::time_tracking::TimeEntryResponse,
            crate::services::time_tracking::EmployeeClockStatus,
            crate::entities::time_entry::ClockStatus,
            crate::services::users::CreateUserRequest,
            crate::services::users::UpdateUserRequest,
            crate::services::users::ChangePasswordRequest,
            crate::services::users::UserResponse,

            // Errors
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_routes_and_bearer_scheme() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Agency Back-Office API"));
        assert!(json.contains("/api/v1/invoices/{id}"));
        assert!(json.contains("/api/v1/transactions/{id}/refund"));
        assert!(json.contains("/api/v1/projects/{id}/progress"));
        assert!(json.contains("/api/v1/time-entries/clock-in"));
        assert!(json.contains("\"Bearer\""));
    }
}
