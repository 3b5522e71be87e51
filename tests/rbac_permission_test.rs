//! Route-level access control: each route group checks the permission set
//! stored on the caller's account, refunds and keyed-in time check the role.

mod common;

use agency_backoffice::auth::Role;
use agency_backoffice::services::users::UpdateUserRequest;
use axum::http::{Method, StatusCode};
use common::TestApp;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case::admin_reads_users(Role::Administrator, "/api/v1/users", true)]
#[case::supervisor_reads_invoices(Role::Supervisor, "/api/v1/invoices", true)]
#[case::supervisor_cannot_read_users(Role::Supervisor, "/api/v1/users", false)]
#[case::cashier_reads_transactions(Role::Cashier, "/api/v1/transactions", true)]
#[case::cashier_reads_invoices(Role::Cashier, "/api/v1/invoices", true)]
#[case::cashier_reads_clients(Role::Cashier, "/api/v1/clients", true)]
#[case::cashier_cannot_read_users(Role::Cashier, "/api/v1/users", false)]
#[case::staff_cannot_read_invoices(Role::Staff, "/api/v1/invoices", false)]
#[case::staff_cannot_read_transactions(Role::Staff, "/api/v1/transactions", false)]
#[case::staff_cannot_read_clients(Role::Staff, "/api/v1/clients", false)]
#[case::staff_cannot_read_services(Role::Staff, "/api/v1/services", false)]
#[case::staff_reads_projects(Role::Staff, "/api/v1/projects", true)]
#[case::staff_reads_time_entries(Role::Staff, "/api/v1/time-entries", true)]
#[case::staff_reads_clock_status(Role::Staff, "/api/v1/time-entries/status/current", true)]
#[case::staff_cannot_read_employees(Role::Staff, "/api/v1/employees", false)]
#[case::admin_reads_time_entries(Role::Administrator, "/api/v1/time-entries", true)]
#[case::supervisor_reads_employees(Role::Supervisor, "/api/v1/employees", true)]
#[case::cashier_cannot_read_projects(Role::Cashier, "/api/v1/projects", false)]
#[case::cashier_cannot_read_time_entries(Role::Cashier, "/api/v1/time-entries", false)]
#[tokio::test]
async fn read_routes_follow_role_permissions(
    #[case] role: Role,
    #[case] uri: &str,
    #[case] allowed: bool,
) {
    let app = TestApp::new().await;
    let (status, _) = app.request_as(role, Method::GET, uri, None).await;

    if allowed {
        assert_eq!(status, StatusCode::OK, "{role} should read {uri}");
    } else {
        assert_eq!(status, StatusCode::FORBIDDEN, "{role} should not read {uri}");
    }
}

#[rstest]
#[case::cashier_cannot_create_invoices(Role::Cashier, Method::POST, "/api/v1/invoices")]
#[case::cashier_cannot_create_clients(Role::Cashier, Method::POST, "/api/v1/clients")]
#[case::staff_cannot_record_sales(Role::Staff, Method::POST, "/api/v1/transactions")]
#[case::supervisor_cannot_create_users(Role::Supervisor, Method::POST, "/api/v1/users")]
#[case::staff_cannot_create_projects(Role::Staff, Method::POST, "/api/v1/projects")]
#[case::staff_cannot_key_in_time(Role::Staff, Method::POST, "/api/v1/time-entries")]
#[case::cashier_cannot_clock_in(Role::Cashier, Method::POST, "/api/v1/time-entries/clock-in")]
#[case::supervisor_cannot_delete_projects(
    Role::Supervisor,
    Method::DELETE,
    "/api/v1/projects/00000000-0000-0000-0000-000000000000"
)]
#[tokio::test]
async fn write_routes_reject_missing_permission(
    #[case] role: Role,
    #[case] method: Method,
    #[case] uri: &str,
) {
    let app = TestApp::new().await;
    let (status, body) = app.request_as(role, method, uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTH_INSUFFICIENT_PERMISSIONS");
}

#[tokio::test]
async fn supervisor_cannot_delete_documents() {
    let app = TestApp::new().await;
    let (status, created) = app
        .request_as(
            Role::Supervisor,
            Method::POST,
            "/api/v1/invoices",
            Some(app.invoice_body(&[(1, "25")])),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap();

    let uri = format!("/api/v1/invoices/{id}");
    let (status, _) = app.request_as(Role::Supervisor, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request_as(Role::Administrator, Method::DELETE, &uri, None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_or_invalid_token_is_unauthorized() {
    let app = TestApp::new().await;

    let (status, _) = app.request(Method::GET, "/api/v1/invoices", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/api/v1/invoices", None, Some("not-a-jwt"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.request(Method::GET, "/api/v1/roles", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stored_permissions_are_checked_not_the_role_defaults() {
    let app = TestApp::new().await;
    let cashier = app.user_id(Role::Cashier);

    let mut permissions = app.state.catalog.permissions_for(Role::Cashier);
    permissions.push("client:write".to_string());
    app.state
        .services
        .users
        .update_user(
            cashier,
            UpdateUserRequest {
                permissions: Some(permissions),
                ..Default::default()
            },
        )
        .await
        .expect("grant client:write");

    // The token issued before the change picks up the stored set
    let (status, body) = app
        .request_as(
            Role::Cashier,
            Method::POST,
            "/api/v1/clients",
            Some(json!({ "name": "Walk-in Co", "email": "walkin@example.test" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[tokio::test]
async fn deactivated_account_loses_access_immediately() {
    let app = TestApp::new().await;
    let staff = app.user_id(Role::Staff);

    let (status, _) = app
        .request_as(Role::Staff, Method::GET, "/api/v1/auth/me", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request_as(
            Role::Administrator,
            Method::DELETE,
            &format!("/api/v1/users/{staff}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request_as(Role::Staff, Method::GET, "/api/v1/auth/me", None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn any_authenticated_caller_can_list_roles() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request_as(Role::Staff, Method::GET, "/api/v1/roles", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let roles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|definition| definition["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["administrator", "supervisor", "cashier", "staff"]);
}
