mod common;

use agency_backoffice::auth::Role;
use agency_backoffice::services::users::UpdateUserRequest;
use axum::http::{Method, StatusCode};
use common::{TestApp, TEST_PASSWORD};
use serde_json::json;

const ADMIN: Role = Role::Administrator;

#[tokio::test]
async fn login_issues_a_token_for_the_account() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "Cashier@Agency.test", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["user"]["role"], "cashier");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let token = body["data"]["access_token"].as_str().unwrap();
    let (status, me) = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], "cashier@agency.test");
    assert!(!me["data"]["last_login"].is_null());
}

#[tokio::test]
async fn login_rejects_bad_credentials_and_deactivated_accounts() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "staff@agency.test", "password": "wrong-password" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "nobody@agency.test", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let staff = app.user_id(Role::Staff);
    app.request_as(ADMIN, Method::DELETE, &format!("/api/v1/users/{staff}"), None)
        .await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "staff@agency.test", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Account is deactivated");
}

#[tokio::test]
async fn password_change_requires_the_current_password() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request_as(
            Role::Supervisor,
            Method::PUT,
            "/api/v1/auth/password",
            Some(json!({ "current_password": "not-it", "new_password": "new-secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request_as(
            Role::Supervisor,
            Method::PUT,
            "/api/v1/auth/password",
            Some(json!({ "current_password": TEST_PASSWORD, "new_password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request_as(
            Role::Supervisor,
            Method::PUT,
            "/api/v1/auth/password",
            Some(json!({ "current_password": TEST_PASSWORD, "new_password": "new-secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "supervisor@agency.test", "password": "new-secret" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn created_accounts_get_the_role_defaults() {
    let app = TestApp::new().await;
    let body = json!({
        "name": "New Cashier",
        "email": "till2@agency.test",
        "password": "till-password",
        "role": "cashier",
    });

    let (status, created) = app
        .request_as(ADMIN, Method::POST, "/api/v1/users", Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let permissions: Vec<String> =
        serde_json::from_value(created["data"]["permissions"].clone()).unwrap();
    assert_eq!(permissions, app.state.catalog.permissions_for(Role::Cashier));

    let (status, _) = app
        .request_as(ADMIN, Method::POST, "/api/v1/users", Some(body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request_as(
            ADMIN,
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Bad Role",
                "email": "bad@agency.test",
                "password": "whatever1",
                "role": "owner",
            })),
        )
        .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn role_change_restamps_permissions() {
    let app = TestApp::new().await;
    let staff = app.user_id(Role::Staff);

    let (status, updated) = app
        .request_as(
            ADMIN,
            Method::PUT,
            &format!("/api/v1/users/{staff}"),
            Some(json!({ "role": "supervisor" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["role"], "supervisor");
    let permissions: Vec<String> =
        serde_json::from_value(updated["data"]["permissions"].clone()).unwrap();
    assert_eq!(permissions, app.state.catalog.permissions_for(Role::Supervisor));
}

#[tokio::test]
async fn sole_administrator_cannot_be_removed() {
    let app = TestApp::new().await;
    let admin = app.user_id(ADMIN);
    let supervisor = app.user_id(Role::Supervisor);

    // Let the supervisor manage accounts without being an administrator
    let mut permissions = app.state.catalog.permissions_for(Role::Supervisor);
    permissions.extend(["user:read", "user:write", "user:delete"].map(String::from));
    app.state
        .services
        .users
        .update_user(
            supervisor,
            UpdateUserRequest {
                permissions: Some(permissions),
                ..Default::default()
            },
        )
        .await
        .expect("grant user permissions");

    let (status, error) = app
        .request_as(
            Role::Supervisor,
            Method::DELETE,
            &format!("/api/v1/users/{admin}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("Cannot delete the last administrator"));

    let (status, _) = app
        .request_as(
            Role::Supervisor,
            Method::PUT,
            &format!("/api/v1/users/{admin}"),
            Some(json!({ "role": "cashier" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.account(admin).await.unwrap().is_active);

    let (status, _) = app
        .request_as(
            ADMIN,
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Second Admin",
                "email": "admin2@agency.test",
                "password": "admin2-password",
                "role": "administrator",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .request_as(
            Role::Supervisor,
            Method::DELETE,
            &format!("/api/v1/users/{admin}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.account(admin).await.unwrap().is_active);
}

#[tokio::test]
async fn administrators_cannot_delete_themselves() {
    let app = TestApp::new().await;
    let admin = app.user_id(ADMIN);

    let (status, error) = app
        .request_as(ADMIN, Method::DELETE, &format!("/api/v1/users/{admin}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("You cannot delete your own account"));
}

#[tokio::test]
async fn users_list_filters_by_role_and_search() {
    let app = TestApp::new().await;

    let (status, list) = app
        .request_as(ADMIN, Method::GET, "/api/v1/users?role=cashier", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"]["total"], 1);
    assert_eq!(list["data"]["items"][0]["email"], "cashier@agency.test");

    let (_, list) = app
        .request_as(ADMIN, Method::GET, "/api/v1/users?search=agency.test", None)
        .await;
    assert_eq!(list["data"]["total"], 4);
}

#[tokio::test]
async fn racing_administrator_removals_leave_one_standing() {
    let app = TestApp::new().await;
    let first = app.user_id(ADMIN);

    let (status, created) = app
        .request_as(
            ADMIN,
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Second Admin",
                "email": "admin2@agency.test",
                "password": "admin2-password",
                "role": "administrator",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let second: uuid::Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    let users = &app.state.services.users;
    let (a, b) = tokio::join!(users.delete_user(second, first), users.delete_user(first, second));
    assert!(
        a.is_ok() ^ b.is_ok(),
        "exactly one removal should win: {a:?} / {b:?}"
    );

    let remaining = [first, second];
    let mut active = 0;
    for id in remaining {
        if app.account(id).await.unwrap().is_active {
            active += 1;
        }
    }
    assert_eq!(active, 1);
}
