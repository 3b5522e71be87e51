mod common;

use agency_backoffice::auth::Role;
use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn record_sale(app: &TestApp, amount: &str, tax: &str) -> Value {
    let (status, body) = app
        .request_as(
            Role::Cashier,
            Method::POST,
            "/api/v1/transactions",
            Some(app.transaction_body(amount, tax)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "sale failed: {body}");
    body["data"].clone()
}

async fn refund(app: &TestApp, role: Role, id: &str, body: Value) -> (StatusCode, Value) {
    app.request_as(
        role,
        Method::POST,
        &format!("/api/v1/transactions/{id}/refund"),
        Some(body),
    )
    .await
}

async fn fetch(app: &TestApp, id: &str) -> Value {
    let (status, body) = app
        .request_as(
            Role::Administrator,
            Method::GET,
            &format!("/api/v1/transactions/{id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    body["data"].clone()
}

async fn transaction_count(app: &TestApp) -> u64 {
    let (_, list) = app
        .request_as(Role::Administrator, Method::GET, "/api/v1/transactions", None)
        .await;
    list["data"]["total"].as_u64().unwrap()
}

#[tokio::test]
async fn full_refund_marks_original_and_records_reversal() {
    let app = TestApp::new().await;
    let sale = record_sale(&app, "100", "10").await;
    assert_eq!(sale["payment_status"], "completed");
    let id = sale["id"].as_str().unwrap();
    let number = sale["transaction_number"].as_str().unwrap();
    assert!(number.starts_with("TXN-"));

    let (status, body) = refund(&app, Role::Administrator, id, json!({})).await;
    assert_eq!(status, StatusCode::OK, "refund failed: {body}");
    let receipt = &body["data"];
    assert_eq!(decimal(&receipt["refund_amount"]), dec!(110));
    assert_eq!(receipt["reversal_number"], format!("REFUND-{number}"));

    let original = fetch(&app, id).await;
    assert_eq!(original["payment_status"], "refunded");
    assert_eq!(decimal(&original["total_amount"]), dec!(110));

    let reversal = fetch(&app, receipt["reversal_id"].as_str().unwrap()).await;
    assert_eq!(reversal["payment_method"], "refund");
    assert_eq!(reversal["payment_status"], "completed");
    assert_eq!(decimal(&reversal["total_amount"]), dec!(-110));
    assert_eq!(decimal(&reversal["tax_amount"]), dec!(0));
    assert!(reversal["client_id"].is_null());
    assert_eq!(reversal["notes"], format!("Refund for {number}"));
}

#[tokio::test]
async fn partial_refund_records_reason() {
    let app = TestApp::new().await;
    let sale = record_sale(&app, "80", "0").await;
    let id = sale["id"].as_str().unwrap();

    let (status, body) = refund(
        &app,
        Role::Supervisor,
        id,
        json!({ "refund_amount": "30", "reason": "damaged" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["refund_amount"]), dec!(30));

    let reversal = fetch(&app, body["data"]["reversal_id"].as_str().unwrap()).await;
    assert_eq!(decimal(&reversal["amount"]), dec!(-30));
    let number = sale["transaction_number"].as_str().unwrap();
    assert_eq!(reversal["notes"], format!("Refund for {number}: damaged"));
}

#[tokio::test]
async fn second_refund_is_rejected() {
    let app = TestApp::new().await;
    let sale = record_sale(&app, "50", "5").await;
    let id = sale["id"].as_str().unwrap();

    let (status, _) = refund(&app, Role::Administrator, id, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = refund(&app, Role::Administrator, id, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("Only completed transactions can be refunded"));
    assert_eq!(transaction_count(&app).await, 2);
}

#[tokio::test]
async fn over_total_refund_is_rejected_before_any_write() {
    let app = TestApp::new().await;
    let sale = record_sale(&app, "40", "4").await;
    let id = sale["id"].as_str().unwrap();

    let (status, error) = refund(
        &app,
        Role::Administrator,
        id,
        json!({ "refund_amount": "44.01" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("cannot exceed original transaction amount"));

    let (status, _) = refund(&app, Role::Administrator, id, json!({ "refund_amount": "0" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let original = fetch(&app, id).await;
    assert_eq!(original["payment_status"], "completed");
    assert_eq!(transaction_count(&app).await, 1);
}

#[tokio::test]
async fn refund_requires_administrator_or_supervisor() {
    let app = TestApp::new().await;
    let sale = record_sale(&app, "20", "2").await;
    let id = sale["id"].as_str().unwrap();

    for role in [Role::Cashier, Role::Staff] {
        let (status, _) = refund(&app, role, id, json!({})).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{role} must not refund");
    }

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/transactions/{id}/refund"),
            Some(json!({})),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(fetch(&app, id).await["payment_status"], "completed");
}

#[tokio::test]
async fn reversals_and_non_completed_sales_cannot_be_refunded() {
    let app = TestApp::new().await;
    let sale = record_sale(&app, "60", "0").await;
    let id = sale["id"].as_str().unwrap();

    let (_, body) = refund(&app, Role::Administrator, id, json!({})).await;
    let reversal_id = body["data"]["reversal_id"].as_str().unwrap().to_string();
    let (status, error) = refund(&app, Role::Administrator, &reversal_id, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("Refund reversals cannot be refunded"));

    let pending = record_sale(&app, "15", "0").await;
    let pending_id = pending["id"].as_str().unwrap();
    let (status, _) = app
        .request_as(
            Role::Cashier,
            Method::PATCH,
            &format!("/api/v1/transactions/{pending_id}/status"),
            Some(json!({ "status": "pending" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = refund(&app, Role::Administrator, pending_id, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refund_payment_method_is_reserved() {
    let app = TestApp::new().await;
    let mut body = app.transaction_body("10", "0");
    body["payment_method"] = json!("refund");

    let (status, _) = app
        .request_as(Role::Cashier, Method::POST, "/api/v1/transactions", Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(transaction_count(&app).await, 0);
}

#[tokio::test]
async fn reopened_sale_can_be_refunded_again_under_a_new_number() {
    let app = TestApp::new().await;
    let sale = record_sale(&app, "40", "0").await;
    let id = sale["id"].as_str().unwrap();
    let number = sale["transaction_number"].as_str().unwrap();

    let (status, first) = refund(&app, Role::Administrator, id, json!({ "refund_amount": "10" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["reversal_number"], format!("REFUND-{number}"));

    let (status, _) = app
        .request_as(
            Role::Cashier,
            Method::PATCH,
            &format!("/api/v1/transactions/{id}/status"),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, second) = refund(&app, Role::Supervisor, id, json!({ "refund_amount": "10" })).await;
    assert_eq!(status, StatusCode::OK, "second refund failed: {second}");
    assert_eq!(second["data"]["reversal_number"], format!("REFUND-{number}-2"));
    assert_ne!(second["data"]["reversal_id"], first["data"]["reversal_id"]);

    assert_eq!(fetch(&app, id).await["payment_status"], "refunded");
    assert_eq!(transaction_count(&app).await, 3);
}

#[tokio::test]
async fn transactions_list_filters_by_day_and_search() {
    let app = TestApp::new().await;
    let sale = record_sale(&app, "40", "4").await;
    let today = chrono::Utc::now().date_naive();
    let yesterday = today.pred_opt().unwrap();

    let total = |uri: String| {
        let app = &app;
        async move {
            let (status, list) = app
                .request_as(Role::Cashier, Method::GET, &uri, None)
                .await;
            assert_eq!(status, StatusCode::OK, "{uri}: {list}");
            list["data"]["total"].as_u64().unwrap()
        }
    };

    assert_eq!(total(format!("/api/v1/transactions?start_date={today}")).await, 1);
    assert_eq!(total(format!("/api/v1/transactions?end_date={yesterday}")).await, 0);
    assert_eq!(
        total(format!("/api/v1/transactions?start_date={yesterday}&end_date={today}")).await,
        1
    );
    assert_eq!(total("/api/v1/transactions?search=studio".to_string()).await, 1);
    assert_eq!(total("/api/v1/transactions?search=Acme".to_string()).await, 1);
    assert_eq!(total("/api/v1/transactions?search=Globex".to_string()).await, 0);

    let number = sale["transaction_number"].as_str().unwrap();
    assert_eq!(total(format!("/api/v1/transactions?search={number}")).await, 1);
}
