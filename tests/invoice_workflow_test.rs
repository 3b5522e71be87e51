mod common;

use agency_backoffice::auth::Role;
use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use regex::Regex;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

const ADMIN: Role = Role::Administrator;

async fn create_invoice(app: &TestApp, body: Value) -> Value {
    let (status, body) = app
        .request_as(ADMIN, Method::POST, "/api/v1/invoices", Some(body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["data"].clone()
}

async fn fetch_invoice(app: &TestApp, id: &str) -> Value {
    let (status, body) = app
        .request_as(ADMIN, Method::GET, &format!("/api/v1/invoices/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    body["data"].clone()
}

fn descriptions(invoice: &Value) -> Vec<String> {
    invoice["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|item| item["description"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn draft_invoice_lifecycle_end_to_end() {
    let app = TestApp::new().await;

    let body = json!({
        "client_id": app.client_id,
        "amount": "100",
        "tax_amount": "10",
        "total_amount": "110",
        "due_date": "2099-12-31",
        "items": [{
            "service_id": app.service_id,
            "description": "Brand workshop",
            "quantity": 2,
            "unit_price": "50",
            "line_total": "100",
        }],
    });

    let invoice = create_invoice(&app, body.clone()).await;
    let number_format = Regex::new(r"^INV-\d+-[A-Z0-9]{5}$").unwrap();
    assert!(number_format.is_match(invoice["invoice_number"].as_str().unwrap()));
    assert_eq!(invoice["status"], "draft");
    assert_eq!(decimal(&invoice["total_amount"]), dec!(110));
    assert_eq!(invoice["items"].as_array().unwrap().len(), 1);

    let id = invoice["id"].as_str().unwrap();
    let (status, _) = app
        .request_as(ADMIN, Method::DELETE, &format!("/api/v1/invoices/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request_as(ADMIN, Method::GET, &format!("/api/v1/invoices/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let invoice = create_invoice(&app, body).await;
    let id = invoice["id"].as_str().unwrap();
    let (status, paid) = app
        .request_as(
            ADMIN,
            Method::PATCH,
            &format!("/api/v1/invoices/{id}/status"),
            Some(json!({ "status": "paid" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["data"]["status"], "paid");
    assert!(!paid["data"]["paid_date"].is_null());

    let (status, error) = app
        .request_as(ADMIN, Method::DELETE, &format!("/api/v1/invoices/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("Only draft invoices can be deleted"));
}

#[tokio::test]
async fn items_read_back_in_submission_order() {
    let app = TestApp::new().await;
    let invoice = create_invoice(
        &app,
        app.invoice_body(&[(1, "10"), (2, "20"), (3, "30"), (4, "40"), (5, "50")]),
    )
    .await;

    let stored = fetch_invoice(&app, invoice["id"].as_str().unwrap()).await;
    assert_eq!(
        descriptions(&stored),
        vec!["Line 1", "Line 2", "Line 3", "Line 4", "Line 5"]
    );
    let quantities: Vec<i64> = stored["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["quantity"].as_i64().unwrap())
        .collect();
    assert_eq!(quantities, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn update_replaces_items_wholesale() {
    let app = TestApp::new().await;
    let invoice = create_invoice(&app, app.invoice_body(&[(1, "10"), (1, "20"), (1, "30")])).await;
    let id = invoice["id"].as_str().unwrap();

    let (status, updated) = app
        .request_as(
            ADMIN,
            Method::PUT,
            &format!("/api/v1/invoices/{id}"),
            Some(app.invoice_body(&[(2, "75"), (1, "5")])),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "update failed: {updated}");

    let stored = fetch_invoice(&app, id).await;
    let items = stored["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(decimal(&items[0]["line_total"]), dec!(150));
    assert_eq!(decimal(&items[1]["line_total"]), dec!(5));
    assert_eq!(decimal(&stored["amount"]), dec!(155));
    assert_eq!(stored["invoice_number"], invoice["invoice_number"]);
}

#[tokio::test]
async fn failed_item_rolls_back_the_whole_update() {
    let app = TestApp::new().await;
    let invoice = create_invoice(&app, app.invoice_body(&[(1, "10"), (1, "20")])).await;
    let id = invoice["id"].as_str().unwrap();

    // The second item references a service that does not exist
    let mut body = app.invoice_body(&[(3, "10"), (3, "10"), (3, "10")]);
    body["items"][1]["service_id"] = json!(uuid::Uuid::new_v4());

    let (status, error) = app
        .request_as(ADMIN, Method::PUT, &format!("/api/v1/invoices/{id}"), Some(body))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["message"], "Failed to update invoice");

    let stored = fetch_invoice(&app, id).await;
    let items = stored["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(decimal(&items[0]["line_total"]), dec!(10));
    assert_eq!(decimal(&items[1]["line_total"]), dec!(20));
    assert_eq!(decimal(&stored["amount"]), dec!(30));
}

#[tokio::test]
async fn non_draft_invoice_cannot_be_changed() {
    let app = TestApp::new().await;
    let invoice = create_invoice(&app, app.invoice_body(&[(1, "40")])).await;
    let id = invoice["id"].as_str().unwrap();

    let (status, _) = app
        .request_as(
            ADMIN,
            Method::PATCH,
            &format!("/api/v1/invoices/{id}/status"),
            Some(json!({ "status": "pending" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = app
        .request_as(
            ADMIN,
            Method::PUT,
            &format!("/api/v1/invoices/{id}"),
            Some(app.invoice_body(&[(9, "9")])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("Only draft invoices can be updated"));

    let (status, _) = app
        .request_as(ADMIN, Method::DELETE, &format!("/api/v1/invoices/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = fetch_invoice(&app, id).await;
    assert_eq!(stored["status"], "pending");
    assert_eq!(descriptions(&stored), vec!["Line 1"]);
    assert_eq!(decimal(&stored["amount"]), dec!(40));
}

#[tokio::test]
async fn inconsistent_totals_are_rejected() {
    let app = TestApp::new().await;

    let mut body = app.invoice_body(&[(2, "50")]);
    body["total_amount"] = json!("999");
    let (status, _) = app
        .request_as(ADMIN, Method::POST, "/api/v1/invoices", Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = app.invoice_body(&[(2, "50")]);
    body["items"] = json!([]);
    let (status, _) = app
        .request_as(ADMIN, Method::POST, "/api/v1/invoices", Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, list) = app
        .request_as(ADMIN, Method::GET, "/api/v1/invoices", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"]["total"], 0);
}

#[tokio::test]
async fn invoices_list_filters_by_status() {
    let app = TestApp::new().await;
    let first = create_invoice(&app, app.invoice_body(&[(1, "10")])).await;
    create_invoice(&app, app.invoice_body(&[(1, "20")])).await;

    let id = first["id"].as_str().unwrap();
    app.request_as(
        ADMIN,
        Method::PATCH,
        &format!("/api/v1/invoices/{id}/status"),
        Some(json!({ "status": "overdue" })),
    )
    .await;

    let (status, list) = app
        .request_as(ADMIN, Method::GET, "/api/v1/invoices?status=overdue", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"]["total"], 1);
    assert_eq!(list["data"]["items"][0]["id"], first["id"]);

    let (_, all) = app
        .request_as(ADMIN, Method::GET, "/api/v1/invoices?limit=1", None)
        .await;
    assert_eq!(all["data"]["total"], 2);
    assert_eq!(all["data"]["total_pages"], 2);
    assert_eq!(all["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invoices_list_filters_by_issue_day_and_client() {
    let app = TestApp::new().await;
    let january = create_invoice(&app, app.invoice_body(&[(1, "10")])).await;

    let mut march = app.invoice_body(&[(1, "20")]);
    march["issue_date"] = json!("2024-03-05");
    march["due_date"] = json!("2024-03-31");
    create_invoice(&app, march).await;

    let (status, globex) = app
        .request_as(
            ADMIN,
            Method::POST,
            "/api/v1/clients",
            Some(json!({
                "name": "Hank Scorpio",
                "email": "hank@globex.test",
                "company": "Globex Corp",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let mut other = app.invoice_body(&[(1, "30")]);
    other["client_id"] = globex["data"]["id"].clone();
    create_invoice(&app, other).await;

    let total = |uri: &'static str| {
        let app = &app;
        async move {
            let (status, list) = app.request_as(ADMIN, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}: {list}");
            list["data"]["total"].as_u64().unwrap()
        }
    };

    assert_eq!(total("/api/v1/invoices?start_date=2024-01-01&end_date=2024-01-01").await, 2);
    assert_eq!(total("/api/v1/invoices?start_date=2024-03-01").await, 1);
    assert_eq!(total("/api/v1/invoices?end_date=2023-12-31").await, 0);
    assert_eq!(total("/api/v1/invoices?search=Studio").await, 2);
    assert_eq!(total("/api/v1/invoices?search=globex").await, 1);
    assert_eq!(total("/api/v1/invoices?search=Scorpio&start_date=2024-02-01").await, 0);

    let number = january["invoice_number"].as_str().unwrap();
    let (_, by_number) = app
        .request_as(
            ADMIN,
            Method::GET,
            &format!("/api/v1/invoices?search={number}"),
            None,
        )
        .await;
    assert_eq!(by_number["data"]["total"], 1);
    assert_eq!(by_number["data"]["items"][0]["id"], january["id"]);

    let (status, _) = app
        .request_as(
            ADMIN,
            Method::GET,
            "/api/v1/invoices?start_date=2024-02-01&end_date=2024-01-01",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn amounts_beyond_decimal_range_are_rejected() {
    let app = TestApp::new().await;
    let mut body = app.invoice_body(&[(1, "10")]);
    body["amount"] = json!("79228162514264337593543950335");
    body["tax_amount"] = json!("1");
    body["total_amount"] = json!("1");

    let (status, error) = app
        .request_as(ADMIN, Method::POST, "/api/v1/invoices", Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{error}");
    assert!(error["message"].as_str().unwrap().contains("too large"));
}
