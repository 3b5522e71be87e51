#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use agency_backoffice::{
    auth::{password::hash_password, Role},
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    entities::user::{self, Entity as UserEntity, PermissionSet},
    entities::employee::Position,
    services::{
        clients::CreateClientRequest, employees::CreateEmployeeRequest,
        service_catalog::CreateServiceRequest,
    },
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "password123";

/// Test harness: the full router over a fresh in-memory SQLite database,
/// one active account per role and a seeded client, service and employee.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub users: HashMap<Role, user::Model>,
    tokens: HashMap<Role, String>,
    pub client_id: Uuid,
    pub service_id: Uuid,
    pub employee_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let pool = db::establish_connection_with_config(&DbConfig::in_memory())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);

        // One hash shared by every seeded account keeps setup fast
        let password_hash = hash_password(TEST_PASSWORD).expect("hash test password");
        let mut users = HashMap::new();
        let mut tokens = HashMap::new();
        for role in [
            Role::Administrator,
            Role::Supervisor,
            Role::Cashier,
            Role::Staff,
        ] {
            let account = user::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(format!("Test {}", role)),
                email: Set(format!("{}@agency.test", role)),
                password_hash: Set(password_hash.clone()),
                role: Set(role),
                permissions: Set(PermissionSet(state.catalog.permissions_for(role))),
                is_active: Set(true),
                last_login: Set(None),
                ..Default::default()
            }
            .insert(&*state.db)
            .await
            .expect("seed account");

            let token = state.auth.issue_token(&account).expect("issue token");
            tokens.insert(role, token.access_token);
            users.insert(role, account);
        }

        let client = state
            .services
            .clients
            .create_client(CreateClientRequest {
                name: "Acme Studio".to_string(),
                email: "billing@acme.test".to_string(),
                phone: None,
                company: Some("Acme".to_string()),
                address: None,
                notes: None,
            })
            .await
            .expect("seed client");

        let service = state
            .services
            .services
            .create_service(CreateServiceRequest {
                name: "Brand workshop".to_string(),
                description: None,
                price: Decimal::new(50, 0),
                category: "consulting".to_string(),
                duration_hours: Some(2),
            })
            .await
            .expect("seed service");

        let employee = state
            .services
            .employees
            .create_employee(CreateEmployeeRequest {
                name: "Dana Designer".to_string(),
                email: "dana@agency.test".to_string(),
                phone: None,
                position: Position::Designer,
                department: Some("creative".to_string()),
                salary: None,
                hire_date: None,
            })
            .await
            .expect("seed employee");

        let router = build_router(state.clone());

        Self {
            router,
            state,
            users,
            tokens,
            client_id: client.id,
            service_id: service.id,
            employee_id: employee.id,
        }
    }

    pub fn token(&self, role: Role) -> &str {
        &self.tokens[&role]
    }

    pub fn user_id(&self, role: Role) -> Uuid {
        self.users[&role].id
    }

    /// Send a request with an optional bearer token and decode the JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Request on behalf of the seeded account holding `role`.
    pub async fn request_as(
        &self,
        role: Role,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.request(method, uri, body, Some(self.token(role))).await
    }

    /// An invoice body whose totals agree with its items.
    pub fn invoice_body(&self, items: &[(i32, &str)]) -> Value {
        let lines: Vec<Value> = items
            .iter()
            .enumerate()
            .map(|(i, (qty, unit))| {
                let unit: Decimal = unit.parse().expect("unit price");
                json!({
                    "service_id": self.service_id,
                    "description": format!("Line {}", i + 1),
                    "quantity": qty,
                    "unit_price": unit.to_string(),
                    "line_total": (unit * Decimal::from(*qty)).to_string(),
                })
            })
            .collect();
        let amount: Decimal = items
            .iter()
            .map(|(qty, unit)| unit.parse::<Decimal>().expect("unit price") * Decimal::from(*qty))
            .sum();
        let tax = (amount / Decimal::from(10)).round_dp(2);

        json!({
            "client_id": self.client_id,
            "amount": amount.to_string(),
            "tax_amount": tax.to_string(),
            "total_amount": (amount + tax).to_string(),
            "issue_date": "2024-01-01",
            "due_date": "2024-01-31",
            "items": lines,
        })
    }

    /// A transaction body whose totals agree with its items.
    pub fn transaction_body(&self, amount: &str, tax: &str) -> Value {
        let amount: Decimal = amount.parse().expect("amount");
        let tax: Decimal = tax.parse().expect("tax");
        json!({
            "client_id": self.client_id,
            "amount": amount.to_string(),
            "tax_amount": tax.to_string(),
            "total_amount": (amount + tax).to_string(),
            "payment_method": "card",
            "items": [{
                "service_id": self.service_id,
                "description": "Brand workshop",
                "quantity": 1,
                "unit_price": amount.to_string(),
                "line_total": amount.to_string(),
            }],
        })
    }

    /// A project body for the seeded client and service.
    pub fn project_body(&self, name: &str) -> Value {
        json!({
            "name": name,
            "client_id": self.client_id,
            "service_id": self.service_id,
            "priority": "high",
            "start_date": "2024-01-01",
            "due_date": "2024-02-01",
            "value": "1200.00",
        })
    }

    pub async fn account(&self, id: Uuid) -> Option<user::Model> {
        UserEntity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("load account")
    }
}

/// Read a decimal field that may be serialized as a string or a number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}
