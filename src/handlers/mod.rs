pub mod auth;
pub mod clients;
pub mod common;
pub mod employees;
pub mod invoices;
pub mod projects;
pub mod roles;
pub mod services;
pub mod time_entries;
pub mod transactions;
pub mod users;

use std::sync::Arc;

use crate::auth::PermissionCatalog;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::services::{
    clients::ClientService, employees::EmployeeService, invoices::InvoiceService,
    projects::ProjectService, service_catalog::ServiceCatalogService,
    time_tracking::TimeTrackingService, transactions::TransactionService, users::UserService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub invoices: Arc<InvoiceService>,
    pub transactions: Arc<TransactionService>,
    pub clients: Arc<ClientService>,
    pub services: Arc<ServiceCatalogService>,
    pub employees: Arc<EmployeeService>,
    pub projects: Arc<ProjectService>,
    pub time_tracking: Arc<TimeTrackingService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, catalog: Arc<PermissionCatalog>, config: &AppConfig) -> Self {
        let attempts = config.document_number_attempts;
        Self {
            invoices: Arc::new(InvoiceService::new(db.clone(), attempts)),
            transactions: Arc::new(TransactionService::new(db.clone(), attempts)),
            clients: Arc::new(ClientService::new(db.clone())),
            services: Arc::new(ServiceCatalogService::new(db.clone())),
            employees: Arc::new(EmployeeService::new(db.clone())),
            projects: Arc::new(ProjectService::new(db.clone())),
            time_tracking: Arc::new(TimeTrackingService::new(db.clone())),
            users: Arc::new(UserService::new(db, catalog)),
        }
    }
}
