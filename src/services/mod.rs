// Documents
pub mod invoices;
pub mod transactions;

// Document building blocks
pub mod date_range;
pub mod lifecycle;
pub mod line_items;
pub mod numbering;

// Records referenced by documents
pub mod clients;
pub mod service_catalog;

// Delivery
pub mod employees;
pub mod projects;
pub mod time_tracking;

// Accounts
pub mod users;
