//! sea-orm entities backing the back-office schema.

pub mod client;
pub mod employee;
pub mod invoice;
pub mod invoice_item;
pub mod project;
pub mod service;
pub mod time_entry;
pub mod transaction;
pub mod transaction_item;
pub mod user;
