/*!
 * # Permissions Module
 *
 * Permission strings are opaque `resource:action` capability tokens. They are
 * snapshotted onto an account when it is created or updated and compared
 * verbatim against route requirements afterwards.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const WRITE: &'static str = "write";
    pub const DELETE: &'static str = "delete";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const USERS: &'static str = "user";
    pub const EMPLOYEES: &'static str = "employee";
    pub const CLIENTS: &'static str = "client";
    pub const SERVICES: &'static str = "service";
    pub const PROJECTS: &'static str = "project";
    pub const INVOICES: &'static str = "invoice";
    pub const TRANSACTIONS: &'static str = "transaction";
    pub const ANALYTICS: &'static str = "analytics";
    pub const SETTINGS: &'static str = "settings";
    pub const TIME: &'static str = "time";
}

/// Build a permission string from a resource and an action.
pub fn permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Common permission string constants for compile-time safety
pub mod consts {
    // Users
    pub const USER_READ: &str = "user:read";
    pub const USER_WRITE: &str = "user:write";
    pub const USER_DELETE: &str = "user:delete";

    // Employees
    pub const EMPLOYEE_READ: &str = "employee:read";
    pub const EMPLOYEE_WRITE: &str = "employee:write";
    pub const EMPLOYEE_DELETE: &str = "employee:delete";

    // Clients
    pub const CLIENT_READ: &str = "client:read";
    pub const CLIENT_WRITE: &str = "client:write";
    pub const CLIENT_DELETE: &str = "client:delete";

    // Services
    pub const SERVICE_READ: &str = "service:read";
    pub const SERVICE_WRITE: &str = "service:write";
    pub const SERVICE_DELETE: &str = "service:delete";

    // Projects
    pub const PROJECT_READ: &str = "project:read";
    pub const PROJECT_WRITE: &str = "project:write";
    pub const PROJECT_DELETE: &str = "project:delete";

    // Invoices
    pub const INVOICE_READ: &str = "invoice:read";
    pub const INVOICE_WRITE: &str = "invoice:write";
    pub const INVOICE_DELETE: &str = "invoice:delete";

    // Transactions
    pub const TRANSACTION_READ: &str = "transaction:read";
    pub const TRANSACTION_WRITE: &str = "transaction:write";

    // Reporting and settings
    pub const ANALYTICS_READ: &str = "analytics:read";
    pub const SETTINGS_READ: &str = "settings:read";
    pub const SETTINGS_WRITE: &str = "settings:write";

    // Time tracking
    pub const TIME_READ: &str = "time:read";
    pub const TIME_WRITE: &str = "time:write";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_joins_resource_and_action() {
        assert_eq!(
            permission(Resources::INVOICES, Actions::WRITE),
            consts::INVOICE_WRITE
        );
        assert_eq!(
            permission(Resources::TRANSACTIONS, Actions::READ),
            consts::TRANSACTION_READ
        );
    }
}
