/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Defines the four account roles, the role → permission catalog used to
 * snapshot an account's permissions, and the access decision applied to each
 * protected route.
 */

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use super::permissions::consts::*;
use super::{AuthError, AuthUser};

/// Account role
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "administrator")]
    Administrator,
    #[sea_orm(string_value = "supervisor")]
    Supervisor,
    #[sea_orm(string_value = "cashier")]
    Cashier,
    #[sea_orm(string_value = "staff")]
    Staff,
}

/// A role together with the permissions new accounts of that role receive.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleDefinition {
    pub role: Role,
    pub description: String,
    pub permissions: Vec<String>,
}

/// Immutable role → permission table.
///
/// Built once at startup and shared through application state. Looking up a
/// role copies its list, so later edits to a catalog never reach accounts
/// that were already stamped.
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    roles: HashMap<Role, RoleDefinition>,
}

impl PermissionCatalog {
    /// Build a catalog from explicit definitions.
    pub fn new(definitions: impl IntoIterator<Item = RoleDefinition>) -> Self {
        let roles = definitions
            .into_iter()
            .map(|definition| (definition.role, definition))
            .collect();
        Self { roles }
    }

    /// The standard agency roles.
    pub fn standard() -> Self {
        fn perms(list: &[&str]) -> Vec<String> {
            list.iter().map(ToString::to_string).collect()
        }

        Self::new([
            RoleDefinition {
                role: Role::Administrator,
                description: "Full access, including user management and deletions".to_string(),
                permissions: perms(&[
                    USER_READ,
                    USER_WRITE,
                    USER_DELETE,
                    EMPLOYEE_READ,
                    EMPLOYEE_WRITE,
                    EMPLOYEE_DELETE,
                    CLIENT_READ,
                    CLIENT_WRITE,
                    CLIENT_DELETE,
                    SERVICE_READ,
                    SERVICE_WRITE,
                    SERVICE_DELETE,
                    PROJECT_READ,
                    PROJECT_WRITE,
                    PROJECT_DELETE,
                    INVOICE_READ,
                    INVOICE_WRITE,
                    INVOICE_DELETE,
                    TRANSACTION_READ,
                    TRANSACTION_WRITE,
                    ANALYTICS_READ,
                    SETTINGS_READ,
                    SETTINGS_WRITE,
                ]),
            },
            RoleDefinition {
                role: Role::Supervisor,
                description: "Day-to-day operations without deletions or user management"
                    .to_string(),
                permissions: perms(&[
                    EMPLOYEE_READ,
                    EMPLOYEE_WRITE,
                    CLIENT_READ,
                    CLIENT_WRITE,
                    SERVICE_READ,
                    SERVICE_WRITE,
                    PROJECT_READ,
                    PROJECT_WRITE,
                    INVOICE_READ,
                    INVOICE_WRITE,
                    TRANSACTION_READ,
                    TRANSACTION_WRITE,
                    ANALYTICS_READ,
                ]),
            },
            RoleDefinition {
                role: Role::Cashier,
                description: "Point of sale: transactions and read access to billing data"
                    .to_string(),
                permissions: perms(&[
                    CLIENT_READ,
                    SERVICE_READ,
                    TRANSACTION_READ,
                    TRANSACTION_WRITE,
                    INVOICE_READ,
                ]),
            },
            RoleDefinition {
                role: Role::Staff,
                description: "Project work and time tracking".to_string(),
                permissions: perms(&[PROJECT_READ, TIME_READ, TIME_WRITE]),
            },
        ])
    }

    /// Permissions a new account with `role` is stamped with.
    pub fn permissions_for(&self, role: Role) -> Vec<String> {
        self.roles
            .get(&role)
            .map(|definition| definition.permissions.clone())
            .unwrap_or_default()
    }

    /// All role definitions, most privileged first.
    pub fn roles(&self) -> Vec<RoleDefinition> {
        let mut definitions: Vec<RoleDefinition> = self.roles.values().cloned().collect();
        definitions.sort_by_key(|definition| rank(definition.role));
        definitions
    }
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn rank(role: Role) -> u8 {
    match role {
        Role::Administrator => 0,
        Role::Supervisor => 1,
        Role::Cashier => 2,
        Role::Staff => 3,
    }
}

/// What a route demands of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequirement {
    /// The caller's stored permission set must contain this string.
    Permission(String),
    /// The caller's stored permission set must contain at least one of these.
    AnyPermission(Vec<String>),
    /// The caller's role must be one of these.
    AnyRole(Vec<Role>),
}

/// Allow or deny `user` against `requirement`.
///
/// Only the account's stored permission set is consulted for permission
/// requirements; the role is not expanded through the catalog here.
pub fn authorize(user: &AuthUser, requirement: &AccessRequirement) -> Result<(), AuthError> {
    let allowed = match requirement {
        AccessRequirement::Permission(permission) => user.has_permission(permission),
        AccessRequirement::AnyPermission(permissions) => permissions
            .iter()
            .any(|permission| user.has_permission(permission)),
        AccessRequirement::AnyRole(roles) => roles.iter().any(|role| user.has_role(*role)),
    };

    if allowed {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.id, role = %user.role, ?requirement, "access denied");
        Err(AuthError::InsufficientPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::PermissionSet;
    use rstest::rstest;
    use uuid::Uuid;

    fn user_with(role: Role, permissions: Vec<String>) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@agency.test".to_string(),
            role,
            permissions: PermissionSet(permissions),
        }
    }

    #[test]
    fn administrator_is_superset_of_every_role() {
        let catalog = PermissionCatalog::standard();
        let admin = catalog.permissions_for(Role::Administrator);
        for role in [Role::Supervisor, Role::Cashier] {
            for permission in catalog.permissions_for(role) {
                assert!(admin.contains(&permission), "{} missing {}", role, permission);
            }
        }
    }

    #[test]
    fn supervisor_has_no_delete_or_user_permissions() {
        let supervisor = PermissionCatalog::standard().permissions_for(Role::Supervisor);
        assert!(supervisor.iter().all(|p| !p.ends_with(":delete")));
        assert!(supervisor.iter().all(|p| !p.starts_with("user:")));
    }

    #[test]
    fn roles_are_listed_most_privileged_first() {
        let roles: Vec<Role> = PermissionCatalog::standard()
            .roles()
            .into_iter()
            .map(|d| d.role)
            .collect();
        assert_eq!(
            roles,
            vec![Role::Administrator, Role::Supervisor, Role::Cashier, Role::Staff]
        );
    }

    #[test]
    fn catalog_lookup_returns_a_copy() {
        let catalog = PermissionCatalog::standard();
        let mut stamped = catalog.permissions_for(Role::Cashier);
        stamped.push("invoice:delete".to_string());
        assert!(!catalog
            .permissions_for(Role::Cashier)
            .contains(&"invoice:delete".to_string()));
    }

    #[rstest]
    #[case(Role::Administrator, INVOICE_DELETE, true)]
    #[case(Role::Supervisor, INVOICE_DELETE, false)]
    #[case(Role::Supervisor, INVOICE_WRITE, true)]
    #[case(Role::Cashier, TRANSACTION_WRITE, true)]
    #[case(Role::Cashier, INVOICE_WRITE, false)]
    #[case(Role::Staff, INVOICE_READ, false)]
    #[case(Role::Staff, TIME_WRITE, true)]
    fn permission_requirement_uses_stamped_set(
        #[case] role: Role,
        #[case] permission: &str,
        #[case] allowed: bool,
    ) {
        let catalog = PermissionCatalog::standard();
        let user = user_with(role, catalog.permissions_for(role));
        let result = authorize(&user, &AccessRequirement::Permission(permission.to_string()));
        assert_eq!(result.is_ok(), allowed);
    }

    #[test]
    fn administrator_role_without_stored_permission_is_denied() {
        let user = user_with(Role::Administrator, vec![]);
        assert!(authorize(
            &user,
            &AccessRequirement::Permission(INVOICE_READ.to_string())
        )
        .is_err());
    }

    #[rstest]
    #[case(Role::Administrator, true)]
    #[case(Role::Supervisor, true)]
    #[case(Role::Staff, true)]
    #[case(Role::Cashier, false)]
    fn any_permission_requirement_accepts_either_grant(#[case] role: Role, #[case] allowed: bool) {
        let catalog = PermissionCatalog::standard();
        let user = user_with(role, catalog.permissions_for(role));
        let requirement = AccessRequirement::AnyPermission(vec![
            TIME_READ.to_string(),
            EMPLOYEE_READ.to_string(),
        ]);
        assert_eq!(authorize(&user, &requirement).is_ok(), allowed);
    }

    #[test]
    fn role_requirement_checks_membership() {
        let requirement = AccessRequirement::AnyRole(vec![Role::Administrator, Role::Supervisor]);
        assert!(authorize(&user_with(Role::Supervisor, vec![]), &requirement).is_ok());
        assert!(authorize(&user_with(Role::Cashier, vec![]), &requirement).is_err());
    }
}
