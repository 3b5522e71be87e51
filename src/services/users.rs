use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{PermissionCatalog, Role};
use crate::db::transaction::with_transaction;
use crate::entities::user::{self, Entity as UserEntity, PermissionSet};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<Role>,
    /// Explicit permission set; when omitted a role change restamps the role's defaults
    pub permissions: Option<Vec<String>>,
    pub is_active: Option<bool>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Matches name or email
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            permissions: model.permissions.into_vec(),
            is_active: model.is_active,
            last_login: model.last_login,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn check_permission_strings(permissions: &[String]) -> Result<(), ServiceError> {
    match permissions
        .iter()
        .find(|p| p.split_once(':').map_or(true, |(r, a)| r.is_empty() || a.is_empty()))
    {
        Some(bad) => Err(ServiceError::ValidationError(format!(
            "Invalid permission '{}': expected resource:action",
            bad
        ))),
        None => Ok(()),
    }
}

/// Back-office accounts. Permissions are stamped from the catalog when an
/// account is created or its role changes and are not re-derived afterwards.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<PermissionCatalog>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, catalog: Arc<PermissionCatalog>) -> Self {
        Self { db, catalog }
    }

    #[instrument(skip(self, request), fields(role = %request.role))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        ensure_email_free(&*self.db, &email, None).await?;

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            password_hash: Set(hash_password(&request.password)?),
            role: Set(request.role),
            permissions: Set(PermissionSet(self.catalog.permissions_for(request.role))),
            is_active: Set(true),
            last_login: Set(None),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = %model.id, role = %model.role, "User created");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        self.find(user_id).await.map(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        query: &UserListQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<UserResponse>, u64), ServiceError> {
        let mut select = UserEntity::find();

        if let Some(role) = query.role {
            select = select.filter(user::Column::Role.eq(role));
        }
        if let Some(is_active) = query.is_active {
            select = select.filter(user::Column::IsActive.eq(is_active));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(user::Column::Name.contains(search))
                    .add(user::Column::Email.contains(search)),
            );
        }

        let paginator = select
            .order_by_asc(user::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((users.into_iter().map(Into::into).collect(), total))
    }

    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        if let Some(permissions) = &request.permissions {
            check_permission_strings(permissions)?;
        }
        let password_hash = request.password.as_deref().map(hash_password).transpose()?;
        let catalog = self.catalog.clone();

        let updated = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let existing = find_user(txn, user_id).await?;
                let loses_admin = existing.role == Role::Administrator
                    && existing.is_active
                    && (request.role.map_or(false, |r| r != Role::Administrator)
                        || request.is_active == Some(false));
                if loses_admin {
                    ensure_not_last_admin(txn, user_id, "demote or deactivate").await?;
                }

                let mut model: user::ActiveModel = existing.into();

                if let Some(email) = request.email {
                    let email = email.trim().to_lowercase();
                    ensure_email_free(txn, &email, Some(user_id)).await?;
                    model.email = Set(email);
                }
                if let Some(name) = request.name {
                    model.name = Set(name.trim().to_string());
                }
                if let Some(role) = request.role {
                    model.role = Set(role);
                }
                match (request.permissions, request.role) {
                    (Some(permissions), _) => model.permissions = Set(PermissionSet(permissions)),
                    (None, Some(role)) => {
                        model.permissions = Set(PermissionSet(catalog.permissions_for(role)))
                    }
                    (None, None) => {}
                }
                if let Some(is_active) = request.is_active {
                    model.is_active = Set(is_active);
                }
                if let Some(hash) = password_hash {
                    model.password_hash = Set(hash);
                }

                Ok(model.update(txn).await?)
            })
        })
        .await?;

        info!(%user_id, role = %updated.role, "User updated");
        Ok(updated.into())
    }

    /// Deactivate an account. The last active administrator cannot be removed.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: Uuid, acting_user: Uuid) -> Result<(), ServiceError> {
        if user_id == acting_user {
            return Err(ServiceError::InvalidOperation(
                "You cannot delete your own account".to_string(),
            ));
        }

        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let existing = find_user(txn, user_id).await?;
                if existing.role == Role::Administrator && existing.is_active {
                    ensure_not_last_admin(txn, user_id, "delete").await?;
                }

                let mut model: user::ActiveModel = existing.into();
                model.is_active = Set(false);
                model.update(txn).await?;
                Ok(())
            })
        })
        .await?;

        info!(%user_id, "User deactivated");
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;
        let existing = self.find(user_id).await?;

        if !verify_password(&request.current_password, &existing.password_hash)? {
            warn!(%user_id, "password change with wrong current password");
            return Err(ServiceError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut model: user::ActiveModel = existing.into();
        model.password_hash = Set(hash_password(&request.new_password)?);
        model.update(&*self.db).await?;

        info!(%user_id, "Password changed");
        Ok(())
    }

    /// Create the first administrator when the users table is empty.
    pub async fn ensure_bootstrap_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<UserResponse>, ServiceError> {
        if UserEntity::find().count(&*self.db).await? > 0 {
            return Ok(None);
        }

        let admin = self
            .create_user(CreateUserRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: Role::Administrator,
            })
            .await?;
        info!(user_id = %admin.id, "Bootstrap administrator created");
        Ok(Some(admin))
    }

    async fn find(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        find_user(&*self.db, user_id).await
    }
}

async fn find_user<C>(conn: &C, user_id: Uuid) -> Result<user::Model, ServiceError>
where
    C: ConnectionTrait,
{
    UserEntity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
}

/// Fail unless an active administrator other than `user_id` remains.
///
/// The active administrator rows are locked for the rest of the transaction,
/// so two removals racing each other are decided one after the other.
async fn ensure_not_last_admin<C>(conn: &C, user_id: Uuid, action: &str) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let admins = UserEntity::find()
        .filter(user::Column::Role.eq(Role::Administrator))
        .filter(user::Column::IsActive.eq(true))
        .lock_exclusive()
        .all(conn)
        .await?;

    if !admins.iter().any(|admin| admin.id != user_id) {
        warn!(%user_id, "refusing to remove the last administrator");
        return Err(ServiceError::InvalidOperation(format!(
            "Cannot {} the last administrator",
            action
        )));
    }
    Ok(())
}

async fn ensure_email_free<C>(conn: &C, email: &str, except: Option<Uuid>) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let mut select = UserEntity::find().filter(user::Column::Email.eq(email));
    if let Some(id) = except {
        select = select.filter(user::Column::Id.ne(id));
    }
    if select.count(conn).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "A user with email {} already exists",
            email
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_strings_must_be_resource_action() {
        assert!(check_permission_strings(&["invoice:read".to_string()]).is_ok());
        assert!(check_permission_strings(&["invoice".to_string()]).is_err());
        assert!(check_permission_strings(&[":read".to_string()]).is_err());
        assert!(check_permission_strings(&[]).is_ok());
    }
}
