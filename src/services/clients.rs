use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::entities::client::{self, Entity as ClientEntity};
use crate::entities::{invoice, transaction};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ClientListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Matches name, email or company
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<client::Model> for ClientResponse {
    fn from(model: client::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            company: model.company,
            address: model.address,
            notes: model.notes,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Fails with `NotFound` unless `client_id` names an active client.
pub async fn ensure_active_client<C>(conn: &C, client_id: Uuid) -> Result<client::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ClientEntity::find_by_id(client_id)
        .filter(client::Column::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Client {} not found", client_id)))
}

/// Rows whose joined client name or company contains `search`.
pub(crate) fn client_name_matches(search: &str) -> Condition {
    Condition::any()
        .add(client::Column::Name.contains(search))
        .add(client::Column::Company.contains(search))
}

/// Client records: the party referenced by invoices and transactions.
#[derive(Clone)]
pub struct ClientService {
    db: Arc<DatabaseConnection>,
}

impl ClientService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request))]
    pub async fn create_client(
        &self,
        request: CreateClientRequest,
    ) -> Result<ClientResponse, ServiceError> {
        request.validate()?;
        let db = &*self.db;
        let email = request.email.trim().to_lowercase();

        self.ensure_email_free(&email, None).await?;

        let model = client::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            phone: Set(request.phone),
            company: Set(request.company),
            address: Set(request.address),
            notes: Set(request.notes),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(client_id = %model.id, "Client created");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn get_client(&self, client_id: Uuid) -> Result<ClientResponse, ServiceError> {
        self.find(client_id).await.map(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list_clients(
        &self,
        query: &ClientListQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ClientResponse>, u64), ServiceError> {
        let mut select = ClientEntity::find();

        if let Some(is_active) = query.is_active {
            select = select.filter(client::Column::IsActive.eq(is_active));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(client::Column::Name.contains(search))
                    .add(client::Column::Email.contains(search))
                    .add(client::Column::Company.contains(search)),
            );
        }

        let paginator = select
            .order_by_asc(client::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let clients = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((clients.into_iter().map(Into::into).collect(), total))
    }

    #[instrument(skip(self, request))]
    pub async fn update_client(
        &self,
        client_id: Uuid,
        request: UpdateClientRequest,
    ) -> Result<ClientResponse, ServiceError> {
        request.validate()?;
        let existing = self.find(client_id).await?;
        let mut model: client::ActiveModel = existing.into();

        if let Some(email) = request.email {
            let email = email.trim().to_lowercase();
            self.ensure_email_free(&email, Some(client_id)).await?;
            model.email = Set(email);
        }
        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(phone) = request.phone {
            model.phone = Set(Some(phone));
        }
        if let Some(company) = request.company {
            model.company = Set(Some(company));
        }
        if let Some(address) = request.address {
            model.address = Set(Some(address));
        }
        if let Some(notes) = request.notes {
            model.notes = Set(Some(notes));
        }
        if let Some(is_active) = request.is_active {
            model.is_active = Set(is_active);
        }

        let updated = model.update(&*self.db).await?;
        info!(%client_id, "Client updated");
        Ok(updated.into())
    }

    /// Deactivate a client that no document references.
    #[instrument(skip(self))]
    pub async fn delete_client(&self, client_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let existing = self.find(client_id).await?;

        let invoices = invoice::Entity::find()
            .filter(invoice::Column::ClientId.eq(client_id))
            .count(db)
            .await?;
        let transactions = transaction::Entity::find()
            .filter(transaction::Column::ClientId.eq(client_id))
            .count(db)
            .await?;

        if invoices > 0 || transactions > 0 {
            warn!(%client_id, invoices, transactions, "refusing to delete referenced client");
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot delete client with existing invoices ({}) or transactions ({})",
                invoices, transactions
            )));
        }

        let mut model: client::ActiveModel = existing.into();
        model.is_active = Set(false);
        model.update(db).await?;

        info!(%client_id, "Client deactivated");
        Ok(())
    }

    async fn find(&self, client_id: Uuid) -> Result<client::Model, ServiceError> {
        ClientEntity::find_by_id(client_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Client {} not found", client_id)))
    }

    async fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut select = ClientEntity::find().filter(client::Column::Email.eq(email));
        if let Some(id) = except {
            select = select.filter(client::Column::Id.ne(id));
        }
        if select.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "A client with email {} already exists",
                email
            )));
        }
        Ok(())
    }
}
