use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::line_items::non_negative;
use crate::entities::service::{self, Entity as ServiceEntity};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,
    #[validate(range(min = 0))]
    pub duration_hours: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateServiceRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "non_negative")]
    pub price: Option<Decimal>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub duration_hours: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ServiceListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category: Option<String>,
    /// Matches the service name
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: String,
    pub duration_hours: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<service::Model> for ServiceResponse {
    fn from(model: service::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            category: model.category,
            duration_hours: model.duration_hours,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Fails with `NotFound` unless `service_id` names an active catalog entry.
pub async fn ensure_active_service<C>(
    conn: &C,
    service_id: Uuid,
) -> Result<service::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ServiceEntity::find_by_id(service_id)
        .filter(service::Column::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Service {} not found", service_id)))
}

/// The agency's billable offerings.
#[derive(Clone)]
pub struct ServiceCatalogService {
    db: Arc<DatabaseConnection>,
}

impl ServiceCatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request))]
    pub async fn create_service(
        &self,
        request: CreateServiceRequest,
    ) -> Result<ServiceResponse, ServiceError> {
        request.validate()?;

        let model = service::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            price: Set(request.price),
            category: Set(request.category.trim().to_string()),
            duration_hours: Set(request.duration_hours),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(service_id = %model.id, "Service created");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn get_service(&self, service_id: Uuid) -> Result<ServiceResponse, ServiceError> {
        self.find(service_id).await.map(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list_services(
        &self,
        query: &ServiceListQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ServiceResponse>, u64), ServiceError> {
        let mut select = ServiceEntity::find();

        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            select = select.filter(service::Column::Category.eq(category));
        }
        if let Some(is_active) = query.is_active {
            select = select.filter(service::Column::IsActive.eq(is_active));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(service::Column::Name.contains(search));
        }

        let paginator = select
            .order_by_asc(service::Column::Category)
            .order_by_asc(service::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let services = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((services.into_iter().map(Into::into).collect(), total))
    }

    #[instrument(skip(self, request))]
    pub async fn update_service(
        &self,
        service_id: Uuid,
        request: UpdateServiceRequest,
    ) -> Result<ServiceResponse, ServiceError> {
        request.validate()?;
        let mut model: service::ActiveModel = self.find(service_id).await?.into();

        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            model.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            model.price = Set(price);
        }
        if let Some(category) = request.category {
            model.category = Set(category.trim().to_string());
        }
        if let Some(duration_hours) = request.duration_hours {
            model.duration_hours = Set(Some(duration_hours));
        }
        if let Some(is_active) = request.is_active {
            model.is_active = Set(is_active);
        }

        let updated = model.update(&*self.db).await?;
        info!(%service_id, "Service updated");
        Ok(updated.into())
    }

    /// Soft delete: the service stays referenced by existing line items.
    #[instrument(skip(self))]
    pub async fn delete_service(&self, service_id: Uuid) -> Result<(), ServiceError> {
        let mut model: service::ActiveModel = self.find(service_id).await?.into();
        model.is_active = Set(false);
        model.update(&*self.db).await?;

        info!(%service_id, "Service deactivated");
        Ok(())
    }

    async fn find(&self, service_id: Uuid) -> Result<service::Model, ServiceError> {
        ServiceEntity::find_by_id(service_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Service {} not found", service_id)))
    }
}
