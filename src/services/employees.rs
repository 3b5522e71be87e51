use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
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

use super::date_range::search_term;
use super::line_items::non_negative;
use crate::entities::employee::{self, Entity as EmployeeEntity, Position};
use crate::entities::time_entry;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub position: Position,
    #[validate(length(max = 50))]
    pub department: Option<String>,
    #[validate(custom = "non_negative")]
    pub salary: Option<Decimal>,
    pub hire_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateEmployeeRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub position: Option<Position>,
    #[validate(length(max = 50))]
    pub department: Option<String>,
    #[validate(custom = "non_negative")]
    pub salary: Option<Decimal>,
    pub hire_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct EmployeeListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Matches name or email
    pub search: Option<String>,
    pub position: Option<Position>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: Position,
    pub department: Option<String>,
    pub salary: Option<Decimal>,
    pub hire_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<employee::Model> for EmployeeResponse {
    fn from(model: employee::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            position: model.position,
            department: model.department,
            salary: model.salary,
            hire_date: model.hire_date,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Fails with `NotFound` unless `employee_id` names an active employee.
///
/// The row is locked for the rest of the surrounding transaction so that
/// concurrent clock-ins for one employee run one after the other.
pub async fn ensure_active_employee<C>(
    conn: &C,
    employee_id: Uuid,
) -> Result<employee::Model, ServiceError>
where
    C: ConnectionTrait,
{
    EmployeeEntity::find_by_id(employee_id)
        .filter(employee::Column::IsActive.eq(true))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Employee {} not found or inactive", employee_id))
        })
}

/// Staff records used for project assignment and time tracking.
#[derive(Clone)]
pub struct EmployeeService {
    db: Arc<DatabaseConnection>,
}

impl EmployeeService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request))]
    pub async fn create_employee(
        &self,
        request: CreateEmployeeRequest,
    ) -> Result<EmployeeResponse, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        self.ensure_email_free(&email, None).await?;

        let model = employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            phone: Set(request.phone),
            position: Set(request.position),
            department: Set(request.department),
            salary: Set(request.salary),
            hire_date: Set(request.hire_date),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(employee_id = %model.id, position = %model.position, "Employee created");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn get_employee(&self, employee_id: Uuid) -> Result<EmployeeResponse, ServiceError> {
        self.find(employee_id).await.map(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list_employees(
        &self,
        query: &EmployeeListQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<EmployeeResponse>, u64), ServiceError> {
        let mut select = EmployeeEntity::find();

        if let Some(position) = query.position {
            select = select.filter(employee::Column::Position.eq(position));
        }
        if let Some(department) = query.department.as_deref().filter(|d| !d.is_empty()) {
            select = select.filter(employee::Column::Department.eq(department));
        }
        if let Some(is_active) = query.is_active {
            select = select.filter(employee::Column::IsActive.eq(is_active));
        }
        if let Some(search) = search_term(&query.search) {
            select = select.filter(
                Condition::any()
                    .add(employee::Column::Name.contains(search))
                    .add(employee::Column::Email.contains(search)),
            );
        }

        let paginator = select
            .order_by_asc(employee::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let employees = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((employees.into_iter().map(Into::into).collect(), total))
    }

    #[instrument(skip(self, request))]
    pub async fn update_employee(
        &self,
        employee_id: Uuid,
        request: UpdateEmployeeRequest,
    ) -> Result<EmployeeResponse, ServiceError> {
        request.validate()?;
        let mut model: employee::ActiveModel = self.find(employee_id).await?.into();

        if let Some(email) = request.email {
            let email = email.trim().to_lowercase();
            self.ensure_email_free(&email, Some(employee_id)).await?;
            model.email = Set(email);
        }
        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(phone) = request.phone {
            model.phone = Set(Some(phone));
        }
        if let Some(position) = request.position {
            model.position = Set(position);
        }
        if let Some(department) = request.department {
            model.department = Set(Some(department));
        }
        if let Some(salary) = request.salary {
            model.salary = Set(Some(salary));
        }
        if let Some(hire_date) = request.hire_date {
            model.hire_date = Set(Some(hire_date));
        }
        if let Some(is_active) = request.is_active {
            model.is_active = Set(is_active);
        }

        let updated = model.update(&*self.db).await?;
        info!(%employee_id, "Employee updated");
        Ok(updated.into())
    }

    /// Deactivate an employee with no recorded time.
    #[instrument(skip(self))]
    pub async fn delete_employee(&self, employee_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let existing = self.find(employee_id).await?;

        let entries = time_entry::Entity::find()
            .filter(time_entry::Column::EmployeeId.eq(employee_id))
            .count(db)
            .await?;
        if entries > 0 {
            warn!(%employee_id, entries, "refusing to delete employee with time entries");
            return Err(ServiceError::InvalidOperation(
                "Cannot delete employee with associated time entries".to_string(),
            ));
        }

        let mut model: employee::ActiveModel = existing.into();
        model.is_active = Set(false);
        model.update(db).await?;

        info!(%employee_id, "Employee deactivated");
        Ok(())
    }

    async fn find(&self, employee_id: Uuid) -> Result<employee::Model, ServiceError> {
        EmployeeEntity::find_by_id(employee_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Employee {} not found", employee_id)))
    }

    async fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut select = EmployeeEntity::find().filter(employee::Column::Email.eq(email));
        if let Some(id) = except {
            select = select.filter(employee::Column::Id.ne(id));
        }
        if select.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "An employee with email {} already exists",
                email
            )));
        }
        Ok(())
    }
}
