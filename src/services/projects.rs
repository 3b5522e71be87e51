use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::clients::{client_name_matches, ensure_active_client};
use super::date_range::search_term;
use super::employees::ensure_active_employee;
use super::line_items::non_negative;
use super::service_catalog::ensure_active_service;
use crate::entities::project::{self, Entity as ProjectEntity, ProjectPriority, ProjectStatus};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters"))]
    pub name: String,
    pub client_id: Uuid,
    pub service_id: Uuid,
    pub assigned_to: Option<Uuid>,
    /// Defaults to `brief_received`
    pub status: Option<ProjectStatus>,
    /// Defaults to `medium`
    pub priority: Option<ProjectPriority>,
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(custom = "non_negative")]
    pub value: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    pub client_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<ProjectPriority>,
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(custom = "non_negative")]
    pub value: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Progress report from the people doing the work.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProgressRequest {
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i32>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ProjectListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Matches the project name or the client's name or company
    pub search: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<ProjectPriority>,
    pub client_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub client_id: Uuid,
    pub service_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    pub progress: i32,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub value: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<project::Model> for ProjectResponse {
    fn from(model: project::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            client_id: model.client_id,
            service_id: model.service_id,
            assigned_to: model.assigned_to,
            status: model.status,
            priority: model.priority,
            progress: model.progress,
            start_date: model.start_date,
            due_date: model.due_date,
            value: model.value,
            notes: model.notes,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn check_schedule(start: Option<NaiveDate>, due: Option<NaiveDate>) -> Result<(), ServiceError> {
    match (start, due) {
        (Some(start), Some(due)) if due < start => Err(ServiceError::ValidationError(
            "due_date must not be before start_date".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Client work in flight, from brief to delivery.
#[derive(Clone)]
pub struct ProjectService {
    db: Arc<DatabaseConnection>,
}

impl ProjectService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request))]
    pub async fn create_project(
        &self,
        request: CreateProjectRequest,
        created_by: Uuid,
    ) -> Result<ProjectResponse, ServiceError> {
        request.validate()?;
        check_schedule(request.start_date, request.due_date)?;

        let db = &*self.db;
        ensure_references(db, Some(request.client_id), Some(request.service_id), request.assigned_to)
            .await?;

        let model = project::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            client_id: Set(request.client_id),
            service_id: Set(request.service_id),
            assigned_to: Set(request.assigned_to),
            status: Set(request.status.unwrap_or(ProjectStatus::BriefReceived)),
            priority: Set(request.priority.unwrap_or(ProjectPriority::Medium)),
            progress: Set(request.progress.unwrap_or(0)),
            start_date: Set(request.start_date),
            due_date: Set(request.due_date),
            value: Set(request.value.unwrap_or(Decimal::ZERO)),
            notes: Set(request.notes),
            created_by: Set(Some(created_by)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(project_id = %model.id, client_id = %model.client_id, "Project created");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn get_project(&self, project_id: Uuid) -> Result<ProjectResponse, ServiceError> {
        self.find(project_id).await.map(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list_projects(
        &self,
        query: &ProjectListQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ProjectResponse>, u64), ServiceError> {
        let mut select = ProjectEntity::find();

        if let Some(status) = query.status {
            select = select.filter(project::Column::Status.eq(status));
        }
        if let Some(priority) = query.priority {
            select = select.filter(project::Column::Priority.eq(priority));
        }
        if let Some(client_id) = query.client_id {
            select = select.filter(project::Column::ClientId.eq(client_id));
        }
        if let Some(assigned_to) = query.assigned_to {
            select = select.filter(project::Column::AssignedTo.eq(assigned_to));
        }
        if let Some(search) = search_term(&query.search) {
            select = select
                .join(JoinType::LeftJoin, project::Relation::Client.def())
                .filter(
                    Condition::any()
                        .add(project::Column::Name.contains(search))
                        .add(client_name_matches(search)),
                );
        }

        let paginator = select
            .order_by_desc(project::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let projects = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((projects.into_iter().map(Into::into).collect(), total))
    }

    #[instrument(skip(self, request))]
    pub async fn update_project(
        &self,
        project_id: Uuid,
        request: UpdateProjectRequest,
    ) -> Result<ProjectResponse, ServiceError> {
        request.validate()?;
        let db = &*self.db;
        let existing = self.find(project_id).await?;
        check_schedule(
            request.start_date.or(existing.start_date),
            request.due_date.or(existing.due_date),
        )?;
        ensure_references(db, request.client_id, request.service_id, request.assigned_to).await?;

        let mut model: project::ActiveModel = existing.into();
        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(client_id) = request.client_id {
            model.client_id = Set(client_id);
        }
        if let Some(service_id) = request.service_id {
            model.service_id = Set(service_id);
        }
        if let Some(assigned_to) = request.assigned_to {
            model.assigned_to = Set(Some(assigned_to));
        }
        if let Some(status) = request.status {
            model.status = Set(status);
        }
        if let Some(priority) = request.priority {
            model.priority = Set(priority);
        }
        if let Some(progress) = request.progress {
            model.progress = Set(progress);
        }
        if let Some(start_date) = request.start_date {
            model.start_date = Set(Some(start_date));
        }
        if let Some(due_date) = request.due_date {
            model.due_date = Set(Some(due_date));
        }
        if let Some(value) = request.value {
            model.value = Set(value);
        }
        if let Some(notes) = request.notes {
            model.notes = Set(Some(notes));
        }

        let updated = model.update(db).await?;
        info!(%project_id, "Project updated");
        Ok(updated.into())
    }

    /// Record progress and, optionally, move the project to another stage.
    #[instrument(skip(self, request))]
    pub async fn update_progress(
        &self,
        project_id: Uuid,
        request: UpdateProgressRequest,
    ) -> Result<ProjectResponse, ServiceError> {
        request.validate()?;
        if request.progress.is_none() && request.status.is_none() {
            return Err(ServiceError::ValidationError(
                "Provide progress or status".to_string(),
            ));
        }

        let mut model: project::ActiveModel = self.find(project_id).await?.into();
        if let Some(progress) = request.progress {
            model.progress = Set(progress);
        }
        if let Some(status) = request.status {
            model.status = Set(status);
        }

        let updated = model.update(&*self.db).await?;
        info!(
            %project_id,
            progress = updated.progress,
            status = %updated.status,
            "Project progress updated"
        );
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_project(&self, project_id: Uuid) -> Result<(), ServiceError> {
        let result = ProjectEntity::delete_by_id(project_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Project {} not found",
                project_id
            )));
        }

        info!(%project_id, "Project deleted");
        Ok(())
    }

    async fn find(&self, project_id: Uuid) -> Result<project::Model, ServiceError> {
        ProjectEntity::find_by_id(project_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Project {} not found", project_id)))
    }
}

/// Each supplied reference must name an active record.
async fn ensure_references<C>(
    conn: &C,
    client_id: Option<Uuid>,
    service_id: Option<Uuid>,
    assigned_to: Option<Uuid>,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(client_id) = client_id {
        ensure_active_client(conn, client_id).await?;
    }
    if let Some(service_id) = service_id {
        ensure_active_service(conn, service_id).await?;
    }
    if let Some(employee_id) = assigned_to {
        ensure_active_employee(conn, employee_id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn due_date_before_start_is_rejected() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 10);
        let due = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_matches!(check_schedule(start, due), Err(ServiceError::ValidationError(_)));
        assert!(check_schedule(due, start).is_ok());
        assert!(check_schedule(start, None).is_ok());
    }

    #[test]
    fn progress_outside_percent_range_fails_validation() {
        let request = UpdateProgressRequest {
            progress: Some(101),
            status: None,
        };
        assert!(request.validate().is_err());
    }
}
