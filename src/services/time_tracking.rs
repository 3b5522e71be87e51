use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::date_range::DayRange;
use super::employees::ensure_active_employee;
use crate::db::transaction::{with_transaction, write_failure};
use crate::entities::employee::{self, Entity as EmployeeEntity, Position};
use crate::entities::time_entry::{self, ClockStatus, Entity as TimeEntryEntity};
use crate::errors::ServiceError;

const CLOCK_IN_FAILED: &str = "Failed to clock in";
const CLOCK_OUT_FAILED: &str = "Failed to clock out";
const CREATE_FAILED: &str = "Failed to create time entry";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ClockInRequest {
    pub employee_id: Uuid,
    #[validate(length(max = 100))]
    pub device_id: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ClockOutRequest {
    pub employee_id: Uuid,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// A time entry keyed in after the fact.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTimeEntryRequest {
    pub employee_id: Uuid,
    pub clock_in: DateTime<Utc>,
    /// Leave empty to record a shift that is still running
    pub clock_out: Option<DateTime<Utc>>,
    #[validate(length(max = 100))]
    pub device_id: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateTimeEntryRequest {
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct TimeEntryListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub employee_id: Option<Uuid>,
    pub status: Option<ClockStatus>,
    /// Earliest clock-in day (UTC), inclusive
    pub start_date: Option<chrono::NaiveDate>,
    /// Latest clock-in day (UTC), inclusive
    pub end_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimeEntryResponse {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
    pub status: ClockStatus,
    pub total_hours: Option<Decimal>,
    pub device_id: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<time_entry::Model> for TimeEntryResponse {
    fn from(model: time_entry::Model) -> Self {
        Self {
            id: model.id,
            employee_id: model.employee_id,
            clock_in: model.clock_in,
            clock_out: model.clock_out,
            status: model.status,
            total_hours: model.total_hours,
            device_id: model.device_id,
            location: model.location,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Whether an active employee is on the clock right now.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeClockStatus {
    pub employee_id: Uuid,
    pub name: String,
    pub position: Position,
    pub is_clocked_in: bool,
    pub current_entry: Option<TimeEntryResponse>,
}

/// Hours between two instants, rounded to the cent of an hour.
pub fn hours_between(clock_in: DateTime<Utc>, clock_out: DateTime<Utc>) -> Decimal {
    let seconds = (clock_out - clock_in).num_seconds();
    (Decimal::from(seconds) / Decimal::from(3600)).round_dp(2)
}

fn check_interval(
    clock_in: DateTime<Utc>,
    clock_out: Option<DateTime<Utc>>,
) -> Result<(), ServiceError> {
    match clock_out {
        Some(out) if out < clock_in => Err(ServiceError::ValidationError(
            "clock_out must not be before clock_in".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn open_entry<C>(conn: &C, employee_id: Uuid) -> Result<Option<time_entry::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(TimeEntryEntity::find()
        .filter(time_entry::Column::EmployeeId.eq(employee_id))
        .filter(time_entry::Column::ClockOut.is_null())
        .order_by_desc(time_entry::Column::ClockIn)
        .one(conn)
        .await?)
}

/// Clock-in and clock-out records for employees.
#[derive(Clone)]
pub struct TimeTrackingService {
    db: Arc<DatabaseConnection>,
}

impl TimeTrackingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Open a new entry. An employee may hold only one open entry.
    #[instrument(skip(self, request), fields(employee_id = %request.employee_id))]
    pub async fn clock_in(
        &self,
        request: ClockInRequest,
    ) -> Result<TimeEntryResponse, ServiceError> {
        request.validate()?;

        let entry = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                ensure_active_employee(txn, request.employee_id).await?;
                if open_entry(txn, request.employee_id).await?.is_some() {
                    return Err(ServiceError::InvalidOperation(
                        "Employee is already clocked in".to_string(),
                    ));
                }

                time_entry::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    employee_id: Set(request.employee_id),
                    clock_in: Set(Utc::now()),
                    clock_out: Set(None),
                    status: Set(ClockStatus::ClockedIn),
                    total_hours: Set(None),
                    device_id: Set(request.device_id),
                    location: Set(request.location),
                    notes: Set(request.notes),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(write_failure(CLOCK_IN_FAILED))
            })
        })
        .await?;

        info!(entry_id = %entry.id, "Employee clocked in");
        Ok(entry.into())
    }

    /// Close the employee's open entry and record the hours worked.
    #[instrument(skip(self, request), fields(employee_id = %request.employee_id))]
    pub async fn clock_out(
        &self,
        request: ClockOutRequest,
    ) -> Result<TimeEntryResponse, ServiceError> {
        request.validate()?;

        let entry = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                ensure_active_employee(txn, request.employee_id).await?;
                let open = open_entry(txn, request.employee_id).await?.ok_or_else(|| {
                    ServiceError::InvalidOperation("Employee is not clocked in".to_string())
                })?;

                let now = Utc::now();
                let notes = match (open.notes.clone(), request.notes) {
                    (Some(earlier), Some(later)) => Some(format!("{}\n{}", earlier, later)),
                    (earlier, later) => later.or(earlier),
                };
                let clock_in = open.clock_in;
                let mut model: time_entry::ActiveModel = open.into();
                model.clock_out = Set(Some(now));
                model.status = Set(ClockStatus::ClockedOut);
                model.total_hours = Set(Some(hours_between(clock_in, now)));
                model.notes = Set(notes);
                model.update(txn).await.map_err(write_failure(CLOCK_OUT_FAILED))
            })
        })
        .await?;

        info!(entry_id = %entry.id, total_hours = ?entry.total_hours, "Employee clocked out");
        Ok(entry.into())
    }

    #[instrument(skip(self, request), fields(employee_id = %request.employee_id))]
    pub async fn create_entry(
        &self,
        request: CreateTimeEntryRequest,
    ) -> Result<TimeEntryResponse, ServiceError> {
        request.validate()?;
        check_interval(request.clock_in, request.clock_out)?;

        let entry = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                ensure_active_employee(txn, request.employee_id).await?;
                if request.clock_out.is_none()
                    && open_entry(txn, request.employee_id).await?.is_some()
                {
                    return Err(ServiceError::InvalidOperation(
                        "Employee is already clocked in".to_string(),
                    ));
                }

                let (status, total_hours) = match request.clock_out {
                    Some(out) => (
                        ClockStatus::ClockedOut,
                        Some(hours_between(request.clock_in, out)),
                    ),
                    None => (ClockStatus::ClockedIn, None),
                };

                time_entry::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    employee_id: Set(request.employee_id),
                    clock_in: Set(request.clock_in),
                    clock_out: Set(request.clock_out),
                    status: Set(status),
                    total_hours: Set(total_hours),
                    device_id: Set(request.device_id),
                    location: Set(request.location),
                    notes: Set(request.notes),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(write_failure(CREATE_FAILED))
            })
        })
        .await?;

        info!(entry_id = %entry.id, "Time entry recorded");
        Ok(entry.into())
    }

    #[instrument(skip(self))]
    pub async fn get_entry(&self, entry_id: Uuid) -> Result<TimeEntryResponse, ServiceError> {
        self.find(entry_id).await.map(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list_entries(
        &self,
        query: &TimeEntryListQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<TimeEntryResponse>, u64), ServiceError> {
        let range = DayRange::new(query.start_date, query.end_date)?;
        let mut select = TimeEntryEntity::find();

        if let Some(employee_id) = query.employee_id {
            select = select.filter(time_entry::Column::EmployeeId.eq(employee_id));
        }
        if let Some(status) = query.status {
            select = select.filter(time_entry::Column::Status.eq(status));
        }
        if let Some(from) = range.from_instant() {
            select = select.filter(time_entry::Column::ClockIn.gte(from));
        }
        if let Some(until) = range.until_instant() {
            select = select.filter(time_entry::Column::ClockIn.lt(until));
        }

        let paginator = select
            .order_by_desc(time_entry::Column::ClockIn)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((entries.into_iter().map(Into::into).collect(), total))
    }

    /// Correct the times or notes of an entry. Hours are recomputed.
    #[instrument(skip(self, request))]
    pub async fn update_entry(
        &self,
        entry_id: Uuid,
        request: UpdateTimeEntryRequest,
    ) -> Result<TimeEntryResponse, ServiceError> {
        request.validate()?;
        let existing = self.find(entry_id).await?;

        let clock_in = request.clock_in.unwrap_or(existing.clock_in);
        let clock_out = request.clock_out.or(existing.clock_out);
        check_interval(clock_in, clock_out)?;

        let mut model: time_entry::ActiveModel = existing.into();
        model.clock_in = Set(clock_in);
        if let Some(out) = clock_out {
            model.clock_out = Set(Some(out));
            model.status = Set(ClockStatus::ClockedOut);
            model.total_hours = Set(Some(hours_between(clock_in, out)));
        }
        if let Some(location) = request.location {
            model.location = Set(Some(location));
        }
        if let Some(notes) = request.notes {
            model.notes = Set(Some(notes));
        }

        let updated = model.update(&*self.db).await?;
        info!(%entry_id, "Time entry updated");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_entry(&self, entry_id: Uuid) -> Result<(), ServiceError> {
        let result = TimeEntryEntity::delete_by_id(entry_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Time entry {} not found",
                entry_id
            )));
        }

        warn!(%entry_id, "Time entry deleted");
        Ok(())
    }

    /// Every active employee with their open entry, if any.
    #[instrument(skip(self))]
    pub async fn current_status(&self) -> Result<Vec<EmployeeClockStatus>, ServiceError> {
        let db = &*self.db;
        let employees = EmployeeEntity::find()
            .filter(employee::Column::IsActive.eq(true))
            .order_by_asc(employee::Column::Name)
            .all(db)
            .await?;

        let mut open: HashMap<Uuid, time_entry::Model> = TimeEntryEntity::find()
            .filter(time_entry::Column::ClockOut.is_null())
            .filter(time_entry::Column::EmployeeId.is_in(employees.iter().map(|e| e.id)))
            .all(db)
            .await?
            .into_iter()
            .map(|entry| (entry.employee_id, entry))
            .collect();

        Ok(employees
            .into_iter()
            .map(|employee| {
                let current_entry = open.remove(&employee.id).map(TimeEntryResponse::from);
                EmployeeClockStatus {
                    employee_id: employee.id,
                    name: employee.name,
                    position: employee.position,
                    is_clocked_in: current_entry.is_some(),
                    current_entry,
                }
            })
            .collect())
    }

    async fn find(&self, entry_id: Uuid) -> Result<time_entry::Model, ServiceError> {
        TimeEntryEntity::find_by_id(entry_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Time entry {} not found", entry_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn hours_are_rounded_to_two_places() {
        let start = Utc::now();
        assert_eq!(hours_between(start, start + Duration::minutes(90)), dec!(1.50));
        assert_eq!(hours_between(start, start + Duration::minutes(20)), dec!(0.33));
        assert_eq!(hours_between(start, start), Decimal::ZERO);
    }

    #[test]
    fn clock_out_before_clock_in_is_rejected() {
        let start = Utc::now();
        assert_matches!(
            check_interval(start, Some(start - Duration::seconds(1))),
            Err(ServiceError::ValidationError(_))
        );
        assert!(check_interval(start, None).is_ok());
    }
}
