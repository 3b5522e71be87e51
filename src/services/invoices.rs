use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::clients::{client_name_matches, ensure_active_client};
use super::date_range::{search_term, DayRange};
use super::lifecycle::{self, DraftOnly};
use super::line_items::{self, non_negative, LineItemInput, LineItemResponse};
use super::numbering::{self, INVOICE_PREFIX};
use crate::db::transaction::write_failure;
use crate::entities::invoice::{self, Entity as InvoiceEntity, InvoiceStatus};
use crate::entities::invoice_item::{self, Entity as InvoiceItemEntity};
use crate::errors::ServiceError;

const CREATE_FAILED: &str = "Failed to create invoice";
const UPDATE_FAILED: &str = "Failed to update invoice";
const DELETE_FAILED: &str = "Failed to delete invoice";

/// Invoice header and items as submitted for create or full update.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct InvoiceRequest {
    pub client_id: Uuid,
    #[validate(custom = "non_negative")]
    pub amount: Decimal,
    #[validate(custom = "non_negative")]
    pub tax_amount: Decimal,
    #[validate(custom = "non_negative")]
    pub total_amount: Decimal,
    /// Defaults to today
    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate]
    pub items: Vec<LineItemInput>,
}

impl InvoiceRequest {
    fn check(&self) -> Result<NaiveDate, ServiceError> {
        self.validate()?;
        if self.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one line item is required".to_string(),
            ));
        }
        let issue_date = self.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        if self.due_date < issue_date {
            return Err(ServiceError::ValidationError(
                "due_date must not be before issue_date".to_string(),
            ));
        }
        line_items::check_totals(self.amount, self.tax_amount, self.total_amount, &self.items)?;
        Ok(issue_date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateInvoiceStatusRequest {
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct InvoiceListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    /// Matches the invoice number or the client's name or company
    pub search: Option<String>,
    /// Earliest issue date, inclusive
    pub start_date: Option<NaiveDate>,
    /// Latest issue date, inclusive
    pub end_date: Option<NaiveDate>,
}

/// Invoice header as listed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceSummary {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<invoice::Model> for InvoiceSummary {
    fn from(model: invoice::Model) -> Self {
        Self {
            id: model.id,
            invoice_number: model.invoice_number,
            client_id: model.client_id,
            amount: model.amount,
            tax_amount: model.tax_amount,
            total_amount: model.total_amount,
            status: model.status,
            issue_date: model.issue_date,
            due_date: model.due_date,
            paid_date: model.paid_date,
            notes: model.notes,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Invoice header with its items in submission order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: InvoiceSummary,
    pub items: Vec<LineItemResponse>,
}

impl InvoiceResponse {
    fn new(header: invoice::Model, items: Vec<invoice_item::Model>) -> Self {
        Self {
            invoice: header.into(),
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceStatusResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub paid_date: Option<NaiveDate>,
}

/// Invoices and their line items. Every write runs in one database transaction.
#[derive(Clone)]
pub struct InvoiceService {
    db: Arc<DatabaseConnection>,
    number_attempts: u32,
}

impl InvoiceService {
    pub fn new(db: Arc<DatabaseConnection>, number_attempts: u32) -> Self {
        Self {
            db,
            number_attempts,
        }
    }

    /// Create a draft invoice and its items atomically.
    #[instrument(skip(self, request), fields(client_id = %request.client_id, items = request.items.len()))]
    pub async fn create_invoice(
        &self,
        request: InvoiceRequest,
        created_by: Uuid,
    ) -> Result<InvoiceResponse, ServiceError> {
        let issue_date = request.check()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for invoice creation");
            ServiceError::DatabaseError(e)
        })?;

        ensure_active_client(&txn, request.client_id).await?;

        let invoice_number = numbering::allocate_unique(
            INVOICE_PREFIX,
            self.number_attempts,
            |candidate| {
                let txn = &txn;
                async move {
                    Ok(InvoiceEntity::find()
                        .filter(invoice::Column::InvoiceNumber.eq(candidate))
                        .count(txn)
                        .await?
                        > 0)
                }
            },
        )
        .await?;

        let header = invoice::ActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_number: Set(invoice_number),
            client_id: Set(request.client_id),
            amount: Set(request.amount),
            tax_amount: Set(request.tax_amount),
            total_amount: Set(request.total_amount),
            status: Set(InvoiceStatus::Draft),
            issue_date: Set(issue_date),
            due_date: Set(request.due_date),
            paid_date: Set(None),
            notes: Set(request.notes.clone()),
            created_by: Set(Some(created_by)),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(write_failure(CREATE_FAILED))?;

        let items =
            line_items::insert_invoice_items(&txn, header.id, &request.items, CREATE_FAILED)
                .await?;

        txn.commit().await.map_err(write_failure(CREATE_FAILED))?;

        info!(invoice_id = %header.id, invoice_number = %header.invoice_number, "Invoice created");
        Ok(InvoiceResponse::new(header, items))
    }

    /// Replace a draft invoice's header fields and all of its items.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        request: InvoiceRequest,
    ) -> Result<InvoiceResponse, ServiceError> {
        let issue_date = request.check()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, %invoice_id, "Failed to start transaction for invoice update");
            ServiceError::DatabaseError(e)
        })?;

        let existing = find_invoice(&txn, invoice_id).await?;
        lifecycle::ensure_invoice_draft(existing.status, DraftOnly::Update)?;
        ensure_active_client(&txn, request.client_id).await?;

        let mut header: invoice::ActiveModel = existing.into();
        header.client_id = Set(request.client_id);
        header.amount = Set(request.amount);
        header.tax_amount = Set(request.tax_amount);
        header.total_amount = Set(request.total_amount);
        header.issue_date = Set(issue_date);
        header.due_date = Set(request.due_date);
        header.notes = Set(request.notes.clone());
        let header = header
            .update(&txn)
            .await
            .map_err(write_failure(UPDATE_FAILED))?;

        InvoiceItemEntity::delete_many()
            .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
            .exec(&txn)
            .await
            .map_err(write_failure(UPDATE_FAILED))?;

        let items =
            line_items::insert_invoice_items(&txn, invoice_id, &request.items, UPDATE_FAILED)
                .await?;

        txn.commit().await.map_err(write_failure(UPDATE_FAILED))?;

        info!(%invoice_id, items = items.len(), "Invoice updated");
        Ok(InvoiceResponse::new(header, items))
    }

    /// Set an invoice's status. `paid` stamps today's date; any other status clears it.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<InvoiceStatusResponse, ServiceError> {
        let existing = find_invoice(&*self.db, invoice_id).await?;
        let previous = existing.status;

        let mut header: invoice::ActiveModel = existing.into();
        header.status = Set(status);
        header.paid_date = Set(lifecycle::paid_date_for(status, Utc::now().date_naive()));
        let updated = header.update(&*self.db).await?;

        info!(%invoice_id, from = %previous, to = %status, "Invoice status changed");
        Ok(InvoiceStatusResponse {
            id: updated.id,
            invoice_number: updated.invoice_number,
            status: updated.status,
            paid_date: updated.paid_date,
        })
    }

    /// Delete a draft invoice and its items.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, %invoice_id, "Failed to start transaction for invoice deletion");
            ServiceError::DatabaseError(e)
        })?;

        let existing = find_invoice(&txn, invoice_id).await?;
        lifecycle::ensure_invoice_draft(existing.status, DraftOnly::Delete)?;

        InvoiceItemEntity::delete_many()
            .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
            .exec(&txn)
            .await
            .map_err(write_failure(DELETE_FAILED))?;
        existing
            .delete(&txn)
            .await
            .map_err(write_failure(DELETE_FAILED))?;

        txn.commit().await.map_err(write_failure(DELETE_FAILED))?;

        info!(%invoice_id, "Invoice deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<InvoiceResponse, ServiceError> {
        let db = &*self.db;
        let header = find_invoice(db, invoice_id).await?;
        let items = header
            .find_related(InvoiceItemEntity)
            .order_by_asc(invoice_item::Column::Position)
            .all(db)
            .await?;

        Ok(InvoiceResponse::new(header, items))
    }

    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        query: &InvoiceListQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<InvoiceSummary>, u64), ServiceError> {
        let range = DayRange::new(query.start_date, query.end_date)?;
        let mut select = InvoiceEntity::find();

        if let Some(status) = query.status {
            select = select.filter(invoice::Column::Status.eq(status));
        }
        if let Some(client_id) = query.client_id {
            select = select.filter(invoice::Column::ClientId.eq(client_id));
        }
        if let Some(start) = range.start {
            select = select.filter(invoice::Column::IssueDate.gte(start));
        }
        if let Some(end) = range.end {
            select = select.filter(invoice::Column::IssueDate.lte(end));
        }
        if let Some(search) = search_term(&query.search) {
            select = select
                .join(JoinType::LeftJoin, invoice::Relation::Client.def())
                .filter(
                    Condition::any()
                        .add(invoice::Column::InvoiceNumber.contains(search))
                        .add(client_name_matches(search)),
                );
        }

        let paginator = select
            .order_by_desc(invoice::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let invoices = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((invoices.into_iter().map(Into::into).collect(), total))
    }
}

async fn find_invoice<C>(conn: &C, invoice_id: Uuid) -> Result<invoice::Model, ServiceError>
where
    C: sea_orm::ConnectionTrait,
{
    InvoiceEntity::find_by_id(invoice_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", invoice_id)))
}
