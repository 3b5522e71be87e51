use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    JoinType, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::clients::{client_name_matches, ensure_active_client};
use super::date_range::{search_term, DayRange};
use super::lifecycle;
use super::line_items::{self, non_negative, LineItemInput, LineItemResponse};
use super::numbering::{self, TRANSACTION_PREFIX};
use crate::db::transaction::{with_transaction, write_failure};
use crate::entities::transaction::{
    self, Entity as TransactionEntity, PaymentMethod, PaymentStatus,
};
use crate::entities::transaction_item::{self, Entity as TransactionItemEntity};
use crate::errors::ServiceError;

const CREATE_FAILED: &str = "Failed to create transaction";
const REFUND_FAILED: &str = "Failed to process refund";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTransactionRequest {
    /// Walk-in sales have no client
    pub client_id: Option<Uuid>,
    #[validate(custom = "non_negative")]
    pub amount: Decimal,
    #[validate(custom = "non_negative")]
    pub tax_amount: Decimal,
    #[validate(custom = "non_negative")]
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate]
    pub items: Vec<LineItemInput>,
}

impl CreateTransactionRequest {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one line item is required".to_string(),
            ));
        }
        if self.payment_method == PaymentMethod::Refund {
            return Err(ServiceError::ValidationError(
                "payment_method 'refund' is reserved for refund reversals".to_string(),
            ));
        }
        line_items::check_totals(self.amount, self.tax_amount, self.total_amount, &self.items)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateTransactionStatusRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefundRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    /// Defaults to the full original total
    pub refund_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundResponse {
    pub transaction_id: Uuid,
    pub refund_amount: Decimal,
    pub reversal_id: Uuid,
    pub reversal_number: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct TransactionListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub client_id: Option<Uuid>,
    /// Matches the transaction number or the client's name or company
    pub search: Option<String>,
    /// Earliest creation day (UTC), inclusive
    pub start_date: Option<NaiveDate>,
    /// Latest creation day (UTC), inclusive
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub transaction_number: String,
    pub client_id: Option<Uuid>,
    pub amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<transaction::Model> for TransactionSummary {
    fn from(model: transaction::Model) -> Self {
        Self {
            id: model.id,
            transaction_number: model.transaction_number,
            client_id: model.client_id,
            amount: model.amount,
            tax_amount: model.tax_amount,
            total_amount: model.total_amount,
            payment_method: model.payment_method,
            payment_status: model.payment_status,
            notes: model.notes,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    #[serde(flatten)]
    pub transaction: TransactionSummary,
    pub items: Vec<LineItemResponse>,
}

impl TransactionResponse {
    fn new(header: transaction::Model, items: Vec<transaction_item::Model>) -> Self {
        Self {
            transaction: header.into(),
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionStatusResponse {
    pub id: Uuid,
    pub transaction_number: String,
    pub payment_status: PaymentStatus,
}

/// Point-of-sale transactions, their items and refund reversals.
#[derive(Clone)]
pub struct TransactionService {
    db: Arc<DatabaseConnection>,
    number_attempts: u32,
}

impl TransactionService {
    pub fn new(db: Arc<DatabaseConnection>, number_attempts: u32) -> Self {
        Self {
            db,
            number_attempts,
        }
    }

    /// Record a completed sale and its items atomically.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
        created_by: Uuid,
    ) -> Result<TransactionResponse, ServiceError> {
        request.check()?;
        let attempts = self.number_attempts;

        let response = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                if let Some(client_id) = request.client_id {
                    ensure_active_client(txn, client_id).await?;
                }

                let transaction_number =
                    numbering::allocate_unique(TRANSACTION_PREFIX, attempts, |candidate| async move {
                        number_taken(txn, candidate).await
                    })
                    .await?;

                let header = transaction::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    transaction_number: Set(transaction_number),
                    client_id: Set(request.client_id),
                    amount: Set(request.amount),
                    tax_amount: Set(request.tax_amount),
                    total_amount: Set(request.total_amount),
                    payment_method: Set(request.payment_method),
                    payment_status: Set(PaymentStatus::Completed),
                    notes: Set(request.notes.clone()),
                    created_by: Set(Some(created_by)),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(write_failure(CREATE_FAILED))?;

                let items = line_items::insert_transaction_items(
                    txn,
                    header.id,
                    &request.items,
                    CREATE_FAILED,
                )
                .await?;

                Ok(TransactionResponse::new(header, items))
            })
        })
        .await?;

        info!(
            transaction_id = %response.transaction.id,
            transaction_number = %response.transaction.transaction_number,
            "Transaction created"
        );
        Ok(response)
    }

    /// Set a transaction's payment status. Any status may follow any other.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        transaction_id: Uuid,
        status: PaymentStatus,
    ) -> Result<TransactionStatusResponse, ServiceError> {
        let existing = find_transaction(&*self.db, transaction_id).await?;
        let previous = existing.payment_status;

        let mut header: transaction::ActiveModel = existing.into();
        header.payment_status = Set(status);
        let updated = header.update(&*self.db).await?;

        info!(%transaction_id, from = %previous, to = %status, "Transaction status changed");
        Ok(TransactionStatusResponse {
            id: updated.id,
            transaction_number: updated.transaction_number,
            payment_status: updated.payment_status,
        })
    }

    /// Refund a completed transaction: mark it refunded and append a
    /// negative reversal document. Amounts on the original are left untouched.
    /// A transaction moved back to `completed` can be refunded again; each
    /// reversal gets its own number.
    #[instrument(skip(self, request))]
    pub async fn refund_transaction(
        &self,
        transaction_id: Uuid,
        request: RefundRequest,
        refunded_by: Uuid,
    ) -> Result<RefundResponse, ServiceError> {
        request.validate()?;
        let attempts = self.number_attempts;

        let response = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let original = find_transaction(txn, transaction_id).await?;
                lifecycle::ensure_refundable(&original)?;
                let amount = lifecycle::refund_amount(request.refund_amount, original.total_amount)?;

                let flipped = TransactionEntity::update_many()
                    .col_expr(
                        transaction::Column::PaymentStatus,
                        Expr::value(PaymentStatus::Refunded),
                    )
                    .col_expr(transaction::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(transaction::Column::Id.eq(transaction_id))
                    .filter(transaction::Column::PaymentStatus.eq(PaymentStatus::Completed))
                    .exec(txn)
                    .await
                    .map_err(write_failure(REFUND_FAILED))?;

                if flipped.rows_affected == 0 {
                    warn!(%transaction_id, "transaction refunded concurrently");
                    return Err(ServiceError::InvalidOperation(
                        "Only completed transactions can be refunded".to_string(),
                    ));
                }

                let notes = match request.reason.as_deref().map(str::trim) {
                    Some(reason) if !reason.is_empty() => {
                        format!("Refund for {}: {}", original.transaction_number, reason)
                    }
                    _ => format!("Refund for {}", original.transaction_number),
                };

                let prior_reversals = TransactionEntity::find()
                    .filter(
                        transaction::Column::TransactionNumber
                            .starts_with(numbering::refund_number(&original.transaction_number)),
                    )
                    .count(txn)
                    .await?;
                let reversal_number = numbering::allocate_refund_number(
                    &original.transaction_number,
                    prior_reversals,
                    attempts,
                    |candidate| async move { number_taken(txn, candidate).await },
                )
                .await?;

                let reversal = transaction::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    transaction_number: Set(reversal_number),
                    client_id: Set(None),
                    amount: Set(-amount),
                    tax_amount: Set(Decimal::ZERO),
                    total_amount: Set(-amount),
                    payment_method: Set(PaymentMethod::Refund),
                    payment_status: Set(PaymentStatus::Completed),
                    notes: Set(Some(notes)),
                    created_by: Set(Some(refunded_by)),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(write_failure(REFUND_FAILED))?;

                Ok(RefundResponse {
                    transaction_id,
                    refund_amount: amount,
                    reversal_id: reversal.id,
                    reversal_number: reversal.transaction_number,
                })
            })
        })
        .await?;

        info!(
            %transaction_id,
            refund_amount = %response.refund_amount,
            reversal_number = %response.reversal_number,
            "Transaction refunded"
        );
        Ok(response)
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<TransactionResponse, ServiceError> {
        let db = &*self.db;
        let header = find_transaction(db, transaction_id).await?;
        let items = header
            .find_related(TransactionItemEntity)
            .order_by_asc(transaction_item::Column::Position)
            .all(db)
            .await?;

        Ok(TransactionResponse::new(header, items))
    }

    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        query: &TransactionListQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<TransactionSummary>, u64), ServiceError> {
        let range = DayRange::new(query.start_date, query.end_date)?;
        let mut select = TransactionEntity::find();

        if let Some(status) = query.status {
            select = select.filter(transaction::Column::PaymentStatus.eq(status));
        }
        if let Some(method) = query.payment_method {
            select = select.filter(transaction::Column::PaymentMethod.eq(method));
        }
        if let Some(client_id) = query.client_id {
            select = select.filter(transaction::Column::ClientId.eq(client_id));
        }
        if let Some(from) = range.from_instant() {
            select = select.filter(transaction::Column::CreatedAt.gte(from));
        }
        if let Some(until) = range.until_instant() {
            select = select.filter(transaction::Column::CreatedAt.lt(until));
        }
        if let Some(search) = search_term(&query.search) {
            select = select
                .join(JoinType::LeftJoin, transaction::Relation::Client.def())
                .filter(
                    Condition::any()
                        .add(transaction::Column::TransactionNumber.contains(search))
                        .add(client_name_matches(search)),
                );
        }

        let paginator = select
            .order_by_desc(transaction::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let transactions = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((transactions.into_iter().map(Into::into).collect(), total))
    }
}

async fn number_taken<C>(conn: &C, candidate: String) -> Result<bool, sea_orm::DbErr>
where
    C: ConnectionTrait,
{
    Ok(TransactionEntity::find()
        .filter(transaction::Column::TransactionNumber.eq(candidate))
        .count(conn)
        .await?
        > 0)
}

async fn find_transaction<C>(conn: &C, transaction_id: Uuid) -> Result<transaction::Model, ServiceError>
where
    C: ConnectionTrait,
{
    TransactionEntity::find_by_id(transaction_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Transaction {} not found", transaction_id))
        })
}
