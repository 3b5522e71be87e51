//! Line items shared by invoices and transactions, and the header/item
//! consistency rules applied before either is written.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::db::transaction::write_failure;
use crate::entities::{invoice_item, transaction_item};
use crate::errors::ServiceError;

/// One billed or sold unit as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LineItemInput {
    pub service_id: Option<Uuid>,
    #[validate(length(min = 1, max = 500, message = "Description is required"))]
    pub description: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "non_negative")]
    pub unit_price: Decimal,
    #[validate(custom = "non_negative")]
    pub line_total: Decimal,
}

/// A stored line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItemResponse {
    pub id: Uuid,
    pub service_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub position: i32,
}

impl From<invoice_item::Model> for LineItemResponse {
    fn from(model: invoice_item::Model) -> Self {
        Self {
            id: model.id,
            service_id: model.service_id,
            description: model.description,
            quantity: model.quantity,
            unit_price: model.unit_price,
            line_total: model.line_total,
            position: model.position,
        }
    }
}

impl From<transaction_item::Model> for LineItemResponse {
    fn from(model: transaction_item::Model) -> Self {
        Self {
            id: model.id,
            service_id: model.service_id,
            description: model.description,
            quantity: model.quantity,
            unit_price: model.unit_price,
            line_total: model.line_total,
            position: model.position,
        }
    }
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Amount must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Reject a document whose header does not add up: `total = amount + tax`
/// and `amount = Σ line_total`. Line totals themselves are taken as given.
pub fn check_totals(
    amount: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    items: &[LineItemInput],
) -> Result<(), ServiceError> {
    let header_total = amount
        .checked_add(tax_amount)
        .ok_or_else(|| out_of_range("amount plus tax_amount"))?;
    if header_total != total_amount {
        return Err(ServiceError::ValidationError(format!(
            "total_amount ({}) must equal amount ({}) plus tax_amount ({})",
            total_amount, amount, tax_amount
        )));
    }

    let items_total = items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total))
        .ok_or_else(|| out_of_range("the sum of line totals"))?;
    if items_total != amount {
        return Err(ServiceError::ValidationError(format!(
            "amount ({}) must equal the sum of line totals ({})",
            amount, items_total
        )));
    }

    Ok(())
}

fn out_of_range(what: &str) -> ServiceError {
    ServiceError::ValidationError(format!("{} is too large", what))
}

/// Last line of defence inside the writer: a malformed item that slipped past
/// request validation fails the whole write.
fn ensure_writable(item: &LineItemInput, position: usize) -> Result<(), String> {
    if item.quantity < 1 {
        return Err(format!("item {} has quantity {}", position, item.quantity));
    }
    if item.description.trim().is_empty() {
        return Err(format!("item {} has no description", position));
    }
    Ok(())
}

/// Insert `items` for an invoice, in order, recording each one's position.
pub async fn insert_invoice_items<C>(
    conn: &C,
    invoice_id: Uuid,
    items: &[LineItemInput],
    failure: &'static str,
) -> Result<Vec<invoice_item::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut stored = Vec::with_capacity(items.len());

    for (position, item) in items.iter().enumerate() {
        if let Err(reason) = ensure_writable(item, position) {
            tracing::error!(%invoice_id, %reason, "{}", failure);
            return Err(ServiceError::WriteFailed(failure.to_string()));
        }

        let model = invoice_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_id: Set(invoice_id),
            service_id: Set(item.service_id),
            description: Set(item.description.clone()),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            line_total: Set(item.line_total),
            position: Set(position as i32),
            created_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(write_failure(failure))?;

        stored.push(model);
    }

    Ok(stored)
}

/// Insert `items` for a transaction, in order, recording each one's position.
pub async fn insert_transaction_items<C>(
    conn: &C,
    transaction_id: Uuid,
    items: &[LineItemInput],
    failure: &'static str,
) -> Result<Vec<transaction_item::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut stored = Vec::with_capacity(items.len());

    for (position, item) in items.iter().enumerate() {
        if let Err(reason) = ensure_writable(item, position) {
            tracing::error!(%transaction_id, %reason, "{}", failure);
            return Err(ServiceError::WriteFailed(failure.to_string()));
        }

        let model = transaction_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            transaction_id: Set(transaction_id),
            service_id: Set(item.service_id),
            description: Set(item.description.clone()),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            line_total: Set(item.line_total),
            position: Set(position as i32),
            created_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(write_failure(failure))?;

        stored.push(model);
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn item(quantity: i32, unit_price: Decimal, line_total: Decimal) -> LineItemInput {
        LineItemInput {
            service_id: None,
            description: "Logo design".to_string(),
            quantity,
            unit_price,
            line_total,
        }
    }

    #[test]
    fn consistent_totals_pass() {
        let items = vec![item(2, dec!(50), dec!(100))];
        assert!(check_totals(dec!(100), dec!(10), dec!(110), &items).is_ok());
    }

    #[test]
    fn scale_differences_do_not_matter() {
        let items = vec![item(1, dec!(99.5), dec!(99.50)), item(1, dec!(0.5), dec!(0.5))];
        assert!(check_totals(dec!(100.00), dec!(10.0), dec!(110), &items).is_ok());
    }

    #[test]
    fn header_must_add_up() {
        let items = vec![item(2, dec!(50), dec!(100))];
        assert_matches!(
            check_totals(dec!(100), dec!(10), dec!(120), &items),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn items_must_sum_to_amount() {
        let items = vec![item(2, dec!(50), dec!(90))];
        assert_matches!(
            check_totals(dec!(100), dec!(10), dec!(110), &items),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn overflowing_amounts_are_rejected() {
        let items = vec![item(1, Decimal::MAX, Decimal::MAX)];
        assert_matches!(
            check_totals(Decimal::MAX, Decimal::MAX, Decimal::MAX, &items),
            Err(ServiceError::ValidationError(message)) if message.contains("too large")
        );

        let items = vec![item(1, Decimal::MAX, Decimal::MAX), item(1, dec!(1), dec!(1))];
        assert_matches!(
            check_totals(Decimal::MAX, dec!(0), Decimal::MAX, &items),
            Err(ServiceError::ValidationError(message)) if message.contains("line totals")
        );
    }

    #[test]
    fn item_validation_rules() {
        assert!(item(1, dec!(10), dec!(10)).validate().is_ok());
        assert!(item(0, dec!(10), dec!(0)).validate().is_err());
        assert!(item(1, dec!(-1), dec!(10)).validate().is_err());

        let mut blank = item(1, dec!(10), dec!(10));
        blank.description = String::new();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn writer_guard_catches_bad_items() {
        assert!(ensure_writable(&item(1, dec!(1), dec!(1)), 0).is_ok());
        assert!(ensure_writable(&item(0, dec!(1), dec!(1)), 3).is_err());

        let mut blank = item(1, dec!(1), dec!(1));
        blank.description = "   ".to_string();
        assert!(ensure_writable(&blank, 0).is_err());
    }
}
