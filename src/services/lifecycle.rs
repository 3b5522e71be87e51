//! Status rules for invoices and transactions.
//!
//! Invoices are strict: full edits and deletion are only allowed while the
//! invoice is a draft. Transaction status may be corrected freely; only a
//! refund is gated, and only from `completed`.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::entities::invoice::InvoiceStatus;
use crate::entities::transaction::{self, PaymentMethod, PaymentStatus};
use crate::errors::ServiceError;

/// Edits that are only legal on a draft invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftOnly {
    Update,
    Delete,
}

impl DraftOnly {
    fn past_tense(self) -> &'static str {
        match self {
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }
}

pub fn ensure_invoice_draft(status: InvoiceStatus, action: DraftOnly) -> Result<(), ServiceError> {
    if status == InvoiceStatus::Draft {
        Ok(())
    } else {
        Err(ServiceError::InvalidOperation(format!(
            "Only draft invoices can be {}",
            action.past_tense()
        )))
    }
}

/// Paid date an invoice carries after moving to `status`.
pub fn paid_date_for(status: InvoiceStatus, today: NaiveDate) -> Option<NaiveDate> {
    match status {
        InvoiceStatus::Paid => Some(today),
        InvoiceStatus::Draft | InvoiceStatus::Pending | InvoiceStatus::Overdue => None,
    }
}

pub fn ensure_refundable(original: &transaction::Model) -> Result<(), ServiceError> {
    if original.payment_method == PaymentMethod::Refund {
        return Err(ServiceError::InvalidOperation(
            "Refund reversals cannot be refunded".to_string(),
        ));
    }
    if original.payment_status != PaymentStatus::Completed {
        return Err(ServiceError::InvalidOperation(
            "Only completed transactions can be refunded".to_string(),
        ));
    }
    Ok(())
}

/// The amount a refund will move: the requested amount, or the full total.
pub fn refund_amount(requested: Option<Decimal>, total: Decimal) -> Result<Decimal, ServiceError> {
    let amount = requested.unwrap_or(total);
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Refund amount must be greater than zero".to_string(),
        ));
    }
    if amount > total {
        return Err(ServiceError::ValidationError(
            "Refund amount cannot exceed original transaction amount".to_string(),
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn txn(method: PaymentMethod, status: PaymentStatus) -> transaction::Model {
        let now = Utc::now();
        transaction::Model {
            id: Uuid::new_v4(),
            transaction_number: "TXN-1-AAAAA".to_string(),
            client_id: None,
            amount: dec!(50),
            tax_amount: dec!(0),
            total_amount: dec!(50),
            payment_method: method,
            payment_status: status,
            notes: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_drafts_are_editable() {
        assert!(ensure_invoice_draft(InvoiceStatus::Draft, DraftOnly::Update).is_ok());
        for status in [
            InvoiceStatus::Pending,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
        ] {
            let err = ensure_invoice_draft(status, DraftOnly::Delete).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Invalid operation: Only draft invoices can be deleted"
            );
        }
    }

    #[test]
    fn paid_stamps_date_everything_else_clears_it() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(paid_date_for(InvoiceStatus::Paid, today), Some(today));
        assert_eq!(paid_date_for(InvoiceStatus::Overdue, today), None);
        assert_eq!(paid_date_for(InvoiceStatus::Draft, today), None);
    }

    #[test]
    fn refund_requires_completed_sale() {
        assert!(ensure_refundable(&txn(PaymentMethod::Cash, PaymentStatus::Completed)).is_ok());
        assert_matches!(
            ensure_refundable(&txn(PaymentMethod::Cash, PaymentStatus::Refunded)),
            Err(ServiceError::InvalidOperation(_))
        );
        assert_matches!(
            ensure_refundable(&txn(PaymentMethod::Card, PaymentStatus::Pending)),
            Err(ServiceError::InvalidOperation(_))
        );
        assert_matches!(
            ensure_refundable(&txn(PaymentMethod::Refund, PaymentStatus::Completed)),
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[test]
    fn refund_amount_defaults_to_total_and_is_bounded() {
        assert_eq!(refund_amount(None, dec!(80)).unwrap(), dec!(80));
        assert_eq!(refund_amount(Some(dec!(30)), dec!(80)).unwrap(), dec!(30));
        assert_eq!(refund_amount(Some(dec!(80)), dec!(80)).unwrap(), dec!(80));
        assert_matches!(
            refund_amount(Some(dec!(80.01)), dec!(80)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            refund_amount(Some(dec!(0)), dec!(80)),
            Err(ServiceError::ValidationError(_))
        );
    }
}
