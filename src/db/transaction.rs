/*!
 * Transaction Helper Utilities
 *
 * Runs a unit of work inside one database transaction: commit on `Ok`,
 * rollback on `Err`. The closure's `ServiceError` comes back unchanged so a
 * guard failure (not found, wrong status) keeps its own status code.
 */

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionError, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use tracing::error;

use crate::errors::ServiceError;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Execute a function within a database transaction
///
/// # Example
///
/// ```rust,ignore
/// let invoice = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         let header = header.insert(txn).await.map_err(write_failure("Failed to create invoice"))?;
///         write_items(txn, header.id, &items).await?;
///         Ok(header)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T>(db: &DatabaseConnection, f: F) -> Result<T, ServiceError>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, ServiceError>> + Send,
    T: Send,
{
    db.transaction::<F, T, ServiceError>(f)
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
}

/// Map a storage error raised during a write phase to one generic failure,
/// logging the cause.
pub fn write_failure(summary: &'static str) -> impl Fn(DbErr) -> ServiceError {
    move |err| {
        error!(error = %err, "{}", summary);
        ServiceError::WriteFailed(summary.to_string())
    }
}
