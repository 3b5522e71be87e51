//! Human-readable document numbers: `PREFIX-<unix millis>-<5 chars of [0-9A-Z]>`.

use chrono::Utc;
use rand::Rng;
use sea_orm::DbErr;
use std::future::Future;
use tracing::warn;

use crate::errors::ServiceError;

pub const INVOICE_PREFIX: &str = "INV";
pub const TRANSACTION_PREFIX: &str = "TXN";
pub const REFUND_PREFIX: &str = "REFUND";

const SUFFIX_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const SUFFIX_LEN: usize = 5;

/// A fresh candidate number stamped with the current time.
pub fn generate(prefix: &str) -> String {
    generate_at(prefix, Utc::now().timestamp_millis())
}

/// A candidate number for a given millisecond timestamp.
pub fn generate_at(prefix: &str, millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", prefix, millis, suffix)
}

/// Number of the first reversal document written when `original` is refunded.
pub fn refund_number(original: &str) -> String {
    format!("{}-{}", REFUND_PREFIX, original)
}

/// Number of the `sequence`-th reversal of `original`, counting from zero.
/// The first keeps the plain `REFUND-<original>` form; later ones get a `-<n>` suffix.
pub fn nth_refund_number(original: &str, sequence: u64) -> String {
    match sequence {
        0 => refund_number(original),
        n => format!("{}-{}", refund_number(original), n + 1),
    }
}

/// Draw candidates until `is_taken` reports one free, giving up after
/// `max_attempts` collisions.
///
/// `is_taken` should run on the same transaction that will insert the
/// document so the check and the insert see the same snapshot.
pub async fn allocate_unique<F, Fut>(
    prefix: &str,
    max_attempts: u32,
    is_taken: F,
) -> Result<String, ServiceError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, DbErr>>,
{
    allocate_with(prefix, max_attempts, |_| generate(prefix), is_taken).await
}

/// Reversal number for a refund of `original`, given how many reversals of it
/// already exist. Further candidates are tried if that one is taken.
pub async fn allocate_refund_number<F, Fut>(
    original: &str,
    prior_reversals: u64,
    max_attempts: u32,
    is_taken: F,
) -> Result<String, ServiceError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, DbErr>>,
{
    allocate_with(
        REFUND_PREFIX,
        max_attempts,
        |attempt| nth_refund_number(original, prior_reversals + u64::from(attempt) - 1),
        is_taken,
    )
    .await
}

async fn allocate_with<N, F, Fut>(
    label: &str,
    max_attempts: u32,
    mut candidate_for: N,
    mut is_taken: F,
) -> Result<String, ServiceError>
where
    N: FnMut(u32) -> String,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, DbErr>>,
{
    for attempt in 1..=max_attempts.max(1) {
        let candidate = candidate_for(attempt);
        if !is_taken(candidate.clone()).await? {
            return Ok(candidate);
        }
        warn!(%candidate, attempt, "document number collision");
    }

    Err(ServiceError::Conflict(format!(
        "Could not allocate a unique {} number after {} attempts",
        label, max_attempts
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use regex::Regex;
    use std::cell::Cell;

    #[test]
    fn generated_numbers_match_format() {
        let re = Regex::new(r"^INV-\d+-[A-Z0-9]{5}$").unwrap();
        for _ in 0..100 {
            let number = generate(INVOICE_PREFIX);
            assert!(re.is_match(&number), "{}", number);
        }
    }

    #[test]
    fn timestamp_is_embedded_verbatim() {
        let number = generate_at(TRANSACTION_PREFIX, 1_700_000_000_123);
        assert!(number.starts_with("TXN-1700000000123-"));
        assert_eq!(number.len(), "TXN-1700000000123-".len() + SUFFIX_LEN);
    }

    #[test]
    fn refund_number_wraps_original() {
        assert_eq!(refund_number("TXN-1-ABCDE"), "REFUND-TXN-1-ABCDE");
    }

    #[test]
    fn later_reversals_are_suffixed() {
        assert_eq!(nth_refund_number("TXN-1-ABCDE", 0), "REFUND-TXN-1-ABCDE");
        assert_eq!(nth_refund_number("TXN-1-ABCDE", 1), "REFUND-TXN-1-ABCDE-2");
        assert_eq!(nth_refund_number("TXN-1-ABCDE", 4), "REFUND-TXN-1-ABCDE-5");
    }

    #[tokio::test]
    async fn refund_allocation_skips_taken_numbers() {
        let number = allocate_refund_number("TXN-1-ABCDE", 1, 5, |candidate| async move {
            Ok(candidate == "REFUND-TXN-1-ABCDE-2")
        })
        .await
        .unwrap();
        assert_eq!(number, "REFUND-TXN-1-ABCDE-3");

        let exhausted = allocate_refund_number("TXN-1-ABCDE", 0, 2, |_| async { Ok(true) }).await;
        assert_matches!(exhausted, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn allocation_retries_past_collisions() {
        let calls = Cell::new(0);
        let number = allocate_unique(INVOICE_PREFIX, 5, |_| {
            calls.set(calls.get() + 1);
            let taken = calls.get() < 3;
            async move { Ok(taken) }
        })
        .await
        .unwrap();

        assert_eq!(calls.get(), 3);
        assert!(number.starts_with("INV-"));
    }

    #[tokio::test]
    async fn allocation_gives_up_with_conflict() {
        let result = allocate_unique(INVOICE_PREFIX, 3, |_| async { Ok(true) }).await;
        assert_matches!(result, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn lookup_errors_propagate() {
        let result = allocate_unique(TRANSACTION_PREFIX, 3, |_| async {
            Err(DbErr::Custom("down".into()))
        })
        .await;
        assert_matches!(result, Err(ServiceError::DatabaseError(_)));
    }
}
