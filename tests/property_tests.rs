//! Property-based tests for document numbering and refund bounds.

use agency_backoffice::services::lifecycle::refund_amount;
use agency_backoffice::services::numbering::{generate_at, refund_number, SUFFIX_LEN};
use proptest::prelude::*;
use regex::Regex;
use rust_decimal::Decimal;

fn number_format(prefix: &str) -> Regex {
    Regex::new(&format!(r"^{}-(\d+)-([0-9A-Z]{{{}}})$", prefix, SUFFIX_LEN)).unwrap()
}

proptest! {
    #[test]
    fn numbers_in_the_same_millisecond_differ(millis in 1_600_000_000_000i64..2_000_000_000_000i64) {
        let first = generate_at("INV", millis);
        let second = generate_at("INV", millis);
        prop_assert_ne!(first, second);
    }

    #[test]
    fn numbers_carry_prefix_timestamp_and_suffix(
        prefix in prop::sample::select(vec!["INV", "TXN"]),
        millis in 0i64..4_000_000_000_000i64,
    ) {
        let number = generate_at(prefix, millis);
        let captures = number_format(prefix).captures(&number);
        prop_assert!(captures.is_some(), "unexpected format: {}", number);
        let captures = captures.unwrap();
        let expected_millis = millis.to_string();
        prop_assert_eq!(&captures[1], expected_millis.as_str());
    }

    #[test]
    fn refund_numbers_wrap_the_original(millis in 0i64..4_000_000_000_000i64) {
        let original = generate_at("TXN", millis);
        let reversal = refund_number(&original);
        prop_assert_eq!(reversal, format!("REFUND-{}", original));
    }

    #[test]
    fn refund_amount_stays_within_the_original_total(
        total_cents in 1i64..10_000_000i64,
        requested_cents in -1_000i64..20_000_000i64,
    ) {
        let total = Decimal::new(total_cents, 2);
        let requested = Decimal::new(requested_cents, 2);

        match refund_amount(Some(requested), total) {
            Ok(amount) => {
                prop_assert!(amount > Decimal::ZERO);
                prop_assert!(amount <= total);
                prop_assert_eq!(amount, requested);
            }
            Err(_) => prop_assert!(requested <= Decimal::ZERO || requested > total),
        }

        prop_assert_eq!(refund_amount(None, total).unwrap(), total);
    }
}
