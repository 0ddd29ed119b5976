//! Property-based tests for functional conversion.

use corebook_shared::types::{AccountId, JournalId, rounding_tolerance};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::CurrencyService;
use crate::ledger::{JournalLine, validate_functional_balance};

/// Strategy to generate positive decimal amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate positive exchange rates (0.000001 to 100.000000).
fn positive_rate() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 6))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* amount and rate, the result of convert() SHALL have at most
    /// 4 decimal places.
    #[test]
    fn prop_convert_rounds_to_4_decimals(
        amount in positive_amount(),
        rate in positive_rate(),
    ) {
        let result = CurrencyService::convert(amount, rate);
        let scaled = result * Decimal::from(10000);
        prop_assert_eq!(scaled, scaled.round(), "{} has more than 4 places", result);
    }

    /// *For any* balanced journal converted at one rate, functional debits and credits
    /// SHALL agree within the rounding tolerance.
    #[test]
    fn prop_converted_journal_stays_balanced(
        debits in prop::collection::vec(positive_amount(), 1..12),
        rate in positive_rate(),
    ) {
        let journal_id = JournalId::new();
        let mut lines: Vec<JournalLine> = debits
            .iter()
            .zip(1u32..)
            .map(|(amount, n)| JournalLine::debit(journal_id, n, AccountId::new(), *amount, "EUR"))
            .collect();
        let total: Decimal = debits.iter().copied().sum();
        let next = u32::try_from(lines.len()).unwrap_or(u32::MAX) + 1;
        lines.push(JournalLine::credit(journal_id, next, AccountId::new(), total, "EUR"));

        CurrencyService::apply_rate(&mut lines, "EUR", rate);

        let debit: Decimal = lines.iter().map(|l| l.functional_debit).sum();
        let credit: Decimal = lines.iter().map(|l| l.functional_credit).sum();
        prop_assert!((debit - credit).abs() <= rounding_tolerance(lines.len()));
        prop_assert!(validate_functional_balance(&lines).is_ok());
    }
}
