//! Property-based tests for journal line validation rules.

use corebook_shared::types::{AccountId, JournalId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::error::ValidationError;
use super::types::JournalLine;
use super::validation::validate_lines;

/// Strategy to generate a valid positive amount (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Builds a balanced journal: every debit amount plus one credit line for the total.
fn balanced_lines(debits: &[Decimal]) -> Vec<JournalLine> {
    let journal_id = JournalId::new();
    let mut lines: Vec<JournalLine> = debits
        .iter()
        .zip(1u32..)
        .map(|(amount, n)| JournalLine::debit(journal_id, n, AccountId::new(), *amount, "USD"))
        .collect();
    let total: Decimal = debits.iter().copied().sum();
    let next = u32::try_from(lines.len()).unwrap_or(u32::MAX) + 1;
    lines.push(JournalLine::credit(journal_id, next, AccountId::new(), total, "USD"));
    lines
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* set of positive debits offset by one credit, validation SHALL accept the
    /// journal and report equal totals.
    #[test]
    fn prop_balanced_journal_accepted(
        debits in prop::collection::vec(positive_amount(), 1..10),
    ) {
        let lines = balanced_lines(&debits);
        let totals = validate_lines(&lines);
        prop_assert!(totals.is_ok(), "balanced journal rejected: {:?}", totals);
        let totals = totals.unwrap();
        prop_assert_eq!(totals.debit, totals.credit);
    }

    /// *For any* balanced journal, perturbing one amount SHALL make it unbalanced.
    #[test]
    fn prop_perturbed_journal_rejected(
        debits in prop::collection::vec(positive_amount(), 1..10),
        delta in positive_amount(),
    ) {
        let mut lines = balanced_lines(&debits);
        lines[0].debit += delta;
        prop_assert!(
            matches!(validate_lines(&lines), Err(ValidationError::Unbalanced { .. })),
            "perturbed journal should be unbalanced"
        );
    }

    /// *For any* line with a negative amount, validation SHALL reject it.
    #[test]
    fn prop_negative_amount_rejected(
        amount in positive_amount(),
    ) {
        let mut lines = balanced_lines(&[amount]);
        lines[0].debit = -amount;
        prop_assert_eq!(
            validate_lines(&lines),
            Err(ValidationError::NegativeAmount { line_number: 1 })
        );
    }
}
