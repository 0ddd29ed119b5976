//! Account balance calculations.
//!
//! Balances are debit-positive for every account nature:
//! `balance += functional_debit - functional_credit`.

use corebook_shared::types::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::AccountNature;

/// Signed effect of a debit/credit pair on a debit-positive balance.
#[must_use]
pub fn balance_change(debit: Decimal, credit: Decimal) -> Decimal {
    debit - credit
}

/// Aggregated functional totals of one account's ledger rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTotals {
    /// The account.
    pub account_id: AccountId,
    /// Account nature.
    pub nature: AccountNature,
    /// Sum of functional debits.
    pub functional_debit: Decimal,
    /// Sum of functional credits.
    pub functional_credit: Decimal,
}

impl AccountTotals {
    /// Net balance, debit-positive.
    #[must_use]
    pub fn net(&self) -> Decimal {
        balance_change(self.functional_debit, self.functional_credit)
    }
}

/// Running balance snapshot produced when a ledger row is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningBalance {
    /// Balance before the row.
    pub previous_balance: Decimal,
    /// Balance after the row.
    pub current_balance: Decimal,
}

impl RunningBalance {
    /// Applies a debit/credit pair to `previous_balance`.
    #[must_use]
    pub fn apply(previous_balance: Decimal, debit: Decimal, credit: Decimal) -> Self {
        Self {
            previous_balance,
            current_balance: previous_balance + balance_change(debit, credit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn balance_change_strategy() -> impl Strategy<Value = (Decimal, Decimal)> {
        (0i64..100_000i64, any::<bool>()).prop_map(|(n, is_debit)| {
            let amount = Decimal::new(n, 2);
            if is_debit {
                (amount, Decimal::ZERO)
            } else {
                (Decimal::ZERO, amount)
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// *For any* sequence of lines, the final balance SHALL equal the opening balance
        /// plus the cumulative net.
        #[test]
        fn prop_final_balance_equals_opening_plus_net(
            opening in (-100_000i64..100_000i64).prop_map(|n| Decimal::new(n, 2)),
            changes in prop::collection::vec(balance_change_strategy(), 1..20),
        ) {
            let mut balance = opening;
            for (debit, credit) in &changes {
                let rb = RunningBalance::apply(balance, *debit, *credit);
                prop_assert_eq!(rb.previous_balance, balance);
                balance = rb.current_balance;
            }

            let net: Decimal = changes.iter().map(|(d, c)| d - c).sum();
            prop_assert_eq!(balance, opening + net);
        }
    }

    #[test]
    fn test_account_totals_net() {
        let totals = AccountTotals {
            account_id: AccountId::new(),
            nature: AccountNature::Income,
            functional_debit: dec!(20),
            functional_credit: dec!(520),
        };
        assert_eq!(totals.net(), dec!(-500));
    }

    #[test]
    fn test_credit_lowers_debit_positive_balance() {
        let rb = RunningBalance::apply(dec!(0), dec!(0), dec!(100.00));
        assert_eq!(rb.current_balance, dec!(-100.00));
    }
}
