//! Property-based tests for closing and opening plans.

use corebook_shared::types::AccountId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::closing::{PlannedLine, plan_closing, plan_opening};
use crate::ledger::{AccountNature, AccountTotals};

fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|units| Decimal::new(units, 4))
}

fn nature(profit_and_loss: bool) -> impl Strategy<Value = AccountNature> {
    if profit_and_loss {
        prop_oneof![Just(AccountNature::Income), Just(AccountNature::Expense)].boxed()
    } else {
        prop_oneof![
            Just(AccountNature::Asset),
            Just(AccountNature::Liability),
            Just(AccountNature::Equity)
        ]
        .boxed()
    }
}

fn account_totals(profit_and_loss: bool) -> impl Strategy<Value = Vec<AccountTotals>> {
    prop::collection::vec((nature(profit_and_loss), amount(), amount()), 0..15).prop_map(|rows| {
        rows.into_iter()
            .map(|(nature, functional_debit, functional_credit)| AccountTotals {
                account_id: AccountId::new(),
                nature,
                functional_debit,
                functional_credit,
            })
            .collect()
    })
}

fn net(lines: &[PlannedLine]) -> Decimal {
    lines.iter().map(|l| l.debit - l.credit).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* income/expense balances, the closing journal SHALL balance and bring every
    /// account to zero, transferring exactly `net_result` to retained earnings.
    #[test]
    fn prop_closing_zeroes_profit_and_loss(totals in account_totals(true)) {
        let retained = AccountId::new();
        let plan = plan_closing(&totals, Some(retained)).unwrap();

        prop_assert_eq!(net(&plan.lines), Decimal::ZERO);

        for t in &totals {
            let applied: Decimal = plan
                .lines
                .iter()
                .filter(|l| l.account_id == t.account_id)
                .map(|l| l.debit - l.credit)
                .sum();
            prop_assert_eq!(t.net() + applied, Decimal::ZERO);
        }

        let transferred: Decimal = plan
            .lines
            .iter()
            .filter(|l| l.account_id == retained)
            .map(|l| l.debit - l.credit)
            .sum();
        prop_assert_eq!(transferred, plan.net_result);
    }

    /// *For any* balance-sheet balances, the opening journal SHALL balance and reproduce
    /// each account's balance, with the residue on the adjustment account.
    #[test]
    fn prop_opening_reproduces_positions(totals in account_totals(false)) {
        let adjustment = AccountId::new();
        let plan = plan_opening(&totals, Some(adjustment)).unwrap();

        prop_assert_eq!(net(&plan.lines), Decimal::ZERO);

        for t in &totals {
            let carried: Decimal = plan
                .lines
                .iter()
                .filter(|l| l.account_id == t.account_id)
                .map(|l| l.debit - l.credit)
                .sum();
            prop_assert_eq!(carried, t.net());
        }

        let swept: Decimal = plan
            .lines
            .iter()
            .filter(|l| l.account_id == adjustment)
            .map(|l| l.debit - l.credit)
            .sum();
        prop_assert_eq!(swept, -plan.residue);
    }
}
