//! Year-end closing and opening-balance calculations.
//!
//! Pure functions over aggregated ledger totals. The closer turns the resulting plans into
//! journals and posts them.

use corebook_shared::types::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::AccountTotals;

/// Nature of a year's net result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultNature {
    /// Income exceeded expenses.
    Profit,
    /// Expenses exceeded income.
    Loss,
    /// Nothing to transfer.
    BreakEven,
}

impl ResultNature {
    /// Classifies a debit-positive net result (negative = profit).
    #[must_use]
    pub fn from_net_result(net_result: Decimal) -> Self {
        if net_result < Decimal::ZERO {
            Self::Profit
        } else if net_result > Decimal::ZERO {
            Self::Loss
        } else {
            Self::BreakEven
        }
    }

    /// Returns the metadata tag value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profit => "profit",
            Self::Loss => "loss",
            Self::BreakEven => "break_even",
        }
    }

    /// Parses a metadata tag value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "profit" => Some(Self::Profit),
            "loss" => Some(Self::Loss),
            "break_even" => Some(Self::BreakEven),
            _ => None,
        }
    }
}

/// A generated journal line in base currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedLine {
    /// Account.
    pub account_id: AccountId,
    /// Debit amount (zero on credit lines).
    pub debit: Decimal,
    /// Credit amount (zero on debit lines).
    pub credit: Decimal,
}

impl PlannedLine {
    /// Line moving `amount` (debit-positive) onto the account.
    fn signed(account_id: AccountId, amount: Decimal) -> Self {
        if amount > Decimal::ZERO {
            Self {
                account_id,
                debit: amount,
                credit: Decimal::ZERO,
            }
        } else {
            Self {
                account_id,
                debit: Decimal::ZERO,
                credit: -amount,
            }
        }
    }
}

/// Lines of a closing journal plus the result they transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingPlan {
    /// Generated lines; empty when no income/expense account carries a balance.
    pub lines: Vec<PlannedLine>,
    /// Sum of the income/expense nets, debit-positive (negative = profit).
    pub net_result: Decimal,
    /// Nature of `net_result`.
    pub result_nature: ResultNature,
}

/// Lines of an opening-balance journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningPlan {
    /// Generated lines; empty when no balance-sheet account carries a balance.
    pub lines: Vec<PlannedLine>,
    /// Rounding residue routed to the adjustment account (debit-positive).
    pub residue: Decimal,
}

/// Missing configuration detected while planning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A nonzero result needs a retained-earnings account.
    #[error("retained earnings account is not configured but the net result is {net_result}")]
    MissingRetainedEarnings {
        /// Result that could not be transferred.
        net_result: Decimal,
    },

    /// A residue needs an adjustment account.
    #[error("rollover adjustment account is not configured but the opening residue is {residue}")]
    MissingAdjustmentAccount {
        /// Residue that could not be swept.
        residue: Decimal,
    },
}

/// Plans the closing journal zeroing every income/expense account.
///
/// Each account with a nonzero net gets one line on the opposite side of its balance. A
/// nonzero net result is transferred to retained earnings on the side that balances the
/// journal: credit on profit, debit on loss.
///
/// # Errors
///
/// `MissingRetainedEarnings` when the result is nonzero and no account is configured.
pub fn plan_closing(
    totals: &[AccountTotals],
    retained_earnings_account_id: Option<AccountId>,
) -> Result<ClosingPlan, PlanError> {
    let mut lines: Vec<PlannedLine> = totals
        .iter()
        .filter(|t| t.nature.is_profit_and_loss() && !t.net().is_zero())
        .map(|t| PlannedLine::signed(t.account_id, -t.net()))
        .collect();

    let net_result: Decimal = totals
        .iter()
        .filter(|t| t.nature.is_profit_and_loss())
        .map(AccountTotals::net)
        .sum();

    if !net_result.is_zero() {
        let retained_earnings = retained_earnings_account_id
            .ok_or(PlanError::MissingRetainedEarnings { net_result })?;
        lines.push(PlannedLine::signed(retained_earnings, net_result));
    }

    Ok(ClosingPlan {
        lines,
        net_result,
        result_nature: ResultNature::from_net_result(net_result),
    })
}

/// Plans the opening journal reproducing every balance-sheet account's balance.
///
/// # Errors
///
/// `MissingAdjustmentAccount` when the balances leave a residue and no account is
/// configured.
pub fn plan_opening(
    totals: &[AccountTotals],
    adjustment_account_id: Option<AccountId>,
) -> Result<OpeningPlan, PlanError> {
    let mut lines: Vec<PlannedLine> = totals
        .iter()
        .filter(|t| !t.nature.is_profit_and_loss() && !t.net().is_zero())
        .map(|t| PlannedLine::signed(t.account_id, t.net()))
        .collect();

    let residue: Decimal = lines.iter().map(|l| l.debit - l.credit).sum();
    if !residue.is_zero() {
        let adjustment = adjustment_account_id.ok_or(PlanError::MissingAdjustmentAccount { residue })?;
        lines.push(PlannedLine::signed(adjustment, -residue));
    }

    Ok(OpeningPlan { lines, residue })
}
