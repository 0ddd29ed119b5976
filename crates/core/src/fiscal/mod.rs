//! Fiscal year and period management.
//!
//! - `period` - fiscal years, accounting periods and their posting rules
//! - `closing` - closing and opening plans computed from ledger totals
//! - `closer` - the year-end close, reopen and single-period close

pub mod closer;
pub mod closing;
pub mod error;
pub mod period;

#[cfg(test)]
mod closer_tests;
#[cfg(test)]
mod closing_props;

pub use closer::{
    CloseFiscalYearCommand, ClosePeriodCommand, ClosingResult, FiscalYearCloser,
    ReopenFiscalYearCommand,
};
pub use closing::{
    ClosingPlan, OpeningPlan, PlanError, PlannedLine, ResultNature, plan_closing, plan_opening,
};
pub use error::ClosingError;
pub use period::{AccountingPeriod, FiscalYear, FiscalYearStatus, PeriodStatus};
