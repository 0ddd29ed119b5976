//! Double-entry bookkeeping logic.
//!
//! This module implements the core ledger functionality:
//! - Journals, lines, accounts and general-ledger rows
//! - Line validation (balance, one side per line, dense numbering)
//! - Debit-positive balance arithmetic
//! - Error types for posting operations

pub mod balance;
pub mod error;
pub mod types;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use balance::{AccountTotals, RunningBalance, balance_change};
pub use error::{PostingError, ValidationError};
pub use types::{
    Account, AccountNature, ClosingType, Dimensions, GeneralLedgerEntry, Journal, JournalLine,
    JournalStatus, JournalType, NumberingScope, OrganizationSettings, metadata,
};
pub use validation::{LineTotals, validate_functional_balance, validate_lines};
