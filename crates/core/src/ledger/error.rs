//! Posting error types.
//!
//! `ValidationError` carries the caller-correctable detail; `PostingError` is the closed
//! outcome taxonomy of a posting attempt and always names the journal involved.

use chrono::NaiveDate;
use corebook_shared::types::{AccountId, JournalId, JournalTypeId, PeriodId, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::JournalStatus;
use crate::store::StoreError;

/// Caller-correctable problems detected before any write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    // ========== Lifecycle ==========
    /// Journal does not exist.
    #[error("Journal not found")]
    JournalNotFound,

    /// Journal status does not allow posting.
    #[error("Journal in status '{status}' cannot be posted")]
    InvalidStatus {
        /// Current status.
        status: JournalStatus,
    },

    /// Journal is locked although not posted.
    #[error("Journal is locked")]
    JournalLocked,

    /// Only posted journals can be reversed.
    #[error("Only posted journals can be reversed, journal is '{status}'")]
    NotReversible {
        /// Current status.
        status: JournalStatus,
    },

    /// A required field is empty.
    #[error("Required field missing: {0}")]
    MissingField(&'static str),

    // ========== Lines ==========
    /// Fewer than two lines.
    #[error("Journal must have at least 2 lines, found {count}")]
    InsufficientLines {
        /// Number of lines found.
        count: usize,
    },

    /// Line numbers are not 1..=n.
    #[error("Line numbers must be dense from 1: expected {expected}, found {found}")]
    LineNumbering {
        /// Expected line number.
        expected: u32,
        /// Line number found at that position.
        found: u32,
    },

    /// Both debit and credit set on one line.
    #[error("Line {line_number} sets both debit and credit")]
    BothSides {
        /// Offending line.
        line_number: u32,
    },

    /// Neither debit nor credit set.
    #[error("Line {line_number} has no amount")]
    ZeroAmount {
        /// Offending line.
        line_number: u32,
    },

    /// Negative debit or credit.
    #[error("Line {line_number} has a negative amount")]
    NegativeAmount {
        /// Offending line.
        line_number: u32,
    },

    /// Entry-currency debits and credits differ.
    #[error("Journal is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Total debit.
        debit: Decimal,
        /// Total credit.
        credit: Decimal,
    },

    /// Functional debits and credits differ beyond rounding tolerance.
    #[error(
        "Functional amounts are not balanced. Debit: {debit}, Credit: {credit}, tolerance: {tolerance}"
    )]
    FunctionalImbalance {
        /// Total functional debit.
        debit: Decimal,
        /// Total functional credit.
        credit: Decimal,
        /// Allowed residue.
        tolerance: Decimal,
    },

    // ========== Accounts ==========
    /// Account missing or owned by another organization.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account is inactive.
    #[error("Account {0} is inactive")]
    AccountInactive(AccountId),

    /// Journal type missing.
    #[error("Journal type not found: {0}")]
    JournalTypeNotFound(JournalTypeId),

    // ========== Currency ==========
    /// Rate is zero or negative.
    #[error("Exchange rate must be positive, got {rate}")]
    InvalidExchangeRate {
        /// Offending rate.
        rate: Decimal,
    },

    /// Resolver could not supply a rate.
    #[error("No exchange rate found for {from} to {to} on {date}: {reason}")]
    ExchangeRateUnavailable {
        /// Entry currency.
        from: String,
        /// Base currency.
        to: String,
        /// Journal date.
        date: NaiveDate,
        /// Resolver message.
        reason: String,
    },
}

impl ValidationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::JournalNotFound => "JOURNAL_NOT_FOUND",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::JournalLocked => "JOURNAL_LOCKED",
            Self::NotReversible { .. } => "NOT_REVERSIBLE",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InsufficientLines { .. } => "INSUFFICIENT_LINES",
            Self::LineNumbering { .. } => "INVALID_LINE_NUMBERING",
            Self::BothSides { .. } => "INVALID_ENTRY_TYPE",
            Self::ZeroAmount { .. } => "ZERO_AMOUNT",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::Unbalanced { .. } => "UNBALANCED_JOURNAL",
            Self::FunctionalImbalance { .. } => "UNBALANCED_FUNCTIONAL_AMOUNTS",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::JournalTypeNotFound(_) => "JOURNAL_TYPE_NOT_FOUND",
            Self::InvalidExchangeRate { .. } => "INVALID_EXCHANGE_RATE",
            Self::ExchangeRateUnavailable { .. } => "NO_EXCHANGE_RATE",
        }
    }
}

/// Outcome of a failed posting attempt.
#[derive(Debug, Error)]
pub enum PostingError {
    /// Caller-correctable problem; nothing was written.
    #[error("Journal {journal_id} failed validation: {source}")]
    Validation {
        /// Journal involved.
        journal_id: JournalId,
        /// Detail.
        #[source]
        source: ValidationError,
    },

    /// Actor lacks the capability.
    #[error("Actor {actor} is not permitted to {action} journal {journal_id}")]
    Permission {
        /// Journal involved.
        journal_id: JournalId,
        /// Acting user.
        actor: UserId,
        /// Capability checked.
        action: &'static str,
    },

    /// Target period is not open for this journal.
    #[error("Period {period_id} does not accept journal {journal_id}: {reason}")]
    PeriodClosed {
        /// Journal involved.
        journal_id: JournalId,
        /// Period targeted.
        period_id: PeriodId,
        /// Why the period rejected the journal.
        reason: String,
    },

    /// Concurrent write conflict; the journal did not end up posted.
    #[error("Concurrent modification while posting journal {journal_id}, please retry")]
    Conflict {
        /// Journal involved.
        journal_id: JournalId,
        /// Store detail.
        #[source]
        source: StoreError,
    },

    /// Unexpected storage failure; the unit was rolled back.
    #[error("Posting journal {journal_id} failed")]
    Storage {
        /// Journal involved.
        journal_id: JournalId,
        /// Store detail (logged, not shown to end users).
        #[source]
        source: StoreError,
    },
}

impl PostingError {
    pub(crate) fn validation(journal_id: JournalId, source: ValidationError) -> Self {
        Self::Validation { journal_id, source }
    }

    /// Maps a store failure to `Conflict` or `Storage`.
    pub(crate) fn from_store(journal_id: JournalId, source: StoreError) -> Self {
        match source {
            StoreError::Conflict(_) => Self::Conflict { journal_id, source },
            StoreError::NotFound { .. } | StoreError::Backend(_) => {
                Self::Storage { journal_id, source }
            }
        }
    }

    /// Journal the failure refers to.
    #[must_use]
    pub fn journal_id(&self) -> JournalId {
        match self {
            Self::Validation { journal_id, .. }
            | Self::Permission { journal_id, .. }
            | Self::PeriodClosed { journal_id, .. }
            | Self::Conflict { journal_id, .. }
            | Self::Storage { journal_id, .. } => *journal_id,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { source, .. } => source.error_code(),
            Self::Permission { .. } => "PERMISSION_DENIED",
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::Conflict { .. } => "CONCURRENT_MODIFICATION",
            Self::Storage { .. } => "STORAGE_ERROR",
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
