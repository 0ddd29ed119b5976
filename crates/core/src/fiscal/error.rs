//! Fiscal year closing error types.

use corebook_shared::types::{FiscalYearId, UserId};
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::PostingError;
use crate::ports::Capability;
use crate::store::StoreError;

/// Errors raised by close, reopen and period close.
#[derive(Debug, Error)]
pub enum ClosingError {
    /// Fiscal year or period does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Identifier looked up.
        id: Uuid,
    },

    /// Actor lacks the capability.
    #[error("Actor {actor} lacks {capability} on fiscal year {fiscal_year_id}")]
    Permission {
        /// Fiscal year involved.
        fiscal_year_id: FiscalYearId,
        /// Acting user.
        actor: UserId,
        /// Capability checked.
        capability: Capability,
    },

    /// State precondition unmet (already closed, open periods, not closed).
    #[error("Fiscal year {fiscal_year_id}: {message}")]
    Validation {
        /// Fiscal year involved.
        fiscal_year_id: FiscalYearId,
        /// Human-readable reason.
        message: String,
    },

    /// Closing configuration missing or a residue could not be swept.
    #[error("Year-end closing of fiscal year {fiscal_year_id} failed: {message}")]
    YearEndClosing {
        /// Fiscal year involved.
        fiscal_year_id: FiscalYearId,
        /// Human-readable reason.
        message: String,
    },

    /// Posting a generated journal failed.
    #[error("Posting the {stage} journal of fiscal year {fiscal_year_id} failed: {source}")]
    Posting {
        /// Fiscal year involved.
        fiscal_year_id: FiscalYearId,
        /// `closing` or `opening`.
        stage: &'static str,
        /// Posting failure.
        #[source]
        source: PostingError,
    },

    /// Unexpected storage failure; nothing was committed.
    #[error("Storage failure while processing fiscal year {fiscal_year_id}")]
    Storage {
        /// Fiscal year involved.
        fiscal_year_id: FiscalYearId,
        /// Store detail.
        #[source]
        source: StoreError,
    },
}

impl ClosingError {
    pub(crate) fn validation(fiscal_year_id: FiscalYearId, message: impl Into<String>) -> Self {
        Self::Validation {
            fiscal_year_id,
            message: message.into(),
        }
    }

    pub(crate) fn year_end(fiscal_year_id: FiscalYearId, message: impl Into<String>) -> Self {
        Self::YearEndClosing {
            fiscal_year_id,
            message: message.into(),
        }
    }

    pub(crate) fn storage(fiscal_year_id: FiscalYearId) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Storage {
            fiscal_year_id,
            source,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Permission { .. } => "PERMISSION_DENIED",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::YearEndClosing { .. } => "YEAR_END_CLOSING_ERROR",
            Self::Posting { source, .. } => source.error_code(),
            Self::Storage { .. } => "STORAGE_ERROR",
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Posting { source, .. } => source.is_retryable(),
            Self::Storage { source, .. } => matches!(source, StoreError::Conflict(_)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let fiscal_year_id = FiscalYearId::new();
        assert_eq!(
            ClosingError::validation(fiscal_year_id, "already closed").error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            ClosingError::year_end(fiscal_year_id, "no retained earnings account").error_code(),
            "YEAR_END_CLOSING_ERROR"
        );
    }

    #[test]
    fn test_conflicts_are_retryable() {
        let fiscal_year_id = FiscalYearId::new();
        let err = ClosingError::storage(fiscal_year_id)(StoreError::Conflict("lock".into()));
        assert!(err.is_retryable());
        let err = ClosingError::storage(fiscal_year_id)(StoreError::Backend("io".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display_names_fiscal_year() {
        let fiscal_year_id = FiscalYearId::new();
        let err = ClosingError::validation(fiscal_year_id, "fiscal year is already closed");
        assert_eq!(
            err.to_string(),
            format!("Fiscal year {fiscal_year_id}: fiscal year is already closed")
        );
    }
}
