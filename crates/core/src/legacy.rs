//! Compatibility entry point for callers of the old two-error posting API.
//!
//! Posts with `allow_draft` set and folds [`PostingError`] into the two errors those
//! callers handle.

use corebook_shared::types::{JournalId, UserId};
use thiserror::Error;
use tracing::{error, warn};

use crate::ledger::{Journal, PostingError};
use crate::posting::{PostJournalCommand, PostingEngine};
use crate::store::LedgerStore;

/// Errors of the legacy posting API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegacyPostingError {
    /// The journal cannot be posted as it stands.
    #[error("Journal {journal_id} failed validation: {message}")]
    JournalValidationError {
        /// Journal.
        journal_id: JournalId,
        /// Machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Posting was refused or failed.
    #[error("Journal {journal_id} could not be posted: {message}")]
    JournalPostingError {
        /// Journal.
        journal_id: JournalId,
        /// Human-readable message.
        message: String,
    },
}

/// Legacy `post_journal` adapter over a [`PostingEngine`].
pub struct LegacyJournalPoster<S: LedgerStore> {
    engine: PostingEngine<S>,
}

impl<S: LedgerStore> LegacyJournalPoster<S> {
    /// Creates the adapter.
    pub fn new(engine: PostingEngine<S>) -> Self {
        Self { engine }
    }

    /// Posts a draft or approved journal and returns it as stored.
    ///
    /// # Errors
    ///
    /// `JournalValidationError` for validation and closed-period failures,
    /// `JournalPostingError` for everything else. A journal that is already posted, or
    /// that a conflicting poster managed to post, is returned as a success.
    pub async fn post_journal(
        &self,
        journal_id: JournalId,
        actor: UserId,
    ) -> Result<Journal, LegacyPostingError> {
        let command = PostJournalCommand {
            allow_draft: true,
            ..PostJournalCommand::new(journal_id, actor)
        };
        match self.engine.post(&command).await {
            Ok(posted) => Ok(posted.journal),
            Err(err) => self.recover(journal_id, err).await,
        }
    }

    async fn recover(
        &self,
        journal_id: JournalId,
        err: PostingError,
    ) -> Result<Journal, LegacyPostingError> {
        match err {
            PostingError::Validation { .. } | PostingError::PeriodClosed { .. } => {
                Err(LegacyPostingError::JournalValidationError {
                    journal_id,
                    code: err.error_code().to_string(),
                    message: validation_message(&err),
                })
            }
            PostingError::Conflict { .. } => match self.engine.find_posted(journal_id).await {
                Ok(Some(posted)) => {
                    warn!(journal_id = %journal_id, "conflict resolved, journal is posted");
                    Ok(posted.journal)
                }
                Ok(None) => Err(LegacyPostingError::JournalPostingError {
                    journal_id,
                    message: err.to_string(),
                }),
                Err(e) => {
                    error!(journal_id = %journal_id, error = %e, "re-reading journal after conflict failed");
                    Err(LegacyPostingError::JournalPostingError {
                        journal_id,
                        message: err.to_string(),
                    })
                }
            },
            PostingError::Permission { .. } | PostingError::Storage { .. } => {
                Err(LegacyPostingError::JournalPostingError {
                    journal_id,
                    message: err.to_string(),
                })
            }
        }
    }
}

fn validation_message(err: &PostingError) -> String {
    match err {
        PostingError::Validation { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
