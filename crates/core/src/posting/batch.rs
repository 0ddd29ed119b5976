//! Batch posting coordinator.
//!
//! Scans eligible journals in (journal date, id) order, one keyset page at a time, and posts
//! each one in its own transaction. A failing journal is recorded and the batch moves on.

use std::time::Duration;

use corebook_shared::config::PostingConfig;
use corebook_shared::types::{JournalId, KeysetPage, UserId};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::engine::{PostJournalCommand, PostedJournal, PostingEngine};
use crate::ledger::PostingError;
use crate::store::{BatchFilter, LedgerStore, LedgerTx, StoreError};

/// Bounded retry of retryable posting failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per journal, including the first (minimum 1).
    pub max_attempts: u32,
    /// Also retry opaque storage errors, not just conflicts.
    pub retry_storage_errors: bool,
    /// Delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            retry_storage_errors: false,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Returns true if a journal that failed with `error` on `attempt` gets another try.
    #[must_use]
    pub fn should_retry(&self, error: &PostingError, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        match error {
            PostingError::Conflict { .. } => true,
            PostingError::Storage { .. } => self.retry_storage_errors,
            _ => false,
        }
    }
}

/// Execution policy of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Journals posted concurrently within a page (minimum 1).
    pub concurrency: usize,
    /// Per-journal retry.
    pub retry: RetryPolicy,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            concurrency: 1,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&PostingConfig> for BatchPolicy {
    fn from(config: &PostingConfig) -> Self {
        Self {
            concurrency: usize::try_from(config.concurrency.max(1)).unwrap_or(1),
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                retry_storage_errors: config.retry_storage_errors,
                backoff: Duration::from_millis(config.retry_backoff_ms),
            },
        }
    }
}

/// Request to post every eligible journal matching a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostBatchCommand {
    /// Selection.
    pub filter: BatchFilter,
    /// Maximum journals considered in this invocation.
    pub limit: u32,
    /// Journals read per page.
    pub chunk_size: u32,
    /// Acting user.
    pub actor: UserId,
}

impl PostBatchCommand {
    /// Command using the configured limit and chunk size.
    #[must_use]
    pub fn from_config(filter: BatchFilter, actor: UserId, config: &PostingConfig) -> Self {
        Self {
            filter,
            limit: config.batch_limit,
            chunk_size: config.chunk_size,
            actor,
        }
    }
}

/// One journal the batch could not post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Journal.
    pub journal_id: JournalId,
    /// Machine-readable code.
    pub error_code: String,
    /// Human-readable message.
    pub message: String,
}

/// Deterministic summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Journals posted, in scan order.
    pub posted: Vec<JournalId>,
    /// Journals that failed, in scan order.
    pub failed: Vec<BatchFailure>,
    /// Journals considered.
    pub scanned: u32,
}

/// Posts journals in bulk through a [`PostingEngine`].
pub struct BatchPoster<S: LedgerStore> {
    engine: PostingEngine<S>,
    policy: BatchPolicy,
}

impl<S: LedgerStore> BatchPoster<S> {
    /// Creates a poster.
    pub fn new(engine: PostingEngine<S>, policy: BatchPolicy) -> Self {
        Self { engine, policy }
    }

    /// Posts eligible journals until the filter is exhausted or `limit` is reached.
    ///
    /// # Errors
    ///
    /// Only a failure to read a page aborts the batch; posting failures are recorded in
    /// [`BatchResult::failed`].
    #[instrument(skip_all, fields(organization_id = %command.filter.organization_id))]
    pub async fn post_batch(&self, command: &PostBatchCommand) -> Result<BatchResult, StoreError> {
        let mut result = BatchResult::default();
        let mut remaining = command.limit;
        let mut page = KeysetPage::first(command.chunk_size);

        while remaining > 0 {
            page.size = command.chunk_size.max(1).min(remaining);
            let keys = {
                let mut tx = self.engine.store().begin().await?;
                tx.eligible_journals(&command.filter, &page).await?
            };
            let Some(last) = keys.last().copied() else {
                break;
            };
            let fetched = u32::try_from(keys.len()).unwrap_or(u32::MAX);
            result.scanned += fetched;
            remaining = remaining.saturating_sub(fetched);

            let outcomes: Vec<(JournalId, Result<PostedJournal, PostingError>)> =
                stream::iter(keys.into_iter().map(|(_, journal_id)| async move {
                    (journal_id, self.post_one(journal_id, command.actor).await)
                }))
                .buffered(self.policy.concurrency.max(1))
                .collect()
                .await;

            for (journal_id, outcome) in outcomes {
                match outcome {
                    Ok(_) => result.posted.push(journal_id),
                    Err(e) => {
                        warn!(journal_id = %journal_id, error_code = e.error_code(), error = %e, "batch item failed");
                        result.failed.push(BatchFailure {
                            journal_id,
                            error_code: e.error_code().to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }

            if fetched < page.size {
                break;
            }
            page = page.next(last);
        }

        info!(
            scanned = result.scanned,
            posted = result.posted.len(),
            failed = result.failed.len(),
            "batch posting finished"
        );
        Ok(result)
    }

    async fn post_one(
        &self,
        journal_id: JournalId,
        actor: UserId,
    ) -> Result<PostedJournal, PostingError> {
        let command = PostJournalCommand::new(journal_id, actor)
            .with_idempotency_key(format!("batch-{journal_id}"));
        let mut attempt = 1;
        loop {
            match self.engine.post(&command).await {
                Err(e) if self.policy.retry.should_retry(&e, attempt) => {
                    warn!(journal_id = %journal_id, attempt, error = %e, "retrying journal");
                    if !self.policy.retry.backoff.is_zero() {
                        tokio::time::sleep(self.policy.retry.backoff).await;
                    }
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}
