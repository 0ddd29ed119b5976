//! Posting engine: turns an approved journal into general-ledger rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use corebook_shared::types::{AccountId, JournalId, LedgerEntryId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::currency::CurrencyService;
use crate::ledger::{
    ClosingType, GeneralLedgerEntry, Journal, JournalStatus, PostingError, RunningBalance,
    ValidationError, validate_functional_balance, validate_lines,
};
use crate::numbering::{format_journal_number, sequence_scope};
use crate::ports::{
    AuditEntry, AuditLogger, Capability, DomainEvent, EventEmitter, ExchangeRateResolver, Outbox,
    PermissionChecker, PermissionRequest, TracingAuditLogger, TracingEventEmitter,
};
use crate::store::{LedgerStore, LedgerTx, StoreError};

/// Request to post one journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostJournalCommand {
    /// Journal to post.
    pub journal_id: JournalId,
    /// Acting user.
    pub actor: UserId,
    /// Makes repeated calls on a posted journal return it instead of failing.
    pub idempotency_key: Option<String>,
    /// Accept `draft` journals (legacy callers only).
    pub allow_draft: bool,
}

impl PostJournalCommand {
    /// Command posting an approved journal without an idempotency key.
    #[must_use]
    pub fn new(journal_id: JournalId, actor: UserId) -> Self {
        Self {
            journal_id,
            actor,
            idempotency_key: None,
            allow_draft: false,
        }
    }

    /// Sets the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A posted journal with the ledger rows it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostedJournal {
    /// The journal, as stored after posting.
    pub journal: Journal,
    /// Its general-ledger rows in line order.
    pub ledger_entries: Vec<GeneralLedgerEntry>,
    /// True when the journal had already been posted before this call.
    pub already_posted: bool,
}

/// Whether `post_in` must consult the permission checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Authorization {
    /// Check `accounting/journal/post` for the actor.
    Check,
    /// The caller already checked a capability covering this post.
    Delegated,
}

/// Posts journals against a [`LedgerStore`].
pub struct PostingEngine<S: LedgerStore> {
    store: Arc<S>,
    permissions: Arc<dyn PermissionChecker>,
    rates: Arc<dyn ExchangeRateResolver>,
    audit: Arc<dyn AuditLogger>,
    events: Arc<dyn EventEmitter>,
}

impl<S: LedgerStore> Clone for PostingEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            permissions: Arc::clone(&self.permissions),
            rates: Arc::clone(&self.rates),
            audit: Arc::clone(&self.audit),
            events: Arc::clone(&self.events),
        }
    }
}

impl<S: LedgerStore> PostingEngine<S> {
    /// Creates an engine logging audit entries and events through `tracing`.
    pub fn new(
        store: Arc<S>,
        permissions: Arc<dyn PermissionChecker>,
        rates: Arc<dyn ExchangeRateResolver>,
    ) -> Self {
        Self {
            store,
            permissions,
            rates,
            audit: Arc::new(TracingAuditLogger),
            events: Arc::new(TracingEventEmitter),
        }
    }

    /// Replaces the audit logger.
    #[must_use]
    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the event emitter.
    #[must_use]
    pub fn with_event_emitter(mut self, events: Arc<dyn EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) async fn is_permitted(&self, request: &PermissionRequest) -> bool {
        self.permissions.has_permission(request).await
    }

    pub(crate) fn flush(&self, outbox: Outbox) {
        outbox.flush(self.audit.as_ref(), self.events.as_ref());
    }

    /// Posts a journal in its own transaction.
    ///
    /// A journal that is already posted, whether by an earlier call or by a concurrent
    /// poster that took the row lock first, is returned with `already_posted` set. A write
    /// conflict is resolved the same way by re-reading the journal.
    ///
    /// # Errors
    ///
    /// See [`PostingError`]. Nothing is written on error.
    #[instrument(skip_all, fields(journal_id = %command.journal_id))]
    pub async fn post(&self, command: &PostJournalCommand) -> Result<PostedJournal, PostingError> {
        let journal_id = command.journal_id;
        match self.try_post(command).await {
            Err(PostingError::Conflict { source, .. }) => {
                warn!(journal_id = %journal_id, error = %source, "write conflict while posting, checking for concurrent success");
                match self.find_posted(journal_id).await {
                    Ok(Some(posted)) => {
                        warn!(journal_id = %journal_id, "journal was posted concurrently, returning it");
                        Ok(posted)
                    }
                    Ok(None) => Err(PostingError::Conflict { journal_id, source }),
                    Err(e) => {
                        error!(journal_id = %journal_id, error = %e, "recovery read failed");
                        Err(PostingError::Conflict { journal_id, source })
                    }
                }
            }
            Err(err @ PostingError::Storage { .. }) => {
                error!(journal_id = %journal_id, error = ?err, "posting failed");
                Err(err)
            }
            other => other,
        }
    }

    async fn try_post(&self, command: &PostJournalCommand) -> Result<PostedJournal, PostingError> {
        let journal_id = command.journal_id;
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| PostingError::from_store(journal_id, e))?;
        let mut outbox = Outbox::default();

        let posted = self
            .post_in(&mut tx, command, Authorization::Check, &mut outbox)
            .await?;
        if posted.already_posted {
            return Ok(posted);
        }

        tx.commit()
            .await
            .map_err(|e| PostingError::from_store(journal_id, e))?;

        info!(
            journal_id = %journal_id,
            journal_number = posted.journal.journal_number.as_deref().unwrap_or_default(),
            lines = posted.ledger_entries.len(),
            "journal posted"
        );
        self.flush(outbox);
        Ok(posted)
    }

    /// Reads a journal and returns it if it is posted.
    ///
    /// # Errors
    ///
    /// Returns the store error if the read fails.
    pub async fn find_posted(&self, journal_id: JournalId) -> Result<Option<PostedJournal>, StoreError> {
        let mut tx = self.store.begin().await?;
        let Some(journal) = tx.journal_for_update(journal_id).await? else {
            return Ok(None);
        };
        if !journal.status.is_posted() {
            return Ok(None);
        }
        let ledger_entries = tx.ledger_entries_for_journal(journal_id).await?;
        Ok(Some(PostedJournal {
            journal,
            ledger_entries,
            already_posted: true,
        }))
    }

    /// Posts a journal inside a caller-owned transaction. The caller commits.
    pub(crate) async fn post_in(
        &self,
        tx: &mut S::Tx,
        command: &PostJournalCommand,
        authorization: Authorization,
        outbox: &mut Outbox,
    ) -> Result<PostedJournal, PostingError> {
        let journal_id = command.journal_id;
        let store_err = |e| PostingError::from_store(journal_id, e);
        let invalid = |e| PostingError::validation(journal_id, e);

        let mut journal = tx
            .journal_for_update(journal_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| invalid(ValidationError::JournalNotFound))?;

        // Under the row lock a poster that lost a race sees the winner's posted journal.
        if journal.status.is_posted() {
            if command.idempotency_key.is_some() {
                debug!(journal_id = %journal_id, "journal already posted, returning existing rows");
            } else {
                warn!(journal_id = %journal_id, "journal was posted by another caller, returning it");
            }
            let ledger_entries = tx
                .ledger_entries_for_journal(journal_id)
                .await
                .map_err(store_err)?;
            return Ok(PostedJournal {
                journal,
                ledger_entries,
                already_posted: true,
            });
        }
        if !journal.status.can_post(command.allow_draft) {
            return Err(invalid(ValidationError::InvalidStatus {
                status: journal.status,
            }));
        }
        if journal.is_locked {
            return Err(invalid(ValidationError::JournalLocked));
        }

        if authorization == Authorization::Check {
            let request = PermissionRequest {
                actor: command.actor,
                organization_id: journal.organization_id,
                capability: Capability::POST_JOURNAL,
            };
            if !self.is_permitted(&request).await {
                return Err(PostingError::Permission {
                    journal_id,
                    actor: command.actor,
                    action: "post",
                });
            }
        }

        let totals = validate_lines(&journal.lines).map_err(invalid)?;

        let journal_type = tx
            .journal_type_for_update(journal.journal_type_id)
            .await
            .map_err(store_err)?
            .filter(|t| t.organization_id == journal.organization_id)
            .ok_or_else(|| invalid(ValidationError::JournalTypeNotFound(journal.journal_type_id)))?;

        let period_closed = |reason: String| PostingError::PeriodClosed {
            journal_id,
            period_id: journal.period_id,
            reason,
        };
        let period = tx
            .period(journal.period_id)
            .await
            .map_err(store_err)?
            .filter(|p| p.organization_id == journal.organization_id)
            .ok_or_else(|| period_closed("period not found".to_string()))?;
        period
            .accepts(
                journal.journal_date,
                journal.closing_type() == Some(ClosingType::YearEnd),
            )
            .map_err(period_closed)?;

        let settings = tx
            .organization_settings(journal.organization_id)
            .await
            .map_err(store_err)?;
        let rate = CurrencyService::journal_rate(
            self.rates.as_ref(),
            &journal.currency,
            &settings.base_currency,
            journal.exchange_rate,
            journal.journal_date,
        )
        .await
        .map_err(invalid)?;

        journal.lines.sort_by_key(|l| l.line_number);
        let currency = journal.currency.clone();
        CurrencyService::apply_rate(&mut journal.lines, &currency, rate);
        validate_functional_balance(&journal.lines).map_err(invalid)?;
        journal.exchange_rate = Some(rate);

        // Ascending id order keeps concurrent posters from deadlocking on accounts.
        let mut balances: BTreeMap<AccountId, Decimal> = BTreeMap::new();
        for account_id in journal.lines.iter().map(|l| l.account_id) {
            balances.entry(account_id).or_insert(Decimal::ZERO);
        }
        for (account_id, balance) in &mut balances {
            let account = tx
                .account_for_update(*account_id)
                .await
                .map_err(store_err)?
                .filter(|a| a.organization_id == journal.organization_id)
                .ok_or_else(|| invalid(ValidationError::AccountNotFound(*account_id)))?;
            if !account.is_active {
                return Err(invalid(ValidationError::AccountInactive(*account_id)));
            }
            *balance = account.current_balance;
        }

        if journal.journal_number.is_none() {
            let sequence = tx
                .next_sequence_value(journal_type.id, sequence_scope(&journal_type, &period))
                .await
                .map_err(store_err)?;
            journal.journal_number = Some(format_journal_number(&journal_type, sequence));
        }

        let now = Utc::now();
        journal.status = JournalStatus::Posted;
        journal.is_locked = true;
        journal.posted_by = Some(command.actor);
        journal.posted_at = Some(now);
        journal.updated_by = command.actor;
        journal.updated_at = now;
        if command.idempotency_key.is_some() {
            journal.idempotency_key.clone_from(&command.idempotency_key);
        }
        tx.update_journal(&journal).await.map_err(store_err)?;

        let closing_type = journal.closing_type();
        let mut ledger_entries = Vec::with_capacity(journal.lines.len());
        for line in &journal.lines {
            let Some(balance) = balances.get_mut(&line.account_id) else {
                return Err(invalid(ValidationError::AccountNotFound(line.account_id)));
            };
            *balance =
                RunningBalance::apply(*balance, line.functional_debit, line.functional_credit)
                    .current_balance;
            let entry = GeneralLedgerEntry {
                id: LedgerEntryId::new(),
                organization_id: journal.organization_id,
                account_id: line.account_id,
                journal_id,
                journal_line_id: line.id,
                period_id: journal.period_id,
                transaction_date: journal.journal_date,
                debit: line.debit,
                credit: line.credit,
                functional_debit: line.functional_debit,
                functional_credit: line.functional_credit,
                balance_after: *balance,
                currency: line.currency.clone(),
                exchange_rate: line.exchange_rate,
                dimensions: line.dimensions.clone(),
                closing_type,
                created_at: now,
                sequence: 0,
            };
            ledger_entries.push(tx.append_ledger_entry(entry).await.map_err(store_err)?);
        }
        for (account_id, balance) in &balances {
            tx.update_account_balance(*account_id, *balance)
                .await
                .map_err(store_err)?;
        }

        let journal_number = journal.journal_number.clone().unwrap_or_default();
        outbox.audit(AuditEntry {
            actor: command.actor,
            organization_id: journal.organization_id,
            subject_type: "journal",
            subject_id: journal_id.into_inner(),
            action: "posted",
            details: json!({
                "journal_number": journal_number,
                "period_id": journal.period_id,
                "total": totals.debit.to_string(),
                "currency": journal.currency,
                "exchange_rate": rate.to_string(),
            }),
            recorded_at: now,
        });
        outbox.event(DomainEvent {
            name: "journal_posted",
            organization_id: journal.organization_id,
            subject_id: journal_id.into_inner(),
            payload: json!({
                "journal_number": journal_number,
                "period_id": journal.period_id,
                "journal_date": journal.journal_date,
                "closing_type": closing_type.map(ClosingType::as_str),
            }),
        });

        Ok(PostedJournal {
            journal,
            ledger_entries,
            already_posted: false,
        })
    }
}
