//! Reversal of posted journals.
//!
//! A reversal is a new journal with debits and credits swapped, posted at the original
//! rate, after which the original is flagged `reversed`. Both happen in one transaction.

use chrono::{NaiveDate, Utc};
use corebook_shared::types::{JournalId, JournalLineId, PeriodId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use super::engine::{Authorization, PostJournalCommand, PostedJournal, PostingEngine};
use crate::ledger::{Journal, JournalLine, JournalStatus, PostingError, ValidationError, metadata};
use crate::ports::{AuditEntry, Capability, Outbox, PermissionRequest};
use crate::store::{LedgerStore, LedgerTx};

/// Request to reverse a posted journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseJournalCommand {
    /// Journal to reverse.
    pub journal_id: JournalId,
    /// Acting user.
    pub actor: UserId,
    /// Why the journal is reversed (required).
    pub reason: String,
    /// Date of the reversal; defaults to the original date.
    pub reversal_date: Option<NaiveDate>,
    /// Period of the reversal; defaults to the original period.
    pub period_id: Option<PeriodId>,
}

/// Outcome of a reversal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReversedJournal {
    /// The original journal, now `reversed`.
    pub original: Journal,
    /// The posted reversing journal.
    pub reversal: PostedJournal,
}

/// Builds the reversing journal for `original`: sides swapped, same rate and dimensions.
#[must_use]
pub fn build_reversal(original: &Journal, command: &ReverseJournalCommand) -> Journal {
    let mut reversal = Journal::draft(
        original.organization_id,
        original.journal_type_id,
        command.period_id.unwrap_or(original.period_id),
        command.reversal_date.unwrap_or(original.journal_date),
        format!(
            "Reversal of {}. Reason: {}",
            original.journal_number.as_deref().unwrap_or("journal"),
            command.reason
        ),
        &original.currency,
        command.actor,
    );
    reversal.reference.clone_from(&original.reference);
    reversal.exchange_rate = original.exchange_rate;
    reversal.status = JournalStatus::Approved;
    reversal.reverses_journal_id = Some(original.id);
    reversal.tag(metadata::REVERSES_JOURNAL_ID, original.id.to_string());
    reversal.tag(metadata::REVERSAL_REASON, command.reason.clone());

    let reversal_id = reversal.id;
    reversal.lines = original
        .lines
        .iter()
        .map(|line| JournalLine {
            id: JournalLineId::new(),
            journal_id: reversal_id,
            debit: line.credit,
            credit: line.debit,
            description: Some(format!(
                "Reversal: {}",
                line.description.as_deref().unwrap_or_default()
            )),
            ..line.clone()
        })
        .collect();
    reversal
}

impl<S: LedgerStore> PostingEngine<S> {
    /// Reverses a posted journal.
    ///
    /// # Errors
    ///
    /// `Validation` when the journal is not posted or no reason is given, `Permission`
    /// without `accounting/journal/reverse`, and any error posting the reversal.
    #[instrument(skip_all, fields(journal_id = %command.journal_id))]
    pub async fn reverse(
        &self,
        command: &ReverseJournalCommand,
    ) -> Result<ReversedJournal, PostingError> {
        let journal_id = command.journal_id;
        let store_err = |e| PostingError::from_store(journal_id, e);
        let invalid = |e| PostingError::validation(journal_id, e);

        if command.reason.trim().is_empty() {
            return Err(invalid(ValidationError::MissingField("reason")));
        }

        let mut tx = self.store().begin().await.map_err(store_err)?;
        let mut outbox = Outbox::default();

        let mut original = tx
            .journal_for_update(journal_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| invalid(ValidationError::JournalNotFound))?;
        if original.status != JournalStatus::Posted {
            return Err(invalid(ValidationError::NotReversible {
                status: original.status,
            }));
        }

        let request = PermissionRequest {
            actor: command.actor,
            organization_id: original.organization_id,
            capability: Capability::REVERSE_JOURNAL,
        };
        if !self.is_permitted(&request).await {
            return Err(PostingError::Permission {
                journal_id,
                actor: command.actor,
                action: "reverse",
            });
        }

        let reversal = build_reversal(&original, command);
        tx.insert_journal(&reversal).await.map_err(store_err)?;
        let posted = self
            .post_in(
                &mut tx,
                &PostJournalCommand::new(reversal.id, command.actor),
                Authorization::Delegated,
                &mut outbox,
            )
            .await?;

        let now = Utc::now();
        original.status = JournalStatus::Reversed;
        original.updated_by = command.actor;
        original.updated_at = now;
        tx.update_journal(&original).await.map_err(store_err)?;

        outbox.audit(AuditEntry {
            actor: command.actor,
            organization_id: original.organization_id,
            subject_type: "journal",
            subject_id: journal_id.into_inner(),
            action: "reversed",
            details: json!({
                "reversal_journal_id": posted.journal.id,
                "reason": command.reason,
            }),
            recorded_at: now,
        });

        tx.commit().await.map_err(store_err)?;
        info!(
            journal_id = %journal_id,
            reversal_journal_id = %posted.journal.id,
            "journal reversed"
        );
        self.flush(outbox);

        Ok(ReversedJournal {
            original,
            reversal: posted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebook_shared::types::{AccountId, JournalTypeId, OrganizationId};
    use rust_decimal_macros::dec;

    #[test]
    fn test_build_reversal_swaps_sides() {
        let mut original = Journal::draft(
            OrganizationId::new(),
            JournalTypeId::new(),
            PeriodId::new(),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            "Sale",
            "USD",
            UserId::new(),
        );
        let cash = AccountId::new();
        let revenue = AccountId::new();
        original.push_debit(cash, dec!(100));
        original.push_credit(revenue, dec!(100));
        original.status = JournalStatus::Posted;
        original.journal_number = Some("JN-0001".to_string());

        let command = ReverseJournalCommand {
            journal_id: original.id,
            actor: UserId::new(),
            reason: "Duplicate".to_string(),
            reversal_date: None,
            period_id: None,
        };
        let reversal = build_reversal(&original, &command);

        assert_eq!(reversal.status, JournalStatus::Approved);
        assert_eq!(reversal.reverses_journal_id, Some(original.id));
        assert_eq!(reversal.description, "Reversal of JN-0001. Reason: Duplicate");
        assert_eq!(reversal.lines[0].account_id, cash);
        assert_eq!(reversal.lines[0].credit, dec!(100));
        assert_eq!(reversal.lines[1].debit, dec!(100));
        assert!(reversal.lines.iter().all(|l| l.journal_id == reversal.id));
        assert_eq!(reversal.total_debit(), reversal.total_credit());
    }
}
