//! Fiscal year closing engine.
//!
//! `close` runs as one unit of work with the fiscal-year row locked: the closing journal,
//! the opening journal of the next year, the period closes and the state change either all
//! commit or none do. Generated journals go through the posting engine's in-transaction
//! path, so they get numbers, ledger rows and balance updates like any other journal.

use chrono::{NaiveDate, Utc};
use corebook_shared::types::{FiscalYearId, JournalTypeId, OrganizationId, PeriodId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::closing::{PlannedLine, ResultNature, plan_closing, plan_opening};
use super::error::ClosingError;
use super::period::{AccountingPeriod, FiscalYear, FiscalYearStatus, PeriodStatus};
use crate::ledger::{
    AccountNature, ClosingType, Journal, JournalStatus, OrganizationSettings, metadata,
};
use crate::ports::{AuditEntry, Capability, DomainEvent, Outbox, PermissionRequest};
use crate::posting::{Authorization, PostJournalCommand, PostedJournal, PostingEngine};
use crate::store::{LedgerStore, LedgerTotalsQuery, LedgerTx};

/// Request to close a fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseFiscalYearCommand {
    /// Fiscal year to close.
    pub fiscal_year_id: FiscalYearId,
    /// Acting user.
    pub actor: UserId,
    /// Close still-open periods instead of refusing.
    pub auto_close_open_periods: bool,
}

/// Request to reopen a closed fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenFiscalYearCommand {
    /// Fiscal year to reopen.
    pub fiscal_year_id: FiscalYearId,
    /// Acting user.
    pub actor: UserId,
    /// Recorded in the audit trail.
    pub reason: Option<String>,
}

/// Request to close one accounting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePeriodCommand {
    /// Period to close.
    pub period_id: PeriodId,
    /// Acting user.
    pub actor: UserId,
}

/// Outcome of a fiscal year close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosingResult {
    /// The fiscal year as stored after closing.
    pub fiscal_year: FiscalYear,
    /// Closing journal, `None` when no income/expense account carried a balance.
    pub closing_journal: Option<PostedJournal>,
    /// Opening journal in the next year, when rollover applied.
    pub opening_journal: Option<PostedJournal>,
    /// Debit-positive net result (negative = profit).
    pub net_result: Decimal,
    /// Nature of `net_result`.
    pub result_nature: ResultNature,
    /// Periods closed by this call.
    pub closed_periods: Vec<PeriodId>,
    /// Fiscal year promoted to current, if any.
    pub promoted_fiscal_year: Option<FiscalYearId>,
}

/// Closes and reopens fiscal years through a [`PostingEngine`].
pub struct FiscalYearCloser<S: LedgerStore> {
    engine: PostingEngine<S>,
}

impl<S: LedgerStore> FiscalYearCloser<S> {
    /// Creates a closer sharing the engine's store and collaborators.
    pub fn new(engine: PostingEngine<S>) -> Self {
        Self { engine }
    }

    async fn authorize(
        &self,
        actor: UserId,
        organization_id: OrganizationId,
        fiscal_year_id: FiscalYearId,
        capability: Capability,
    ) -> Result<(), ClosingError> {
        let request = PermissionRequest {
            actor,
            organization_id,
            capability,
        };
        if self.engine.is_permitted(&request).await {
            Ok(())
        } else {
            Err(ClosingError::Permission {
                fiscal_year_id,
                actor,
                capability,
            })
        }
    }

    /// Closes a fiscal year.
    ///
    /// # Errors
    ///
    /// `Permission` without `accounting/fiscalyear/close_fiscalyear`, `Validation` when the
    /// year is already closed or has open periods, `YearEndClosing` when closing settings are
    /// missing, `Posting` when a generated journal fails to post. Nothing is committed on
    /// error.
    #[instrument(skip_all, fields(fiscal_year_id = %command.fiscal_year_id))]
    pub async fn close(
        &self,
        command: &CloseFiscalYearCommand,
    ) -> Result<ClosingResult, ClosingError> {
        let fiscal_year_id = command.fiscal_year_id;
        let mut tx = self
            .engine
            .store()
            .begin()
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        let mut outbox = Outbox::default();

        let mut fiscal_year = tx
            .fiscal_year_for_update(fiscal_year_id)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?
            .ok_or(ClosingError::NotFound {
                entity: "fiscal year",
                id: fiscal_year_id.into_inner(),
            })?;
        let organization_id = fiscal_year.organization_id;

        self.authorize(
            command.actor,
            organization_id,
            fiscal_year_id,
            Capability::CLOSE_FISCAL_YEAR,
        )
        .await?;

        if fiscal_year.is_closed() {
            return Err(ClosingError::validation(
                fiscal_year_id,
                format!("fiscal year '{}' is already closed", fiscal_year.name),
            ));
        }

        let periods = tx
            .periods_of(fiscal_year_id)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        let open_periods: Vec<&AccountingPeriod> = periods.iter().filter(|p| p.is_open()).collect();
        if !open_periods.is_empty() && !command.auto_close_open_periods {
            let names: Vec<&str> = open_periods.iter().map(|p| p.name.as_str()).collect();
            return Err(ClosingError::validation(
                fiscal_year_id,
                format!("periods still open: {}", names.join(", ")),
            ));
        }

        let settings = tx
            .organization_settings(organization_id)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;

        let (closing_journal, net_result) = self
            .closing_journal(
                &mut tx,
                &fiscal_year,
                &periods,
                &settings,
                command.actor,
                &mut outbox,
            )
            .await?;

        let next_year = tx
            .next_fiscal_year(&fiscal_year)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        let opening_journal = match &next_year {
            Some(next) if settings.auto_rollover_closing => {
                self.opening_journal(
                    &mut tx,
                    &fiscal_year,
                    next,
                    &settings,
                    command.actor,
                    &mut outbox,
                )
                .await?
            }
            _ => None,
        };

        let now = Utc::now();
        let mut closed_periods = Vec::with_capacity(open_periods.len());
        for period_id in open_periods.iter().map(|p| p.id) {
            let mut period = tx
                .period(period_id)
                .await
                .map_err(ClosingError::storage(fiscal_year_id))?
                .ok_or(ClosingError::NotFound {
                    entity: "period",
                    id: period_id.into_inner(),
                })?;
            if !period.is_open() {
                return Err(ClosingError::validation(
                    fiscal_year_id,
                    format!("period '{}' is no longer open", period.name),
                ));
            }
            period.status = PeriodStatus::Closed;
            period.closed_at = Some(now);
            period.closed_by = Some(command.actor);
            tx.update_period(&period)
                .await
                .map_err(ClosingError::storage(fiscal_year_id))?;
            outbox.audit(AuditEntry {
                actor: command.actor,
                organization_id,
                subject_type: "period",
                subject_id: period_id.into_inner(),
                action: "closed",
                details: json!({ "fiscal_year_id": fiscal_year_id, "auto_closed": true }),
                recorded_at: now,
            });
            closed_periods.push(period_id);
        }

        let was_current = fiscal_year.is_current;
        fiscal_year.status = FiscalYearStatus::Closed;
        fiscal_year.closed_at = Some(now);
        fiscal_year.closed_by = Some(command.actor);
        fiscal_year.is_current = false;
        fiscal_year.closing_journal_id = closing_journal.as_ref().map(|p| p.journal.id);
        fiscal_year.opening_journal_id = opening_journal.as_ref().map(|p| p.journal.id);
        fiscal_year.net_result = Some(net_result);
        tx.update_fiscal_year(&fiscal_year)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;

        let mut promoted_fiscal_year = None;
        if was_current {
            let mut candidate = next_year;
            while let Some(next) = candidate {
                if !next.is_closed() {
                    let mut next = tx
                        .fiscal_year_for_update(next.id)
                        .await
                        .map_err(ClosingError::storage(fiscal_year_id))?
                        .ok_or(ClosingError::NotFound {
                            entity: "fiscal year",
                            id: next.id.into_inner(),
                        })?;
                    next.is_current = true;
                    tx.update_fiscal_year(&next)
                        .await
                        .map_err(ClosingError::storage(fiscal_year_id))?;
                    outbox.audit(AuditEntry {
                        actor: command.actor,
                        organization_id,
                        subject_type: "fiscal_year",
                        subject_id: next.id.into_inner(),
                        action: "promoted_current",
                        details: json!({ "previous_fiscal_year_id": fiscal_year_id }),
                        recorded_at: now,
                    });
                    promoted_fiscal_year = Some(next.id);
                    break;
                }
                candidate = tx
                    .next_fiscal_year(&next)
                    .await
                    .map_err(ClosingError::storage(fiscal_year_id))?;
            }
        }

        let result_nature = ResultNature::from_net_result(net_result);
        outbox.audit(AuditEntry {
            actor: command.actor,
            organization_id,
            subject_type: "fiscal_year",
            subject_id: fiscal_year_id.into_inner(),
            action: "closed",
            details: json!({
                "net_result": net_result.to_string(),
                "result_nature": result_nature.as_str(),
                "closing_journal_id": fiscal_year.closing_journal_id,
                "opening_journal_id": fiscal_year.opening_journal_id,
                "closed_periods": closed_periods,
            }),
            recorded_at: now,
        });
        outbox.event(DomainEvent {
            name: "fiscal_year_closed",
            organization_id,
            subject_id: fiscal_year_id.into_inner(),
            payload: json!({
                "net_result": net_result.to_string(),
                "result_nature": result_nature.as_str(),
                "promoted_fiscal_year_id": promoted_fiscal_year,
            }),
        });

        tx.commit()
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        info!(
            fiscal_year_id = %fiscal_year_id,
            net_result = %net_result,
            result_nature = result_nature.as_str(),
            closed_periods = closed_periods.len(),
            "fiscal year closed"
        );
        self.engine.flush(outbox);

        Ok(ClosingResult {
            fiscal_year,
            closing_journal,
            opening_journal,
            net_result,
            result_nature,
            closed_periods,
            promoted_fiscal_year,
        })
    }

    /// Finds or generates the year-end closing journal. Returns it with the net result.
    async fn closing_journal(
        &self,
        tx: &mut S::Tx,
        fiscal_year: &FiscalYear,
        periods: &[AccountingPeriod],
        settings: &OrganizationSettings,
        actor: UserId,
        outbox: &mut Outbox,
    ) -> Result<(Option<PostedJournal>, Decimal), ClosingError> {
        let fiscal_year_id = fiscal_year.id;

        if let Some(existing) = tx
            .find_tagged_journal(fiscal_year.organization_id, ClosingType::YearEnd, fiscal_year_id)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?
        {
            debug!(journal_id = %existing.id, "reusing existing closing journal");
            let net_result = existing
                .metadata
                .get(metadata::NET_RESULT)
                .and_then(serde_json::Value::as_str)
                .and_then(|v| v.parse::<Decimal>().ok())
                .or(fiscal_year.net_result)
                .ok_or_else(|| {
                    ClosingError::year_end(
                        fiscal_year_id,
                        format!("closing journal {} records no net result", existing.id),
                    )
                })?;
            let ledger_entries = tx
                .ledger_entries_for_journal(existing.id)
                .await
                .map_err(ClosingError::storage(fiscal_year_id))?;
            return Ok((
                Some(PostedJournal {
                    journal: existing,
                    ledger_entries,
                    already_posted: true,
                }),
                net_result,
            ));
        }

        let totals = tx
            .account_totals(&LedgerTotalsQuery {
                organization_id: fiscal_year.organization_id,
                natures: AccountNature::PROFIT_AND_LOSS.to_vec(),
                date_from: Some(fiscal_year.start_date),
                date_to: fiscal_year.end_date,
                exclude_closing_types: vec![ClosingType::YearEnd, ClosingType::YearOpening],
            })
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        let plan = plan_closing(&totals, settings.retained_earnings_account_id)
            .map_err(|e| ClosingError::year_end(fiscal_year_id, e.to_string()))?;
        if plan.lines.is_empty() {
            return Ok((None, plan.net_result));
        }

        let journal_type_id = closing_journal_type(settings, fiscal_year_id)?;
        let adjustment_period = periods
            .iter()
            .find(|p| p.status == PeriodStatus::Adjustment && p.contains_date(fiscal_year.end_date))
            .ok_or_else(|| {
                ClosingError::year_end(
                    fiscal_year_id,
                    format!(
                        "fiscal year '{}' has no adjustment period covering {}",
                        fiscal_year.name, fiscal_year.end_date
                    ),
                )
            })?;

        let header = GeneratedHeader {
            journal_type_id,
            period_id: adjustment_period.id,
            journal_date: fiscal_year.end_date,
            description: format!("Year-end closing {}", fiscal_year.name),
        };
        let mut journal = generated_journal(fiscal_year, header, settings, actor, &plan.lines);
        journal.tag(metadata::CLOSING_TYPE, ClosingType::YearEnd.as_str());
        journal.tag(metadata::FISCAL_YEAR_ID, fiscal_year_id.to_string());
        journal.tag(metadata::NET_RESULT, plan.net_result.to_string());
        journal.tag(metadata::RESULT_NATURE, plan.result_nature.as_str());

        let key = format!("year-end-{fiscal_year_id}");
        let posted = self
            .post_generated(tx, &journal, key, fiscal_year_id, "closing", outbox)
            .await?;
        Ok((Some(posted), plan.net_result))
    }

    /// Finds or generates the opening journal carrying balances into `next`.
    async fn opening_journal(
        &self,
        tx: &mut S::Tx,
        fiscal_year: &FiscalYear,
        next: &FiscalYear,
        settings: &OrganizationSettings,
        actor: UserId,
        outbox: &mut Outbox,
    ) -> Result<Option<PostedJournal>, ClosingError> {
        let fiscal_year_id = fiscal_year.id;

        if let Some(existing) = tx
            .find_tagged_journal(fiscal_year.organization_id, ClosingType::YearOpening, fiscal_year_id)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?
        {
            debug!(journal_id = %existing.id, "reusing existing opening journal");
            let ledger_entries = tx
                .ledger_entries_for_journal(existing.id)
                .await
                .map_err(ClosingError::storage(fiscal_year_id))?;
            return Ok(Some(PostedJournal {
                journal: existing,
                ledger_entries,
                already_posted: true,
            }));
        }

        // Prior openings restate history already in the ledger; counting them would double it.
        let totals = tx
            .account_totals(&LedgerTotalsQuery {
                organization_id: fiscal_year.organization_id,
                natures: AccountNature::BALANCE_SHEET.to_vec(),
                date_from: None,
                date_to: fiscal_year.end_date,
                exclude_closing_types: vec![ClosingType::YearOpening],
            })
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        let plan = plan_opening(&totals, settings.rollover_adjustment_account_id)
            .map_err(|e| ClosingError::year_end(fiscal_year_id, e.to_string()))?;
        if plan.lines.is_empty() {
            return Ok(None);
        }

        let journal_type_id = closing_journal_type(settings, fiscal_year_id)?;
        let first_period = tx
            .periods_of(next.id)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ClosingError::year_end(
                    fiscal_year_id,
                    format!("next fiscal year '{}' has no periods", next.name),
                )
            })?;

        let header = GeneratedHeader {
            journal_type_id,
            period_id: first_period.id,
            journal_date: next.start_date,
            description: format!("Opening balances {} from {}", next.name, fiscal_year.name),
        };
        let mut journal = generated_journal(fiscal_year, header, settings, actor, &plan.lines);
        journal.tag(metadata::CLOSING_TYPE, ClosingType::YearOpening.as_str());
        journal.tag(metadata::FISCAL_YEAR_ID, fiscal_year_id.to_string());
        journal.tag(metadata::TARGET_FISCAL_YEAR_ID, next.id.to_string());
        if !plan.residue.is_zero() {
            debug!(residue = %plan.residue, "sweeping opening residue to the adjustment account");
        }

        let key = format!("year-opening-{fiscal_year_id}");
        let posted = self
            .post_generated(tx, &journal, key, fiscal_year_id, "opening", outbox)
            .await?;
        Ok(Some(posted))
    }

    async fn post_generated(
        &self,
        tx: &mut S::Tx,
        journal: &Journal,
        idempotency_key: String,
        fiscal_year_id: FiscalYearId,
        stage: &'static str,
        outbox: &mut Outbox,
    ) -> Result<PostedJournal, ClosingError> {
        tx.insert_journal(journal)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        let command =
            PostJournalCommand::new(journal.id, journal.created_by).with_idempotency_key(idempotency_key);
        self.engine
            .post_in(tx, &command, Authorization::Delegated, outbox)
            .await
            .map_err(|source| ClosingError::Posting {
                fiscal_year_id,
                stage,
                source,
            })
    }

    /// Reopens a closed fiscal year and clears its closing metadata.
    ///
    /// Journals posted by the close stay posted; closing again reuses them.
    ///
    /// # Errors
    ///
    /// `Permission` without `accounting/fiscalyear/reopen_fiscalyear`, `Validation` when the
    /// year is not closed.
    #[instrument(skip_all, fields(fiscal_year_id = %command.fiscal_year_id))]
    pub async fn reopen(
        &self,
        command: &ReopenFiscalYearCommand,
    ) -> Result<FiscalYear, ClosingError> {
        let fiscal_year_id = command.fiscal_year_id;
        let mut tx = self
            .engine
            .store()
            .begin()
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        let mut outbox = Outbox::default();

        let mut fiscal_year = tx
            .fiscal_year_for_update(fiscal_year_id)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?
            .ok_or(ClosingError::NotFound {
                entity: "fiscal year",
                id: fiscal_year_id.into_inner(),
            })?;

        self.authorize(
            command.actor,
            fiscal_year.organization_id,
            fiscal_year_id,
            Capability::REOPEN_FISCAL_YEAR,
        )
        .await?;

        if !fiscal_year.is_closed() {
            return Err(ClosingError::validation(
                fiscal_year_id,
                format!("fiscal year '{}' is not closed", fiscal_year.name),
            ));
        }

        let details = json!({
            "reason": command.reason,
            "closing_journal_id": fiscal_year.closing_journal_id,
            "opening_journal_id": fiscal_year.opening_journal_id,
            "net_result": fiscal_year.net_result.map(|n| n.to_string()),
        });
        fiscal_year.status = FiscalYearStatus::Open;
        fiscal_year.clear_closing_metadata();
        tx.update_fiscal_year(&fiscal_year)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;

        outbox.audit(AuditEntry {
            actor: command.actor,
            organization_id: fiscal_year.organization_id,
            subject_type: "fiscal_year",
            subject_id: fiscal_year_id.into_inner(),
            action: "reopened",
            details,
            recorded_at: Utc::now(),
        });

        tx.commit()
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        info!(fiscal_year_id = %fiscal_year_id, "fiscal year reopened");
        self.engine.flush(outbox);
        Ok(fiscal_year)
    }

    /// Closes a single open period.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown period, `Permission` without `accounting/period/close`,
    /// `Validation` when the period is not open.
    #[instrument(skip_all, fields(period_id = %command.period_id))]
    pub async fn close_period(
        &self,
        command: &ClosePeriodCommand,
    ) -> Result<AccountingPeriod, ClosingError> {
        let period_id = command.period_id;
        let not_found = ClosingError::NotFound {
            entity: "period",
            id: period_id.into_inner(),
        };
        // The owning year is unknown until the period has been read.
        let unscoped = |source| ClosingError::Storage {
            fiscal_year_id: FiscalYearId::from_uuid(Uuid::nil()),
            source,
        };
        let mut tx = self.engine.store().begin().await.map_err(unscoped)?;
        let Some(mut period) = tx.period(period_id).await.map_err(unscoped)? else {
            return Err(not_found);
        };
        let fiscal_year_id = period.fiscal_year_id;

        // Serializes with a concurrent close of the owning year.
        tx.fiscal_year_for_update(fiscal_year_id)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;

        self.authorize(
            command.actor,
            period.organization_id,
            fiscal_year_id,
            Capability::CLOSE_PERIOD,
        )
        .await?;

        if !period.is_open() {
            return Err(ClosingError::validation(
                fiscal_year_id,
                format!("period '{}' is not open", period.name),
            ));
        }

        let now = Utc::now();
        period.status = PeriodStatus::Closed;
        period.closed_at = Some(now);
        period.closed_by = Some(command.actor);
        tx.update_period(&period)
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;

        let mut outbox = Outbox::default();
        outbox.audit(AuditEntry {
            actor: command.actor,
            organization_id: period.organization_id,
            subject_type: "period",
            subject_id: period_id.into_inner(),
            action: "closed",
            details: json!({ "fiscal_year_id": fiscal_year_id, "auto_closed": false }),
            recorded_at: now,
        });

        tx.commit()
            .await
            .map_err(ClosingError::storage(fiscal_year_id))?;
        info!(period_id = %period_id, fiscal_year_id = %fiscal_year_id, "period closed");
        self.engine.flush(outbox);
        Ok(period)
    }
}

fn closing_journal_type(
    settings: &OrganizationSettings,
    fiscal_year_id: FiscalYearId,
) -> Result<JournalTypeId, ClosingError> {
    settings.closing_journal_type_id.ok_or_else(|| {
        ClosingError::year_end(fiscal_year_id, "closing journal type is not configured")
    })
}

/// Header of a journal generated by the close.
struct GeneratedHeader {
    journal_type_id: JournalTypeId,
    period_id: PeriodId,
    journal_date: NaiveDate,
    description: String,
}

fn generated_journal(
    fiscal_year: &FiscalYear,
    header: GeneratedHeader,
    settings: &OrganizationSettings,
    actor: UserId,
    lines: &[PlannedLine],
) -> Journal {
    let mut journal = Journal::draft(
        fiscal_year.organization_id,
        header.journal_type_id,
        header.period_id,
        header.journal_date,
        header.description,
        &settings.base_currency,
        actor,
    );
    journal.status = JournalStatus::Approved;
    journal.exchange_rate = Some(Decimal::ONE);
    for line in lines {
        if line.debit > Decimal::ZERO {
            journal.push_debit(line.account_id, line.debit);
        } else {
            journal.push_credit(line.account_id, line.credit);
        }
    }
    journal
}
