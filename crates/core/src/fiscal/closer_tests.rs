//! Fiscal year closer tests against the in-memory store.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::ledger::{ClosingType, Journal, JournalStatus, metadata};
use crate::ports::Capability;
use crate::posting::PostJournalCommand;
use crate::store::MemoryLedgerStore;
use crate::test_support::{Fixture, allow_only, date, deny_all};

async fn post(fixture: &Fixture, journal: Journal) {
    let id = fixture.insert(journal).await;
    fixture
        .engine()
        .post(&PostJournalCommand::new(id, fixture.actor))
        .await
        .unwrap();
}

/// Revenue 500 and expense 200 in FY2026.
async fn profitable_year(fixture: &Fixture) {
    post(fixture, fixture.sale_on(date(2026, 3, 10), dec!(500))).await;
    post(fixture, fixture.expense_on(date(2026, 4, 15), dec!(200))).await;
}

fn closer(fixture: &Fixture) -> FiscalYearCloser<MemoryLedgerStore> {
    FiscalYearCloser::new(fixture.engine())
}

fn close_2026(fixture: &Fixture) -> CloseFiscalYearCommand {
    CloseFiscalYearCommand {
        fiscal_year_id: fixture.fy2026.id,
        actor: fixture.actor,
        auto_close_open_periods: true,
    }
}

fn line_amounts(journal: &Journal, account_id: corebook_shared::types::AccountId) -> (Decimal, Decimal) {
    journal
        .lines
        .iter()
        .filter(|l| l.account_id == account_id)
        .fold((Decimal::ZERO, Decimal::ZERO), |(d, c), l| (d + l.debit, c + l.credit))
}

#[tokio::test]
async fn test_close_transfers_profit_to_retained_earnings() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;

    let result = closer(&fixture).close(&close_2026(&fixture)).await.unwrap();

    assert_eq!(result.net_result, dec!(-300));
    assert_eq!(result.result_nature, ResultNature::Profit);

    let closing = result.closing_journal.unwrap();
    let journal = &closing.journal;
    assert_eq!(journal.status, JournalStatus::Posted);
    assert_eq!(journal.period_id, fixture.fy2026.adjustment);
    assert_eq!(journal.journal_date, date(2026, 12, 31));
    assert_eq!(journal.journal_type_id, fixture.closing_journal_type);
    assert_eq!(journal.journal_number.as_deref(), Some("CL-0001"));
    assert!(journal.is_tagged(ClosingType::YearEnd, fixture.fy2026.id));
    let recorded: Decimal = journal.metadata[metadata::NET_RESULT]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(recorded, dec!(-300));
    assert_eq!(journal.metadata[metadata::RESULT_NATURE], "profit");
    assert_eq!(line_amounts(journal, fixture.accounts.revenue), (dec!(500), dec!(0)));
    assert_eq!(line_amounts(journal, fixture.accounts.expense), (dec!(0), dec!(200)));
    assert_eq!(
        line_amounts(journal, fixture.accounts.retained_earnings),
        (dec!(0), dec!(300))
    );
    assert!(closing
        .ledger_entries
        .iter()
        .all(|e| e.closing_type == Some(ClosingType::YearEnd)));

    assert_eq!(fixture.balance(fixture.accounts.revenue).await, Decimal::ZERO);
    assert_eq!(fixture.balance(fixture.accounts.expense).await, Decimal::ZERO);
    let retained_row = closing
        .ledger_entries
        .iter()
        .find(|e| e.account_id == fixture.accounts.retained_earnings)
        .unwrap();
    assert_eq!(retained_row.balance_after, dec!(-300));
}

#[tokio::test]
async fn test_close_marks_year_closed_and_promotes_next() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;

    let result = closer(&fixture).close(&close_2026(&fixture)).await.unwrap();

    assert_eq!(result.closed_periods, fixture.fy2026.months);
    assert_eq!(result.promoted_fiscal_year, Some(fixture.fy2027.id));

    let state = fixture.store.snapshot().await;
    let closed = state.fiscal_year(fixture.fy2026.id).unwrap();
    assert!(closed.is_closed());
    assert!(!closed.is_current);
    assert_eq!(closed.closed_by, Some(fixture.actor));
    assert_eq!(closed.net_result, Some(dec!(-300)));
    assert_eq!(
        closed.closing_journal_id,
        result.closing_journal.as_ref().map(|p| p.journal.id)
    );
    assert!(state.fiscal_year(fixture.fy2027.id).unwrap().is_current);
    assert!(fixture
        .fy2026
        .months
        .iter()
        .all(|id| state.period(*id).unwrap().status == PeriodStatus::Closed));
    assert_eq!(
        state.period(fixture.fy2026.adjustment).unwrap().status,
        PeriodStatus::Adjustment
    );

    let actions = fixture.audit.actions();
    assert!(actions.contains(&("fiscal_year", "closed")));
    assert!(actions.contains(&("fiscal_year", "promoted_current")));
    assert_eq!(actions.iter().filter(|a| **a == ("period", "closed")).count(), 12);
    assert!(fixture.events.names().contains(&"fiscal_year_closed"));
}

#[tokio::test]
async fn test_close_generates_opening_balances_in_next_year() {
    let fixture = Fixture::new();
    post(&fixture, {
        let mut capital = fixture.journal(date(2026, 1, 2), "Capital injection");
        capital.push_debit(fixture.accounts.cash, dec!(1000));
        capital.push_credit(fixture.accounts.capital, dec!(1000));
        capital
    })
    .await;
    profitable_year(&fixture).await;

    let result = closer(&fixture).close(&close_2026(&fixture)).await.unwrap();

    let opening = result.opening_journal.unwrap();
    let journal = &opening.journal;
    assert_eq!(journal.period_id, fixture.fy2027.month(1));
    assert_eq!(journal.journal_date, date(2027, 1, 1));
    assert!(journal.is_tagged(ClosingType::YearOpening, fixture.fy2026.id));
    assert_eq!(
        journal.metadata[metadata::TARGET_FISCAL_YEAR_ID],
        fixture.fy2027.id.to_string()
    );
    assert_eq!(line_amounts(journal, fixture.accounts.cash), (dec!(1300), dec!(0)));
    assert_eq!(line_amounts(journal, fixture.accounts.capital), (dec!(0), dec!(1000)));
    assert_eq!(
        line_amounts(journal, fixture.accounts.retained_earnings),
        (dec!(0), dec!(300))
    );
    assert_eq!(line_amounts(journal, fixture.accounts.revenue), (dec!(0), dec!(0)));
    assert_eq!(line_amounts(journal, fixture.accounts.rollover_adjustment), (dec!(0), dec!(0)));
    assert!(opening
        .ledger_entries
        .iter()
        .all(|e| e.closing_type == Some(ClosingType::YearOpening)));
}

#[tokio::test]
async fn test_next_year_close_ignores_prior_closing_rows() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    closer(&fixture).close(&close_2026(&fixture)).await.unwrap();
    post(&fixture, fixture.sale_on(date(2027, 2, 1), dec!(50))).await;

    let result = closer(&fixture)
        .close(&CloseFiscalYearCommand {
            fiscal_year_id: fixture.fy2027.id,
            ..close_2026(&fixture)
        })
        .await
        .unwrap();

    assert_eq!(result.net_result, dec!(-50));
    assert!(result.opening_journal.is_none());
    assert_eq!(result.promoted_fiscal_year, None);
    let closing = result.closing_journal.unwrap();
    assert_eq!(line_amounts(&closing.journal, fixture.accounts.revenue), (dec!(50), dec!(0)));
}

#[tokio::test]
async fn test_open_periods_block_close_without_auto_close() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;

    let err = closer(&fixture)
        .close(&CloseFiscalYearCommand {
            auto_close_open_periods: false,
            ..close_2026(&fixture)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClosingError::Validation { ref message, .. } if message.contains("2026-01")));
    let state = fixture.store.snapshot().await;
    assert!(!state.fiscal_year(fixture.fy2026.id).unwrap().is_closed());
    assert_eq!(state.ledger_entries().len(), 4);
}

#[tokio::test]
async fn test_close_without_open_periods_needs_no_auto_close() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    fixture.close_all_2026_months().await;

    let result = closer(&fixture)
        .close(&CloseFiscalYearCommand {
            auto_close_open_periods: false,
            ..close_2026(&fixture)
        })
        .await
        .unwrap();

    assert!(result.closed_periods.is_empty());
    assert_eq!(result.net_result, dec!(-300));
}

#[tokio::test]
async fn test_closed_year_cannot_be_closed_again() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    closer(&fixture).close(&close_2026(&fixture)).await.unwrap();

    let err = closer(&fixture).close(&close_2026(&fixture)).await.unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_close_capability_is_enough_for_generated_journals() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    let closer = FiscalYearCloser::new(
        fixture.engine_with(allow_only(&[Capability::CLOSE_FISCAL_YEAR])),
    );

    let result = closer.close(&close_2026(&fixture)).await.unwrap();

    assert!(result.closing_journal.is_some());
}

#[tokio::test]
async fn test_close_without_capability_is_denied() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    let closer = FiscalYearCloser::new(fixture.engine_with(deny_all()));

    let err = closer.close(&close_2026(&fixture)).await.unwrap_err();

    assert!(matches!(
        err,
        ClosingError::Permission { capability, .. } if capability == Capability::CLOSE_FISCAL_YEAR
    ));
}

#[tokio::test]
async fn test_missing_retained_earnings_account_aborts_close() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    fixture
        .update_settings(|s| s.retained_earnings_account_id = None)
        .await;

    let err = closer(&fixture).close(&close_2026(&fixture)).await.unwrap_err();

    assert_eq!(err.error_code(), "YEAR_END_CLOSING_ERROR");
    let state = fixture.store.snapshot().await;
    assert!(!state.fiscal_year(fixture.fy2026.id).unwrap().is_closed());
    assert!(state.period(fixture.fy2026.month(1)).unwrap().is_open());
}

#[tokio::test]
async fn test_missing_closing_journal_type_aborts_close() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    fixture.update_settings(|s| s.closing_journal_type_id = None).await;

    let err = closer(&fixture).close(&close_2026(&fixture)).await.unwrap_err();

    assert!(matches!(err, ClosingError::YearEndClosing { ref message, .. } if message.contains("journal type")));
}

#[tokio::test]
async fn test_failed_closing_post_rolls_back_everything() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    fixture
        .update_settings(|s| s.retained_earnings_account_id = Some(fixture.accounts.dormant))
        .await;

    let err = closer(&fixture).close(&close_2026(&fixture)).await.unwrap_err();

    assert!(matches!(err, ClosingError::Posting { stage: "closing", .. }));
    assert_eq!(err.error_code(), "ACCOUNT_INACTIVE");
    let state = fixture.store.snapshot().await;
    assert_eq!(state.ledger_entries().len(), 4);
    assert_eq!(state.journals().count(), 2);
    assert!(state.period(fixture.fy2026.month(12)).unwrap().is_open());
}

#[tokio::test]
async fn test_quiet_year_closes_without_journals() {
    let fixture = Fixture::new();
    fixture.update_settings(|s| s.auto_rollover_closing = false).await;

    let result = closer(&fixture).close(&close_2026(&fixture)).await.unwrap();

    assert!(result.closing_journal.is_none());
    assert!(result.opening_journal.is_none());
    assert_eq!(result.net_result, Decimal::ZERO);
    assert_eq!(result.result_nature, ResultNature::BreakEven);
    assert!(result.fiscal_year.is_closed());
}

#[tokio::test]
async fn test_reopen_clears_metadata_and_reclose_reuses_journals() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    let first = closer(&fixture).close(&close_2026(&fixture)).await.unwrap();

    let reopened = closer(&fixture)
        .reopen(&ReopenFiscalYearCommand {
            fiscal_year_id: fixture.fy2026.id,
            actor: fixture.actor,
            reason: Some("Late supplier invoice".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(reopened.status, FiscalYearStatus::Open);
    assert!(reopened.closing_journal_id.is_none());
    assert!(reopened.opening_journal_id.is_none());
    assert!(reopened.net_result.is_none());
    assert!(fixture.audit.actions().contains(&("fiscal_year", "reopened")));

    let second = closer(&fixture).close(&close_2026(&fixture)).await.unwrap();

    let first_closing = first.closing_journal.unwrap();
    let second_closing = second.closing_journal.unwrap();
    assert!(second_closing.already_posted);
    assert_eq!(second_closing.journal.id, first_closing.journal.id);
    assert_eq!(
        second.opening_journal.map(|p| p.journal.id),
        first.opening_journal.map(|p| p.journal.id)
    );
    assert_eq!(second.net_result, dec!(-300));
    assert_eq!(fixture.balance(fixture.accounts.revenue).await, Decimal::ZERO);
    let state = fixture.store.snapshot().await;
    assert_eq!(
        state.fiscal_year(fixture.fy2026.id).unwrap().closing_journal_id,
        Some(first_closing.journal.id)
    );
}

#[tokio::test]
async fn test_reopen_requires_closed_year_and_capability() {
    let fixture = Fixture::new();
    let command = ReopenFiscalYearCommand {
        fiscal_year_id: fixture.fy2026.id,
        actor: fixture.actor,
        reason: None,
    };

    let err = closer(&fixture).reopen(&command).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    closer(&fixture).close(&close_2026(&fixture)).await.unwrap();
    let restricted = FiscalYearCloser::new(
        fixture.engine_with(allow_only(&[Capability::CLOSE_FISCAL_YEAR])),
    );
    let err = restricted.reopen(&command).await.unwrap_err();
    assert_eq!(err.error_code(), "PERMISSION_DENIED");
}

#[tokio::test]
async fn test_close_period() {
    let fixture = Fixture::new();
    let command = ClosePeriodCommand {
        period_id: fixture.fy2026.month(1),
        actor: fixture.actor,
    };

    let period = closer(&fixture).close_period(&command).await.unwrap();
    assert_eq!(period.status, PeriodStatus::Closed);
    assert_eq!(period.closed_by, Some(fixture.actor));
    assert!(fixture.audit.actions().contains(&("period", "closed")));

    let err = closer(&fixture).close_period(&command).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let err = closer(&fixture)
        .close_period(&ClosePeriodCommand {
            period_id: fixture.fy2026.adjustment,
            actor: fixture.actor,
        })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let err = closer(&fixture)
        .close_period(&ClosePeriodCommand {
            period_id: corebook_shared::types::PeriodId::new(),
            actor: fixture.actor,
        })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_close_period_requires_capability() {
    let fixture = Fixture::new();
    let restricted =
        FiscalYearCloser::new(fixture.engine_with(allow_only(&[Capability::POST_JOURNAL])));

    let err = restricted
        .close_period(&ClosePeriodCommand {
            period_id: fixture.fy2026.month(2),
            actor: fixture.actor,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClosingError::Permission { capability, .. } if capability == Capability::CLOSE_PERIOD
    ));
}

#[tokio::test]
async fn test_reclose_without_recorded_net_result_fails() {
    let fixture = Fixture::new();
    profitable_year(&fixture).await;
    let first = closer(&fixture).close(&close_2026(&fixture)).await.unwrap();
    closer(&fixture)
        .reopen(&ReopenFiscalYearCommand {
            fiscal_year_id: fixture.fy2026.id,
            actor: fixture.actor,
            reason: None,
        })
        .await
        .unwrap();
    let mut closing = first.closing_journal.unwrap().journal;
    closing.metadata.remove(metadata::NET_RESULT);
    fixture.store.modify(|state| state.add_journal(closing)).await;

    let err = closer(&fixture).close(&close_2026(&fixture)).await.unwrap_err();

    assert!(matches!(err, ClosingError::YearEndClosing { .. }));
    let state = fixture.store.snapshot().await;
    assert_eq!(
        state.fiscal_year(fixture.fy2026.id).unwrap().status,
        FiscalYearStatus::Open
    );
}
