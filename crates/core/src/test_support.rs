//! Shared fixtures for engine tests: one USD organization with a small chart of accounts,
//! FY2026 (twelve months plus an adjustment period) and FY2027.

use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate};
use corebook_shared::types::{
    AccountId, FiscalYearId, JournalId, JournalTypeId, OrganizationId, PeriodId, UserId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::currency::StaticRateTable;
use crate::fiscal::{AccountingPeriod, FiscalYear, FiscalYearStatus, PeriodStatus};
use crate::ledger::{
    Account, AccountNature, GeneralLedgerEntry, Journal, JournalStatus, JournalType,
    NumberingScope, OrganizationSettings, balance_change,
};
use crate::ports::{
    AuditEntry, AuditLogger, Capability, DomainEvent, EventEmitter, PermissionChecker,
    PermissionRequest,
};
use crate::posting::PostingEngine;
use crate::store::{CommitFault, LedgerState, MemoryLedgerStore, StoreError};

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// First row whose `balance_after` breaks the running total from `opening_balance`.
pub(crate) fn find_running_balance_break<'a>(
    opening_balance: Decimal,
    entries: impl IntoIterator<Item = &'a GeneralLedgerEntry>,
) -> Option<&'a GeneralLedgerEntry> {
    let mut balance = opening_balance;
    entries.into_iter().find(|entry| {
        balance += balance_change(entry.functional_debit, entry.functional_credit);
        entry.balance_after != balance
    })
}

pub(crate) fn allow_all() -> Arc<dyn PermissionChecker> {
    Arc::new(|_: &PermissionRequest| true)
}

pub(crate) fn deny_all() -> Arc<dyn PermissionChecker> {
    Arc::new(|_: &PermissionRequest| false)
}

pub(crate) fn allow_only(capabilities: &[Capability]) -> Arc<dyn PermissionChecker> {
    let capabilities = capabilities.to_vec();
    Arc::new(move |request: &PermissionRequest| capabilities.contains(&request.capability))
}

#[derive(Debug, Default)]
pub(crate) struct RecordingAuditLogger {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditLogger {
    pub(crate) fn actions(&self) -> Vec<(&'static str, &'static str)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.subject_type, e.action))
            .collect()
    }
}

impl AuditLogger for RecordingAuditLogger {
    fn record(&self, entry: AuditEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingEventEmitter {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventEmitter {
    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name).collect()
    }
}

impl EventEmitter for RecordingEventEmitter {
    fn emit(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Chart of accounts of the fixture organization.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Accounts {
    pub cash: AccountId,
    pub payable: AccountId,
    pub capital: AccountId,
    pub retained_earnings: AccountId,
    pub rollover_adjustment: AccountId,
    pub revenue: AccountId,
    pub expense: AccountId,
    pub dormant: AccountId,
}

/// Periods of one fiscal year.
#[derive(Debug, Clone)]
pub(crate) struct Year {
    pub id: FiscalYearId,
    pub months: Vec<PeriodId>,
    pub adjustment: PeriodId,
}

impl Year {
    pub(crate) fn month(&self, month: u32) -> PeriodId {
        self.months[usize::try_from(month - 1).unwrap()]
    }
}

pub(crate) struct Fixture {
    pub store: MemoryLedgerStore,
    pub organization_id: OrganizationId,
    pub actor: UserId,
    pub accounts: Accounts,
    pub journal_type: JournalTypeId,
    pub closing_journal_type: JournalTypeId,
    pub fy2026: Year,
    pub fy2027: Year,
    pub rates: StaticRateTable,
    pub audit: Arc<RecordingAuditLogger>,
    pub events: Arc<RecordingEventEmitter>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let organization_id = OrganizationId::new();
        let mut state = LedgerState::default();

        let mut account = |code: &str, name: &str, nature: AccountNature| {
            let account = Account {
                id: AccountId::new(),
                organization_id,
                code: code.to_string(),
                name: name.to_string(),
                nature,
                current_balance: Decimal::ZERO,
                is_active: true,
            };
            let id = account.id;
            state.add_account(account);
            id
        };
        let accounts = Accounts {
            cash: account("1100", "Cash", AccountNature::Asset),
            payable: account("2100", "Accounts Payable", AccountNature::Liability),
            capital: account("3100", "Share Capital", AccountNature::Equity),
            retained_earnings: account("3200", "Retained Earnings", AccountNature::Equity),
            rollover_adjustment: account("3900", "Rollover Adjustment", AccountNature::Equity),
            revenue: account("4100", "Sales Revenue", AccountNature::Income),
            expense: account("5100", "Operating Expense", AccountNature::Expense),
            dormant: account("1900", "Dormant Asset", AccountNature::Asset),
        };
        let mut dormant = state.account(accounts.dormant).cloned().unwrap();
        dormant.is_active = false;
        state.add_account(dormant);

        let journal_type = JournalType {
            id: JournalTypeId::new(),
            organization_id,
            code: "JN".to_string(),
            name: "General Journal".to_string(),
            numbering_scope: NumberingScope::Period,
            padding: 4,
        };
        let closing_journal_type = JournalType {
            id: JournalTypeId::new(),
            organization_id,
            code: "CL".to_string(),
            name: "Closing Journal".to_string(),
            numbering_scope: NumberingScope::FiscalYear,
            padding: 4,
        };

        state.set_settings(OrganizationSettings {
            organization_id,
            base_currency: "USD".to_string(),
            retained_earnings_account_id: Some(accounts.retained_earnings),
            rollover_adjustment_account_id: Some(accounts.rollover_adjustment),
            closing_journal_type_id: Some(closing_journal_type.id),
            auto_rollover_closing: true,
        });

        let fy2026 = add_year(&mut state, organization_id, 2026, true);
        let fy2027 = add_year(&mut state, organization_id, 2027, false);

        let journal_type_id = journal_type.id;
        let closing_journal_type_id = closing_journal_type.id;
        state.add_journal_type(journal_type);
        state.add_journal_type(closing_journal_type);

        Self {
            store: MemoryLedgerStore::new(state),
            organization_id,
            actor: UserId::new(),
            accounts,
            journal_type: journal_type_id,
            closing_journal_type: closing_journal_type_id,
            fy2026,
            fy2027,
            rates: StaticRateTable::new().with_rate("EUR", "USD", date(2026, 1, 1), dec!(1.1)),
            audit: Arc::new(RecordingAuditLogger::default()),
            events: Arc::new(RecordingEventEmitter::default()),
        }
    }

    pub(crate) fn engine(&self) -> PostingEngine<MemoryLedgerStore> {
        self.engine_with(allow_all())
    }

    pub(crate) fn engine_with(
        &self,
        permissions: Arc<dyn PermissionChecker>,
    ) -> PostingEngine<MemoryLedgerStore> {
        PostingEngine::new(
            Arc::new(self.store.clone()),
            permissions,
            Arc::new(self.rates.clone()),
        )
        .with_audit_logger(self.audit.clone())
        .with_event_emitter(self.events.clone())
    }

    /// Regular period of FY2026/FY2027 containing `date`.
    pub(crate) fn period_for(&self, date: NaiveDate) -> PeriodId {
        let year = if date.year() == 2026 { &self.fy2026 } else { &self.fy2027 };
        year.month(date.month())
    }

    /// Empty approved USD journal dated `date` in the matching month.
    pub(crate) fn journal(&self, date: NaiveDate, description: &str) -> Journal {
        let mut journal = Journal::draft(
            self.organization_id,
            self.journal_type,
            self.period_for(date),
            date,
            description,
            "USD",
            self.actor,
        );
        journal.status = JournalStatus::Approved;
        journal
    }

    /// Approved journal on 2026-03-10: debit cash, credit revenue.
    pub(crate) fn sale(&self, amount: Decimal) -> Journal {
        self.sale_on(date(2026, 3, 10), amount)
    }

    pub(crate) fn sale_on(&self, date: NaiveDate, amount: Decimal) -> Journal {
        let mut journal = self.journal(date, "Cash sale");
        journal.push_debit(self.accounts.cash, amount);
        journal.push_credit(self.accounts.revenue, amount);
        journal
    }

    /// Approved journal: debit expense, credit cash.
    pub(crate) fn expense_on(&self, date: NaiveDate, amount: Decimal) -> Journal {
        let mut journal = self.journal(date, "Office supplies");
        journal.push_debit(self.accounts.expense, amount);
        journal.push_credit(self.accounts.cash, amount);
        journal
    }

    pub(crate) async fn insert(&self, journal: Journal) -> JournalId {
        let id = journal.id;
        self.store.modify(|state| state.add_journal(journal)).await;
        id
    }

    /// Closes the regular period containing `date` directly in the store.
    pub(crate) async fn close_period_of(&self, date: NaiveDate) -> PeriodId {
        let period_id = self.period_for(date);
        self.set_period_status(period_id, PeriodStatus::Closed).await;
        period_id
    }

    pub(crate) async fn set_period_status(&self, period_id: PeriodId, status: PeriodStatus) {
        self.store
            .modify(|state| {
                let mut period = state.period(period_id).cloned().unwrap();
                period.status = status;
                state.add_period(period);
            })
            .await;
    }

    /// Closes every regular period of FY2026 directly in the store.
    pub(crate) async fn close_all_2026_months(&self) {
        for period_id in self.fy2026.months.clone() {
            self.set_period_status(period_id, PeriodStatus::Closed).await;
        }
    }

    pub(crate) async fn update_settings(&self, f: impl FnOnce(&mut OrganizationSettings)) {
        let organization_id = self.organization_id;
        self.store
            .modify(|state| {
                let mut settings = state.settings(organization_id).cloned().unwrap();
                f(&mut settings);
                state.set_settings(settings);
            })
            .await;
    }

    pub(crate) async fn balance(&self, account_id: AccountId) -> Decimal {
        self.store
            .snapshot()
            .await
            .account(account_id)
            .unwrap()
            .current_balance
    }

    pub(crate) async fn lose_next_commit_ack(&self) {
        self.store
            .inject_commit_fault(CommitFault::LostAck(StoreError::Conflict(
                "connection dropped during commit".into(),
            )))
            .await;
    }

    pub(crate) async fn reject_next_commit(&self) {
        self.store
            .inject_commit_fault(CommitFault::Reject(StoreError::Conflict(
                "could not serialize access".into(),
            )))
            .await;
    }
}

fn add_year(
    state: &mut LedgerState,
    organization_id: OrganizationId,
    year: i32,
    is_current: bool,
) -> Year {
    let fiscal_year = FiscalYear {
        id: FiscalYearId::new(),
        organization_id,
        name: format!("FY{year}"),
        start_date: date(year, 1, 1),
        end_date: date(year, 12, 31),
        status: FiscalYearStatus::Open,
        is_current,
        closed_at: None,
        closed_by: None,
        closing_journal_id: None,
        opening_journal_id: None,
        net_result: None,
    };
    let fiscal_year_id = fiscal_year.id;
    state.add_fiscal_year(fiscal_year);

    let mut period = |number: u32,
                      name: String,
                      start: NaiveDate,
                      end: NaiveDate,
                      status: PeriodStatus| {
        let period = AccountingPeriod {
            id: PeriodId::new(),
            organization_id,
            fiscal_year_id,
            name,
            period_number: number,
            start_date: start,
            end_date: end,
            status,
            closed_at: None,
            closed_by: None,
        };
        let id = period.id;
        state.add_period(period);
        id
    };

    let months = (1..=12)
        .map(|month| {
            let start = date(year, month, 1);
            let end = if month == 12 {
                date(year, 12, 31)
            } else {
                date(year, month + 1, 1).pred_opt().unwrap()
            };
            period(month, format!("{year}-{month:02}"), start, end, PeriodStatus::Open)
        })
        .collect();
    let adjustment = period(
        13,
        format!("{year} Adjustment"),
        date(year, 12, 31),
        date(year, 12, 31),
        PeriodStatus::Adjustment,
    );

    Year {
        id: fiscal_year_id,
        months,
        adjustment,
    }
}
