//! In-memory ledger store.
//!
//! Serializable by construction: `begin` takes the store-wide lock and works on a copy of
//! the state, `commit` publishes the copy. Only one transaction runs at a time.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use corebook_shared::types::{
    AccountId, FiscalYearId, JournalId, JournalTypeId, KeysetPage, OrganizationId, PeriodId,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{BatchFilter, JournalKey, LedgerStore, LedgerTotalsQuery, LedgerTx, StoreError};
use crate::fiscal::{AccountingPeriod, FiscalYear};
use crate::ledger::{
    Account, AccountTotals, ClosingType, GeneralLedgerEntry, Journal, JournalType,
    OrganizationSettings,
};

/// Complete ledger state held by [`MemoryLedgerStore`].
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    settings: HashMap<OrganizationId, OrganizationSettings>,
    accounts: BTreeMap<AccountId, Account>,
    journals: HashMap<JournalId, Journal>,
    journal_types: HashMap<JournalTypeId, JournalType>,
    sequences: HashMap<(JournalTypeId, Uuid), i64>,
    periods: HashMap<PeriodId, AccountingPeriod>,
    fiscal_years: HashMap<FiscalYearId, FiscalYear>,
    ledger: Vec<GeneralLedgerEntry>,
    next_ledger_sequence: i64,
}

impl LedgerState {
    /// Sets an organization's settings.
    pub fn set_settings(&mut self, settings: OrganizationSettings) {
        self.settings.insert(settings.organization_id, settings);
    }

    /// Adds or replaces an account.
    pub fn add_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Adds or replaces a journal.
    pub fn add_journal(&mut self, journal: Journal) {
        self.journals.insert(journal.id, journal);
    }

    /// Adds or replaces a journal type.
    pub fn add_journal_type(&mut self, journal_type: JournalType) {
        self.journal_types.insert(journal_type.id, journal_type);
    }

    /// Sets the next value a sequence will hand out.
    pub fn set_sequence_next(&mut self, journal_type_id: JournalTypeId, scope: Uuid, next: i64) {
        self.sequences.insert((journal_type_id, scope), next);
    }

    /// Adds or replaces a period.
    pub fn add_period(&mut self, period: AccountingPeriod) {
        self.periods.insert(period.id, period);
    }

    /// Adds or replaces a fiscal year.
    pub fn add_fiscal_year(&mut self, fiscal_year: FiscalYear) {
        self.fiscal_years.insert(fiscal_year.id, fiscal_year);
    }

    /// Settings of an organization.
    #[must_use]
    pub fn settings(&self, organization_id: OrganizationId) -> Option<&OrganizationSettings> {
        self.settings.get(&organization_id)
    }

    /// Account by id.
    #[must_use]
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    /// Journal by id.
    #[must_use]
    pub fn journal(&self, id: JournalId) -> Option<&Journal> {
        self.journals.get(&id)
    }

    /// All journals, unordered.
    pub fn journals(&self) -> impl Iterator<Item = &Journal> {
        self.journals.values()
    }

    /// Period by id.
    #[must_use]
    pub fn period(&self, id: PeriodId) -> Option<&AccountingPeriod> {
        self.periods.get(&id)
    }

    /// Fiscal year by id.
    #[must_use]
    pub fn fiscal_year(&self, id: FiscalYearId) -> Option<&FiscalYear> {
        self.fiscal_years.get(&id)
    }

    /// All ledger rows in insert order.
    #[must_use]
    pub fn ledger_entries(&self) -> &[GeneralLedgerEntry] {
        &self.ledger
    }
}

/// Outcome injected into the next commit.
#[derive(Debug, Clone)]
pub enum CommitFault {
    /// Discard the work and fail.
    Reject(StoreError),
    /// Publish the work but report failure, as when a commit acknowledgement is lost.
    LostAck(StoreError),
}

#[derive(Debug, Default)]
struct Shared {
    state: LedgerState,
    faults: VecDeque<CommitFault>,
}

/// Serializable in-memory [`LedgerStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryLedgerStore {
    /// Creates a store holding `state`.
    #[must_use]
    pub fn new(state: LedgerState) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state,
                faults: VecDeque::new(),
            })),
        }
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> LedgerState {
        self.shared.lock().await.state.clone()
    }

    /// Applies `f` to the committed state outside any transaction.
    pub async fn modify(&self, f: impl FnOnce(&mut LedgerState)) {
        f(&mut self.shared.lock().await.state);
    }

    /// Queues a fault for an upcoming commit (first queued, first applied).
    pub async fn inject_commit_fault(&self, fault: CommitFault) {
        self.shared.lock().await.faults.push_back(fault);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let guard = Arc::clone(&self.shared).lock_owned().await;
        let working = guard.state.clone();
        Ok(MemoryTx { guard, working })
    }
}

/// Transaction of a [`MemoryLedgerStore`]; holds the store lock until dropped.
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<Shared>,
    working: LedgerState,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn organization_settings(
        &mut self,
        organization_id: OrganizationId,
    ) -> Result<OrganizationSettings, StoreError> {
        self.working
            .settings
            .get(&organization_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("organization settings", organization_id))
    }

    async fn journal_for_update(&mut self, id: JournalId) -> Result<Option<Journal>, StoreError> {
        Ok(self.working.journals.get(&id).cloned())
    }

    async fn eligible_journals(
        &mut self,
        filter: &BatchFilter,
        page: &KeysetPage<JournalKey>,
    ) -> Result<Vec<JournalKey>, StoreError> {
        let mut keys: Vec<JournalKey> = self
            .working
            .journals
            .values()
            .filter(|j| filter.matches(j))
            .map(|j| (j.journal_date, j.id))
            .filter(|key| page.after.is_none_or(|after| *key > after))
            .collect();
        keys.sort_unstable();
        keys.truncate(usize::try_from(page.size).unwrap_or(usize::MAX));
        Ok(keys)
    }

    async fn find_tagged_journal(
        &mut self,
        organization_id: OrganizationId,
        closing_type: ClosingType,
        fiscal_year_id: FiscalYearId,
    ) -> Result<Option<Journal>, StoreError> {
        Ok(self
            .working
            .journals
            .values()
            .filter(|j| j.organization_id == organization_id && j.status.is_posted())
            .find(|j| j.is_tagged(closing_type, fiscal_year_id))
            .cloned())
    }

    async fn insert_journal(&mut self, journal: &Journal) -> Result<(), StoreError> {
        if self.working.journals.contains_key(&journal.id) {
            return Err(StoreError::Conflict(format!(
                "journal {} already exists",
                journal.id
            )));
        }
        self.working.journals.insert(journal.id, journal.clone());
        Ok(())
    }

    async fn update_journal(&mut self, journal: &Journal) -> Result<(), StoreError> {
        if let Some(number) = &journal.journal_number {
            let duplicate = self.working.journals.values().any(|j| {
                j.id != journal.id
                    && j.journal_type_id == journal.journal_type_id
                    && j.period_id == journal.period_id
                    && j.journal_number.as_ref() == Some(number)
            });
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "journal number {number} already issued"
                )));
            }
        }
        let stored = self
            .working
            .journals
            .get_mut(&journal.id)
            .ok_or_else(|| StoreError::not_found("journal", journal.id))?;
        *stored = journal.clone();
        Ok(())
    }

    async fn journal_type_for_update(
        &mut self,
        id: JournalTypeId,
    ) -> Result<Option<JournalType>, StoreError> {
        Ok(self.working.journal_types.get(&id).cloned())
    }

    async fn next_sequence_value(
        &mut self,
        journal_type_id: JournalTypeId,
        scope: Uuid,
    ) -> Result<i64, StoreError> {
        let next = self
            .working
            .sequences
            .entry((journal_type_id, scope))
            .or_insert(1);
        let value = *next;
        *next += 1;
        Ok(value)
    }

    async fn period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>, StoreError> {
        Ok(self.working.periods.get(&id).cloned())
    }

    async fn periods_of(
        &mut self,
        fiscal_year_id: FiscalYearId,
    ) -> Result<Vec<AccountingPeriod>, StoreError> {
        let mut periods: Vec<AccountingPeriod> = self
            .working
            .periods
            .values()
            .filter(|p| p.fiscal_year_id == fiscal_year_id)
            .cloned()
            .collect();
        periods.sort_by_key(|p| (p.start_date, p.period_number));
        Ok(periods)
    }

    async fn update_period(&mut self, period: &AccountingPeriod) -> Result<(), StoreError> {
        let stored = self
            .working
            .periods
            .get_mut(&period.id)
            .ok_or_else(|| StoreError::not_found("period", period.id))?;
        *stored = period.clone();
        Ok(())
    }

    async fn account_for_update(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.working.accounts.get(&id).cloned())
    }

    async fn update_account_balance(
        &mut self,
        id: AccountId,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let account = self
            .working
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("account", id))?;
        account.current_balance = balance;
        Ok(())
    }

    async fn append_ledger_entry(
        &mut self,
        mut entry: GeneralLedgerEntry,
    ) -> Result<GeneralLedgerEntry, StoreError> {
        if self
            .working
            .ledger
            .iter()
            .any(|e| e.journal_line_id == entry.journal_line_id)
        {
            return Err(StoreError::Conflict(format!(
                "ledger row for line {} already exists",
                entry.journal_line_id
            )));
        }
        self.working.next_ledger_sequence += 1;
        entry.sequence = self.working.next_ledger_sequence;
        entry.created_at = Utc::now();
        self.working.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn ledger_entries_for_journal(
        &mut self,
        journal_id: JournalId,
    ) -> Result<Vec<GeneralLedgerEntry>, StoreError> {
        Ok(self
            .working
            .ledger
            .iter()
            .filter(|e| e.journal_id == journal_id)
            .cloned()
            .collect())
    }

    async fn account_totals(
        &mut self,
        query: &LedgerTotalsQuery,
    ) -> Result<Vec<AccountTotals>, StoreError> {
        let mut totals: BTreeMap<AccountId, AccountTotals> = BTreeMap::new();
        for entry in &self.working.ledger {
            let Some(account) = self.working.accounts.get(&entry.account_id) else {
                continue;
            };
            if !query.includes(account.nature, entry) {
                continue;
            }
            let total = totals.entry(account.id).or_insert_with(|| AccountTotals {
                account_id: account.id,
                nature: account.nature,
                functional_debit: Decimal::ZERO,
                functional_credit: Decimal::ZERO,
            });
            total.functional_debit += entry.functional_debit;
            total.functional_credit += entry.functional_credit;
        }
        Ok(totals.into_values().collect())
    }

    async fn fiscal_year_for_update(
        &mut self,
        id: FiscalYearId,
    ) -> Result<Option<FiscalYear>, StoreError> {
        Ok(self.working.fiscal_years.get(&id).cloned())
    }

    async fn next_fiscal_year(
        &mut self,
        fiscal_year: &FiscalYear,
    ) -> Result<Option<FiscalYear>, StoreError> {
        Ok(self
            .working
            .fiscal_years
            .values()
            .filter(|fy| {
                fy.organization_id == fiscal_year.organization_id
                    && fy.start_date > fiscal_year.end_date
            })
            .min_by_key(|fy| fy.start_date)
            .cloned())
    }

    async fn update_fiscal_year(&mut self, fiscal_year: &FiscalYear) -> Result<(), StoreError> {
        let stored = self
            .working
            .fiscal_years
            .get_mut(&fiscal_year.id)
            .ok_or_else(|| StoreError::not_found("fiscal year", fiscal_year.id))?;
        *stored = fiscal_year.clone();
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let Self { mut guard, working } = self;
        match guard.faults.pop_front() {
            None => {
                guard.state = working;
                Ok(())
            }
            Some(CommitFault::Reject(err)) => Err(err),
            Some(CommitFault::LostAck(err)) => {
                guard.state = working;
                Err(err)
            }
        }
    }
}
