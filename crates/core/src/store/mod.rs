//! Ledger store: the unit-of-work seam between the engines and persistence.
//!
//! `LedgerStore::begin` opens a transaction. Every `*_for_update` read locks the row until
//! the transaction ends. Dropping a transaction without `commit` rolls it back.

mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use corebook_shared::types::{
    AccountId, FiscalYearId, JournalId, JournalTypeId, KeysetPage, OrganizationId, PeriodId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::fiscal::{AccountingPeriod, FiscalYear};
use crate::ledger::{
    Account, AccountNature, AccountTotals, ClosingType, GeneralLedgerEntry, Journal, JournalType,
    OrganizationSettings,
};

pub use memory::{CommitFault, LedgerState, MemoryLedgerStore, MemoryTx};

/// Errors raised by store implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Row expected to exist is missing.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Identifier looked up.
        id: Uuid,
    },

    /// Concurrent write conflict (unique violation, serialization failure, lock timeout).
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Any other backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for `NotFound`.
    pub fn not_found(entity: &'static str, id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Filter selecting journals for batch posting.
///
/// Eligible journals are always `approved` and unlocked; these fields narrow further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFilter {
    /// Organization (required).
    pub organization_id: OrganizationId,
    /// Restrict to one journal type.
    pub journal_type_id: Option<JournalTypeId>,
    /// Restrict to one period.
    pub period_id: Option<PeriodId>,
    /// Earliest journal date (inclusive).
    pub date_from: Option<NaiveDate>,
    /// Latest journal date (inclusive).
    pub date_to: Option<NaiveDate>,
}

impl BatchFilter {
    /// Filter matching every eligible journal of the organization.
    #[must_use]
    pub fn organization(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            journal_type_id: None,
            period_id: None,
            date_from: None,
            date_to: None,
        }
    }

    /// Returns true if `journal` is eligible under this filter.
    #[must_use]
    pub fn matches(&self, journal: &Journal) -> bool {
        journal.organization_id == self.organization_id
            && journal.status == crate::ledger::JournalStatus::Approved
            && !journal.is_locked
            && self.journal_type_id.is_none_or(|t| journal.journal_type_id == t)
            && self.period_id.is_none_or(|p| journal.period_id == p)
            && self.date_from.is_none_or(|d| journal.journal_date >= d)
            && self.date_to.is_none_or(|d| journal.journal_date <= d)
    }
}

/// Keyset of the batch scan order.
pub type JournalKey = (NaiveDate, JournalId);

/// Aggregation request over general-ledger rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTotalsQuery {
    /// Organization.
    pub organization_id: OrganizationId,
    /// Account natures to include.
    pub natures: Vec<AccountNature>,
    /// Earliest transaction date (inclusive); `None` means from the beginning.
    pub date_from: Option<NaiveDate>,
    /// Latest transaction date (inclusive).
    pub date_to: NaiveDate,
    /// Rows tagged with any of these closing types are skipped.
    pub exclude_closing_types: Vec<ClosingType>,
}

impl LedgerTotalsQuery {
    /// Returns true if `entry` of an account with `nature` falls under this query.
    #[must_use]
    pub fn includes(&self, nature: AccountNature, entry: &GeneralLedgerEntry) -> bool {
        entry.organization_id == self.organization_id
            && self.natures.contains(&nature)
            && self.date_from.is_none_or(|d| entry.transaction_date >= d)
            && entry.transaction_date <= self.date_to
            && entry
                .closing_type
                .is_none_or(|t| !self.exclude_closing_types.contains(&t))
    }
}

/// Factory of ledger transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Transaction type.
    type Tx: LedgerTx;

    /// Opens a transaction.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One unit of work against the ledger.
#[async_trait]
pub trait LedgerTx: Send {
    /// Reads an organization's posting and closing settings.
    async fn organization_settings(
        &mut self,
        organization_id: OrganizationId,
    ) -> Result<OrganizationSettings, StoreError>;

    /// Reads and locks a journal with its lines.
    async fn journal_for_update(&mut self, id: JournalId) -> Result<Option<Journal>, StoreError>;

    /// Returns keys of eligible journals after `page.after`, in (date, id) order.
    async fn eligible_journals(
        &mut self,
        filter: &BatchFilter,
        page: &KeysetPage<JournalKey>,
    ) -> Result<Vec<JournalKey>, StoreError>;

    /// Finds the journal tagged `closing_type` for a fiscal year.
    async fn find_tagged_journal(
        &mut self,
        organization_id: OrganizationId,
        closing_type: ClosingType,
        fiscal_year_id: FiscalYearId,
    ) -> Result<Option<Journal>, StoreError>;

    /// Inserts a new journal with its lines.
    async fn insert_journal(&mut self, journal: &Journal) -> Result<(), StoreError>;

    /// Writes a journal header and each line's currency, rate and functional amounts.
    async fn update_journal(&mut self, journal: &Journal) -> Result<(), StoreError>;

    /// Reads and locks a journal type.
    async fn journal_type_for_update(
        &mut self,
        id: JournalTypeId,
    ) -> Result<Option<JournalType>, StoreError>;

    /// Returns the next value of the (journal type, scope) counter and advances it.
    async fn next_sequence_value(
        &mut self,
        journal_type_id: JournalTypeId,
        scope: Uuid,
    ) -> Result<i64, StoreError>;

    /// Reads a period.
    async fn period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>, StoreError>;

    /// Reads the periods of a fiscal year ordered by start date then number.
    async fn periods_of(
        &mut self,
        fiscal_year_id: FiscalYearId,
    ) -> Result<Vec<AccountingPeriod>, StoreError>;

    /// Writes a period's status and close stamps.
    async fn update_period(&mut self, period: &AccountingPeriod) -> Result<(), StoreError>;

    /// Reads and locks an account.
    async fn account_for_update(&mut self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Sets an account's running balance.
    async fn update_account_balance(
        &mut self,
        id: AccountId,
        balance: Decimal,
    ) -> Result<(), StoreError>;

    /// Appends a general-ledger row; the store assigns `sequence`.
    async fn append_ledger_entry(
        &mut self,
        entry: GeneralLedgerEntry,
    ) -> Result<GeneralLedgerEntry, StoreError>;

    /// Ledger rows of a journal in insert order.
    async fn ledger_entries_for_journal(
        &mut self,
        journal_id: JournalId,
    ) -> Result<Vec<GeneralLedgerEntry>, StoreError>;

    /// Functional debit/credit sums per account, ordered by account id.
    async fn account_totals(
        &mut self,
        query: &LedgerTotalsQuery,
    ) -> Result<Vec<AccountTotals>, StoreError>;

    /// Reads and locks a fiscal year.
    async fn fiscal_year_for_update(
        &mut self,
        id: FiscalYearId,
    ) -> Result<Option<FiscalYear>, StoreError>;

    /// Earliest fiscal year of the same organization starting after `fiscal_year` ends.
    async fn next_fiscal_year(
        &mut self,
        fiscal_year: &FiscalYear,
    ) -> Result<Option<FiscalYear>, StoreError>;

    /// Writes a fiscal year.
    async fn update_fiscal_year(&mut self, fiscal_year: &FiscalYear) -> Result<(), StoreError>;

    /// Commits the unit of work.
    async fn commit(self) -> Result<(), StoreError>;
}
