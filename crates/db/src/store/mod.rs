//! PostgreSQL ledger store on top of `SeaORM`.
//!
//! Each [`SeaOrmTx`] wraps one database transaction. `*_for_update` reads issue
//! `SELECT ... FOR UPDATE`, so the engines' lock discipline carries over to the database.
//! Dropping the transaction without `commit` rolls it back.

mod mapping;

use async_trait::async_trait;
use chrono::NaiveDate;
use corebook_core::fiscal::{AccountingPeriod, FiscalYear};
use corebook_core::ledger::{
    Account, AccountTotals, ClosingType, GeneralLedgerEntry, Journal, JournalType,
    OrganizationSettings,
};
use corebook_core::store::{
    BatchFilter, JournalKey, LedgerStore, LedgerTotalsQuery, LedgerTx, StoreError,
};
use corebook_shared::types::{
    AccountId, FiscalYearId, JournalId, JournalTypeId, KeysetPage, OrganizationId, PeriodId,
};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbBackend, DbErr, EntityTrait, FromQueryResult, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Statement, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::{self as db_enums, AccountNature, JournalStatus};
use crate::entities::{
    accounting_periods, accounts, fiscal_years, general_ledger_entries, journal_lines,
    journal_types, journals, organization_settings,
};
use mapping::{
    account_from, fiscal_year_from, journal_active, journal_from, journal_type_from,
    ledger_entry_active, ledger_entry_from, line_active, period_from, settings_from, store_error,
};

/// Hands out the next number and advances the counter; the upsert keeps the row locked
/// until the transaction ends.
const NEXT_SEQUENCE_SQL: &str = r"
INSERT INTO journal_sequences (journal_type_id, scope_id, sequence_next)
VALUES ($1, $2, 2)
ON CONFLICT (journal_type_id, scope_id)
DO UPDATE SET sequence_next = journal_sequences.sequence_next + 1
RETURNING sequence_next - 1 AS value
";

/// [`LedgerStore`] backed by a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct SeaOrmLedgerStore {
    db: DatabaseConnection,
}

impl SeaOrmLedgerStore {
    /// Creates a store over an established connection.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Underlying connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for SeaOrmLedgerStore {
    type Tx = SeaOrmTx;

    async fn begin(&self) -> Result<SeaOrmTx, StoreError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        Ok(SeaOrmTx { txn })
    }
}

/// One database transaction of a [`SeaOrmLedgerStore`].
pub struct SeaOrmTx {
    txn: DatabaseTransaction,
}

impl std::fmt::Debug for SeaOrmTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeaOrmTx").finish_non_exhaustive()
    }
}

#[derive(Debug, FromQueryResult)]
struct TotalsRow {
    account_id: Uuid,
    nature: AccountNature,
    functional_debit: Decimal,
    functional_credit: Decimal,
}

/// Maps the "no row touched" outcome of an update to `NotFound`.
fn updated<T>(result: Result<T, DbErr>, entity: &'static str, id: Uuid) -> Result<T, StoreError> {
    match result {
        Ok(model) => Ok(model),
        Err(DbErr::RecordNotUpdated) => Err(StoreError::not_found(entity, id)),
        Err(err) => Err(store_error(err)),
    }
}

impl SeaOrmTx {
    async fn lines_of(&self, journal_id: Uuid) -> Result<Vec<journal_lines::Model>, StoreError> {
        journal_lines::Entity::find()
            .filter(journal_lines::Column::JournalId.eq(journal_id))
            .order_by_asc(journal_lines::Column::LineNumber)
            .all(&self.txn)
            .await
            .map_err(store_error)
    }

    async fn with_lines(&self, header: Option<journals::Model>) -> Result<Option<Journal>, StoreError> {
        let Some(header) = header else {
            return Ok(None);
        };
        let lines = self.lines_of(header.id).await?;
        journal_from(header, lines).map(Some)
    }
}

#[async_trait]
impl LedgerTx for SeaOrmTx {
    async fn organization_settings(
        &mut self,
        organization_id: OrganizationId,
    ) -> Result<OrganizationSettings, StoreError> {
        organization_settings::Entity::find_by_id(organization_id.into_inner())
            .one(&self.txn)
            .await
            .map_err(store_error)?
            .map(settings_from)
            .ok_or_else(|| StoreError::not_found("organization settings", organization_id))
    }

    async fn journal_for_update(&mut self, id: JournalId) -> Result<Option<Journal>, StoreError> {
        let header = journals::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(store_error)?;
        self.with_lines(header).await
    }

    async fn eligible_journals(
        &mut self,
        filter: &BatchFilter,
        page: &KeysetPage<JournalKey>,
    ) -> Result<Vec<JournalKey>, StoreError> {
        let mut select = journals::Entity::find()
            .select_only()
            .column(journals::Column::JournalDate)
            .column(journals::Column::Id)
            .filter(journals::Column::OrganizationId.eq(filter.organization_id.into_inner()))
            .filter(journals::Column::Status.eq(JournalStatus::Approved))
            .filter(journals::Column::IsLocked.eq(false));

        if let Some(journal_type_id) = filter.journal_type_id {
            select = select.filter(journals::Column::JournalTypeId.eq(journal_type_id.into_inner()));
        }
        if let Some(period_id) = filter.period_id {
            select = select.filter(journals::Column::PeriodId.eq(period_id.into_inner()));
        }
        if let Some(date_from) = filter.date_from {
            select = select.filter(journals::Column::JournalDate.gte(date_from));
        }
        if let Some(date_to) = filter.date_to {
            select = select.filter(journals::Column::JournalDate.lte(date_to));
        }
        if let Some((date, id)) = page.after {
            select = select.filter(
                Condition::any()
                    .add(journals::Column::JournalDate.gt(date))
                    .add(
                        Condition::all()
                            .add(journals::Column::JournalDate.eq(date))
                            .add(journals::Column::Id.gt(id.into_inner())),
                    ),
            );
        }

        let keys: Vec<(NaiveDate, Uuid)> = select
            .order_by_asc(journals::Column::JournalDate)
            .order_by_asc(journals::Column::Id)
            .limit(page.limit())
            .into_tuple()
            .all(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(keys.into_iter().map(|(date, id)| (date, id.into())).collect())
    }

    async fn find_tagged_journal(
        &mut self,
        organization_id: OrganizationId,
        closing_type: ClosingType,
        fiscal_year_id: FiscalYearId,
    ) -> Result<Option<Journal>, StoreError> {
        let header = journals::Entity::find()
            .filter(journals::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(journals::Column::Status.is_in([JournalStatus::Posted, JournalStatus::Reversed]))
            .filter(Expr::cust_with_values(
                "metadata ->> 'closing_type' = ? AND metadata ->> 'fiscal_year_id' = ?",
                [closing_type.as_str().to_string(), fiscal_year_id.to_string()],
            ))
            .order_by_asc(journals::Column::PostedAt)
            .one(&self.txn)
            .await
            .map_err(store_error)?;
        self.with_lines(header).await
    }

    async fn insert_journal(&mut self, journal: &Journal) -> Result<(), StoreError> {
        journals::Entity::insert(journal_active(journal))
            .exec_without_returning(&self.txn)
            .await
            .map_err(store_error)?;
        if journal.lines.is_empty() {
            return Ok(());
        }
        let lines = journal
            .lines
            .iter()
            .map(line_active)
            .collect::<Result<Vec<_>, _>>()?;
        journal_lines::Entity::insert_many(lines)
            .exec_without_returning(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update_journal(&mut self, journal: &Journal) -> Result<(), StoreError> {
        let id = journal.id.into_inner();
        updated(journal_active(journal).update(&self.txn).await, "journal", id)?;
        for line in &journal.lines {
            let active = journal_lines::ActiveModel {
                id: Set(line.id.into_inner()),
                currency: Set(line.currency.clone()),
                exchange_rate: Set(line.exchange_rate),
                functional_debit: Set(line.functional_debit),
                functional_credit: Set(line.functional_credit),
                ..Default::default()
            };
            updated(active.update(&self.txn).await, "journal line", line.id.into_inner())?;
        }
        Ok(())
    }

    async fn journal_type_for_update(
        &mut self,
        id: JournalTypeId,
    ) -> Result<Option<JournalType>, StoreError> {
        journal_types::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(store_error)?
            .map(journal_type_from)
            .transpose()
    }

    async fn next_sequence_value(
        &mut self,
        journal_type_id: JournalTypeId,
        scope: Uuid,
    ) -> Result<i64, StoreError> {
        let statement = Statement::from_sql_and_values(
            DbBackend::Postgres,
            NEXT_SEQUENCE_SQL,
            [journal_type_id.into_inner().into(), scope.into()],
        );
        let row = self
            .txn
            .query_one(statement)
            .await
            .map_err(store_error)?
            .ok_or_else(|| StoreError::Backend("sequence upsert returned no row".to_string()))?;
        row.try_get::<i64>("", "value").map_err(store_error)
    }

    async fn period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>, StoreError> {
        accounting_periods::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(store_error)?
            .map(period_from)
            .transpose()
    }

    async fn periods_of(
        &mut self,
        fiscal_year_id: FiscalYearId,
    ) -> Result<Vec<AccountingPeriod>, StoreError> {
        accounting_periods::Entity::find()
            .filter(accounting_periods::Column::FiscalYearId.eq(fiscal_year_id.into_inner()))
            .order_by_asc(accounting_periods::Column::StartDate)
            .order_by_asc(accounting_periods::Column::PeriodNumber)
            .all(&self.txn)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(period_from)
            .collect()
    }

    async fn update_period(&mut self, period: &AccountingPeriod) -> Result<(), StoreError> {
        let active = accounting_periods::ActiveModel {
            id: Set(period.id.into_inner()),
            status: Set(period.status.into()),
            closed_at: Set(period.closed_at.map(Into::into)),
            closed_by: Set(period.closed_by.map(|u| u.into_inner())),
            ..Default::default()
        };
        updated(active.update(&self.txn).await, "period", period.id.into_inner())?;
        Ok(())
    }

    async fn account_for_update(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(accounts::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(store_error)?
            .map(account_from))
    }

    async fn update_account_balance(
        &mut self,
        id: AccountId,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let active = accounts::ActiveModel {
            id: Set(id.into_inner()),
            current_balance: Set(balance),
            ..Default::default()
        };
        updated(active.update(&self.txn).await, "account", id.into_inner())?;
        Ok(())
    }

    async fn append_ledger_entry(
        &mut self,
        entry: GeneralLedgerEntry,
    ) -> Result<GeneralLedgerEntry, StoreError> {
        let stored = ledger_entry_active(&entry)
            .insert(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(ledger_entry_from(stored))
    }

    async fn ledger_entries_for_journal(
        &mut self,
        journal_id: JournalId,
    ) -> Result<Vec<GeneralLedgerEntry>, StoreError> {
        Ok(general_ledger_entries::Entity::find()
            .filter(general_ledger_entries::Column::JournalId.eq(journal_id.into_inner()))
            .order_by_asc(general_ledger_entries::Column::Sequence)
            .all(&self.txn)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(ledger_entry_from)
            .collect())
    }

    async fn account_totals(
        &mut self,
        query: &LedgerTotalsQuery,
    ) -> Result<Vec<AccountTotals>, StoreError> {
        let natures: Vec<AccountNature> = query.natures.iter().copied().map(Into::into).collect();
        let mut select = general_ledger_entries::Entity::find()
            .select_only()
            .column(general_ledger_entries::Column::AccountId)
            .column(accounts::Column::Nature)
            .column_as(general_ledger_entries::Column::FunctionalDebit.sum(), "functional_debit")
            .column_as(general_ledger_entries::Column::FunctionalCredit.sum(), "functional_credit")
            .join(JoinType::InnerJoin, general_ledger_entries::Relation::Accounts.def())
            .filter(general_ledger_entries::Column::OrganizationId.eq(query.organization_id.into_inner()))
            .filter(accounts::Column::Nature.is_in(natures))
            .filter(general_ledger_entries::Column::TransactionDate.lte(query.date_to));

        if let Some(date_from) = query.date_from {
            select = select.filter(general_ledger_entries::Column::TransactionDate.gte(date_from));
        }
        if !query.exclude_closing_types.is_empty() {
            let excluded: Vec<db_enums::ClosingType> = query
                .exclude_closing_types
                .iter()
                .copied()
                .map(Into::into)
                .collect();
            select = select.filter(
                Condition::any()
                    .add(general_ledger_entries::Column::ClosingType.is_null())
                    .add(general_ledger_entries::Column::ClosingType.is_not_in(excluded)),
            );
        }

        let rows = select
            .group_by(general_ledger_entries::Column::AccountId)
            .group_by(accounts::Column::Nature)
            .order_by_asc(general_ledger_entries::Column::AccountId)
            .into_model::<TotalsRow>()
            .all(&self.txn)
            .await
            .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .map(|row| AccountTotals {
                account_id: row.account_id.into(),
                nature: row.nature.into(),
                functional_debit: row.functional_debit,
                functional_credit: row.functional_credit,
            })
            .collect())
    }

    async fn fiscal_year_for_update(
        &mut self,
        id: FiscalYearId,
    ) -> Result<Option<FiscalYear>, StoreError> {
        Ok(fiscal_years::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(store_error)?
            .map(fiscal_year_from))
    }

    async fn next_fiscal_year(
        &mut self,
        fiscal_year: &FiscalYear,
    ) -> Result<Option<FiscalYear>, StoreError> {
        Ok(fiscal_years::Entity::find()
            .filter(fiscal_years::Column::OrganizationId.eq(fiscal_year.organization_id.into_inner()))
            .filter(fiscal_years::Column::StartDate.gt(fiscal_year.end_date))
            .order_by_asc(fiscal_years::Column::StartDate)
            .one(&self.txn)
            .await
            .map_err(store_error)?
            .map(fiscal_year_from))
    }

    async fn update_fiscal_year(&mut self, fiscal_year: &FiscalYear) -> Result<(), StoreError> {
        let active = fiscal_years::ActiveModel {
            id: Set(fiscal_year.id.into_inner()),
            status: Set(fiscal_year.status.into()),
            is_current: Set(fiscal_year.is_current),
            closed_at: Set(fiscal_year.closed_at.map(Into::into)),
            closed_by: Set(fiscal_year.closed_by.map(|u| u.into_inner())),
            closing_journal_id: Set(fiscal_year.closing_journal_id.map(|j| j.into_inner())),
            opening_journal_id: Set(fiscal_year.opening_journal_id.map(|j| j.into_inner())),
            net_result: Set(fiscal_year.net_result),
            ..Default::default()
        };
        updated(active.update(&self.txn).await, "fiscal year", fiscal_year.id.into_inner())?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().await.map_err(store_error)
    }
}
