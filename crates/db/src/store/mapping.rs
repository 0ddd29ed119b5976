//! Conversions between stored rows and ledger domain types.

use chrono::Utc;
use corebook_core::fiscal::{AccountingPeriod, FiscalYear};
use corebook_core::ledger::{
    Account, Dimensions, GeneralLedgerEntry, Journal, JournalLine, JournalType,
    OrganizationSettings,
};
use corebook_core::store::StoreError;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{DbErr, RuntimeErr, SqlErr};

use crate::entities::{
    accounting_periods, accounts, fiscal_years, general_ledger_entries, journal_lines,
    journal_types, journals, organization_settings,
};

/// Postgres SQLSTATE codes that signal a retryable write conflict.
const CONFLICT_STATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

/// Maps a database error onto the store taxonomy.
///
/// Unique violations and the SQLSTATEs in [`CONFLICT_STATES`] become `Conflict`.
pub(crate) fn store_error(err: DbErr) -> StoreError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return StoreError::Conflict(detail);
    }
    if sqlstate(&err).is_some_and(|code| CONFLICT_STATES.contains(&code.as_str())) {
        return StoreError::Conflict(err.to_string());
    }
    tracing::error!(error = %err, "ledger store query failed");
    StoreError::Backend(err.to_string())
}

fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Exec(runtime) | DbErr::Query(runtime) | DbErr::Conn(runtime) => runtime,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx_err) => database_code(sqlx_err),
        RuntimeErr::Internal(_) => None,
    }
}

fn database_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(std::borrow::Cow::into_owned),
        _ => None,
    }
}

pub(crate) fn to_i32(value: u32, field: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Backend(format!("{field} {value} out of range")))
}

pub(crate) fn to_u32(value: i32, field: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Backend(format!("{field} {value} out of range")))
}

fn metadata_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

pub(crate) fn settings_from(model: organization_settings::Model) -> OrganizationSettings {
    OrganizationSettings {
        organization_id: model.organization_id.into(),
        base_currency: model.base_currency,
        retained_earnings_account_id: model.retained_earnings_account_id.map(Into::into),
        rollover_adjustment_account_id: model.rollover_adjustment_account_id.map(Into::into),
        closing_journal_type_id: model.closing_journal_type_id.map(Into::into),
        auto_rollover_closing: model.auto_rollover_closing,
    }
}

pub(crate) fn account_from(model: accounts::Model) -> Account {
    Account {
        id: model.id.into(),
        organization_id: model.organization_id.into(),
        code: model.code,
        name: model.name,
        nature: model.nature.into(),
        current_balance: model.current_balance,
        is_active: model.is_active,
    }
}

pub(crate) fn journal_type_from(model: journal_types::Model) -> Result<JournalType, StoreError> {
    Ok(JournalType {
        id: model.id.into(),
        organization_id: model.organization_id.into(),
        code: model.code,
        name: model.name,
        numbering_scope: model.numbering_scope.into(),
        padding: to_u32(model.padding, "padding")?,
    })
}

pub(crate) fn period_from(model: accounting_periods::Model) -> Result<AccountingPeriod, StoreError> {
    Ok(AccountingPeriod {
        id: model.id.into(),
        organization_id: model.organization_id.into(),
        fiscal_year_id: model.fiscal_year_id.into(),
        name: model.name,
        period_number: to_u32(model.period_number, "period_number")?,
        start_date: model.start_date,
        end_date: model.end_date,
        status: model.status.into(),
        closed_at: model.closed_at.map(|at| at.with_timezone(&Utc)),
        closed_by: model.closed_by.map(Into::into),
    })
}

pub(crate) fn fiscal_year_from(model: fiscal_years::Model) -> FiscalYear {
    FiscalYear {
        id: model.id.into(),
        organization_id: model.organization_id.into(),
        name: model.name,
        start_date: model.start_date,
        end_date: model.end_date,
        status: model.status.into(),
        is_current: model.is_current,
        closed_at: model.closed_at.map(|at| at.with_timezone(&Utc)),
        closed_by: model.closed_by.map(Into::into),
        closing_journal_id: model.closing_journal_id.map(Into::into),
        opening_journal_id: model.opening_journal_id.map(Into::into),
        net_result: model.net_result,
    }
}

pub(crate) fn journal_from(
    header: journals::Model,
    lines: Vec<journal_lines::Model>,
) -> Result<Journal, StoreError> {
    let lines = lines
        .into_iter()
        .map(line_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Journal {
        id: header.id.into(),
        organization_id: header.organization_id.into(),
        journal_type_id: header.journal_type_id.into(),
        period_id: header.period_id.into(),
        journal_date: header.journal_date,
        reference: header.reference,
        description: header.description,
        currency: header.currency,
        exchange_rate: header.exchange_rate,
        status: header.status.into(),
        is_locked: header.is_locked,
        journal_number: header.journal_number,
        idempotency_key: header.idempotency_key,
        created_by: header.created_by.into(),
        created_at: header.created_at.with_timezone(&Utc),
        updated_by: header.updated_by.into(),
        updated_at: header.updated_at.with_timezone(&Utc),
        posted_by: header.posted_by.map(Into::into),
        posted_at: header.posted_at.map(|at| at.with_timezone(&Utc)),
        reverses_journal_id: header.reverses_journal_id.map(Into::into),
        metadata: metadata_map(header.metadata),
        lines,
    })
}

fn line_from(model: journal_lines::Model) -> Result<JournalLine, StoreError> {
    Ok(JournalLine {
        id: model.id.into(),
        journal_id: model.journal_id.into(),
        line_number: to_u32(model.line_number, "line_number")?,
        account_id: model.account_id.into(),
        description: model.description,
        debit: model.debit,
        credit: model.credit,
        currency: model.currency,
        exchange_rate: model.exchange_rate,
        functional_debit: model.functional_debit,
        functional_credit: model.functional_credit,
        dimensions: Dimensions {
            department: model.department,
            project: model.project,
            cost_center: model.cost_center,
            tax_code: model.tax_code,
        },
    })
}

pub(crate) fn ledger_entry_from(model: general_ledger_entries::Model) -> GeneralLedgerEntry {
    GeneralLedgerEntry {
        id: model.id.into(),
        organization_id: model.organization_id.into(),
        account_id: model.account_id.into(),
        journal_id: model.journal_id.into(),
        journal_line_id: model.journal_line_id.into(),
        period_id: model.period_id.into(),
        transaction_date: model.transaction_date,
        debit: model.debit,
        credit: model.credit,
        functional_debit: model.functional_debit,
        functional_credit: model.functional_credit,
        balance_after: model.balance_after,
        currency: model.currency,
        exchange_rate: model.exchange_rate,
        dimensions: Dimensions {
            department: model.department,
            project: model.project,
            cost_center: model.cost_center,
            tax_code: model.tax_code,
        },
        closing_type: model.closing_type.map(Into::into),
        created_at: model.created_at.with_timezone(&Utc),
        sequence: model.sequence,
    }
}

/// Header columns of a journal; every column is `Set`.
pub(crate) fn journal_active(journal: &Journal) -> journals::ActiveModel {
    journals::ActiveModel {
        id: Set(journal.id.into_inner()),
        organization_id: Set(journal.organization_id.into_inner()),
        journal_type_id: Set(journal.journal_type_id.into_inner()),
        period_id: Set(journal.period_id.into_inner()),
        journal_date: Set(journal.journal_date),
        reference: Set(journal.reference.clone()),
        description: Set(journal.description.clone()),
        currency: Set(journal.currency.clone()),
        exchange_rate: Set(journal.exchange_rate),
        status: Set(journal.status.into()),
        is_locked: Set(journal.is_locked),
        journal_number: Set(journal.journal_number.clone()),
        idempotency_key: Set(journal.idempotency_key.clone()),
        created_by: Set(journal.created_by.into_inner()),
        created_at: Set(journal.created_at.into()),
        updated_by: Set(journal.updated_by.into_inner()),
        updated_at: Set(journal.updated_at.into()),
        posted_by: Set(journal.posted_by.map(|u| u.into_inner())),
        posted_at: Set(journal.posted_at.map(Into::into)),
        reverses_journal_id: Set(journal.reverses_journal_id.map(|j| j.into_inner())),
        metadata: Set(serde_json::Value::Object(journal.metadata.clone())),
    }
}

pub(crate) fn line_active(line: &JournalLine) -> Result<journal_lines::ActiveModel, StoreError> {
    Ok(journal_lines::ActiveModel {
        id: Set(line.id.into_inner()),
        journal_id: Set(line.journal_id.into_inner()),
        line_number: Set(to_i32(line.line_number, "line_number")?),
        account_id: Set(line.account_id.into_inner()),
        description: Set(line.description.clone()),
        debit: Set(line.debit),
        credit: Set(line.credit),
        currency: Set(line.currency.clone()),
        exchange_rate: Set(line.exchange_rate),
        functional_debit: Set(line.functional_debit),
        functional_credit: Set(line.functional_credit),
        department: Set(line.dimensions.department.clone()),
        project: Set(line.dimensions.project.clone()),
        cost_center: Set(line.dimensions.cost_center.clone()),
        tax_code: Set(line.dimensions.tax_code.clone()),
    })
}

/// Ledger row to insert; `sequence` and `created_at` come from the database.
pub(crate) fn ledger_entry_active(entry: &GeneralLedgerEntry) -> general_ledger_entries::ActiveModel {
    general_ledger_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        sequence: NotSet,
        organization_id: Set(entry.organization_id.into_inner()),
        account_id: Set(entry.account_id.into_inner()),
        journal_id: Set(entry.journal_id.into_inner()),
        journal_line_id: Set(entry.journal_line_id.into_inner()),
        period_id: Set(entry.period_id.into_inner()),
        transaction_date: Set(entry.transaction_date),
        debit: Set(entry.debit),
        credit: Set(entry.credit),
        functional_debit: Set(entry.functional_debit),
        functional_credit: Set(entry.functional_credit),
        balance_after: Set(entry.balance_after),
        currency: Set(entry.currency.clone()),
        exchange_rate: Set(entry.exchange_rate),
        department: Set(entry.dimensions.department.clone()),
        project: Set(entry.dimensions.project.clone()),
        cost_center: Set(entry.dimensions.cost_center.clone()),
        tax_code: Set(entry.dimensions.tax_code.clone()),
        closing_type: Set(entry.closing_type.map(Into::into)),
        created_at: NotSet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use corebook_core::ledger::{JournalStatus, metadata};
    use corebook_shared::types::{AccountId, JournalTypeId, OrganizationId, PeriodId, UserId};
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use sea_orm::ActiveValue;

    fn journal() -> Journal {
        let mut journal = Journal::draft(
            OrganizationId::new(),
            JournalTypeId::new(),
            PeriodId::new(),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            "Cash sale",
            "USD",
            UserId::new(),
        );
        journal.status = JournalStatus::Approved;
        journal.tag(metadata::CLOSING_TYPE, "year_end");
        journal.push_debit(AccountId::new(), dec!(100)).dimensions.project = Some("P-7".into());
        journal.push_credit(AccountId::new(), dec!(100));
        journal
    }

    fn stored_lines(journal: &Journal) -> Vec<journal_lines::Model> {
        journal
            .lines
            .iter()
            .map(|line| {
                let active = line_active(line).unwrap();
                journal_lines::Model {
                    id: active.id.unwrap(),
                    journal_id: active.journal_id.unwrap(),
                    line_number: active.line_number.unwrap(),
                    account_id: active.account_id.unwrap(),
                    description: active.description.unwrap(),
                    debit: active.debit.unwrap(),
                    credit: active.credit.unwrap(),
                    currency: active.currency.unwrap(),
                    exchange_rate: active.exchange_rate.unwrap(),
                    functional_debit: active.functional_debit.unwrap(),
                    functional_credit: active.functional_credit.unwrap(),
                    department: active.department.unwrap(),
                    project: active.project.unwrap(),
                    cost_center: active.cost_center.unwrap(),
                    tax_code: active.tax_code.unwrap(),
                }
            })
            .collect()
    }

    #[test]
    fn test_journal_survives_storage_shape() {
        let original = journal();
        let header = journal_active(&original);
        let model = journals::Model {
            id: header.id.unwrap(),
            organization_id: header.organization_id.unwrap(),
            journal_type_id: header.journal_type_id.unwrap(),
            period_id: header.period_id.unwrap(),
            journal_date: header.journal_date.unwrap(),
            reference: header.reference.unwrap(),
            description: header.description.unwrap(),
            currency: header.currency.unwrap(),
            exchange_rate: header.exchange_rate.unwrap(),
            status: header.status.unwrap(),
            is_locked: header.is_locked.unwrap(),
            journal_number: header.journal_number.unwrap(),
            idempotency_key: header.idempotency_key.unwrap(),
            created_by: header.created_by.unwrap(),
            created_at: header.created_at.unwrap(),
            updated_by: header.updated_by.unwrap(),
            updated_at: header.updated_at.unwrap(),
            posted_by: header.posted_by.unwrap(),
            posted_at: header.posted_at.unwrap(),
            reverses_journal_id: header.reverses_journal_id.unwrap(),
            metadata: header.metadata.unwrap(),
        };

        let restored = journal_from(model, stored_lines(&original)).unwrap();
        assert_eq!(restored, original);
        assert_eq!(restored.lines[0].dimensions.project.as_deref(), Some("P-7"));
    }

    #[test]
    fn test_non_object_metadata_reads_as_empty() {
        assert!(metadata_map(serde_json::Value::Null).is_empty());
        assert!(metadata_map(serde_json::json!(["year_end"])).is_empty());
    }

    #[test]
    fn test_ledger_row_leaves_sequence_to_database() {
        let journal = journal();
        let line = &journal.lines[0];
        let entry = GeneralLedgerEntry {
            id: corebook_shared::types::LedgerEntryId::new(),
            organization_id: journal.organization_id,
            account_id: line.account_id,
            journal_id: journal.id,
            journal_line_id: line.id,
            period_id: journal.period_id,
            transaction_date: journal.journal_date,
            debit: line.debit,
            credit: line.credit,
            functional_debit: dec!(100),
            functional_credit: dec!(0),
            balance_after: dec!(100),
            currency: "USD".into(),
            exchange_rate: dec!(1),
            dimensions: line.dimensions.clone(),
            closing_type: journal.closing_type(),
            created_at: Utc::now(),
            sequence: 0,
        };
        let active = ledger_entry_active(&entry);
        assert!(matches!(active.sequence, ActiveValue::NotSet));
        assert!(matches!(active.created_at, ActiveValue::NotSet));
        assert_eq!(
            active.closing_type,
            ActiveValue::Set(Some(crate::entities::sea_orm_active_enums::ClosingType::YearEnd))
        );
    }

    #[rstest]
    #[case(0, true)]
    #[case(4, true)]
    #[case(-1, false)]
    fn test_negative_stored_numbers_rejected(#[case] stored: i32, #[case] ok: bool) {
        assert_eq!(to_u32(stored, "padding").is_ok(), ok);
    }

    #[test]
    fn test_errors_without_sqlstate_map_to_backend() {
        let err = DbErr::RecordNotInserted;
        assert!(matches!(store_error(err), StoreError::Backend(_)));
    }

    #[test]
    fn test_non_database_driver_errors_carry_no_sqlstate() {
        assert_eq!(database_code(&sqlx::Error::RowNotFound), None);
        assert_eq!(database_code(&sqlx::Error::PoolTimedOut), None);
    }
}
