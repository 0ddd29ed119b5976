//! `SeaORM` entity definitions, one module per table.

#![allow(missing_docs)]

pub mod accounting_periods;
pub mod accounts;
pub mod exchange_rates;
pub mod fiscal_years;
pub mod general_ledger_entries;
pub mod journal_lines;
pub mod journal_sequences;
pub mod journal_types;
pub mod journals;
pub mod organization_settings;
pub mod sea_orm_active_enums;
