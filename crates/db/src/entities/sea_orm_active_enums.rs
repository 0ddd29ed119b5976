//! `SeaORM` active enums mirroring the Postgres enum types.

use corebook_core::fiscal;
use corebook_core::ledger;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "journal_status")]
pub enum JournalStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "awaiting_approval")]
    AwaitingApproval,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "posted")]
    Posted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "reversed")]
    Reversed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_nature")]
pub enum AccountNature {
    #[sea_orm(string_value = "asset")]
    Asset,
    #[sea_orm(string_value = "liability")]
    Liability,
    #[sea_orm(string_value = "equity")]
    Equity,
    #[sea_orm(string_value = "income")]
    Income,
    #[sea_orm(string_value = "expense")]
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "fiscal_year_status")]
pub enum FiscalYearStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "period_status")]
pub enum PeriodStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "numbering_scope")]
pub enum NumberingScope {
    #[sea_orm(string_value = "period")]
    Period,
    #[sea_orm(string_value = "fiscal_year")]
    FiscalYear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "closing_type")]
pub enum ClosingType {
    #[sea_orm(string_value = "year_end")]
    YearEnd,
    #[sea_orm(string_value = "year_opening")]
    YearOpening,
}

/// Generates the two `From` impls between a stored enum and its domain twin.
macro_rules! mirror_enum {
    ($db:ident <=> $module:ident :: $domain:ident { $($variant:ident),+ $(,)? }) => {
        impl From<$db> for $module::$domain {
            fn from(value: $db) -> Self {
                match value {
                    $($db::$variant => Self::$variant,)+
                }
            }
        }

        impl From<$module::$domain> for $db {
            fn from(value: $module::$domain) -> Self {
                match value {
                    $($module::$domain::$variant => Self::$variant,)+
                }
            }
        }
    };
}

mirror_enum!(JournalStatus <=> ledger::JournalStatus {
    Draft,
    AwaitingApproval,
    Approved,
    Posted,
    Rejected,
    Reversed,
});
mirror_enum!(AccountNature <=> ledger::AccountNature {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
});
mirror_enum!(FiscalYearStatus <=> fiscal::FiscalYearStatus { Open, Closed });
mirror_enum!(PeriodStatus <=> fiscal::PeriodStatus { Open, Closed, Adjustment });
mirror_enum!(NumberingScope <=> ledger::NumberingScope { Period, FiscalYear });
mirror_enum!(ClosingType <=> ledger::ClosingType { YearEnd, YearOpening });
