//! `SeaORM` Entity for journals table.

use super::sea_orm_active_enums::JournalStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub journal_type_id: Uuid,
    pub period_id: Uuid,
    pub journal_date: Date,
    pub reference: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 10)))", nullable)]
    pub exchange_rate: Option<Decimal>,
    pub status: JournalStatus,
    pub is_locked: bool,
    pub journal_number: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_by: Uuid,
    pub updated_at: DateTimeWithTimeZone,
    pub posted_by: Option<Uuid>,
    pub posted_at: Option<DateTimeWithTimeZone>,
    pub reverses_journal_id: Option<Uuid>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::journal_lines::Entity")]
    JournalLines,
    #[sea_orm(
        belongs_to = "super::journal_types::Entity",
        from = "Column::JournalTypeId",
        to = "super::journal_types::Column::Id"
    )]
    JournalTypes,
    #[sea_orm(
        belongs_to = "super::accounting_periods::Entity",
        from = "Column::PeriodId",
        to = "super::accounting_periods::Column::Id"
    )]
    AccountingPeriods,
}

impl Related<super::journal_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalLines.def()
    }
}

impl Related<super::journal_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalTypes.def()
    }
}

impl Related<super::accounting_periods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountingPeriods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
