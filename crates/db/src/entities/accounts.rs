//! `SeaORM` Entity for accounts table.

use super::sea_orm_active_enums::AccountNature;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub code: String,
    pub name: String,
    pub nature: AccountNature,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub current_balance: Decimal,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::general_ledger_entries::Entity")]
    GeneralLedgerEntries,
}

impl Related<super::general_ledger_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GeneralLedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
