//! `SeaORM` Entity for journal_types table.

use super::sea_orm_active_enums::NumberingScope;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_types")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub code: String,
    pub name: String,
    pub numbering_scope: NumberingScope,
    pub padding: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::journal_sequences::Entity")]
    JournalSequences,
    #[sea_orm(has_many = "super::journals::Entity")]
    Journals,
}

impl Related<super::journal_sequences::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalSequences.def()
    }
}

impl Related<super::journals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Journals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
