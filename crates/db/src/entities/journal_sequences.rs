//! `SeaORM` Entity for journal_sequences table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub journal_type_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub scope_id: Uuid,
    pub sequence_next: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::journal_types::Entity",
        from = "Column::JournalTypeId",
        to = "super::journal_types::Column::Id"
    )]
    JournalTypes,
}

impl Related<super::journal_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalTypes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
