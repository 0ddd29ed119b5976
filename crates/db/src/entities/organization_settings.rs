//! `SeaORM` Entity for organization_settings table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "organization_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub organization_id: Uuid,
    pub base_currency: String,
    pub retained_earnings_account_id: Option<Uuid>,
    pub rollover_adjustment_account_id: Option<Uuid>,
    pub closing_journal_type_id: Option<Uuid>,
    pub auto_rollover_closing: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
