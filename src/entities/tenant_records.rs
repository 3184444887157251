use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// One row per tenant. Subscription and usage are stored whole as JSON and
/// always read, mutated in memory, and written back as one unit so the
/// invariants between their fields hold in one place.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tenant_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: String,
    pub subscription: Json,
    pub usage: Json,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
