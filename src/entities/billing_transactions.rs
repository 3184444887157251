use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "billing_transaction_status"
)]
#[serde(rename_all = "snake_case")]
pub enum BillingTransactionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl std::fmt::Display for BillingTransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingTransactionStatus::Pending => write!(f, "pending"),
            BillingTransactionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Idempotency ledger for checkout sessions. A `completed` row makes any
/// replay of the same session id a no-op, whether it arrives via webhook or
/// the status-poll endpoint.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "billing_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant_id: String,
    #[sea_orm(unique)]
    pub session_id: String,
    pub tier: String,
    pub billing_cycle: String,
    pub currency: String,
    pub amount: i64,
    pub status: BillingTransactionStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
