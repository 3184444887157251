use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::subscription::{BillingCycle, CurrencyCode, SubscriptionStatus, Tier};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionStatusResponse {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub effective_tier: Tier,
    pub billing_cycle: Option<BillingCycle>,
    pub currency: CurrencyCode,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub is_in_grace_period: bool,
    pub grace_period_hours_remaining: i64,
    pub payment_method_last4: Option<String>,
    pub payment_method_brand: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceUsage {
    pub resource: String,
    pub used: i64,
    /// -1 means unlimited, 0 means disabled for the tier.
    pub limit: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsageStatusResponse {
    pub resources: Vec<ResourceUsage>,
    pub period_resets_in_days: i64,
    pub tier: Tier,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeatureAccessResponse {
    pub feature: String,
    pub has_access: bool,
    pub tier: Tier,
    pub required_tier: Option<Tier>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub tier: Tier,
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub currency: CurrencyCode,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutStatusResponse {
    pub session_id: String,
    /// Stripe session status: open, complete or expired.
    pub status: String,
    /// Stripe payment status: unpaid, paid or no_payment_required.
    pub payment_status: String,
    /// True once the subscription activation has been applied locally.
    pub applied: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PricingQuery {
    pub currency: Option<String>,
}
