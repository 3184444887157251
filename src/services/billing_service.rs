use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use stripe::{CheckoutSessionPaymentStatus, Event, EventObject, EventType, Expandable};

use crate::entities::{BillingTransactionStatus, billing_transaction_entity as bt};
use crate::error::{AppError, AppResult};
use crate::external::stripe::{StripeService, SubscriptionCheckout};
use crate::models::{CheckoutRequest, CheckoutStatusResponse, CreateCheckoutResponse};
use crate::services::tenant_service::TenantService;
use crate::subscription::{BillingCycle, CurrencyCode, Tier, catalog, period, state};

/// Billing event types this processor acts on. Anything else is acknowledged
/// and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEventType {
    CheckoutSessionCompleted,
    InvoicePaymentFailed,
    InvoicePaymentSucceeded,
    SubscriptionDeleted,
}

/// Typed view of the metadata bag attached at checkout-creation time and
/// echoed back by the provider. `tenant_id` is the one required field; the
/// rest default sensibly when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub tenant_id: String,
    pub tier: Option<Tier>,
    pub billing_cycle: Option<BillingCycle>,
    pub currency: Option<CurrencyCode>,
}

impl CheckoutMetadata {
    /// Validate the raw bag at the transport boundary. None when the tenant
    /// identifier is missing: there is nothing correct to do with such an
    /// event.
    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let tenant_id = map.get("tenant_id")?.clone();
        if tenant_id.is_empty() {
            return None;
        }
        Some(Self {
            tenant_id,
            tier: map.get("tier").and_then(|s| Tier::from_str_opt(s)),
            billing_cycle: map
                .get("billing_cycle")
                .and_then(|s| BillingCycle::from_str_opt(s)),
            currency: map.get("currency").and_then(|s| CurrencyCode::from_str_opt(s)),
        })
    }
}

/// A parsed, signature-verified billing event, reduced to what the state
/// machine needs.
#[derive(Debug, Clone)]
pub struct BillingEvent {
    pub event_type: BillingEventType,
    pub metadata: CheckoutMetadata,
    pub session_id: Option<String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

fn expandable_id<T: stripe::Object>(e: &Expandable<T>) -> String
where
    T::Id: ToString,
{
    match e {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(obj) => obj.id().to_string(),
    }
}

#[derive(Clone)]
pub struct BillingService {
    pool: DatabaseConnection,
    tenants: TenantService,
    stripe_service: StripeService,
    frontend_base_url: String,
}

impl BillingService {
    pub fn new(
        pool: DatabaseConnection,
        tenants: TenantService,
        stripe_service: StripeService,
        frontend_base_url: String,
    ) -> Self {
        Self {
            pool,
            tenants,
            stripe_service,
            frontend_base_url,
        }
    }

    /// Open a checkout session for a paid tier and record the pending
    /// transaction that later makes its completion idempotent.
    pub async fn create_checkout(
        &self,
        tenant_id: &str,
        req: CheckoutRequest,
    ) -> AppResult<CreateCheckoutResponse> {
        if req.tier == Tier::Free {
            return Err(AppError::ValidationError(
                "Cannot check out the free tier".into(),
            ));
        }
        let amount = catalog::price_cents(req.tier, req.billing_cycle, req.currency);
        if amount == 0 {
            // a paid tier resolving to zero is a price-table problem; deny
            // rather than start a free checkout
            return Err(AppError::ConfigError(format!(
                "No price configured for {}/{}/{}",
                req.tier, req.billing_cycle, req.currency
            )));
        }

        let session = self
            .stripe_service
            .create_subscription_checkout(SubscriptionCheckout {
                tenant_id,
                tier: req.tier,
                billing_cycle: req.billing_cycle,
                currency: req.currency,
                amount_cents: amount,
                success_url: format!(
                    "{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.frontend_base_url
                ),
                cancel_url: format!("{}/billing/cancelled", self.frontend_base_url),
            })
            .await?;

        let session_id = session.id.to_string();
        bt::ActiveModel {
            tenant_id: Set(tenant_id.to_string()),
            session_id: Set(session_id.clone()),
            tier: Set(req.tier.to_string()),
            billing_cycle: Set(req.billing_cycle.to_string()),
            currency: Set(req.currency.to_string()),
            amount: Set(amount),
            status: Set(BillingTransactionStatus::Pending),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        Ok(CreateCheckoutResponse {
            session_id,
            checkout_url: session.url.unwrap_or_default(),
        })
    }

    /// Poll a session and, when paid, apply the activation through the same
    /// once-only transaction guard the webhook path uses. Whichever side
    /// lands first wins; the other is a no-op.
    pub async fn checkout_status(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> AppResult<CheckoutStatusResponse> {
        let txn = bt::Entity::find()
            .filter(bt::Column::SessionId.eq(session_id))
            .filter(bt::Column::TenantId.eq(tenant_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Checkout session not found".into()))?;

        let session = self.stripe_service.retrieve_checkout_session(session_id).await?;
        let paid = session.payment_status == CheckoutSessionPaymentStatus::Paid;

        let mut applied = txn.status == BillingTransactionStatus::Completed;
        if paid && !applied {
            let metadata = CheckoutMetadata {
                tenant_id: tenant_id.to_string(),
                tier: Tier::from_str_opt(&txn.tier),
                billing_cycle: BillingCycle::from_str_opt(&txn.billing_cycle),
                currency: CurrencyCode::from_str_opt(&txn.currency),
            };
            let event = BillingEvent {
                event_type: BillingEventType::CheckoutSessionCompleted,
                metadata,
                session_id: Some(session_id.to_string()),
                customer_id: session.customer.as_ref().map(expandable_id),
                subscription_id: session.subscription.as_ref().map(expandable_id),
            };
            self.process_event(event).await?;
            applied = true;
        }

        Ok(CheckoutStatusResponse {
            session_id: session_id.to_string(),
            status: session
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            payment_status: session.payment_status.to_string(),
            applied,
        })
    }

    /// Flag the subscription to stop renewing at period end. Entitlement is
    /// untouched until the provider confirms expiry.
    pub async fn cancel(&self, tenant_id: &str) -> AppResult<()> {
        let mut record = self.tenants.load(tenant_id).await?;
        let sub_id = record
            .subscription
            .stripe_subscription_id
            .clone()
            .ok_or_else(|| AppError::InvalidState("No active subscription to cancel".into()))?;

        self.stripe_service.set_cancel_at_period_end(&sub_id, true).await?;
        state::mark_cancelled(&mut record.subscription, Utc::now());
        self.tenants.save(tenant_id, &record).await
    }

    /// Undo a pending cancellation.
    pub async fn reactivate(&self, tenant_id: &str) -> AppResult<()> {
        let mut record = self.tenants.load(tenant_id).await?;
        let sub_id = record
            .subscription
            .stripe_subscription_id
            .clone()
            .ok_or_else(|| AppError::InvalidState("No subscription to reactivate".into()))?;

        state::mark_reactivated(&mut record.subscription)?;
        self.stripe_service.set_cancel_at_period_end(&sub_id, false).await?;
        self.tenants.save(tenant_id, &record).await
    }

    /// Translate a verified provider event and run it through the state
    /// machine. Unknown types and events without a tenant identifier are
    /// acknowledged and dropped.
    pub async fn process_stripe_event(&self, event: Event) -> AppResult<()> {
        let Some(billing_event) = self.translate_event(event).await? else {
            return Ok(());
        };
        self.process_event(billing_event).await
    }

    async fn translate_event(&self, event: Event) -> AppResult<Option<BillingEvent>> {
        let event_type = match event.type_ {
            EventType::CheckoutSessionCompleted => BillingEventType::CheckoutSessionCompleted,
            EventType::InvoicePaymentFailed => BillingEventType::InvoicePaymentFailed,
            EventType::InvoicePaymentSucceeded => BillingEventType::InvoicePaymentSucceeded,
            EventType::CustomerSubscriptionDeleted => BillingEventType::SubscriptionDeleted,
            other => {
                log::info!("Ignoring billing event type {other:?}");
                return Ok(None);
            }
        };

        let (raw_metadata, session_id, customer_id, subscription_id) = match event.data.object {
            EventObject::CheckoutSession(session) => (
                session.metadata.clone().unwrap_or_default(),
                Some(session.id.to_string()),
                session.customer.as_ref().map(expandable_id),
                session.subscription.as_ref().map(expandable_id),
            ),
            EventObject::Invoice(invoice) => {
                let subscription_id = invoice.subscription.as_ref().map(expandable_id);
                let raw = match invoice.subscription.as_ref() {
                    Some(Expandable::Object(sub)) => sub.metadata.clone(),
                    Some(Expandable::Id(id)) => {
                        // the webhook payload carries the bare id; the bag
                        // lives on the subscription object
                        match self.stripe_service.retrieve_subscription(id.as_ref()).await {
                            Ok(sub) => sub.metadata,
                            Err(e) => {
                                log::error!("Failed to fetch subscription {id} for invoice event: {e}");
                                HashMap::new()
                            }
                        }
                    }
                    None => HashMap::new(),
                };
                let customer_id = invoice.customer.as_ref().map(expandable_id);
                (raw, None, customer_id, subscription_id)
            }
            EventObject::Subscription(sub) => (
                sub.metadata.clone(),
                None,
                Some(expandable_id(&sub.customer)),
                Some(sub.id.to_string()),
            ),
            other => {
                log::warn!("Billing event carried an unexpected object: {other:?}");
                return Ok(None);
            }
        };

        match CheckoutMetadata::from_map(&raw_metadata) {
            Some(metadata) => Ok(Some(BillingEvent {
                event_type,
                metadata,
                session_id,
                customer_id,
                subscription_id,
            })),
            None => {
                log::warn!(
                    "Billing event {:?} has no tenant identifier in metadata, ignoring",
                    event_type
                );
                Ok(None)
            }
        }
    }

    /// The subscription state machine. Transitions are keyed purely by event
    /// type; no ordering check against provider timestamps is attempted.
    pub async fn process_event(&self, event: BillingEvent) -> AppResult<()> {
        let tenant_id = event.metadata.tenant_id.clone();
        let now = Utc::now();
        match event.event_type {
            BillingEventType::CheckoutSessionCompleted => {
                let Some(session_id) = event.session_id.clone() else {
                    log::warn!("checkout.session.completed without a session id, ignoring");
                    return Ok(());
                };
                if self.is_session_completed(&session_id).await? {
                    log::info!("Checkout session {session_id} already applied, skipping replay");
                    return Ok(());
                }

                let mut record = self.tenants.load(&tenant_id).await?;
                state::apply_checkout(
                    &mut record.subscription,
                    event.metadata.tier.unwrap_or(Tier::Basic),
                    event.metadata.billing_cycle.unwrap_or(BillingCycle::Monthly),
                    event.metadata.currency.unwrap_or_default(),
                    event.customer_id.clone(),
                    event.subscription_id.clone(),
                    now,
                );
                self.tenants.save(&tenant_id, &record).await?;
                self.mark_session_completed(&tenant_id, &session_id, &event).await?;
                log::info!(
                    "Activated {} subscription for tenant {tenant_id}",
                    record.subscription.tier
                );
            }
            BillingEventType::InvoicePaymentFailed => {
                let mut record = self.tenants.load(&tenant_id).await?;
                state::start_grace_period(&mut record.subscription, now);
                self.tenants.save(&tenant_id, &record).await?;
                log::warn!("Payment failed for tenant {tenant_id}, grace period opened");
            }
            BillingEventType::InvoicePaymentSucceeded => {
                let mut record = self.tenants.load(&tenant_id).await?;
                let cycle = record
                    .subscription
                    .billing_cycle
                    .or(event.metadata.billing_cycle)
                    .unwrap_or(BillingCycle::Monthly);
                state::clear_and_extend(&mut record.subscription, now, cycle);
                // a paying tenant's quota renews when they pay, not on the 1st
                period::reset_monthly(&mut record.usage, now);
                self.tenants.save(&tenant_id, &record).await?;
                log::info!("Payment recovered for tenant {tenant_id}, period extended");
            }
            BillingEventType::SubscriptionDeleted => {
                let mut record = self.tenants.load(&tenant_id).await?;
                state::mark_expired(&mut record.subscription);
                self.tenants.save(&tenant_id, &record).await?;
                log::info!("Subscription expired for tenant {tenant_id}, reverted to free");
            }
        }
        Ok(())
    }

    async fn is_session_completed(&self, session_id: &str) -> AppResult<bool> {
        let txn = bt::Entity::find()
            .filter(bt::Column::SessionId.eq(session_id))
            .one(&self.pool)
            .await?;
        Ok(matches!(
            txn,
            Some(t) if t.status == BillingTransactionStatus::Completed
        ))
    }

    async fn mark_session_completed(
        &self,
        tenant_id: &str,
        session_id: &str,
        event: &BillingEvent,
    ) -> AppResult<()> {
        let existing = bt::Entity::find()
            .filter(bt::Column::SessionId.eq(session_id))
            .one(&self.pool)
            .await?;
        match existing {
            Some(txn) => {
                let mut am = txn.into_active_model();
                am.status = Set(BillingTransactionStatus::Completed);
                am.updated_at = Set(Some(Utc::now()));
                am.update(&self.pool).await?;
            }
            None => {
                // checkout was created elsewhere (another instance, provider
                // dashboard); record it so replays still short-circuit
                bt::ActiveModel {
                    tenant_id: Set(tenant_id.to_string()),
                    session_id: Set(session_id.to_string()),
                    tier: Set(event
                        .metadata
                        .tier
                        .unwrap_or(Tier::Basic)
                        .to_string()),
                    billing_cycle: Set(event
                        .metadata
                        .billing_cycle
                        .unwrap_or(BillingCycle::Monthly)
                        .to_string()),
                    currency: Set(event.metadata.currency.unwrap_or_default().to_string()),
                    amount: Set(0),
                    status: Set(BillingTransactionStatus::Completed),
                    created_at: Set(Some(Utc::now())),
                    updated_at: Set(Some(Utc::now())),
                    ..Default::default()
                }
                .insert(&self.pool)
                .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_requires_tenant_id() {
        let mut map = HashMap::new();
        map.insert("tier".to_string(), "premium".to_string());
        assert_eq!(CheckoutMetadata::from_map(&map), None);

        map.insert("tenant_id".to_string(), String::new());
        assert_eq!(CheckoutMetadata::from_map(&map), None);

        map.insert("tenant_id".to_string(), "user_1".to_string());
        let meta = CheckoutMetadata::from_map(&map).unwrap();
        assert_eq!(meta.tenant_id, "user_1");
        assert_eq!(meta.tier, Some(Tier::Premium));
        assert_eq!(meta.billing_cycle, None);
    }

    #[test]
    fn test_metadata_ignores_unparseable_fields() {
        let mut map = HashMap::new();
        map.insert("tenant_id".to_string(), "user_2".to_string());
        map.insert("tier".to_string(), "platinum".to_string());
        map.insert("billing_cycle".to_string(), "weekly".to_string());
        map.insert("currency".to_string(), "usd".to_string());
        let meta = CheckoutMetadata::from_map(&map).unwrap();
        assert_eq!(meta.tier, None);
        assert_eq!(meta.billing_cycle, None);
        assert_eq!(meta.currency, Some(CurrencyCode::Usd));
    }
}
