use std::collections::HashMap;
use std::str::FromStr;

use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionLineItemsPriceDataRecurring,
    CreateCheckoutSessionLineItemsPriceDataRecurringInterval,
    CreateCheckoutSessionSubscriptionData, Event, Subscription, SubscriptionId,
    UpdateSubscription, Webhook,
};

use crate::config::StripeConfig;
use crate::error::{AppError, AppResult};
use crate::subscription::{BillingCycle, CurrencyCode, Tier};

/// Everything needed to open a subscription checkout. The metadata bag
/// attached here is echoed back on every later webhook event for the
/// resulting subscription.
pub struct SubscriptionCheckout<'a> {
    pub tenant_id: &'a str,
    pub tier: Tier,
    pub billing_cycle: BillingCycle,
    pub currency: CurrencyCode,
    pub amount_cents: i64,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Clone)]
pub struct StripeService {
    client: Client,
    config: StripeConfig,
}

impl StripeService {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(config.secret_key.clone()),
            config,
        }
    }

    fn stripe_currency(code: CurrencyCode) -> stripe::Currency {
        match code {
            CurrencyCode::Aud => stripe::Currency::AUD,
            CurrencyCode::Usd => stripe::Currency::USD,
            CurrencyCode::Eur => stripe::Currency::EUR,
            CurrencyCode::Gbp => stripe::Currency::GBP,
        }
    }

    /// Create a Checkout session in subscription mode with inline price data.
    /// Metadata is set on both the session and the subscription so invoice
    /// events can be attributed to the tenant later.
    pub async fn create_subscription_checkout(
        &self,
        checkout: SubscriptionCheckout<'_>,
    ) -> AppResult<CheckoutSession> {
        let tier_name = match checkout.tier {
            Tier::Basic => "Basic",
            Tier::Premium => "Premium",
            Tier::Free => {
                return Err(AppError::ValidationError(
                    "Free tier has no checkout".into(),
                ));
            }
        };

        let mut metadata = HashMap::new();
        metadata.insert("tenant_id".to_string(), checkout.tenant_id.to_string());
        metadata.insert("tier".to_string(), checkout.tier.to_string());
        metadata.insert(
            "billing_cycle".to_string(),
            checkout.billing_cycle.to_string(),
        );
        metadata.insert("currency".to_string(), checkout.currency.to_string());
        metadata.insert("subscription_type".to_string(), "new".to_string());

        let interval = match checkout.billing_cycle {
            BillingCycle::Annual => CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Year,
            BillingCycle::Monthly => CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Month,
        };

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Subscription);
        params.success_url = Some(&checkout.success_url);
        params.cancel_url = Some(&checkout.cancel_url);
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Self::stripe_currency(checkout.currency),
                unit_amount: Some(checkout.amount_cents),
                recurring: Some(CreateCheckoutSessionLineItemsPriceDataRecurring {
                    interval,
                    interval_count: None,
                }),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: format!("PostPilot {tier_name} Plan"),
                    description: Some(format!(
                        "{} subscription",
                        match checkout.billing_cycle {
                            BillingCycle::Annual => "Annual",
                            BillingCycle::Monthly => "Monthly",
                        }
                    )),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);
        params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
            metadata: Some(metadata.clone()),
            ..Default::default()
        });
        params.metadata = Some(metadata);

        let session = CheckoutSession::create(&self.client, params).await?;
        Ok(session)
    }

    /// Retrieve a session with subscription and customer expanded.
    pub async fn retrieve_checkout_session(&self, session_id: &str) -> AppResult<CheckoutSession> {
        let id = CheckoutSessionId::from_str(session_id)
            .map_err(|_| AppError::ValidationError("Invalid checkout session id".into()))?;
        let session =
            CheckoutSession::retrieve(&self.client, &id, &["subscription", "customer"]).await?;
        Ok(session)
    }

    /// Retrieve a subscription, mainly for the metadata bag attached at
    /// checkout time.
    pub async fn retrieve_subscription(&self, subscription_id: &str) -> AppResult<Subscription> {
        let id = SubscriptionId::from_str(subscription_id)
            .map_err(|_| AppError::ValidationError("Invalid subscription id".into()))?;
        let sub = Subscription::retrieve(&self.client, &id, &[]).await?;
        Ok(sub)
    }

    /// Flip the provider-side cancel-at-period-end flag.
    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> AppResult<()> {
        let id = SubscriptionId::from_str(subscription_id)
            .map_err(|_| AppError::ValidationError("Invalid subscription id".into()))?;
        let mut params = UpdateSubscription::new();
        params.cancel_at_period_end = Some(cancel);
        Subscription::update(&self.client, &id, params).await?;
        Ok(())
    }

    /// Verify the webhook signature and parse the event.
    pub fn verify_webhook_event(&self, payload: &str, signature: &str) -> AppResult<Event> {
        Webhook::construct_event(payload, signature, &self.config.webhook_secret)
            .map_err(|e| AppError::AuthError(format!("Webhook signature verification failed: {e}")))
    }
}
