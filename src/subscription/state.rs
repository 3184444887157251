use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, AppResult};

use super::tier::{BillingCycle, CurrencyCode, SubscriptionStatus, Tier};
use super::records::SubscriptionData;

/// Fixed policy: how long a tenant keeps paid access after a failed payment.
pub const GRACE_PERIOD_HOURS: i64 = 48;

/// Billing period lengths are fixed day counts, deliberately distinct from the
/// calendar-month arithmetic of the usage window.
const MONTHLY_PERIOD_DAYS: i64 = 30;
const ANNUAL_PERIOD_DAYS: i64 = 365;

/// The tier actually granted right now, accounting for the grace period.
///
/// Every entitlement decision flows through here. Any status other than
/// `Active` or an unexpired `PastDue` grace window falls through to `Free`,
/// including status values this build does not know about.
pub fn effective_tier(sub: &SubscriptionData, now: DateTime<Utc>) -> Tier {
    if sub.tier == Tier::Free {
        return Tier::Free;
    }
    if sub.status == SubscriptionStatus::Active {
        return sub.tier;
    }
    if sub.status == SubscriptionStatus::PastDue
        && let Some(grace_end) = sub.grace_period_ends
        && now < grace_end
    {
        return sub.tier;
    }
    Tier::Free
}

pub fn is_in_grace_period(sub: &SubscriptionData, now: DateTime<Utc>) -> bool {
    sub.status == SubscriptionStatus::PastDue
        && sub.grace_period_ends.is_some_and(|end| now < end)
}

/// Whole hours left in the grace window. Zero when not in a grace period,
/// never negative.
pub fn grace_hours_remaining(sub: &SubscriptionData, now: DateTime<Utc>) -> i64 {
    if !is_in_grace_period(sub, now) {
        return 0;
    }
    match sub.grace_period_ends {
        Some(end) => (end - now).num_hours().max(0),
        None => 0,
    }
}

/// A payment attempt failed: open the 48-hour grace window.
pub fn start_grace_period(sub: &mut SubscriptionData, now: DateTime<Utc>) {
    sub.status = SubscriptionStatus::PastDue;
    sub.payment_failed_at = Some(now);
    sub.grace_period_ends = Some(now + Duration::hours(GRACE_PERIOD_HOURS));
}

fn billing_period_end(now: DateTime<Utc>, cycle: BillingCycle) -> DateTime<Utc> {
    match cycle {
        BillingCycle::Annual => now + Duration::days(ANNUAL_PERIOD_DAYS),
        BillingCycle::Monthly => now + Duration::days(MONTHLY_PERIOD_DAYS),
    }
}

/// A payment succeeded: close any grace window and advance the paid period.
pub fn clear_and_extend(sub: &mut SubscriptionData, now: DateTime<Utc>, cycle: BillingCycle) {
    sub.status = SubscriptionStatus::Active;
    sub.payment_failed_at = None;
    sub.grace_period_ends = None;
    sub.current_period_start = Some(now);
    sub.current_period_end = Some(billing_period_end(now, cycle));
}

/// Activate a subscription from a completed checkout. Also the reactivation
/// path after a previously-cancelled subscription resumes: stale cancellation
/// and grace fields are cleared unconditionally.
pub fn apply_checkout(
    sub: &mut SubscriptionData,
    tier: Tier,
    cycle: BillingCycle,
    currency: CurrencyCode,
    customer_id: Option<String>,
    subscription_id: Option<String>,
    now: DateTime<Utc>,
) {
    sub.tier = tier;
    sub.status = SubscriptionStatus::Active;
    sub.billing_cycle = Some(cycle);
    sub.currency = currency;
    sub.current_period_start = Some(now);
    sub.current_period_end = Some(billing_period_end(now, cycle));
    sub.cancelled_at = None;
    sub.cancel_at_period_end = false;
    sub.payment_failed_at = None;
    sub.grace_period_ends = None;
    sub.stripe_customer_id = customer_id;
    sub.stripe_subscription_id = subscription_id;
}

/// Flag the subscription to stop renewing. Tier and status stay untouched:
/// full entitlement is retained until the provider confirms the period ended.
pub fn mark_cancelled(sub: &mut SubscriptionData, now: DateTime<Utc>) {
    sub.cancel_at_period_end = true;
    sub.cancelled_at = Some(now);
}

/// Undo a pending cancellation. Rejected when there is nothing to revert so
/// callers can gate the action in their UI.
pub fn mark_reactivated(sub: &mut SubscriptionData) -> AppResult<()> {
    if !sub.cancel_at_period_end {
        return Err(AppError::InvalidState(
            "Subscription is not pending cancellation".into(),
        ));
    }
    sub.cancel_at_period_end = false;
    sub.cancelled_at = None;
    Ok(())
}

/// Terminal downgrade once the provider confirms the subscription is gone.
/// Every billing reference is cleared; a later checkout starts a fresh cycle.
pub fn mark_expired(sub: &mut SubscriptionData) {
    sub.tier = Tier::Free;
    sub.status = SubscriptionStatus::Expired;
    sub.billing_cycle = None;
    sub.stripe_customer_id = None;
    sub.stripe_subscription_id = None;
    sub.stripe_price_id = None;
    sub.current_period_start = None;
    sub.current_period_end = None;
    sub.cancelled_at = None;
    sub.cancel_at_period_end = false;
    sub.payment_failed_at = None;
    sub.grace_period_ends = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 6, 12, 0, 0).unwrap()
    }

    fn paid_sub(tier: Tier, status: SubscriptionStatus) -> SubscriptionData {
        SubscriptionData {
            tier,
            status,
            billing_cycle: Some(BillingCycle::Monthly),
            stripe_customer_id: Some("cus_123".into()),
            stripe_subscription_id: Some("sub_123".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_free_tier_ignores_status_and_grace_fields() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
        ] {
            let sub = SubscriptionData {
                tier: Tier::Free,
                status,
                grace_period_ends: Some(now() + Duration::hours(5)),
                ..Default::default()
            };
            assert_eq!(effective_tier(&sub, now()), Tier::Free);
        }
    }

    #[test]
    fn test_active_passes_tier_through() {
        let sub = paid_sub(Tier::Premium, SubscriptionStatus::Active);
        assert_eq!(effective_tier(&sub, now()), Tier::Premium);
        assert_eq!(effective_tier(&sub, now() + Duration::days(400)), Tier::Premium);
    }

    #[test]
    fn test_grace_period_boundary() {
        let grace_end = now() + Duration::hours(10);
        let mut sub = paid_sub(Tier::Basic, SubscriptionStatus::PastDue);
        sub.grace_period_ends = Some(grace_end);

        assert_eq!(
            effective_tier(&sub, grace_end - Duration::seconds(1)),
            Tier::Basic
        );
        assert_eq!(effective_tier(&sub, grace_end), Tier::Free);
        assert_eq!(
            effective_tier(&sub, grace_end + Duration::seconds(1)),
            Tier::Free
        );
    }

    #[test]
    fn test_past_due_without_grace_end_is_free() {
        let sub = paid_sub(Tier::Premium, SubscriptionStatus::PastDue);
        assert_eq!(effective_tier(&sub, now()), Tier::Free);
    }

    #[test]
    fn test_expired_is_free() {
        let sub = paid_sub(Tier::Premium, SubscriptionStatus::Expired);
        assert_eq!(effective_tier(&sub, now()), Tier::Free);
    }

    #[test]
    fn test_unrecognized_status_fails_safe_to_free() {
        let mut sub = paid_sub(Tier::Premium, SubscriptionStatus::Unknown);
        // even with a live grace window attached, only past_due honors it
        sub.grace_period_ends = Some(now() + Duration::hours(10));
        assert_eq!(effective_tier(&sub, now()), Tier::Free);
    }

    #[test]
    fn test_grace_hours_monotone_and_floored() {
        let mut sub = paid_sub(Tier::Basic, SubscriptionStatus::PastDue);
        sub.grace_period_ends = Some(now() + Duration::hours(GRACE_PERIOD_HOURS));

        let mut last = i64::MAX;
        for h in 0..=50 {
            let remaining = grace_hours_remaining(&sub, now() + Duration::hours(h));
            assert!(remaining <= last);
            assert!(remaining >= 0);
            last = remaining;
        }
        assert_eq!(grace_hours_remaining(&sub, now()), GRACE_PERIOD_HOURS);
        assert_eq!(
            grace_hours_remaining(&sub, now() + Duration::hours(100)),
            0
        );
        // active subscriptions are never "in grace"
        let active = paid_sub(Tier::Basic, SubscriptionStatus::Active);
        assert_eq!(grace_hours_remaining(&active, now()), 0);
    }

    #[test]
    fn test_start_grace_period_sets_both_fields() {
        let mut sub = paid_sub(Tier::Premium, SubscriptionStatus::Active);
        start_grace_period(&mut sub, now());
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        assert_eq!(sub.payment_failed_at, Some(now()));
        assert_eq!(
            sub.grace_period_ends,
            Some(now() + Duration::hours(GRACE_PERIOD_HOURS))
        );
        assert!(is_in_grace_period(&sub, now()));
    }

    #[test]
    fn test_checkout_activation_scenario() {
        // new tenant completes a premium/annual/usd checkout
        let mut sub = SubscriptionData::default();
        apply_checkout(
            &mut sub,
            Tier::Premium,
            BillingCycle::Annual,
            CurrencyCode::Usd,
            Some("cus_9".into()),
            Some("sub_9".into()),
            now(),
        );
        assert_eq!(effective_tier(&sub, now()), Tier::Premium);
        assert_eq!(sub.current_period_end, Some(now() + Duration::days(365)));
        assert_eq!(sub.stripe_subscription_id.as_deref(), Some("sub_9"));
        assert_eq!(sub.currency, CurrencyCode::Usd);
    }

    #[test]
    fn test_apply_checkout_is_idempotent() {
        let apply = |sub: &mut SubscriptionData| {
            apply_checkout(
                sub,
                Tier::Basic,
                BillingCycle::Monthly,
                CurrencyCode::Aud,
                Some("cus_1".into()),
                Some("sub_1".into()),
                now(),
            )
        };
        let mut once = SubscriptionData::default();
        apply(&mut once);
        let mut twice = once.clone();
        apply(&mut twice);
        assert_eq!(once, twice);
        // in particular the paid period is not extended twice
        assert_eq!(twice.current_period_end, Some(now() + Duration::days(30)));
    }

    #[test]
    fn test_checkout_clears_stale_cancellation_and_grace() {
        let mut sub = paid_sub(Tier::Basic, SubscriptionStatus::PastDue);
        sub.cancel_at_period_end = true;
        sub.cancelled_at = Some(now() - Duration::days(3));
        sub.payment_failed_at = Some(now() - Duration::days(1));
        sub.grace_period_ends = Some(now() + Duration::hours(10));
        apply_checkout(
            &mut sub,
            Tier::Premium,
            BillingCycle::Monthly,
            CurrencyCode::Aud,
            Some("cus_1".into()),
            Some("sub_2".into()),
            now(),
        );
        assert!(!sub.cancel_at_period_end);
        assert_eq!(sub.cancelled_at, None);
        assert_eq!(sub.payment_failed_at, None);
        assert_eq!(sub.grace_period_ends, None);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn test_payment_failure_then_recovery() {
        // scenario: active premium -> payment fails -> 47h ok, 49h downgraded
        let mut sub = paid_sub(Tier::Premium, SubscriptionStatus::Active);
        start_grace_period(&mut sub, now());
        assert_eq!(
            effective_tier(&sub, now() + Duration::hours(47)),
            Tier::Premium
        );
        assert_eq!(effective_tier(&sub, now() + Duration::hours(49)), Tier::Free);

        // recovery: payment succeeds inside the window
        let recovered_at = now() + Duration::hours(20);
        clear_and_extend(&mut sub, recovered_at, BillingCycle::Monthly);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.payment_failed_at, None);
        assert_eq!(sub.grace_period_ends, None);
        assert_eq!(
            sub.current_period_end,
            Some(recovered_at + Duration::days(30))
        );
        assert_eq!(effective_tier(&sub, recovered_at), Tier::Premium);
    }

    #[test]
    fn test_cancel_keeps_entitlement_until_provider_confirms() {
        let mut sub = paid_sub(Tier::Premium, SubscriptionStatus::Active);
        mark_cancelled(&mut sub, now());
        assert!(sub.cancel_at_period_end);
        assert_eq!(sub.cancelled_at, Some(now()));
        assert_eq!(effective_tier(&sub, now()), Tier::Premium);

        mark_expired(&mut sub);
        assert_eq!(sub.tier, Tier::Free);
        assert_eq!(sub.status, SubscriptionStatus::Expired);
        assert_eq!(sub.stripe_customer_id, None);
        assert_eq!(sub.stripe_subscription_id, None);
        assert_eq!(sub.stripe_price_id, None);
        assert_eq!(sub.current_period_end, None);
        assert_eq!(effective_tier(&sub, now()), Tier::Free);
    }

    #[test]
    fn test_reactivate_requires_pending_cancellation() {
        let mut sub = paid_sub(Tier::Basic, SubscriptionStatus::Active);
        assert!(mark_reactivated(&mut sub).is_err());

        mark_cancelled(&mut sub, now());
        mark_reactivated(&mut sub).unwrap();
        assert!(!sub.cancel_at_period_end);
        assert_eq!(sub.cancelled_at, None);
    }
}
