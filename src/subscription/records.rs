use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::catalog::Resource;
use super::period;
use super::tier::{BillingCycle, CurrencyCode, SubscriptionStatus, Tier};

/// Billing state for one tenant, stored as a JSON object on the tenant record.
///
/// Invariant: `grace_period_ends` is set iff `status == PastDue` and the grace
/// window has not been evaluated as expired; both grace fields are written and
/// cleared together. Free-tier records carry no billing references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema, Default)]
#[serde(default)]
pub struct SubscriptionData {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub billing_cycle: Option<BillingCycle>,
    pub currency: CurrencyCode,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub payment_failed_at: Option<DateTime<Utc>>,
    pub grace_period_ends: Option<DateTime<Utc>>,
    pub payment_method_last4: Option<String>,
    pub payment_method_brand: Option<String>,
    pub payment_method_exp: Option<String>,
}

/// Consumption counters for one tenant, stored alongside the subscription.
///
/// Monthly counters accumulate inside `[period_start, period_end)` and reset
/// to zero on rollover; `lifetime_*` counters never reset. The weekly topic
/// suggestion window rolls independently of the monthly one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema, Default)]
#[serde(default)]
pub struct UsageData {
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub posts_created: i64,
    pub ai_generations: i64,
    pub ai_hook_improvements: i64,
    pub url_imports: i64,
    pub gem_extractions: i64,
    pub voice_analyses: i64,
    pub comment_drafts: i64,
    pub topic_suggestions_week_start: Option<DateTime<Utc>>,
    pub topic_suggestions_count: i64,
    pub lifetime_posts: i64,
    pub lifetime_ai_generations: i64,
    pub last_reset: Option<DateTime<Utc>>,
}

impl UsageData {
    /// Fresh usage record for a new tenant, anchored to `now`'s calendar month.
    pub fn bootstrap(now: DateTime<Utc>) -> Self {
        let (start, end) = period::month_window(now);
        UsageData {
            period_start: Some(start),
            period_end: Some(end),
            topic_suggestions_week_start: Some(now),
            last_reset: Some(now),
            ..Default::default()
        }
    }

    /// Count one use of a metered resource. Posts and AI generations also
    /// bump their lifetime counters. Live-count resources have no counter
    /// here and are ignored.
    pub fn record_use(&mut self, resource: Resource) {
        match resource {
            Resource::PostsPerMonth => {
                self.posts_created += 1;
                self.lifetime_posts += 1;
            }
            Resource::AiGenerationsPerMonth => {
                self.ai_generations += 1;
                self.lifetime_ai_generations += 1;
            }
            Resource::AiHookImprovementsPerMonth => self.ai_hook_improvements += 1,
            Resource::UrlImportsPerMonth => self.url_imports += 1,
            Resource::GemExtractionsPerMonth => self.gem_extractions += 1,
            Resource::VoiceAnalysesPerMonth => self.voice_analyses += 1,
            Resource::CommentDraftsPerMonth => self.comment_drafts += 1,
            Resource::TopicSuggestionsPerWeek => self.topic_suggestions_count += 1,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bootstrap_anchors_to_calendar_month() {
        let now = Utc.with_ymd_and_hms(2025, 8, 6, 10, 30, 0).unwrap();
        let usage = UsageData::bootstrap(now);
        assert_eq!(
            usage.period_start,
            Some(Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            usage.period_end,
            Some(Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(usage.posts_created, 0);
        assert_eq!(usage.topic_suggestions_week_start, Some(now));
    }

    #[test]
    fn test_partial_json_deserializes_with_defaults() {
        // Records written by older versions may miss fields entirely.
        let sub: SubscriptionData = serde_json::from_str(r#"{"tier":"basic"}"#).unwrap();
        assert_eq!(sub.tier, Tier::Basic);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.currency, CurrencyCode::Aud);
        assert!(!sub.cancel_at_period_end);

        let usage: UsageData = serde_json::from_str(r#"{"posts_created":4}"#).unwrap();
        assert_eq!(usage.posts_created, 4);
        assert_eq!(usage.period_end, None);
    }
}
