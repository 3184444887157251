use chrono::{DateTime, Utc};

use super::catalog::{self, Feature, Resource, UNLIMITED};
use super::records::{SubscriptionData, UsageData};
use super::state;
use super::tier::Tier;

/// Outcome of an entitlement check. Denial is a normal value the caller turns
/// into an "upgrade required" response, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,
    pub tier: Tier,
    pub limit: i64,
    pub used: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureDecision {
    pub allowed: bool,
    pub tier: Tier,
    pub required_tier: Tier,
}

/// Current value of the monthly (or weekly) counter backing a metered
/// resource. Live-count resources have no counter here; they go through
/// `check_resource_count`.
pub fn counter_value(usage: &UsageData, resource: Resource) -> i64 {
    match resource {
        Resource::PostsPerMonth => usage.posts_created,
        Resource::AiGenerationsPerMonth => usage.ai_generations,
        Resource::AiHookImprovementsPerMonth => usage.ai_hook_improvements,
        Resource::UrlImportsPerMonth => usage.url_imports,
        Resource::GemExtractionsPerMonth => usage.gem_extractions,
        Resource::VoiceAnalysesPerMonth => usage.voice_analyses,
        Resource::CommentDraftsPerMonth => usage.comment_drafts,
        Resource::TopicSuggestionsPerWeek => usage.topic_suggestions_count,
        _ => 0,
    }
}

fn decide(tier: Tier, limit: i64, used: i64) -> GateDecision {
    let allowed = limit == UNLIMITED || used < limit;
    GateDecision {
        allowed,
        tier,
        limit,
        used,
    }
}

/// Gate a monotonic usage counter against the effective tier's limit.
///
/// Check and increment are not atomic across concurrent requests from the
/// same tenant; a burst near the limit can overshoot by a small bounded
/// margin. Accepted tradeoff for freemium soft limits.
pub fn check_usage(
    sub: &SubscriptionData,
    usage: &UsageData,
    resource: Resource,
    now: DateTime<Utc>,
) -> GateDecision {
    let tier = state::effective_tier(sub, now);
    decide(tier, catalog::limit(tier, resource), counter_value(usage, resource))
}

/// Gate a live count of a persisted collection (deletable resources such as
/// saved knowledge items or active scheduled posts).
pub fn check_resource_count(
    sub: &SubscriptionData,
    live_count: i64,
    resource: Resource,
    now: DateTime<Utc>,
) -> GateDecision {
    let tier = state::effective_tier(sub, now);
    decide(tier, catalog::limit(tier, resource), live_count)
}

pub fn check_feature(sub: &SubscriptionData, feature: Feature, now: DateTime<Utc>) -> FeatureDecision {
    let tier = state::effective_tier(sub, now);
    FeatureDecision {
        allowed: catalog::has_feature(tier, feature),
        tier,
        required_tier: feature.required_tier(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::tier::SubscriptionStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 6, 12, 0, 0).unwrap()
    }

    fn sub(tier: Tier) -> SubscriptionData {
        SubscriptionData {
            tier,
            status: SubscriptionStatus::Active,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_tenant_defaults() {
        // fresh record: free tier, 5 posts a month, first one allowed
        let s = SubscriptionData::default();
        let usage = UsageData::default();
        let d = check_usage(&s, &usage, Resource::PostsPerMonth, now());
        assert_eq!(d.tier, Tier::Free);
        assert_eq!(d.limit, 5);
        assert_eq!(d.used, 0);
        assert!(d.allowed);
    }

    #[test]
    fn test_basic_posts_round_trip() {
        // basic allows 0..=29 and denies at 30
        let s = sub(Tier::Basic);
        for used in 0..30 {
            let usage = UsageData {
                posts_created: used,
                ..Default::default()
            };
            let d = check_usage(&s, &usage, Resource::PostsPerMonth, now());
            assert!(d.allowed, "denied at {used}");
            assert_eq!(d.limit, 30);
        }
        let usage = UsageData {
            posts_created: 30,
            ..Default::default()
        };
        let d = check_usage(&s, &usage, Resource::PostsPerMonth, now());
        assert!(!d.allowed);
        assert_eq!(d.used, 30);
    }

    #[test]
    fn test_premium_unlimited() {
        let s = sub(Tier::Premium);
        let usage = UsageData {
            posts_created: 10_000,
            ..Default::default()
        };
        let d = check_usage(&s, &usage, Resource::PostsPerMonth, now());
        assert!(d.allowed);
        assert_eq!(d.limit, -1);
    }

    #[test]
    fn test_disabled_resource_denies_at_zero() {
        let s = sub(Tier::Free);
        let d = check_usage(&s, &UsageData::default(), Resource::CommentDraftsPerMonth, now());
        assert!(!d.allowed);
        assert_eq!(d.limit, 0);
    }

    #[test]
    fn test_expired_grace_gates_at_free_limits() {
        let mut s = sub(Tier::Premium);
        s.status = SubscriptionStatus::PastDue;
        s.grace_period_ends = Some(now() - chrono::Duration::hours(1));
        let usage = UsageData {
            posts_created: 5,
            ..Default::default()
        };
        let d = check_usage(&s, &usage, Resource::PostsPerMonth, now());
        assert_eq!(d.tier, Tier::Free);
        assert_eq!(d.limit, 5);
        assert!(!d.allowed);
    }

    #[test]
    fn test_live_count_check() {
        let s = sub(Tier::Free);
        assert!(check_resource_count(&s, 1, Resource::ActiveScheduledPosts, now()).allowed);
        assert!(!check_resource_count(&s, 2, Resource::ActiveScheduledPosts, now()).allowed);
        assert!(check_resource_count(&sub(Tier::Premium), 500, Resource::KnowledgeItems, now()).allowed);
    }

    #[test]
    fn test_feature_check() {
        let d = check_feature(&sub(Tier::Free), Feature::DirectPublish, now());
        assert!(!d.allowed);
        assert_eq!(d.required_tier, Tier::Basic);

        let d = check_feature(&sub(Tier::Basic), Feature::DirectPublish, now());
        assert!(d.allowed);
    }
}
