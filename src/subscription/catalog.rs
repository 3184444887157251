use serde_json::{Value, json};

use super::tier::{BillingCycle, CurrencyCode, Tier};

/// Sentinel for "no cap on this resource".
pub const UNLIMITED: i64 = -1;

/// Every metered resource a tier limit applies to. Monthly counters and
/// live-count resources share this namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    PostsPerMonth,
    AiGenerationsPerMonth,
    AiHookImprovementsPerMonth,
    ActiveScheduledPosts,
    KnowledgeItems,
    UrlImportsPerMonth,
    GemExtractionsPerMonth,
    VoiceProfiles,
    VoiceAnalysesPerMonth,
    UrlHistory,
    TrackedInfluencers,
    TrackedPosts,
    CommentDraftsPerMonth,
    TopicSuggestionsPerWeek,
}

impl Resource {
    pub const ALL: [Resource; 14] = [
        Resource::PostsPerMonth,
        Resource::AiGenerationsPerMonth,
        Resource::AiHookImprovementsPerMonth,
        Resource::ActiveScheduledPosts,
        Resource::KnowledgeItems,
        Resource::UrlImportsPerMonth,
        Resource::GemExtractionsPerMonth,
        Resource::VoiceProfiles,
        Resource::VoiceAnalysesPerMonth,
        Resource::UrlHistory,
        Resource::TrackedInfluencers,
        Resource::TrackedPosts,
        Resource::CommentDraftsPerMonth,
        Resource::TopicSuggestionsPerWeek,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Resource::PostsPerMonth => "posts_per_month",
            Resource::AiGenerationsPerMonth => "ai_generations_per_month",
            Resource::AiHookImprovementsPerMonth => "ai_hook_improvements_per_month",
            Resource::ActiveScheduledPosts => "active_scheduled_posts",
            Resource::KnowledgeItems => "knowledge_items",
            Resource::UrlImportsPerMonth => "url_imports_per_month",
            Resource::GemExtractionsPerMonth => "gem_extractions_per_month",
            Resource::VoiceProfiles => "voice_profiles",
            Resource::VoiceAnalysesPerMonth => "voice_analyses_per_month",
            Resource::UrlHistory => "url_history",
            Resource::TrackedInfluencers => "tracked_influencers",
            Resource::TrackedPosts => "tracked_posts",
            Resource::CommentDraftsPerMonth => "comment_drafts_per_month",
            Resource::TopicSuggestionsPerWeek => "topic_suggestions_per_week",
        }
    }

    pub fn from_name(name: &str) -> Option<Resource> {
        Resource::ALL.iter().copied().find(|r| r.name() == name)
    }
}

/// Usage limit for a tier. `-1` means unlimited, `0` means the feature is
/// disabled for the tier. Never fails: the tables below are total.
pub fn limit(tier: Tier, resource: Resource) -> i64 {
    match tier {
        Tier::Free => match resource {
            Resource::PostsPerMonth => 5,
            Resource::AiGenerationsPerMonth => 3,
            Resource::AiHookImprovementsPerMonth => 3,
            Resource::ActiveScheduledPosts => 2,
            Resource::KnowledgeItems => 10,
            Resource::UrlImportsPerMonth => 3,
            Resource::GemExtractionsPerMonth => 2,
            Resource::VoiceProfiles => 1,
            Resource::VoiceAnalysesPerMonth => 1,
            Resource::UrlHistory => 5,
            Resource::TrackedInfluencers => 3,
            Resource::TrackedPosts => 5,
            Resource::CommentDraftsPerMonth => 0,
            Resource::TopicSuggestionsPerWeek => 3,
        },
        Tier::Basic => match resource {
            Resource::PostsPerMonth => 30,
            Resource::AiGenerationsPerMonth => 20,
            Resource::AiHookImprovementsPerMonth => 15,
            Resource::ActiveScheduledPosts => 10,
            Resource::KnowledgeItems => 50,
            Resource::UrlImportsPerMonth => 20,
            Resource::GemExtractionsPerMonth => 10,
            Resource::VoiceProfiles => 3,
            Resource::VoiceAnalysesPerMonth => 5,
            Resource::UrlHistory => 25,
            Resource::TrackedInfluencers => 15,
            Resource::TrackedPosts => 25,
            Resource::CommentDraftsPerMonth => 10,
            Resource::TopicSuggestionsPerWeek => UNLIMITED,
        },
        Tier::Premium => UNLIMITED,
    }
}

/// Feature flags gated by tier. The access table is monotone in tier, so each
/// feature is fully described by the lowest tier that grants it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    FrameworkEditor,
    FileUpload,
    KnowledgeInformedAi,
    VoiceMatchedGeneration,
    FavoriteUrls,
    SaveUrlToVault,
    LinkedinConnection,
    DirectPublish,
    EngagementTimer,
    BrowserNotifications,
    CommentDrafting,
    CommentVariations,
    DiscoveryAssistant,
    EngagementReminders,
    EngagementAnalytics,
    AnalyticsByPillar,
    AnalyticsByFramework,
    AnalyticsTrends,
    AnalyticsTopPosts,
    AiStrategyRecommendations,
    EngagementHeatmap,
    ExportReports,
    EmailSupport,
    PrioritySupport,
    DataExport,
    ApiAccess,
}

impl Feature {
    pub const ALL: [Feature; 26] = [
        Feature::FrameworkEditor,
        Feature::FileUpload,
        Feature::KnowledgeInformedAi,
        Feature::VoiceMatchedGeneration,
        Feature::FavoriteUrls,
        Feature::SaveUrlToVault,
        Feature::LinkedinConnection,
        Feature::DirectPublish,
        Feature::EngagementTimer,
        Feature::BrowserNotifications,
        Feature::CommentDrafting,
        Feature::CommentVariations,
        Feature::DiscoveryAssistant,
        Feature::EngagementReminders,
        Feature::EngagementAnalytics,
        Feature::AnalyticsByPillar,
        Feature::AnalyticsByFramework,
        Feature::AnalyticsTrends,
        Feature::AnalyticsTopPosts,
        Feature::AiStrategyRecommendations,
        Feature::EngagementHeatmap,
        Feature::ExportReports,
        Feature::EmailSupport,
        Feature::PrioritySupport,
        Feature::DataExport,
        Feature::ApiAccess,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::FrameworkEditor => "framework_editor",
            Feature::FileUpload => "file_upload",
            Feature::KnowledgeInformedAi => "knowledge_informed_ai",
            Feature::VoiceMatchedGeneration => "voice_matched_generation",
            Feature::FavoriteUrls => "favorite_urls",
            Feature::SaveUrlToVault => "save_url_to_vault",
            Feature::LinkedinConnection => "linkedin_connection",
            Feature::DirectPublish => "direct_publish",
            Feature::EngagementTimer => "engagement_timer",
            Feature::BrowserNotifications => "browser_notifications",
            Feature::CommentDrafting => "comment_drafting",
            Feature::CommentVariations => "comment_variations",
            Feature::DiscoveryAssistant => "discovery_assistant",
            Feature::EngagementReminders => "engagement_reminders",
            Feature::EngagementAnalytics => "engagement_analytics",
            Feature::AnalyticsByPillar => "analytics_by_pillar",
            Feature::AnalyticsByFramework => "analytics_by_framework",
            Feature::AnalyticsTrends => "analytics_trends",
            Feature::AnalyticsTopPosts => "analytics_top_posts",
            Feature::AiStrategyRecommendations => "ai_strategy_recommendations",
            Feature::EngagementHeatmap => "engagement_heatmap",
            Feature::ExportReports => "export_reports",
            Feature::EmailSupport => "email_support",
            Feature::PrioritySupport => "priority_support",
            Feature::DataExport => "data_export",
            Feature::ApiAccess => "api_access",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Lowest tier that grants the feature. `engagement_analytics` is graded
    /// rather than boolean ("basic" on free/basic, "full" on premium) and so
    /// counts as granted on every tier.
    pub fn required_tier(&self) -> Tier {
        match self {
            Feature::EngagementAnalytics => Tier::Free,
            Feature::FrameworkEditor
            | Feature::FileUpload
            | Feature::KnowledgeInformedAi
            | Feature::VoiceMatchedGeneration
            | Feature::FavoriteUrls
            | Feature::SaveUrlToVault
            | Feature::LinkedinConnection
            | Feature::DirectPublish
            | Feature::EngagementTimer
            | Feature::BrowserNotifications
            | Feature::CommentDrafting
            | Feature::DiscoveryAssistant
            | Feature::AnalyticsByPillar
            | Feature::AnalyticsByFramework
            | Feature::AnalyticsTrends
            | Feature::AnalyticsTopPosts
            | Feature::EmailSupport => Tier::Basic,
            Feature::CommentVariations
            | Feature::EngagementReminders
            | Feature::AiStrategyRecommendations
            | Feature::EngagementHeatmap
            | Feature::ExportReports
            | Feature::PrioritySupport
            | Feature::DataExport
            | Feature::ApiAccess => Tier::Premium,
        }
    }
}

pub fn has_feature(tier: Tier, feature: Feature) -> bool {
    tier >= feature.required_tier()
}

/// Grade of the engagement analytics surface for a tier.
pub fn analytics_grade(tier: Tier) -> &'static str {
    match tier {
        Tier::Premium => "full",
        _ => "basic",
    }
}

pub struct CurrencyInfo {
    pub code: CurrencyCode,
    pub symbol: &'static str,
    pub name: &'static str,
    pub flag: &'static str,
    pub is_default: bool,
    pub basic_monthly: i64,
    pub basic_annual: i64,
    pub premium_monthly: i64,
    pub premium_annual: i64,
}

pub fn currency_info(code: CurrencyCode) -> &'static CurrencyInfo {
    match code {
        CurrencyCode::Aud => &CurrencyInfo {
            code: CurrencyCode::Aud,
            symbol: "$",
            name: "Australian Dollar",
            flag: "\u{1F1E6}\u{1F1FA}",
            is_default: true,
            basic_monthly: 2900,
            basic_annual: 29000,
            premium_monthly: 7900,
            premium_annual: 79000,
        },
        CurrencyCode::Usd => &CurrencyInfo {
            code: CurrencyCode::Usd,
            symbol: "$",
            name: "US Dollar",
            flag: "\u{1F1FA}\u{1F1F8}",
            is_default: false,
            basic_monthly: 1900,
            basic_annual: 19000,
            premium_monthly: 4900,
            premium_annual: 49000,
        },
        CurrencyCode::Eur => &CurrencyInfo {
            code: CurrencyCode::Eur,
            symbol: "\u{20AC}",
            name: "Euro",
            flag: "\u{1F1EA}\u{1F1FA}",
            is_default: false,
            basic_monthly: 1900,
            basic_annual: 19000,
            premium_monthly: 4900,
            premium_annual: 49000,
        },
        CurrencyCode::Gbp => &CurrencyInfo {
            code: CurrencyCode::Gbp,
            symbol: "\u{00A3}",
            name: "British Pound",
            flag: "\u{1F1EC}\u{1F1E7}",
            is_default: false,
            basic_monthly: 1500,
            basic_annual: 15000,
            premium_monthly: 3900,
            premium_annual: 39000,
        },
    }
}

/// Checkout price in the currency's smallest unit. Returns 0 for the free
/// tier; a 0 for a paid tier means the price table is misconfigured and the
/// caller must fail closed rather than start a free checkout.
pub fn price_cents(tier: Tier, cycle: BillingCycle, currency: CurrencyCode) -> i64 {
    let info = currency_info(currency);
    match (tier, cycle) {
        (Tier::Basic, BillingCycle::Monthly) => info.basic_monthly,
        (Tier::Basic, BillingCycle::Annual) => info.basic_annual,
        (Tier::Premium, BillingCycle::Monthly) => info.premium_monthly,
        (Tier::Premium, BillingCycle::Annual) => info.premium_annual,
        (Tier::Free, _) => 0,
    }
}

/// Checkout price in major units, for display.
pub fn price_amount(tier: Tier, cycle: BillingCycle, currency: CurrencyCode) -> f64 {
    price_cents(tier, cycle, currency) as f64 / 100.0
}

fn limits_json(tier: Tier) -> Value {
    let mut map = serde_json::Map::new();
    for r in Resource::ALL {
        map.insert(r.name().to_string(), json!(limit(tier, r)));
    }
    Value::Object(map)
}

fn feature_names(tier: Tier) -> Vec<&'static str> {
    Feature::ALL
        .iter()
        .filter(|f| has_feature(tier, **f))
        .map(|f| f.name())
        .collect()
}

fn paid_tier_json(info: &CurrencyInfo, name: &str, monthly: i64, annual: i64) -> Value {
    let symbol = info.symbol;
    json!({
        "name": name,
        "monthly_price": monthly as f64 / 100.0,
        "annual_price": annual as f64 / 100.0,
        "monthly_display": format!("{symbol}{:.0}/mo", monthly as f64 / 100.0),
        "annual_display": format!("{symbol}{:.0}/yr", annual as f64 / 100.0),
        "annual_monthly_equivalent": format!("{symbol}{:.2}/mo", annual as f64 / 1200.0),
        "annual_savings": format!(
            "Save {symbol}{:.0} (17%)",
            (monthly * 12 - annual) as f64 / 100.0
        ),
    })
}

/// Full pricing payload for one currency: per-tier prices with display
/// strings, granted feature lists, and the complete limit tables.
pub fn pricing_for_currency(code: CurrencyCode) -> Value {
    let info = currency_info(code);
    let symbol = info.symbol;
    json!({
        "currency": info.code.as_str(),
        "currency_symbol": symbol,
        "currency_name": info.name,
        "currency_flag": info.flag,
        "tiers": {
            "free": {
                "name": "Free",
                "monthly_price": 0,
                "annual_price": 0,
                "monthly_display": format!("{symbol}0"),
                "annual_display": format!("{symbol}0"),
            },
            "basic": paid_tier_json(info, "Basic", info.basic_monthly, info.basic_annual),
            "premium": paid_tier_json(info, "Premium", info.premium_monthly, info.premium_annual),
        },
        "features": {
            "free": feature_names(Tier::Free),
            "basic": feature_names(Tier::Basic),
            "premium": feature_names(Tier::Premium),
        },
        "limits": {
            "free": limits_json(Tier::Free),
            "basic": limits_json(Tier::Basic),
            "premium": limits_json(Tier::Premium),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tier_limits() {
        assert_eq!(limit(Tier::Free, Resource::PostsPerMonth), 5);
        assert_eq!(limit(Tier::Free, Resource::CommentDraftsPerMonth), 0);
        assert_eq!(limit(Tier::Free, Resource::VoiceProfiles), 1);
    }

    #[test]
    fn test_basic_tier_limits() {
        assert_eq!(limit(Tier::Basic, Resource::PostsPerMonth), 30);
        assert_eq!(limit(Tier::Basic, Resource::TopicSuggestionsPerWeek), UNLIMITED);
    }

    #[test]
    fn test_premium_is_unlimited_everywhere() {
        for r in Resource::ALL {
            assert_eq!(limit(Tier::Premium, r), UNLIMITED);
        }
    }

    #[test]
    fn test_resource_name_round_trip() {
        for r in Resource::ALL {
            assert_eq!(Resource::from_name(r.name()), Some(r));
        }
        assert_eq!(Resource::from_name("mystery_widget"), None);
    }

    #[test]
    fn test_feature_access() {
        assert!(!has_feature(Tier::Free, Feature::DirectPublish));
        assert!(has_feature(Tier::Basic, Feature::DirectPublish));
        assert!(!has_feature(Tier::Basic, Feature::ApiAccess));
        assert!(has_feature(Tier::Premium, Feature::ApiAccess));
        // graded analytics counts as granted on every tier
        assert!(has_feature(Tier::Free, Feature::EngagementAnalytics));
        assert_eq!(analytics_grade(Tier::Basic), "basic");
        assert_eq!(analytics_grade(Tier::Premium), "full");
    }

    #[test]
    fn test_unknown_feature_name() {
        assert_eq!(Feature::from_name("teleportation"), None);
    }

    #[test]
    fn test_price_lookup() {
        assert_eq!(
            price_cents(Tier::Premium, BillingCycle::Annual, CurrencyCode::Usd),
            49000
        );
        assert_eq!(
            price_cents(Tier::Basic, BillingCycle::Monthly, CurrencyCode::Gbp),
            1500
        );
        assert_eq!(
            price_cents(Tier::Free, BillingCycle::Monthly, CurrencyCode::Aud),
            0
        );
        assert_eq!(
            price_amount(Tier::Basic, BillingCycle::Monthly, CurrencyCode::Aud),
            29.0
        );
    }

    #[test]
    fn test_pricing_payload_shape() {
        let payload = pricing_for_currency(CurrencyCode::Aud);
        assert_eq!(payload["currency"], "aud");
        assert_eq!(payload["tiers"]["basic"]["monthly_price"], 29.0);
        assert_eq!(payload["limits"]["free"]["posts_per_month"], 5);
        assert!(
            payload["features"]["premium"]
                .as_array()
                .unwrap()
                .iter()
                .any(|v| v == "api_access")
        );
    }
}
