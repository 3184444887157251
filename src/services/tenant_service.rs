use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};

use crate::entities::{PostStatus, post_entity as post, tenant_record_entity as tr};
use crate::error::AppResult;
use crate::models::{
    FeatureAccessResponse, ResourceUsage, SubscriptionStatusResponse, UsageStatusResponse,
};
use crate::subscription::{
    Feature, Resource, SubscriptionData, UsageData, catalog, gate, period, state,
};

/// In-memory view of one tenant's persisted record. Always mutated whole and
/// written back whole.
#[derive(Debug, Clone)]
pub struct TenantRecord {
    pub subscription: SubscriptionData,
    pub usage: UsageData,
}

#[derive(Clone)]
pub struct TenantService {
    pool: DatabaseConnection,
}

impl TenantService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Load the tenant's record, creating free-tier defaults on first access
    /// and performing any lazy usage rollover that is due. There is no timer:
    /// expiry is evaluated here, on read.
    pub async fn load(&self, tenant_id: &str) -> AppResult<TenantRecord> {
        let now = Utc::now();

        let existing = tr::Entity::find_by_id(tenant_id.to_string())
            .one(&self.pool)
            .await?;

        let mut record = match existing {
            Some(model) => TenantRecord {
                subscription: serde_json::from_value(model.subscription)?,
                usage: serde_json::from_value(model.usage)?,
            },
            None => {
                let record = TenantRecord {
                    subscription: SubscriptionData::default(),
                    usage: UsageData::bootstrap(now),
                };
                // two first-requests may race here; the loser's insert is a no-op
                tr::Entity::insert(tr::ActiveModel {
                    tenant_id: Set(tenant_id.to_string()),
                    subscription: Set(serde_json::to_value(&record.subscription)?),
                    usage: Set(serde_json::to_value(&record.usage)?),
                    created_at: Set(Some(now)),
                    updated_at: Set(Some(now)),
                })
                .on_conflict(
                    OnConflict::column(tr::Column::TenantId)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&self.pool)
                .await?;
                return Ok(record);
            }
        };

        // monthly and weekly windows roll independently
        let mut rolled = false;
        if period::monthly_expired(record.usage.period_end, now) {
            period::reset_monthly(&mut record.usage, now);
            rolled = true;
        }
        if period::weekly_expired(record.usage.topic_suggestions_week_start, now) {
            period::reset_weekly(&mut record.usage, now);
            rolled = true;
        }
        if rolled {
            log::info!("Rolled usage window for tenant {tenant_id}");
            self.save(tenant_id, &record).await?;
        }

        Ok(record)
    }

    /// Write the whole record back.
    pub async fn save(&self, tenant_id: &str, record: &TenantRecord) -> AppResult<()> {
        tr::ActiveModel {
            tenant_id: Set(tenant_id.to_string()),
            subscription: Set(serde_json::to_value(&record.subscription)?),
            usage: Set(serde_json::to_value(&record.usage)?),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&self.pool)
        .await?;
        Ok(())
    }

    /// Count one use of a resource after its gate check passed. Check and
    /// increment are separate persistence round-trips; concurrent requests
    /// from the same tenant can overshoot a limit by a small bounded margin.
    pub async fn record_use(&self, tenant_id: &str, resource: Resource) -> AppResult<()> {
        let mut record = self.load(tenant_id).await?;
        record.usage.record_use(resource);
        self.save(tenant_id, &record).await
    }

    pub async fn count_scheduled_posts(&self, tenant_id: &str) -> AppResult<i64> {
        let count = post::Entity::find()
            .filter(post::Column::TenantId.eq(tenant_id))
            .filter(post::Column::Status.eq(PostStatus::Scheduled))
            .count(&self.pool)
            .await?;
        Ok(count as i64)
    }

    pub async fn subscription_status(&self, tenant_id: &str) -> AppResult<SubscriptionStatusResponse> {
        let record = self.load(tenant_id).await?;
        let sub = &record.subscription;
        let now = Utc::now();
        Ok(SubscriptionStatusResponse {
            tier: sub.tier,
            status: sub.status,
            effective_tier: state::effective_tier(sub, now),
            billing_cycle: sub.billing_cycle,
            currency: sub.currency,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
            is_in_grace_period: state::is_in_grace_period(sub, now),
            grace_period_hours_remaining: state::grace_hours_remaining(sub, now),
            payment_method_last4: sub.payment_method_last4.clone(),
            payment_method_brand: sub.payment_method_brand.clone(),
        })
    }

    pub async fn usage_status(&self, tenant_id: &str) -> AppResult<UsageStatusResponse> {
        let record = self.load(tenant_id).await?;
        let now = Utc::now();
        let tier = state::effective_tier(&record.subscription, now);

        let counter_resources = [
            Resource::PostsPerMonth,
            Resource::AiGenerationsPerMonth,
            Resource::AiHookImprovementsPerMonth,
            Resource::UrlImportsPerMonth,
            Resource::GemExtractionsPerMonth,
            Resource::VoiceAnalysesPerMonth,
            Resource::CommentDraftsPerMonth,
            Resource::TopicSuggestionsPerWeek,
        ];
        let mut resources: Vec<ResourceUsage> = counter_resources
            .iter()
            .map(|&r| ResourceUsage {
                resource: r.name().to_string(),
                used: gate::counter_value(&record.usage, r),
                limit: catalog::limit(tier, r),
            })
            .collect();

        let scheduled = self.count_scheduled_posts(tenant_id).await?;
        resources.push(ResourceUsage {
            resource: Resource::ActiveScheduledPosts.name().to_string(),
            used: scheduled,
            limit: catalog::limit(tier, Resource::ActiveScheduledPosts),
        });

        Ok(UsageStatusResponse {
            resources,
            period_resets_in_days: period::days_until_reset(record.usage.period_end, now),
            tier,
        })
    }

    pub async fn feature_access(
        &self,
        tenant_id: &str,
        feature_name: &str,
    ) -> AppResult<FeatureAccessResponse> {
        let record = self.load(tenant_id).await?;
        let now = Utc::now();
        match Feature::from_name(feature_name) {
            Some(feature) => {
                let decision = gate::check_feature(&record.subscription, feature, now);
                Ok(FeatureAccessResponse {
                    feature: feature_name.to_string(),
                    has_access: decision.allowed,
                    tier: decision.tier,
                    required_tier: Some(decision.required_tier),
                })
            }
            // unknown feature names deny rather than error
            None => Ok(FeatureAccessResponse {
                feature: feature_name.to_string(),
                has_access: false,
                tier: state::effective_tier(&record.subscription, now),
                required_tier: None,
            }),
        }
    }
}
