pub mod posts;
pub mod subscription;
pub mod webhook;

pub use posts::posts_config;
pub use subscription::{feature_config, pricing_config, subscription_config, usage_config};
pub use webhook::webhook_config;

use actix_web::{HttpMessage, HttpRequest, HttpResponse};
use serde_json::json;

use crate::middlewares::TenantId;
use crate::subscription::{GateDecision, Resource};

/// Tenant identifier inserted by the auth middleware.
pub fn get_tenant_id(req: &HttpRequest) -> Option<String> {
    req.extensions().get::<TenantId>().map(|t| t.0.clone())
}

pub fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "success": false,
        "error": {
            "code": "AUTH_ERROR",
            "message": "Missing tenant identity"
        }
    }))
}

/// Entitlement denial is a normal outcome, rendered with enough context for
/// the UI to show "3/3 used this month, upgrade for more".
pub fn upgrade_required(resource: Resource, decision: &GateDecision) -> HttpResponse {
    HttpResponse::Forbidden().json(json!({
        "success": false,
        "error": {
            "code": "UPGRADE_REQUIRED",
            "message": format!(
                "{} limit reached ({}/{}), upgrade to continue",
                resource.name(),
                decision.used,
                decision.limit
            ),
            "resource": resource.name(),
            "used": decision.used,
            "limit": decision.limit,
            "tier": decision.tier,
        }
    }))
}
