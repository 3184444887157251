use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::handlers::{get_tenant_id, unauthorized};
use crate::models::{
    CheckoutRequest, CheckoutStatusResponse, CreateCheckoutResponse, FeatureAccessResponse,
    PricingQuery, SubscriptionStatusResponse, UsageStatusResponse,
};
use crate::services::{BillingService, TenantService};
use crate::subscription::{CurrencyCode, catalog};

#[utoipa::path(
    get,
    path = "/pricing",
    tag = "pricing",
    params(("currency" = Option<String>, Query, description = "Currency code: aud, usd, eur or gbp")),
    responses(
        (status = 200, description = "Pricing for the requested currency")
    )
)]
pub async fn get_pricing(query: web::Query<PricingQuery>) -> Result<HttpResponse> {
    let currency = query
        .currency
        .as_deref()
        .and_then(CurrencyCode::from_str_opt)
        .unwrap_or_default();
    let pricing = catalog::pricing_for_currency(currency);
    Ok(HttpResponse::Ok().json(json!({"success": true, "data": pricing})))
}

#[utoipa::path(
    get,
    path = "/subscription/status",
    tag = "subscription",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current subscription state", body = SubscriptionStatusResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_subscription_status(
    tenant_service: web::Data<TenantService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match tenant_service.subscription_status(&tenant_id).await {
        Ok(resp) => Ok(HttpResponse::Ok().json(json!({"success": true, "data": resp}))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/subscription/checkout",
    tag = "subscription",
    request_body = CheckoutRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Checkout session created", body = CreateCheckoutResponse),
        (status = 400, description = "Invalid tier or billing cycle"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_checkout(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
    request: web::Json<CheckoutRequest>,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match billing_service
        .create_checkout(&tenant_id, request.into_inner())
        .await
    {
        Ok(resp) => Ok(HttpResponse::Ok().json(json!({"success": true, "data": resp}))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/subscription/checkout-status/{session_id}",
    tag = "subscription",
    params(("session_id" = String, Path, description = "Checkout session id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Checkout session status", body = CheckoutStatusResponse),
        (status = 404, description = "Unknown session"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_checkout_status(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match billing_service
        .checkout_status(&tenant_id, &path.into_inner())
        .await
    {
        Ok(resp) => Ok(HttpResponse::Ok().json(json!({"success": true, "data": resp}))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/subscription/cancel",
    tag = "subscription",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription flagged to end at period close"),
        (status = 409, description = "No active subscription"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn cancel_subscription(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match billing_service.cancel(&tenant_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Subscription will end at the close of the current period"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/subscription/reactivate",
    tag = "subscription",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending cancellation reverted"),
        (status = 409, description = "Subscription is not pending cancellation"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn reactivate_subscription(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match billing_service.reactivate(&tenant_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Subscription will continue to renew"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/usage/status",
    tag = "usage",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Per-resource usage against the effective tier's limits", body = UsageStatusResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_usage_status(
    tenant_service: web::Data<TenantService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match tenant_service.usage_status(&tenant_id).await {
        Ok(resp) => Ok(HttpResponse::Ok().json(json!({"success": true, "data": resp}))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/features/{feature_name}",
    tag = "usage",
    params(("feature_name" = String, Path, description = "Feature flag name")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Whether the effective tier grants the feature", body = FeatureAccessResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_feature_access(
    tenant_service: web::Data<TenantService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match tenant_service
        .feature_access(&tenant_id, &path.into_inner())
        .await
    {
        Ok(resp) => Ok(HttpResponse::Ok().json(json!({"success": true, "data": resp}))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn pricing_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/pricing", web::get().to(get_pricing));
}

pub fn subscription_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/subscription")
            .route("/status", web::get().to(get_subscription_status))
            .route("/checkout", web::post().to(create_checkout))
            .route(
                "/checkout-status/{session_id}",
                web::get().to(get_checkout_status),
            )
            .route("/cancel", web::post().to(cancel_subscription))
            .route("/reactivate", web::post().to(reactivate_subscription)),
    );
}

pub fn usage_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/usage").route("/status", web::get().to(get_usage_status)));
}

pub fn feature_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/features/{feature_name}", web::get().to(get_feature_access));
}
