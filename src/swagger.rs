use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::PostStatus;
use crate::handlers;
use crate::models::*;
use crate::subscription::{BillingCycle, CurrencyCode, SubscriptionStatus, Tier};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::subscription::get_pricing,
        handlers::subscription::get_subscription_status,
        handlers::subscription::create_checkout,
        handlers::subscription::get_checkout_status,
        handlers::subscription::cancel_subscription,
        handlers::subscription::reactivate_subscription,
        handlers::subscription::get_usage_status,
        handlers::subscription::get_feature_access,
        handlers::posts::create_post,
        handlers::posts::list_posts,
        handlers::posts::get_post,
        handlers::posts::update_post,
        handlers::posts::delete_post,
    ),
    components(
        schemas(
            Tier,
            SubscriptionStatus,
            BillingCycle,
            CurrencyCode,
            PostStatus,
            SubscriptionStatusResponse,
            UsageStatusResponse,
            ResourceUsage,
            FeatureAccessResponse,
            CheckoutRequest,
            CreateCheckoutResponse,
            CheckoutStatusResponse,
            CreatePostRequest,
            UpdatePostRequest,
            PostResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "pricing", description = "Public pricing API"),
        (name = "subscription", description = "Subscription lifecycle API"),
        (name = "usage", description = "Usage and feature entitlement API"),
        (name = "posts", description = "Post management API"),
    ),
    info(
        title = "PostPilot Backend API",
        version = "1.0.0",
        description = "PostPilot Backend REST API documentation",
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
