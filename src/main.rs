use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use postpilot_backend::{
    config::Config,
    database::{create_connection, run_migrations},
    external::StripeService,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwksCache,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = create_connection(&config.database)
        .await
        .expect("Failed to connect to the database");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwks_cache = Arc::new(JwksCache::new(&config.auth));

    let stripe_service = StripeService::new(config.stripe.clone());

    let tenant_service = TenantService::new(pool.clone());
    let post_service = PostService::new(pool.clone());
    let billing_service = BillingService::new(
        pool.clone(),
        tenant_service.clone(),
        stripe_service.clone(),
        config.frontend.base_url.clone(),
    );

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwks_cache.clone()))
            .app_data(web::Data::new(tenant_service.clone()))
            .app_data(web::Data::new(post_service.clone()))
            .app_data(web::Data::new(billing_service.clone()))
            .app_data(web::Data::new(stripe_service.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::pricing_config)
                    .configure(handlers::subscription_config)
                    .configure(handlers::usage_config)
                    .configure(handlers::feature_config)
                    .configure(handlers::posts_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
