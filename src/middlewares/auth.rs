use std::rc::Rc;
use std::sync::Arc;

use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::Deserialize;
use std::future::{Ready, ready};

use crate::error::{AppError, AppResult};
use crate::utils::JwksCache;

/// Verified tenant identifier, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct TenantId(pub String);

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            exact_paths: vec![
                "/swagger-ui",
                "/swagger-ui/",
                "/api-docs/openapi.json",
                "/api/v1/pricing",
            ],
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/webhook/"],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        if self.exact_paths.contains(&path) {
            return true;
        }
        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

async fn verify_token(jwks: &JwksCache, token: &str) -> AppResult<String> {
    let header = decode_header(token)?;
    if header.alg != Algorithm::RS256 {
        return Err(AppError::AuthError("Unsupported token algorithm".into()));
    }
    let kid = header
        .kid
        .ok_or_else(|| AppError::AuthError("Token missing key id".into()))?;

    let key = jwks.decoding_key(&kid).await?;

    let mut validation = Validation::new(Algorithm::RS256);
    // the identity provider does not consistently set an audience
    validation.validate_aud = false;
    let data = decode::<Claims>(token, &key, &validation)?;
    Ok(data.claims.sub)
}

pub struct AuthMiddleware {
    jwks: Arc<JwksCache>,
}

impl AuthMiddleware {
    pub fn new(jwks: Arc<JwksCache>) -> Self {
        Self { jwks }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            jwks: self.jwks.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    jwks: Arc<JwksCache>,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        // let CORS preflights through
        if req.method() == Method::OPTIONS || self.public_paths.is_public_path(req.path()) {
            return Box::pin(async move { service.call(req).await });
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_owned);

        let jwks = Arc::clone(&self.jwks);

        Box::pin(async move {
            let Some(token) = token else {
                return Err(AppError::AuthError("Missing access token".to_string()).into());
            };
            match verify_token(&jwks, &token).await {
                Ok(tenant_id) => {
                    req.extensions_mut().insert(TenantId(tenant_id));
                    service.call(req).await
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}
