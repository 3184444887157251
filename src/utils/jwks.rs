use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::RwLock;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Time-bounded cache of the identity provider's JWKS. Serves stale keys if
/// a refresh fetch fails so transient provider outages do not lock every
/// tenant out.
pub struct JwksCache {
    url: String,
    ttl: Duration,
    http: reqwest::Client,
    inner: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            url: config.jwks_url.clone(),
            ttl: Duration::from_secs(config.jwks_cache_ttl_secs),
            http: reqwest::Client::new(),
            inner: RwLock::new(None),
        }
    }

    /// Decoding key for the given key id, refreshing the set when the cache
    /// has expired.
    pub async fn decoding_key(&self, kid: &str) -> AppResult<DecodingKey> {
        {
            let guard = self.inner.read().await;
            if let Some(cached) = guard.as_ref()
                && cached.fetched_at.elapsed() < self.ttl
            {
                return Self::key_from_set(&cached.keys, kid);
            }
        }

        match self.fetch().await {
            Ok(keys) => {
                let result = Self::key_from_set(&keys, kid);
                let mut guard = self.inner.write().await;
                *guard = Some(CachedKeys {
                    keys,
                    fetched_at: Instant::now(),
                });
                result
            }
            Err(e) => {
                log::error!("Failed to fetch JWKS: {e}");
                let guard = self.inner.read().await;
                match guard.as_ref() {
                    // stale fallback
                    Some(cached) => Self::key_from_set(&cached.keys, kid),
                    None => Err(AppError::AuthError(
                        "Failed to fetch authentication keys".into(),
                    )),
                }
            }
        }
    }

    async fn fetch(&self) -> AppResult<JwkSet> {
        let response = self
            .http
            .get(&self.url)
            .timeout(Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?;
        let keys: JwkSet = response.json().await?;
        Ok(keys)
    }

    fn key_from_set(keys: &JwkSet, kid: &str) -> AppResult<DecodingKey> {
        let jwk = keys
            .find(kid)
            .ok_or_else(|| AppError::AuthError("Matching key not found in JWKS".into()))?;
        DecodingKey::from_jwk(jwk).map_err(AppError::JwtError)
    }
}
