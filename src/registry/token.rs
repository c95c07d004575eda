use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::Result;

/// The registry hands out 7-day bearer tokens. We refresh a full day early
/// so a token can't expire in the middle of a batched push.
const TOKEN_TTL_DAYS: i64 = 7;
const REFRESH_MARGIN_DAYS: i64 = 1;

#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// A bearer token valid for at least the next request.
    async fn bearer(&self) -> Result<String>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

struct CachedToken {
    token: String,
    refresh_after: DateTime<Utc>,
}

/// Process-wide token cache. Concurrent requests may race to refresh an
/// expired token; the login is idempotent and daily-scale, so the redundant
/// call is accepted instead of serialized.
pub struct CachedTokenProvider {
    base_url: String,
    email: String,
    password: String,
    client: Client,
    cached: RwLock<Option<CachedToken>>,
}

impl CachedTokenProvider {
    pub fn new(base_url: &str, email: &str, password: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            password: password.to_string(),
            client,
            cached: RwLock::new(None),
        }
    }

    async fn login(&self) -> Result<CachedToken> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                email: &self.email,
                password: &self.password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("registry login failed: HTTP {}", response.status()).into());
        }

        let body: LoginResponse = response.json().await?;
        let refresh_after = Utc::now() + Duration::days(TOKEN_TTL_DAYS - REFRESH_MARGIN_DAYS);
        info!("🔑 registry login ok, token cached until {}", refresh_after);
        Ok(CachedToken {
            token: body.token,
            refresh_after,
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn bearer(&self) -> Result<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if Utc::now() < token.refresh_after {
                    return Ok(token.token.clone());
                }
                debug!("cached registry token past refresh point");
            }
        }

        let fresh = self.login().await?;
        let token = fresh.token.clone();
        *self.cached.write().await = Some(fresh);
        Ok(token)
    }
}

/// Fixed token for tests and local tooling; never expires.
pub struct StaticTokenProvider(pub String);

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_hands_back_its_token() {
        let provider = StaticTokenProvider("tok-123".to_string());
        assert_eq!(provider.bearer().await.unwrap(), "tok-123");
    }

    #[test]
    fn refresh_margin_is_inside_the_ttl() {
        assert!(REFRESH_MARGIN_DAYS < TOKEN_TTL_DAYS);
    }
}
