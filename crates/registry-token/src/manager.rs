use crate::config::TokenManagerConfig;
use crate::error::TokenError;
use crate::token::Token;
use registry_core::backoff::{default_schedule, IntervalFunction};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(feature = "metrics")]
use metrics::counter;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
    #[allow(dead_code)]
    scope: Option<String>,
}

struct Inner {
    snapshot: Option<Token>,
}

/// Token Manager (C1): serializes client-credentials exchange against the
/// upstream token endpoint so at most one request is ever in flight.
///
/// The critical section is a `tokio::sync::Mutex` held across the network
/// exchange itself, not a `parking_lot::Mutex`, since the lock must be
/// held across an `.await`.
pub struct TokenManager {
    config: TokenManagerConfig,
    http: reqwest::Client,
    inner: Arc<Mutex<Inner>>,
}

impl TokenManager {
    pub fn new(config: TokenManagerConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: TokenManagerConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            inner: Arc::new(Mutex::new(Inner { snapshot: None })),
        }
    }

    /// Returns a currently-valid bearer token, fetching or refreshing one if
    /// necessary. At most one token-endpoint call is in flight at a time;
    /// waiters observe the result of that single call.
    pub async fn acquire(&self) -> Result<Token, TokenError> {
        {
            let inner = self.inner.lock().await;
            if let Some(token) = &inner.snapshot {
                if token.valid_with_buffer(self.config.safety_buffer) {
                    return Ok(token.clone());
                }
            }
        }

        let mut inner = self.inner.lock().await;
        if let Some(token) = &inner.snapshot {
            if token.valid_with_buffer(self.config.safety_buffer) {
                return Ok(token.clone());
            }
        }

        let token = self.fetch_with_retry().await?;
        inner.snapshot = Some(token.clone());
        Ok(token)
    }

    /// Drops the current snapshot so the next `acquire` forces a refresh.
    /// Called by the Upstream Client on a 401 response.
    pub async fn invalidate(&self) {
        let mut inner = self.inner.lock().await;
        inner.snapshot = None;
    }

    async fn fetch_with_retry(&self) -> Result<Token, TokenError> {
        let backoff = default_schedule(self.config.retry_base.as_millis() as u64);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let wait = backoff.next_interval(attempt - 1);
                #[cfg(feature = "tracing")]
                tracing::warn!(attempt, ?wait, "retrying token fetch");
                tokio::time::sleep(wait).await;
            }

            match self.exchange().await {
                Ok(token) => {
                    #[cfg(feature = "metrics")]
                    counter!("token_fetch_total", "outcome" => "success").increment(1);
                    return Ok(token);
                }
                Err(TokenError::Unauthorized(msg)) => {
                    #[cfg(feature = "metrics")]
                    counter!("token_fetch_total", "outcome" => "unauthorized").increment(1);
                    return Err(TokenError::Unauthorized(msg));
                }
                Err(err) => {
                    last_error = Some(err);
                }
            }
        }

        #[cfg(feature = "metrics")]
        counter!("token_fetch_total", "outcome" => "exhausted").increment(1);
        Err(TokenError::FetchFailed(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "retries exhausted".to_string()),
        ))
    }

    async fn exchange(&self) -> Result<Token, TokenError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.config.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TokenError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Unauthorized(format!(
                "{status}: {body}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::FetchFailed(format!("{status}: {body}")));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError::FetchFailed(e.to_string()))?;

        Ok(Token::new(
            parsed.access_token,
            parsed.token_type,
            std::time::Duration::from_secs(parsed.expires_in),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> TokenManagerConfig {
        TokenManagerConfig::new("http://127.0.0.1:1/token", "id", "secret", "scope")
            .with_max_retries(0)
            .with_retry_base(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn invalidate_clears_snapshot_forcing_refetch() {
        let manager = TokenManager::new(config());
        {
            let mut inner = manager.inner.lock().await;
            inner.snapshot = Some(Token::new("cached".into(), "Bearer".into(), Duration::from_secs(3600)));
        }
        let token = manager.acquire().await.unwrap();
        assert_eq!(token.access_token, "cached");

        manager.invalidate().await;
        assert!(manager.inner.lock().await.snapshot.is_none());
    }

    #[tokio::test]
    async fn exhausted_retries_surface_fetch_failed() {
        let manager = TokenManager::new(config());
        let result = manager.acquire().await;
        assert!(matches!(result, Err(TokenError::FetchFailed(_))));
    }
}
