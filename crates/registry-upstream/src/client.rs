use crate::config::UpstreamClientConfig;
use crate::error::UpstreamError;
use registry_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use registry_core::backoff::{default_schedule, IntervalFunction};
use registry_ratelimiter::{RateLimiter, RateLimiterConfig};
use registry_token::{TokenManager, TokenManagerConfig};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Upstream Client (C4): composes the Token Manager, Rate Limiter, and
/// Circuit Breaker in front of the registry's HTTP API, in this order:
/// circuit gate, rate limiter, token, HTTP exchange, 401-retry-once,
/// 5xx/network backoff, report to circuit, record latency.
pub struct UpstreamClient {
    config: UpstreamClientConfig,
    http: reqwest::Client,
    tokens: TokenManager,
    rate_limiter: RateLimiter,
    circuit: CircuitBreaker,
}

impl UpstreamClient {
    pub fn new(
        config: UpstreamClientConfig,
        token_config: TokenManagerConfig,
        rate_limit_config: RateLimiterConfig,
        circuit_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens: TokenManager::new(token_config),
            rate_limiter: RateLimiter::new(rate_limit_config),
            circuit: CircuitBreaker::new(circuit_config),
            config,
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit
    }

    /// GET the liveness endpoint, bearer-authenticated. 200 => healthy.
    pub async fn liveness(&self) -> Result<bool, UpstreamError> {
        let url = format!("{}/liveness", self.config.base_url);
        let response = self.call(reqwest::Method::GET, &url, None::<&Value>).await?;
        Ok(response.status.is_success())
    }

    /// POST the organization endpoint; returns the raw JSON envelope. An
    /// empty `organisationer` array means "not found", decided by the
    /// caller (Query Service), not here.
    pub async fn organization(&self, identifier: &str) -> Result<Value, UpstreamError> {
        let url = format!("{}/organisationer", self.config.base_url);
        let body = serde_json::json!({ "identitetsbeteckning": identifier });
        let response = self
            .call(reqwest::Method::POST, &url, Some(&body))
            .await?;
        response
            .json::<Value>()
            .map_err(|e| UpstreamError::ServerError(e.to_string()))
    }

    /// POST the document list endpoint for `identifier`.
    pub async fn document_list(&self, identifier: &str) -> Result<Value, UpstreamError> {
        let url = format!("{}/dokument/lista", self.config.base_url);
        let body = serde_json::json!({ "identitetsbeteckning": identifier });
        let response = self
            .call(reqwest::Method::POST, &url, Some(&body))
            .await?;
        response
            .json::<Value>()
            .map_err(|e| UpstreamError::ServerError(e.to_string()))
    }

    /// GET the binary document download endpoint. Returns the raw bytes;
    /// the Query Service is responsible for extracting structured data
    /// (that belongs to the Query Service, not this client).
    pub async fn download_document(&self, document_id: &str) -> Result<Vec<u8>, UpstreamError> {
        let url = format!("{}/dokument/{}", self.config.base_url, document_id);
        let response = self
            .call_with_accept(reqwest::Method::GET, &url, None::<&Value>, "application/zip")
            .await?;
        response
            .bytes()
            .await
            .map_err(|e| UpstreamError::ServerError(e.to_string()))
    }

    async fn call<B: serde::Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<RawResponse, UpstreamError> {
        self.call_with_accept(method, url, body, "application/json").await
    }

    async fn call_with_accept<B: serde::Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
        accept: &str,
    ) -> Result<RawResponse, UpstreamError> {
        let result = self
            .circuit
            .execute_classified(
                || self.call_with_retry(method.clone(), url, body, accept),
                UpstreamError::counts_as_circuit_failure,
            )
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(CircuitBreakerError::Open) => Err(UpstreamError::CircuitOpen),
            Err(CircuitBreakerError::Inner(err)) => Err(err),
        }
    }

    async fn call_with_retry<B: serde::Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
        accept: &str,
    ) -> Result<RawResponse, UpstreamError> {
        let backoff = default_schedule(self.config.retry_base.as_millis() as u64);
        let mut retried_on_unauthorized = false;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let wait = backoff.next_interval(attempt - 1);
                #[cfg(feature = "tracing")]
                tracing::warn!(attempt, ?wait, url, "retrying upstream call");
                tokio::time::sleep(wait).await;
            }

            self.rate_limiter.acquire().await;
            let token = self.tokens.acquire().await.map_err(|e| match e {
                registry_token::TokenError::Unauthorized(msg) => UpstreamError::Unauthorized(msg),
                registry_token::TokenError::FetchFailed(msg) => UpstreamError::ServerError(msg),
            })?;

            let attempt_result = self.exchange(method.clone(), url, body, accept, &token.bearer_header()).await;

            match attempt_result {
                Ok(response) => {
                    #[cfg(feature = "metrics")]
                    counter!("upstream_calls_total", "outcome" => "success").increment(1);
                    return Ok(response);
                }
                Err(UpstreamError::Unauthorized(msg)) if !retried_on_unauthorized => {
                    retried_on_unauthorized = true;
                    self.tokens.invalidate().await;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%msg, "upstream rejected token, invalidating and retrying once");
                    continue;
                }
                Err(err) if self.retryable(&err) && attempt < self.config.max_retries => {
                    continue;
                }
                Err(err) => {
                    #[cfg(feature = "metrics")]
                    counter!("upstream_errors_total", "kind" => err.kind().to_string())
                        .increment(1);
                    return Err(err);
                }
            }
        }

        Err(UpstreamError::ServerError("retries exhausted".into()))
    }

    fn retryable(&self, error: &UpstreamError) -> bool {
        matches!(
            error,
            UpstreamError::ServerError(_) | UpstreamError::Timeout | UpstreamError::RateLimited(_)
        )
    }

    async fn exchange<B: serde::Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
        accept: &str,
        bearer: &str,
    ) -> Result<RawResponse, UpstreamError> {
        let mut request = self
            .http
            .request(method, url)
            .header("Authorization", bearer)
            .header("Accept", accept);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = tokio::time::timeout(self.config.timeout, request.send())
            .await
            .map_err(|_| UpstreamError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    UpstreamError::ServerError(e.to_string())
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::Unauthorized(body))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::RateLimited(body))
            }
            s if s.is_server_error() => {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::ServerError(format!("{s}: {body}")))
            }
            s if s.is_client_error() => {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::BadRequest(format!("{s}: {body}")))
            }
            _ => Ok(RawResponse {
                status,
                inner: response,
            }),
        }
    }
}

struct RawResponse {
    status: StatusCode,
    inner: reqwest::Response,
}

impl RawResponse {
    async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T, reqwest::Error> {
        self.inner.json().await
    }

    async fn bytes(self) -> Result<Vec<u8>, reqwest::Error> {
        Ok(self.inner.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> (UpstreamClientConfig, TokenManagerConfig, RateLimiterConfig, CircuitBreakerConfig) {
        (
            UpstreamClientConfig::new("http://127.0.0.1:1").with_max_retries(0),
            TokenManagerConfig::new("http://127.0.0.1:1/token", "id", "secret", "scope")
                .with_max_retries(0)
                .with_retry_base(Duration::from_millis(1)),
            RateLimiterConfig::default(),
            CircuitBreakerConfig::default(),
        )
    }

    #[tokio::test]
    async fn unreachable_upstream_surfaces_server_error_without_panicking() {
        let (u, t, r, c) = config();
        let client = UpstreamClient::new(u, t, r, c);
        let result = client.organization("5560001712").await;
        assert!(result.is_err());
    }
}
