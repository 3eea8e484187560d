use registry_cache::CacheStoreConfig;
use registry_circuitbreaker::CircuitBreakerConfig;
use registry_ratelimiter::RateLimiterConfig;
use registry_token::TokenManagerConfig;
use registry_upstream::UpstreamClientConfig;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// The full configuration surface, assembled either from
/// environment variables (`upstream.client_id` -> `REGISTRY_UPSTREAM_CLIENT_ID`,
/// matching the `envy`-style flattened-prefix convention) or from a TOML
/// file read with `serde`.
#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub upstream: UpstreamSection,
    pub rate_limit: RateLimitSection,
    pub circuit: CircuitSection,
    pub cache: CacheSection,
    pub token: TokenSection,
    #[serde(default = "default_max_background_refreshes")]
    pub max_background_refreshes: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpstreamSection {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_scope")]
    pub scope: String,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_rate_limit_requests")]
    pub requests: usize,
    #[serde(default = "default_rate_limit_window_ms")]
    pub window_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct CircuitSection {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,
    #[serde(default = "default_recovery_ms")]
    pub recovery_ms: u64,
    #[serde(default = "default_half_open_required_successes")]
    pub half_open_required_successes: usize,
}

#[derive(Debug, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_ttl_details_ms")]
    pub ttl_details_ms: u64,
    #[serde(default = "default_ttl_documents_ms")]
    pub ttl_documents_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct TokenSection {
    #[serde(default = "default_safety_buffer_ms")]
    pub safety_buffer_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_base_ms() -> u64 {
    1_000
}
fn default_scope() -> String {
    String::new()
}
fn default_rate_limit_requests() -> usize {
    10
}
fn default_rate_limit_window_ms() -> u64 {
    1_000
}
fn default_failure_threshold() -> usize {
    5
}
fn default_recovery_ms() -> u64 {
    60_000
}
fn default_half_open_required_successes() -> usize {
    2
}
fn default_database_url() -> String {
    "sqlite://registry-cache.db".to_string()
}
fn default_ttl_details_ms() -> u64 {
    30 * 24 * 60 * 60 * 1000
}
fn default_ttl_documents_ms() -> u64 {
    7 * 24 * 60 * 60 * 1000
}
fn default_safety_buffer_ms() -> u64 {
    60_000
}
fn default_max_background_refreshes() -> usize {
    16
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(String),
    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

impl ServiceConfig {
    /// Reads the required fields from `REGISTRY_UPSTREAM_*` environment
    /// variables and everything else from its `Default` value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = required_env("REGISTRY_UPSTREAM_CLIENT_ID")?;
        let client_secret = required_env("REGISTRY_UPSTREAM_CLIENT_SECRET")?;
        let token_url = required_env("REGISTRY_UPSTREAM_TOKEN_URL")?;
        let base_url = required_env("REGISTRY_UPSTREAM_BASE_URL")?;

        Ok(Self {
            upstream: UpstreamSection {
                client_id,
                client_secret,
                token_url,
                base_url,
                timeout_ms: default_timeout_ms(),
                max_retries: default_max_retries(),
                retry_base_ms: default_retry_base_ms(),
                scope: default_scope(),
            },
            rate_limit: RateLimitSection {
                requests: default_rate_limit_requests(),
                window_ms: default_rate_limit_window_ms(),
            },
            circuit: CircuitSection {
                failure_threshold: default_failure_threshold(),
                recovery_ms: default_recovery_ms(),
                half_open_required_successes: default_half_open_required_successes(),
            },
            cache: CacheSection {
                database_url: default_database_url(),
                ttl_details_ms: default_ttl_details_ms(),
                ttl_documents_ms: default_ttl_documents_ms(),
            },
            token: TokenSection {
                safety_buffer_ms: default_safety_buffer_ms(),
            },
            max_background_refreshes: default_max_background_refreshes(),
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn upstream_client_config(&self) -> UpstreamClientConfig {
        UpstreamClientConfig::new(&self.upstream.base_url)
            .with_timeout(Duration::from_millis(self.upstream.timeout_ms))
            .with_max_retries(self.upstream.max_retries)
    }

    pub fn token_manager_config(&self) -> TokenManagerConfig {
        TokenManagerConfig::new(
            &self.upstream.token_url,
            &self.upstream.client_id,
            &self.upstream.client_secret,
            &self.upstream.scope,
        )
        .with_safety_buffer(Duration::from_millis(self.token.safety_buffer_ms))
        .with_max_retries(self.upstream.max_retries)
        .with_retry_base(Duration::from_millis(self.upstream.retry_base_ms))
    }

    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig::new(
            self.rate_limit.requests,
            Duration::from_millis(self.rate_limit.window_ms),
        )
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::builder()
            .failure_threshold(self.circuit.failure_threshold)
            .recovery_timeout(Duration::from_millis(self.circuit.recovery_ms))
            .half_open_required_successes(self.circuit.half_open_required_successes)
            .build()
    }

    pub fn cache_store_config(&self) -> CacheStoreConfig {
        CacheStoreConfig::new(&self.cache.database_url)
            .with_ttl_details(Duration::from_millis(self.cache.ttl_details_ms))
            .with_ttl_documents(Duration::from_millis(self.cache.ttl_documents_ms))
    }
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnv(key.to_string()))
}
