use serde_json::Value;

/// Result of `details`/`documents`: the payload plus the freshness flags a
/// caller needs.
#[derive(Debug, Clone)]
pub struct CacheFirstResult {
    pub payload: Value,
    pub cache_hit: bool,
    pub stale: bool,
}

/// Result of `report`.
#[derive(Debug, Clone)]
pub struct ReportResult {
    pub payload: Value,
    pub artifact_path: String,
    pub cache_hit: bool,
}

/// Result of `stats`.
#[derive(Debug, Clone)]
pub struct StatsResult {
    pub requests_total: std::collections::HashMap<String, u64>,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub cache_hit_rate_24h: f64,
    pub upstream_calls_total: u64,
    pub circuit_opens_total: u64,
    pub uptime: std::time::Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct DocumentMeta {
    pub document_id: String,
    pub format: String,
    pub period_end: chrono::NaiveDate,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}
