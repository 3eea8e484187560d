use crate::config::CacheStoreConfig;
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::time::Duration;

#[cfg(feature = "metrics")]
use metrics::counter;

/// The three cache classes, each with its own table and TTL policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum CacheClass {
    Details,
    DocumentList,
    Report,
}

impl CacheClass {
    fn table(self) -> &'static str {
        match self {
            CacheClass::Details => "details_cache",
            CacheClass::DocumentList => "document_list_cache",
            CacheClass::Report => "report_cache",
        }
    }
}

/// A cache entry with the timestamps callers need to classify it as
/// fresh, stale, or absent — classification is the caller's job, the
/// store just returns the raw timestamps.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub fetch: DateTime<Utc>,
    pub expiry: Option<DateTime<Utc>>,
    pub fetch_count: i64,
}

impl CacheEntry {
    /// A `None` expiry means the entry never goes stale (the Report class'
    /// permanent TTL).
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now < expiry,
            None => true,
        }
    }
}

/// Durable Cache Store (C5): three logical tables (details, document-list,
/// report) plus the append-only `request_log` sink, backed by `sqlx`.
///
/// Grounded on the connection-pooling style of the pack's own relational
/// store crate: SQLite-first with WAL and a bounded connection pool, same
/// schema portable to Postgres.
#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    config: CacheStoreConfig,
}

impl CacheStore {
    pub async fn connect(config: CacheStoreConfig) -> Result<Self, CacheError> {
        let filename = config
            .database_url
            .strip_prefix("sqlite://")
            .unwrap_or(&config.database_url);

        let connect_options = SqliteConnectOptions::new()
            .filename(filename)
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;

        sqlx::migrate!("../../migrations").run(&pool).await.map_err(|e| {
            CacheError::Unavailable(e.to_string())
        })?;

        Ok(Self { pool, config })
    }

    /// Used by tests and by `registry-query`'s in-memory fakes to construct
    /// a store around an already-open, already-migrated pool.
    pub fn from_pool(pool: SqlitePool, config: CacheStoreConfig) -> Self {
        Self { pool, config }
    }

    /// The underlying pool, shared with `registry-bulkindex::BulkIndex`
    /// since both read the same migrated database (`SqlitePool` is a thin
    /// `Arc` handle, so cloning it is cheap).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// `None` means the class never expires (Report entries are permanent
    /// once stored).
    pub fn default_ttl(&self, class: CacheClass) -> Option<Duration> {
        match class {
            CacheClass::Details => Some(self.config.ttl_details),
            CacheClass::DocumentList => Some(self.config.ttl_documents),
            CacheClass::Report => None,
        }
    }

    /// Point read. Returns `None` for an absent entry; the caller classifies
    /// fresh/stale from the returned `expiry`.
    pub async fn read(&self, class: CacheClass, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query_as::<_, CacheRow>(&format!(
            "SELECT payload, fetch, expiry, fetch_count FROM {} WHERE key = ?1",
            class.table()
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                #[cfg(feature = "metrics")]
                counter!("cache_read_total", "class" => format!("{:?}", class)).increment(1);
                Ok(Some(row.into_entry()?))
            }
            None => Ok(None),
        }
    }

    /// Upsert: `fetch = now`, `expiry = now + ttl` (or `NULL` when `ttl` is
    /// `None`, meaning the entry never goes stale), `fetch_count`
    /// incremented. Write-write races on the same key are last-writer-wins.
    pub async fn write(
        &self,
        class: CacheClass,
        key: &str,
        payload: &serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let now = Utc::now();
        let expiry = ttl.map(|ttl| now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()));
        let payload_text = serde_json::to_string(payload)
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        sqlx::query(&format!(
            "INSERT INTO {table} (key, payload, fetch, expiry, fetch_count)
             VALUES (?1, ?2, ?3, ?4, 1)
             ON CONFLICT(key) DO UPDATE SET
               payload = excluded.payload,
               fetch = excluded.fetch,
               expiry = excluded.expiry,
               fetch_count = {table}.fetch_count + 1",
            table = class.table()
        ))
        .bind(key)
        .bind(payload_text)
        .bind(now)
        .bind(expiry)
        .execute(&self.pool)
        .await?;

        #[cfg(feature = "metrics")]
        counter!("cache_write_total", "class" => format!("{:?}", class)).increment(1);

        Ok(())
    }

    /// Sweeps entries whose `expiry` has already passed, using the
    /// secondary index on `expiry`. Returns the number of
    /// rows removed.
    pub async fn sweep_expired(&self, class: CacheClass) -> Result<u64, CacheError> {
        let now = Utc::now();
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE expiry < ?1",
            class.table()
        ))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Appends one row to the append-only `request_log` table — the
    /// durable sink Observability (C9) writes every completed request to.
    pub async fn append_log(&self, entry: &RequestLogRecord<'_>) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO request_log (endpoint, outcome, cache_hit, latency_ms, correlation_id, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(entry.endpoint)
        .bind(entry.outcome)
        .bind(entry.cache_hit)
        .bind(entry.latency_ms)
        .bind(entry.correlation_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fraction of logged requests that were cache hits since `since`,
    /// computed from the durable `request_log` table rather than the
    /// in-process lifetime counters — this is what gives `stats()` a real
    /// 24-hour window instead of an all-time average.
    pub async fn cache_hit_rate_since(&self, since: DateTime<Utc>) -> Result<f64, CacheError> {
        let (total, hits): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), SUM(CASE WHEN cache_hit THEN 1 ELSE 0 END)
             FROM request_log WHERE recorded_at >= ?1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        if total == 0 {
            Ok(0.0)
        } else {
            Ok(hits.unwrap_or(0) as f64 / total as f64)
        }
    }
}

/// Fields for one `request_log` row.
pub struct RequestLogRecord<'a> {
    pub endpoint: &'a str,
    pub outcome: &'a str,
    pub cache_hit: bool,
    pub latency_ms: i64,
    pub correlation_id: &'a str,
}

#[derive(sqlx::FromRow)]
struct CacheRow {
    payload: String,
    fetch: DateTime<Utc>,
    expiry: Option<DateTime<Utc>>,
    fetch_count: i64,
}

impl CacheRow {
    fn into_entry(self) -> Result<CacheEntry, CacheError> {
        let payload = serde_json::from_str(&self.payload)
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(CacheEntry {
            payload,
            fetch: self.fetch,
            expiry: self.expiry,
            fetch_count: self.fetch_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn in_memory_store() -> CacheStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
        CacheStore::from_pool(pool, CacheStoreConfig::default())
    }

    #[tokio::test]
    async fn write_then_read_round_trips_with_fresh_timestamps() {
        let store = in_memory_store().await;
        let payload = serde_json::json!({ "name": "Acme AB" });
        store
            .write(CacheClass::Details, "5560001712", &payload, Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let entry = store.read(CacheClass::Details, "5560001712").await.unwrap().unwrap();
        assert_eq!(entry.payload, payload);
        assert_eq!(entry.fetch_count, 1);
        assert!(entry.is_fresh(Utc::now()));
    }

    #[tokio::test]
    async fn repeated_write_increments_fetch_count_last_writer_wins() {
        let store = in_memory_store().await;
        let first = serde_json::json!({ "v": 1 });
        let second = serde_json::json!({ "v": 2 });
        store.write(CacheClass::Details, "k", &first, Some(Duration::from_secs(60))).await.unwrap();
        store.write(CacheClass::Details, "k", &second, Some(Duration::from_secs(60))).await.unwrap();

        let entry = store.read(CacheClass::Details, "k").await.unwrap().unwrap();
        assert_eq!(entry.payload, second);
        assert_eq!(entry.fetch_count, 2);
    }

    #[tokio::test]
    async fn absent_key_reads_as_none() {
        let store = in_memory_store().await;
        assert!(store.read(CacheClass::Details, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let store = in_memory_store().await;
        let payload = serde_json::json!({});
        store.write(CacheClass::Details, "expired", &payload, Some(Duration::from_millis(0))).await.unwrap();
        store.write(CacheClass::Details, "fresh", &payload, Some(Duration::from_secs(3600))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let removed = store.sweep_expired(CacheClass::Details).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.read(CacheClass::Details, "fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn report_entries_never_go_stale() {
        let store = in_memory_store().await;
        let payload = serde_json::json!({ "document_id": "doc-1" });
        store.write(CacheClass::Report, "k", &payload, None).await.unwrap();

        let entry = store.read(CacheClass::Report, "k").await.unwrap().unwrap();
        assert!(entry.expiry.is_none());
        assert!(entry.is_fresh(Utc::now() + chrono::Duration::days(3650)));

        let removed = store.sweep_expired(CacheClass::Report).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn append_log_persists_a_row() {
        let store = in_memory_store().await;
        store
            .append_log(&RequestLogRecord {
                endpoint: "details",
                outcome: "ok",
                cache_hit: false,
                latency_ms: 42,
                correlation_id: "11111111-1111-1111-1111-111111111111",
            })
            .await
            .unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM request_log")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn cache_hit_rate_since_reflects_only_recent_rows() {
        let store = in_memory_store().await;
        for cache_hit in [true, true, false] {
            store
                .append_log(&RequestLogRecord {
                    endpoint: "details",
                    outcome: "ok",
                    cache_hit,
                    latency_ms: 5,
                    correlation_id: "11111111-1111-1111-1111-111111111111",
                })
                .await
                .unwrap();
        }

        let rate = store.cache_hit_rate_since(Utc::now() - chrono::Duration::hours(24)).await.unwrap();
        assert!((rate - (2.0 / 3.0)).abs() < 1e-9);

        let rate_future_window = store.cache_hit_rate_since(Utc::now() + chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(rate_future_window, 0.0);
    }
}
