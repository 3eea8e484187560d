use crate::config::ServiceConfig;
use crate::error::QueryError;
use crate::refresh::BackgroundRefresher;
use crate::types::{CacheFirstResult, DocumentMeta, ReportResult, StatsResult};
use chrono::{DateTime, Datelike, Utc};
use registry_bulkindex::{validate_identifier, BulkIndex, RegistryRecord};
use registry_cache::{annual_report_path, ArtifactStore, CacheClass, CacheStore, RequestLogRecord};
use registry_coalesce::SingleflightCoordinator;
use registry_core::CorrelationId;
use registry_observability::{Observability, Outcome, RequestLogEntry};
use registry_upstream::UpstreamClient;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Query Service (C8): the public entry point, composing every other
/// component into the cache-first / singleflight-guarded / circuit- and
/// rate-limit-protected read API.
///
/// Background refresh scheduling needs to hand a `'static` future to the
/// bounded worker pool, so every public operation takes `self: &Arc<Self>`
/// rather than `&self` — callers hold a `QueryService` behind an `Arc` from
/// construction onward.
pub struct QueryService {
    upstream: UpstreamClient,
    cache: CacheStore,
    index: BulkIndex,
    coalesce: SingleflightCoordinator<Value, QueryError>,
    observability: Observability,
    refresher: BackgroundRefresher,
    artifacts: Arc<dyn ArtifactStore>,
}

impl QueryService {
    pub async fn new(
        config: &ServiceConfig,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Result<Arc<Self>, QueryError> {
        let cache = CacheStore::connect(config.cache_store_config()).await?;
        let index = BulkIndex::new(cache.pool());
        let upstream = UpstreamClient::new(
            config.upstream_client_config(),
            config.token_manager_config(),
            config.rate_limiter_config(),
            config.circuit_breaker_config(),
        );

        Ok(Arc::new(Self {
            upstream,
            cache,
            index,
            coalesce: SingleflightCoordinator::new(),
            observability: Observability::new(),
            refresher: BackgroundRefresher::new(config.max_background_refreshes),
            artifacts,
        }))
    }

    /// Exact-key and full-text search against the pre-loaded bulk index
    /// (C6), bypassing the durable cache entirely.
    pub async fn search(
        self: &Arc<Self>,
        text: &str,
        limit: usize,
    ) -> Result<Vec<RegistryRecord>, QueryError> {
        let started = Instant::now();
        let correlation_id = CorrelationId::new();
        let result = self.index.search(text, limit).await.map_err(QueryError::from);
        self.finish("search", result.is_ok(), false, started, correlation_id)
            .await;
        result
    }

    /// Cache-first organization details lookup with singleflight-guarded
    /// misses and stale-while-revalidate background refresh.
    pub async fn details(self: &Arc<Self>, identifier: &str) -> Result<CacheFirstResult, QueryError> {
        let started = Instant::now();
        let correlation_id = CorrelationId::new();
        let result = self.details_inner(identifier).await;
        self.finish(
            "details",
            result.is_ok(),
            result.as_ref().map(|r| r.cache_hit).unwrap_or(false),
            started,
            correlation_id,
        )
        .await;
        result
    }

    async fn details_inner(self: &Arc<Self>, identifier: &str) -> Result<CacheFirstResult, QueryError> {
        let identifier = validate_identifier(identifier).map_err(QueryError::from)?;
        let now = Utc::now();
        let key = format!("details:{identifier}");

        // A durable-store read failure degrades to an upstream fetch rather
        // than failing the request outright — treat it the same as a miss.
        let cached = match self.cache.read(CacheClass::Details, &identifier).await {
            Ok(entry) => entry,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(identifier = %identifier, %err, "cache read failed; degrading to upstream fetch");
                #[cfg(not(feature = "tracing"))]
                let _ = err;
                None
            }
        };

        if let Some(entry) = cached {
            if entry.is_fresh(now) {
                return Ok(CacheFirstResult {
                    payload: entry.payload,
                    cache_hit: true,
                    stale: false,
                });
            }

            let service = Arc::clone(self);
            let identifier_for_fetch = identifier.clone();
            let key_for_fetch = key.clone();
            self.refresher.schedule(async move {
                let result = service
                    .coalesce
                    .do_once(&key_for_fetch, async move {
                        service.fetch_and_cache_details(&identifier_for_fetch).await
                    })
                    .await;
                if let Err(err) = result {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(key = %key_for_fetch, %err, "background details refresh failed");
                    #[cfg(not(feature = "tracing"))]
                    let _ = err;
                }
            });

            return Ok(CacheFirstResult {
                payload: entry.payload,
                cache_hit: true,
                stale: true,
            });
        }

        let service = Arc::clone(self);
        let identifier_for_fetch = identifier.clone();
        let payload = self
            .coalesce
            .do_once(&key, async move { service.fetch_and_cache_details(&identifier_for_fetch).await })
            .await
            .map_err(QueryError::from)?;

        Ok(CacheFirstResult {
            payload,
            cache_hit: false,
            stale: false,
        })
    }

    async fn fetch_and_cache_details(&self, identifier: &str) -> Result<Value, QueryError> {
        let envelope = self.upstream.organization(identifier).await?;
        let payload = envelope
            .get("organisationer")
            .and_then(Value::as_array)
            .and_then(|orgs| orgs.first())
            .cloned()
            .ok_or(QueryError::NotFound)?;

        // A cache write failure is logged and counted, not propagated: the
        // caller already has a good payload from upstream.
        if let Err(err) = self
            .cache
            .write(
                CacheClass::Details,
                identifier,
                &payload,
                self.cache.default_ttl(CacheClass::Details),
            )
            .await
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(identifier = %identifier, %err, "failed to persist details cache entry");
            #[cfg(not(feature = "tracing"))]
            let _ = err;
        }

        Ok(payload)
    }

    /// Same cache-first/singleflight/stale-while-revalidate policy as
    /// `details`, over the document-list endpoint's short-TTL class.
    pub async fn documents(self: &Arc<Self>, identifier: &str) -> Result<CacheFirstResult, QueryError> {
        let started = Instant::now();
        let correlation_id = CorrelationId::new();
        let result = self.documents_inner(identifier).await;
        self.finish(
            "documents",
            result.is_ok(),
            result.as_ref().map(|r| r.cache_hit).unwrap_or(false),
            started,
            correlation_id,
        )
        .await;
        result
    }

    async fn documents_inner(self: &Arc<Self>, identifier: &str) -> Result<CacheFirstResult, QueryError> {
        let identifier = validate_identifier(identifier).map_err(QueryError::from)?;
        let now = Utc::now();
        let key = format!("documents:{identifier}");

        let cached = match self.cache.read(CacheClass::DocumentList, &identifier).await {
            Ok(entry) => entry,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(identifier = %identifier, %err, "cache read failed; degrading to upstream fetch");
                #[cfg(not(feature = "tracing"))]
                let _ = err;
                None
            }
        };

        if let Some(entry) = cached {
            if entry.is_fresh(now) {
                return Ok(CacheFirstResult {
                    payload: entry.payload,
                    cache_hit: true,
                    stale: false,
                });
            }

            let service = Arc::clone(self);
            let identifier_for_fetch = identifier.clone();
            let key_for_fetch = key.clone();
            self.refresher.schedule(async move {
                let result = service
                    .coalesce
                    .do_once(&key_for_fetch, async move {
                        service.fetch_and_cache_documents(&identifier_for_fetch).await
                    })
                    .await;
                if let Err(err) = result {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(key = %key_for_fetch, %err, "background document-list refresh failed");
                    #[cfg(not(feature = "tracing"))]
                    let _ = err;
                }
            });

            return Ok(CacheFirstResult {
                payload: entry.payload,
                cache_hit: true,
                stale: true,
            });
        }

        let service = Arc::clone(self);
        let identifier_for_fetch = identifier.clone();
        let payload = self
            .coalesce
            .do_once(&key, async move { service.fetch_and_cache_documents(&identifier_for_fetch).await })
            .await
            .map_err(QueryError::from)?;

        Ok(CacheFirstResult {
            payload,
            cache_hit: false,
            stale: false,
        })
    }

    async fn fetch_and_cache_documents(&self, identifier: &str) -> Result<Value, QueryError> {
        let payload = self.upstream.document_list(identifier).await?;

        if let Err(err) = self
            .cache
            .write(
                CacheClass::DocumentList,
                identifier,
                &payload,
                self.cache.default_ttl(CacheClass::DocumentList),
            )
            .await
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(identifier = %identifier, %err, "failed to persist document-list cache entry");
            #[cfg(not(feature = "tracing"))]
            let _ = err;
        }

        Ok(payload)
    }

    /// Resolves the annual report for `identifier`, optionally pinned to
    /// `year`, downloading and caching it on first request.
    /// Selection: the document whose reporting-period-end falls in `year`
    /// when given, otherwise the most recent one by period end, ties
    /// broken by registration timestamp.
    pub async fn report(
        self: &Arc<Self>,
        identifier: &str,
        year: Option<i32>,
    ) -> Result<ReportResult, QueryError> {
        let started = Instant::now();
        let correlation_id = CorrelationId::new();
        let result = self.report_inner(identifier, year).await;
        self.finish(
            "report",
            result.is_ok(),
            result.as_ref().map(|r| r.cache_hit).unwrap_or(false),
            started,
            correlation_id,
        )
        .await;
        result
    }

    async fn report_inner(
        self: &Arc<Self>,
        identifier: &str,
        year: Option<i32>,
    ) -> Result<ReportResult, QueryError> {
        let identifier = validate_identifier(identifier).map_err(QueryError::from)?;
        let documents = self.documents(&identifier).await?;
        let candidates = parse_document_metas(&documents.payload);

        let selected = match year {
            Some(y) => candidates
                .into_iter()
                .filter(|d| d.period_end.year() == y)
                .max_by_key(|d| (d.period_end, d.registered_at)),
            None => candidates
                .into_iter()
                .max_by_key(|d| (d.period_end, d.registered_at)),
        }
        .ok_or(QueryError::NotFound)?;

        let resolved_year = selected.period_end.year();
        let cache_key = format!("{identifier}:{resolved_year}:{}", selected.format);

        let cached = match self.cache.read(CacheClass::Report, &cache_key).await {
            Ok(entry) => entry,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(cache_key = %cache_key, %err, "cache read failed; degrading to upstream fetch");
                #[cfg(not(feature = "tracing"))]
                let _ = err;
                None
            }
        };

        if let Some(entry) = cached {
            let artifact_path = entry
                .payload
                .get("artifact_path")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Ok(ReportResult {
                payload: entry.payload,
                artifact_path,
                cache_hit: true,
            });
        }

        let service = Arc::clone(self);
        let selected_for_fetch = selected.clone();
        let identifier_for_fetch = identifier.clone();
        let payload = self
            .coalesce
            .do_once(&format!("report:{cache_key}"), async move {
                service
                    .fetch_and_cache_report(&identifier_for_fetch, resolved_year, &selected_for_fetch)
                    .await
            })
            .await
            .map_err(QueryError::from)?;

        let artifact_path = payload
            .get("artifact_path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(ReportResult {
            payload,
            artifact_path,
            cache_hit: false,
        })
    }

    async fn fetch_and_cache_report(
        &self,
        identifier: &str,
        year: i32,
        doc: &DocumentMeta,
    ) -> Result<Value, QueryError> {
        let bytes = self.upstream.download_document(&doc.document_id).await?;
        let filename = format!("{}.{}", doc.document_id, extension_for(&doc.format));
        let path = annual_report_path(identifier, year, &filename);
        let mime_type = mime_for(&doc.format);

        self.artifacts.put(&path, mime_type, &bytes).await?;

        let payload = serde_json::json!({
            "document_id": doc.document_id,
            "format": doc.format,
            "period_end": doc.period_end,
            "artifact_path": path,
            "size_bytes": bytes.len(),
        });

        let cache_key = format!("{identifier}:{year}:{}", doc.format);
        if let Err(err) = self
            .cache
            .write(
                CacheClass::Report,
                &cache_key,
                &payload,
                self.cache.default_ttl(CacheClass::Report),
            )
            .await
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(cache_key = %cache_key, %err, "failed to persist report cache entry");
            #[cfg(not(feature = "tracing"))]
            let _ = err;
        }

        Ok(payload)
    }

    /// In-process counters and latency quantiles.
    pub async fn stats(self: &Arc<Self>) -> StatsResult {
        let snapshot = self.observability.snapshot();
        let window_start = Utc::now() - chrono::Duration::hours(24);
        let cache_hit_rate_24h = match self.cache.cache_hit_rate_since(window_start).await {
            Ok(rate) => rate,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%err, "failed to compute windowed cache hit rate; falling back to lifetime average");
                #[cfg(not(feature = "tracing"))]
                let _ = err;
                self.observability.cache_hit_rate()
            }
        };
        StatsResult {
            requests_total: snapshot.requests_total,
            cache_hits_total: snapshot.cache_hits_total,
            cache_misses_total: snapshot.cache_misses_total,
            cache_hit_rate_24h,
            upstream_calls_total: snapshot.upstream_calls_total,
            circuit_opens_total: snapshot.circuit_opens_total,
            uptime: snapshot.uptime,
        }
    }

    async fn finish(
        &self,
        endpoint: &str,
        ok: bool,
        cache_hit: bool,
        started: Instant,
        correlation_id: CorrelationId,
    ) {
        let latency = started.elapsed();
        let outcome = if ok { Outcome::Success } else { Outcome::Internal };

        self.observability.record(&RequestLogEntry {
            endpoint: endpoint.to_string(),
            outcome,
            cache_hit,
            latency,
            correlation_id,
        });

        let record = RequestLogRecord {
            endpoint,
            outcome: outcome.as_str(),
            cache_hit,
            latency_ms: latency.as_millis() as i64,
            correlation_id: &correlation_id.to_string(),
        };
        if let Err(err) = self.cache.append_log(&record).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(%err, "failed to persist request log entry");
            #[cfg(not(feature = "tracing"))]
            let _ = err;
        }
    }
}

fn parse_document_metas(payload: &Value) -> Vec<DocumentMeta> {
    payload
        .get("dokument")
        .and_then(Value::as_array)
        .map(|docs| docs.iter().filter_map(parse_document_meta).collect())
        .unwrap_or_default()
}

fn parse_document_meta(doc: &Value) -> Option<DocumentMeta> {
    let document_id = doc.get("dokumentId")?.as_str()?.to_string();
    let format = doc.get("filformat")?.as_str()?.to_string();
    let period_end = doc
        .get("rapporteringsperiodTom")?
        .as_str()
        .and_then(|s| s.parse().ok())?;
    let registered_at: DateTime<Utc> = doc
        .get("registreringstidpunkt")?
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))?;

    Some(DocumentMeta {
        document_id,
        format,
        period_end,
        registered_at,
    })
}

fn extension_for(format: &str) -> &'static str {
    match format {
        "pdf" => "pdf",
        "xml" => "xml",
        _ => "zip",
    }
}

fn mime_for(format: &str) -> &'static str {
    match format {
        "pdf" => "application/pdf",
        "xml" => "application/xml",
        _ => "application/zip",
    }
}
