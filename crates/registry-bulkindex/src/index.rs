use crate::error::BulkIndexError;
use crate::record::RegistryRecord;
use crate::validate::{validate_identifier, validate_limit, validate_query};
use sqlx::sqlite::SqlitePool;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Bulk Index (C6): exact-key lookup and full-text search over a
/// pre-populated, read-only `registry_records` table.
#[derive(Clone)]
pub struct BulkIndex {
    pool: SqlitePool,
}

impl BulkIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Exact-key lookup, intended < 50 ms. Rejects malformed
    /// identifiers before touching the store.
    pub async fn lookup(&self, identifier: &str) -> Result<Option<RegistryRecord>, BulkIndexError> {
        let identifier = validate_identifier(identifier)?;

        let record = sqlx::query_as::<_, RegistryRecord>(
            "SELECT identifier, display_name, form, registration_date, deregistration_date,
                    description, address
             FROM registry_records WHERE identifier = ?1",
        )
        .bind(&identifier)
        .fetch_optional(&self.pool)
        .await?;

        #[cfg(feature = "metrics")]
        counter!("bulkindex_lookup_total", "outcome" => if record.is_some() { "found" } else { "absent" })
            .increment(1);

        Ok(record)
    }

    /// Case-insensitive substring/token search over display name (and
    /// description), ordered by relevance then name; ties broken by
    /// registration date descending then identifier ascending.
    /// Intended < 200 ms at 2x10^6 rows via the FTS5 index.
    pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<RegistryRecord>, BulkIndexError> {
        let query = validate_query(text)?;
        let limit = validate_limit(limit)?;

        // The trigram tokenizer already matches substrings anywhere in the
        // indexed text; it doesn't support FTS5's `*` prefix operator.
        let fts_query = escape_fts_query(&query);

        let records = sqlx::query_as::<_, RegistryRecord>(
            "SELECT r.identifier, r.display_name, r.form, r.registration_date,
                    r.deregistration_date, r.description, r.address
             FROM registry_records_fts f
             JOIN registry_records r ON r.identifier = f.identifier
             WHERE registry_records_fts MATCH ?1
             ORDER BY bm25(registry_records_fts) ASC,
                      r.display_name ASC,
                      r.registration_date DESC,
                      r.identifier ASC
             LIMIT ?2",
        )
        .bind(fts_query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        #[cfg(feature = "metrics")]
        counter!("bulkindex_search_total").increment(1);

        Ok(records)
    }
}

/// FTS5 query syntax treats `"`, `*`, and `:` specially; since the query
/// has already passed `validate_query`'s control-injection check, this only
/// needs to neutralize FTS5's own operators so a legitimate organization
/// name containing e.g. a quote can't be misread as a query expression.
fn escape_fts_query(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}
