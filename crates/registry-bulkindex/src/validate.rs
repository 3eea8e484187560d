use crate::error::BulkIndexError;

/// Patterns that flag a free-text query as a control-injection attempt:
/// SQL meta-characters and script/event-handler sequences.
const REJECTED_PATTERNS: &[&str] = &[
    "--", ";", "/*", "*/", "' or ", "\" or ", "<script", "javascript:", "onerror=", "onload=",
];

/// Validates and normalizes an identifier lookup key: exactly ten decimal
/// digits.
pub fn validate_identifier(identifier: &str) -> Result<String, BulkIndexError> {
    let trimmed = identifier.trim();
    if trimmed.len() != 10 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BulkIndexError::InvalidIdentifier);
    }
    Ok(trimmed.to_string())
}

/// Validates and normalizes a free-text search query: trims, collapses
/// internal whitespace runs, enforces the 1..=200 length bound, and rejects
/// control-injection signatures.
pub fn validate_query(query: &str) -> Result<String, BulkIndexError> {
    let normalized = normalize_whitespace(query);
    if normalized.is_empty() || normalized.chars().count() > 200 {
        return Err(BulkIndexError::QueryLength);
    }

    let lower = normalized.to_lowercase();
    if REJECTED_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
        return Err(BulkIndexError::QueryRejected);
    }
    if normalized.chars().any(|c| c.is_control()) {
        return Err(BulkIndexError::QueryRejected);
    }

    Ok(normalized)
}

/// Validates the `search(text, limit)` limit bound: `1 <= limit <= 100`.
pub fn validate_limit(limit: usize) -> Result<usize, BulkIndexError> {
    if limit == 0 || limit > 100 {
        return Err(BulkIndexError::InvalidLimit);
    }
    Ok(limit)
}

fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ten_digit_identifier() {
        assert_eq!(validate_identifier("5560001712").unwrap(), "5560001712");
    }

    #[test]
    fn rejects_wrong_length_identifier() {
        assert_eq!(validate_identifier("556000171").unwrap_err(), BulkIndexError::InvalidIdentifier);
        assert_eq!(validate_identifier("55600017123").unwrap_err(), BulkIndexError::InvalidIdentifier);
    }

    #[test]
    fn rejects_non_digit_identifier() {
        assert_eq!(validate_identifier("556000171x").unwrap_err(), BulkIndexError::InvalidIdentifier);
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(validate_query("  acme   ab  ").unwrap(), "acme ab");
    }

    #[test]
    fn rejects_empty_or_oversized_query() {
        assert_eq!(validate_query("").unwrap_err(), BulkIndexError::QueryLength);
        assert_eq!(validate_query(&"a".repeat(201)).unwrap_err(), BulkIndexError::QueryLength);
    }

    #[test]
    fn rejects_sql_meta_characters() {
        assert_eq!(validate_query("acme'; DROP TABLE x; --").unwrap_err(), BulkIndexError::QueryRejected);
    }

    #[test]
    fn rejects_script_sequences() {
        assert_eq!(validate_query("<script>alert(1)</script>").unwrap_err(), BulkIndexError::QueryRejected);
    }

    #[test]
    fn limit_bounds_enforced() {
        assert_eq!(validate_limit(0).unwrap_err(), BulkIndexError::InvalidLimit);
        assert_eq!(validate_limit(101).unwrap_err(), BulkIndexError::InvalidLimit);
        assert_eq!(validate_limit(100).unwrap(), 100);
    }
}
