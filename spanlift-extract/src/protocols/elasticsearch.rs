//! Elasticsearch REST conventions.
//!
//! Elasticsearch encodes the target indices and the action in the URL path,
//! and the query DSL in the JSON body:
//!
//! ```text
//! POST /logs-2024,metrics/_search?size=20
//! {"query": {"match": {"name": "OBI"}}}
//! ```
//!
//! Everything before the action segment is the collection (comma-separated
//! index lists are kept as one string), the action maps to an operation verb,
//! and the body becomes the canonical query text. Query-string parameters
//! are not part of the query text.

use spanlift_types::{CapturedExchange, ExtractionResult, Protocol};

use crate::error::ExtractError;
use crate::json;

/// REST action path suffix → operation verb, consulted in order.
pub const ELASTICSEARCH_ACTIONS: &[(&str, &str)] = &[("_search", "search")];

/// Look up the operation verb for an action segment.
pub fn lookup_action(segment: &str) -> Option<&'static str> {
    if !segment.starts_with('_') {
        return None;
    }
    ELASTICSEARCH_ACTIONS
        .iter()
        .find(|(suffix, _)| *suffix == segment)
        .map(|(_, op)| *op)
}

/// Split a URL path into `(collection, operation)`.
///
/// Leading and trailing slashes are ignored; the collection is every segment
/// before the action, joined as it appeared. Returns `None` if the last
/// segment is not a known action.
pub fn parse_path(path: &str) -> Option<(&str, &'static str)> {
    let trimmed = path.trim_matches('/');
    let (collection, action) = match trimmed.rsplit_once('/') {
        Some((collection, action)) => (collection.trim_end_matches('/'), action),
        None => ("", trimmed),
    };
    let operation = lookup_action(action)?;
    Some((collection, operation))
}

/// Recognition rule: `GET` or `POST` to a path ending in a known action.
pub fn matches(exchange: &CapturedExchange<'_>) -> bool {
    (exchange.method_is("GET") || exchange.method_is("POST"))
        && parse_path(exchange.path).is_some()
}

/// Extract collection, operation, and canonical query text.
///
/// The method is checked by [`matches`] only. A path without a known action
/// yields the empty result. An empty body yields an empty query text; a body
/// that is not valid JSON is an error.
pub fn parse(exchange: &CapturedExchange<'_>) -> Result<ExtractionResult, ExtractError> {
    let Some((collection, operation)) = parse_path(exchange.path) else {
        return Ok(ExtractionResult::default());
    };

    let db_query_text = if exchange.has_body() {
        json::canonicalize(exchange.body)
            .map_err(|e| ExtractError::malformed(Protocol::Elasticsearch, e))?
    } else {
        String::new()
    };

    Ok(ExtractionResult {
        protocol: Some(Protocol::Elasticsearch),
        db_query_text,
        db_operation_name: operation.to_string(),
        db_collection_name: collection.to_string(),
    })
}
