//! The data contract between the capture layer, the payload extractors, and the
//! span enricher of [spanlift](https://github.com/spanlift/spanlift).
//!
//! The capture layer reconstructs one HTTP exchange at a time from kernel-level
//! interception and hands it over as a [`CapturedExchange`]: a borrowed view of
//! the request method, path, query string, and (possibly truncated) body bytes.
//! `spanlift-extract` turns that view into an [`ExtractionResult`], which the
//! tracing layer attaches to the matching span through
//! [`ExtractionResult::attributes`].
//!
//! ```text
//! ┌──────────────┐  CapturedExchange  ┌──────────────────┐  ExtractionResult  ┌──────────────┐
//! │ capture/HTTP │ ─────────────────▶ │ spanlift-extract │ ─────────────────▶ │ span enricher│
//! │ reassembly   │   (borrowed view)  │ (pure, per call) │   (owned, short)   │              │
//! └──────────────┘                    └──────────────────┘                    └──────────────┘
//! ```
//!
//! # Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CapturedExchange`] | Borrowed, read-only view of one captured request |
//! | [`CapturedRequest`] | Owned serde form of a captured request (NDJSON replay) |
//! | [`ExtractionResult`] | Database facts recovered from one exchange |
//! | [`Protocol`] | Which protocol parser produced a result |

use serde::{Deserialize, Serialize};

/// Semantic-convention attribute keys for database spans.
pub mod semconv {
    /// Database system (`elasticsearch`, `graphql`).
    pub const DB_SYSTEM_NAME: &str = "db.system.name";
    /// Short verb naming the database operation.
    pub const DB_OPERATION_NAME: &str = "db.operation.name";
    /// Target index or collection.
    pub const DB_COLLECTION_NAME: &str = "db.collection.name";
    /// Canonicalized query payload.
    pub const DB_QUERY_TEXT: &str = "db.query.text";
}

/// Protocols the extractors understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Elasticsearch,
    #[serde(rename = "graphql")]
    GraphQl,
}

impl Protocol {
    /// Value used for `db.system.name`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Elasticsearch => "elasticsearch",
            Protocol::GraphQl => "graphql",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Captured exchange
// ---------------------------------------------------------------------------

/// Read-only view of one reconstructed HTTP request.
///
/// The body may have been cut at the capture size limit, so it is not
/// guaranteed to be complete or well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedExchange<'a> {
    /// HTTP method as seen on the wire (e.g. `GET`, `POST`).
    pub method: &'a str,
    /// URL path without the query string (e.g. `/test_index/_search`).
    pub path: &'a str,
    /// Raw query string without the leading `?` (e.g. `from=40&size=20`).
    pub query: &'a str,
    /// Request body bytes.
    pub body: &'a [u8],
}

impl<'a> CapturedExchange<'a> {
    pub fn new(method: &'a str, path: &'a str, query: &'a str, body: &'a [u8]) -> Self {
        Self {
            method,
            path,
            query,
            body,
        }
    }

    /// Build a view from a request target such as `/idx/_search?size=10`.
    pub fn from_target(method: &'a str, target: &'a str, body: &'a [u8]) -> Self {
        let (path, query) = split_target(target);
        Self::new(method, path, query, body)
    }

    /// Case-insensitive method comparison.
    pub fn method_is(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
    }

    /// Whether the body holds anything besides whitespace.
    pub fn has_body(&self) -> bool {
        self.body.iter().any(|b| !b.is_ascii_whitespace())
    }

    /// Non-empty path segments, in order.
    pub fn path_segments(&self) -> impl DoubleEndedIterator<Item = &'a str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }
}

/// Split a request target into `(path, query)` at the first `?`.
pub fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

/// Owned form of a captured request, one per NDJSON line in replay files.
///
/// Either `path` (+ optional `query`) or a combined `target` may be given.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub body: String,
}

impl CapturedRequest {
    /// Borrow this request as a [`CapturedExchange`].
    pub fn as_exchange(&self) -> CapturedExchange<'_> {
        match (&self.target, self.path.is_empty()) {
            (Some(target), true) => {
                CapturedExchange::from_target(&self.method, target, self.body.as_bytes())
            }
            _ => CapturedExchange::new(&self.method, &self.path, &self.query, self.body.as_bytes()),
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction result
// ---------------------------------------------------------------------------

/// Database facts recovered from one captured exchange.
///
/// A result with every field empty means "nothing extracted", which is the
/// common case for HTTP traffic that is not a database call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Parser that produced this result; `None` for the empty result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    /// Canonicalized query payload, empty if the request had none.
    #[serde(default)]
    pub db_query_text: String,
    /// Short verb naming the operation (`search`, `query GetUser`).
    #[serde(default)]
    pub db_operation_name: String,
    /// Target index/collection, empty if the request names none.
    #[serde(default)]
    pub db_collection_name: String,
}

impl ExtractionResult {
    /// True when no field carries data.
    pub fn is_empty(&self) -> bool {
        self.protocol.is_none()
            && self.db_query_text.is_empty()
            && self.db_operation_name.is_empty()
            && self.db_collection_name.is_empty()
    }

    /// Span attributes for the non-empty fields, in a stable order.
    pub fn attributes(&self) -> Vec<(&'static str, &str)> {
        let mut attrs = Vec::with_capacity(4);
        if let Some(protocol) = self.protocol {
            attrs.push((semconv::DB_SYSTEM_NAME, protocol.as_str()));
        }
        let fields = [
            (semconv::DB_OPERATION_NAME, &self.db_operation_name),
            (semconv::DB_COLLECTION_NAME, &self.db_collection_name),
            (semconv::DB_QUERY_TEXT, &self.db_query_text),
        ];
        for (key, value) in fields {
            if !value.is_empty() {
                attrs.push((key, value.as_str()));
            }
        }
        attrs
    }
}
