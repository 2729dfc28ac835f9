//! Turns a captured HTTP exchange into database span attributes — the index
//! an Elasticsearch query hit, the GraphQL operation a client ran — without
//! any access to the instrumented application.
//!
//! # The problem
//!
//! The agent sees traffic at the socket layer. By the time an HTTP request has
//! been reassembled, all that is left is a method, a path, a query string, and
//! some body bytes that may have been cut off at the capture limit. Plenty of
//! that traffic is a database call in disguise: Elasticsearch speaks REST with
//! the index in the path and the query DSL in the body, and GraphQL funnels
//! every operation through one endpoint with the operation in a JSON envelope.
//! This crate recovers the `db.*` facts a tracing span needs from those bytes.
//!
//! # How it works
//!
//! [`extract`] checks [`ExtractionConfig::enabled`] first; with every
//! extractor off it returns immediately without looking at the exchange.
//! Otherwise it walks the [`protocols::PARSERS`] table (Elasticsearch, then
//! GraphQL) and runs the first parser that is switched on and whose
//! recognition rule matches. Nothing matching is the common case and yields
//! an empty [`ExtractionResult`] with no error. A body that the matched parser
//! cannot read comes back as [`ExtractError::MalformedPayload`]; the caller
//! leaves that one span without database attributes.
//!
//! Everything here is synchronous, allocation-local, and free of shared
//! state, so any number of capture workers can call it concurrently.
//!
//! # Usage
//!
//! ```
//! use spanlift_extract::{extract, ExtractionConfig};
//! use spanlift_types::CapturedExchange;
//!
//! let config = ExtractionConfig::new(false, true);
//! let exchange = CapturedExchange::new(
//!     "POST",
//!     "/test_index/_search",
//!     "",
//!     br#"{"query": {"match_all": {}}}"#,
//! );
//!
//! let result = extract(&config, &exchange).unwrap();
//! assert_eq!(result.db_operation_name, "search");
//! assert_eq!(result.db_collection_name, "test_index");
//! assert_eq!(result.db_query_text, r#"{"query":{"match_all":{}}}"#);
//! ```

/// Extractor switches and their file/environment loader.
pub mod config;
/// Error types.
pub mod error;
/// HTTP/1.x request-head parsing via [`nom`].
pub mod http;
/// Canonical compact JSON.
pub mod json;
/// Elasticsearch and GraphQL parsers plus the dispatch table.
pub mod protocols;

use log::debug;

pub use config::ExtractionConfig;
pub use error::{ConfigError, ExtractError};
pub use spanlift_types::{CapturedExchange, ExtractionResult, Protocol};

/// Extract database facts from one captured exchange.
///
/// Returns an empty result when extraction is disabled, when no enabled
/// parser recognizes the exchange, or when the matched request carries no
/// body. At most one parser runs per call.
pub fn extract(
    config: &ExtractionConfig,
    exchange: &CapturedExchange<'_>,
) -> Result<ExtractionResult, ExtractError> {
    if !config.enabled() {
        return Ok(ExtractionResult::default());
    }

    let Some(parser) = protocols::select(config, exchange) else {
        return Ok(ExtractionResult::default());
    };

    (parser.parse)(exchange).map_err(|e| {
        debug!("{} {}: {}", exchange.method, exchange.path, e);
        e
    })
}

/// Extract database facts from a raw captured HTTP/1.x request buffer.
///
/// Buffers that do not start with an HTTP request line yield an empty result.
/// Chunked bodies are reassembled before parsing.
pub fn extract_payload(
    config: &ExtractionConfig,
    payload: &[u8],
) -> Result<ExtractionResult, ExtractError> {
    if !config.enabled() || !http::looks_like_http_request(payload) {
        return Ok(ExtractionResult::default());
    }
    let Some(request) = http::parse_request(payload) else {
        return Ok(ExtractionResult::default());
    };
    if request.is_truncated() {
        debug!("{} {}: body truncated by capture", request.method, request.target);
    }
    extract(config, &request.exchange())
}
