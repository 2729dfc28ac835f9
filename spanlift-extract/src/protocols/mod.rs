//! Protocol-specific payload parsers.
//!
//! Each submodule exposes the same pair of functions: `matches`, a cheap
//! recognition rule over the method and path, and `parse`, which extracts an
//! [`ExtractionResult`] or reports a malformed payload. The dispatcher walks
//! [`PARSERS`] in order and runs the first enabled parser that matches.

pub mod elasticsearch;
pub mod graphql;

use spanlift_types::{CapturedExchange, ExtractionResult, Protocol};

use crate::config::ExtractionConfig;
use crate::error::ExtractError;

/// One entry in the dispatch table.
pub struct ProtocolParser {
    pub protocol: Protocol,
    pub matches: fn(&CapturedExchange<'_>) -> bool,
    pub parse: fn(&CapturedExchange<'_>) -> Result<ExtractionResult, ExtractError>,
}

impl ProtocolParser {
    /// Whether `config` switches this parser on.
    pub fn is_enabled(&self, config: &ExtractionConfig) -> bool {
        match self.protocol {
            Protocol::Elasticsearch => config.is_elasticsearch_enabled(),
            Protocol::GraphQl => config.is_graphql_enabled(),
        }
    }
}

impl std::fmt::Debug for ProtocolParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolParser")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

/// Dispatch order. Elasticsearch's path rule is the more specific one.
pub const PARSERS: &[ProtocolParser] = &[
    ProtocolParser {
        protocol: Protocol::Elasticsearch,
        matches: elasticsearch::matches,
        parse: elasticsearch::parse,
    },
    ProtocolParser {
        protocol: Protocol::GraphQl,
        matches: graphql::matches,
        parse: graphql::parse,
    },
];

/// First parser that is both enabled and recognizes the exchange.
pub fn select(
    config: &ExtractionConfig,
    exchange: &CapturedExchange<'_>,
) -> Option<&'static ProtocolParser> {
    PARSERS
        .iter()
        .find(|p| p.is_enabled(config) && (p.matches)(exchange))
}
