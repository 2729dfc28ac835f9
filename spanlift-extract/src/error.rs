use std::path::PathBuf;

use spanlift_types::Protocol;
use thiserror::Error;

/// Per-exchange extraction failure.
///
/// Local to the exchange that produced it: the caller annotates that span
/// with no database attributes and moves on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The body was present but not a usable payload for the matched protocol.
    #[error("malformed {protocol} payload: {reason}")]
    MalformedPayload { protocol: Protocol, reason: String },
}

impl ExtractError {
    pub(crate) fn malformed(protocol: Protocol, reason: impl std::fmt::Display) -> Self {
        ExtractError::MalformedPayload {
            protocol,
            reason: reason.to_string(),
        }
    }

    /// Protocol whose parser reported the failure.
    pub fn protocol(&self) -> Protocol {
        match self {
            ExtractError::MalformedPayload { protocol, .. } => *protocol,
        }
    }
}

/// Startup-time configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("environment variable {var} must be a boolean, got {value:?}")]
    InvalidBool { var: &'static str, value: String },
}
