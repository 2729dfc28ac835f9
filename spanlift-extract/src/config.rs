//! Which payload extractors are active.
//!
//! An [`ExtractionConfig`] is resolved once at startup (YAML file, then
//! environment overrides) and then only read. It is `Copy`, so every worker
//! can hold its own snapshot.
//!
//! ```yaml
//! payload_extraction:
//!   http:
//!     graphql:
//!       enabled: true
//!     elasticsearch:
//!       enabled: false
//! ```

use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Overrides `http.graphql.enabled`.
pub const ENV_GRAPHQL_ENABLED: &str = "OTEL_EBPF_HTTP_GRAPHQL_ENABLED";
/// Overrides `http.elasticsearch.enabled`.
pub const ENV_ELASTICSEARCH_ENABLED: &str = "OTEL_EBPF_HTTP_ELASTICSEARCH_ENABLED";

/// Immutable snapshot of the payload extraction switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub http: HttpExtractionConfig,
}

/// Per-protocol switches for HTTP-carried protocols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpExtractionConfig {
    /// GraphQL payload extraction and parsing.
    #[serde(default)]
    pub graphql: ProtocolToggle,
    /// Elasticsearch payload extraction and parsing.
    #[serde(default)]
    pub elasticsearch: ProtocolToggle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolToggle {
    #[serde(default)]
    pub enabled: bool,
}

/// Top level of the agent config file; other sections are ignored here.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    payload_extraction: ExtractionConfig,
}

impl ExtractionConfig {
    pub const fn new(graphql: bool, elasticsearch: bool) -> Self {
        Self {
            http: HttpExtractionConfig {
                graphql: ProtocolToggle { enabled: graphql },
                elasticsearch: ProtocolToggle {
                    enabled: elasticsearch,
                },
            },
        }
    }

    /// True if any extractor is on. Checked before any per-exchange work.
    pub fn enabled(&self) -> bool {
        self.http.graphql.enabled || self.http.elasticsearch.enabled
    }

    pub fn is_graphql_enabled(&self) -> bool {
        self.http.graphql.enabled
    }

    pub fn is_elasticsearch_enabled(&self) -> bool {
        self.http.elasticsearch.enabled
    }

    pub fn with_graphql(mut self, enabled: bool) -> Self {
        self.http.graphql.enabled = enabled;
        self
    }

    pub fn with_elasticsearch(mut self, enabled: bool) -> Self {
        self.http.elasticsearch.enabled = enabled;
        self
    }

    /// Resolve the config from an optional YAML file and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let yaml = match path {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|source| {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            })?),
            None => None,
        };
        let config = Self::from_sources(yaml.as_deref(), |var| std::env::var(var).ok())?;
        info!(
            "Payload extraction: graphql={} elasticsearch={}",
            config.is_graphql_enabled(),
            config.is_elasticsearch_enabled()
        );
        Ok(config)
    }

    /// Resolve the config from YAML text (file defaults) and an environment
    /// lookup (overrides). An empty variable counts as unset.
    pub fn from_sources<F>(yaml: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match yaml {
            Some(text) if !text.trim().is_empty() => {
                serde_yaml::from_str::<ConfigFile>(text)?.payload_extraction
            }
            _ => Self::default(),
        };

        if let Some(enabled) = env_bool(&env, ENV_GRAPHQL_ENABLED)? {
            config.http.graphql.enabled = enabled;
        }
        if let Some(enabled) = env_bool(&env, ENV_ELASTICSEARCH_ENABLED)? {
            config.http.elasticsearch.enabled = enabled;
        }

        Ok(config)
    }
}

fn env_bool<F>(env: &F, var: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = env(var) else {
        return Ok(None);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = parse_bool(value).ok_or_else(|| ConfigError::InvalidBool {
        var,
        value: raw.clone(),
    })?;
    debug!("{var}={parsed} overrides config file");
    Ok(Some(parsed))
}

/// Boolean spellings accepted from the environment.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn default_is_disabled() {
        let c = ExtractionConfig::default();
        assert!(!c.enabled());
        assert!(!c.is_graphql_enabled());
        assert!(!c.is_elasticsearch_enabled());
    }

    #[test]
    fn enabled_is_or_of_flags() {
        assert!(ExtractionConfig::new(true, false).enabled());
        assert!(ExtractionConfig::new(false, true).enabled());
        assert!(ExtractionConfig::new(true, true).enabled());
        assert!(!ExtractionConfig::new(false, false).enabled());
    }

    #[test]
    fn yaml_sets_flags() {
        let yaml = "payload_extraction:\n  http:\n    elasticsearch:\n      enabled: true\n";
        let c = ExtractionConfig::from_sources(Some(yaml), env_of(&[])).unwrap();
        assert!(c.is_elasticsearch_enabled());
        assert!(!c.is_graphql_enabled());
    }

    #[test]
    fn yaml_other_sections_ignored() {
        let yaml = "log_level: debug\nattributes:\n  kubernetes:\n    enable: true\n";
        let c = ExtractionConfig::from_sources(Some(yaml), env_of(&[])).unwrap();
        assert_eq!(c, ExtractionConfig::default());
    }

    #[test]
    fn empty_yaml_is_default() {
        let c = ExtractionConfig::from_sources(Some("  \n"), env_of(&[])).unwrap();
        assert_eq!(c, ExtractionConfig::default());
    }

    #[test]
    fn yaml_non_bool_rejected() {
        let yaml = "payload_extraction:\n  http:\n    graphql:\n      enabled: sometimes\n";
        let err = ExtractionConfig::from_sources(Some(yaml), env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn env_overrides_file() {
        let yaml = "payload_extraction:\n  http:\n    graphql:\n      enabled: true\n";
        let env = env_of(&[
            (ENV_GRAPHQL_ENABLED, "false"),
            (ENV_ELASTICSEARCH_ENABLED, "1"),
        ]);
        let c = ExtractionConfig::from_sources(Some(yaml), env).unwrap();
        assert!(!c.is_graphql_enabled());
        assert!(c.is_elasticsearch_enabled());
    }

    #[test]
    fn empty_env_value_is_unset() {
        let yaml = "payload_extraction:\n  http:\n    graphql:\n      enabled: true\n";
        let env = env_of(&[(ENV_GRAPHQL_ENABLED, "")]);
        let c = ExtractionConfig::from_sources(Some(yaml), env).unwrap();
        assert!(c.is_graphql_enabled());
    }

    #[test]
    fn env_invalid_bool_rejected() {
        let env = env_of(&[(ENV_ELASTICSEARCH_ENABLED, "yes")]);
        let err = ExtractionConfig::from_sources(None, env).unwrap_err();
        match err {
            ConfigError::InvalidBool { var, value } => {
                assert_eq!(var, ENV_ELASTICSEARCH_ENABLED);
                assert_eq!(value, "yes");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_bool_spellings() {
        for v in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        for v in ["yes", "no", "on", "tRuE", "2", ""] {
            assert_eq!(parse_bool(v), None, "{v}");
        }
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yml");
        std::fs::write(
            &path,
            "payload_extraction:\n  http:\n    graphql:\n      enabled: true\n",
        )
        .unwrap();
        let c = ExtractionConfig::load(Some(&path)).unwrap();
        // The test environment may set the override variables; only the
        // file-backed flag is checked when they are absent.
        if std::env::var(ENV_GRAPHQL_ENABLED).is_err() {
            assert!(c.is_graphql_enabled());
        }
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ExtractionConfig::load(Some(Path::new("/nonexistent/spanlift.yml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn builder_overrides() {
        let c = ExtractionConfig::default()
            .with_graphql(true)
            .with_elasticsearch(true)
            .with_graphql(false);
        assert_eq!(c, ExtractionConfig::new(false, true));
    }
}
