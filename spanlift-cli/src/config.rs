use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use spanlift_extract::ExtractionConfig;

use crate::cli::ConfigArgs;

/// Same root key the loader reads, so the output can be fed back in.
#[derive(Serialize)]
struct Resolved<'a> {
    payload_extraction: &'a ExtractionConfig,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    let config = resolve(args.config.as_deref(), None, None)?;
    print!("{}", render(&config)?);
    Ok(())
}

/// Load file + environment, then apply command-line overrides on top.
pub fn resolve(
    path: Option<&Path>,
    graphql: Option<bool>,
    elasticsearch: Option<bool>,
) -> Result<ExtractionConfig> {
    let mut config = match path {
        Some(p) => ExtractionConfig::load(Some(p))
            .with_context(|| format!("Failed to load configuration from {}", p.display()))?,
        None => ExtractionConfig::load(None).context("Invalid extraction configuration")?,
    };
    if let Some(enabled) = graphql {
        config = config.with_graphql(enabled);
    }
    if let Some(enabled) = elasticsearch {
        config = config.with_elasticsearch(enabled);
    }
    Ok(config)
}

fn render(config: &ExtractionConfig) -> Result<String> {
    serde_yaml::to_string(&Resolved {
        payload_extraction: config,
    })
    .context("Failed to serialize configuration")
}
