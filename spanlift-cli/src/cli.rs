use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "spanlift")]
#[command(about = "Recover database span attributes from captured HTTP exchanges")]
#[command(version)]
pub struct Cli {
    /// Log at debug level (per-exchange dispatch and parse failures)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay captured requests through the payload extractors
    Extract(ExtractArgs),

    /// Print the resolved extraction configuration
    Config(ConfigArgs),
}

#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// YAML configuration file (environment variables still override it)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// File with NDJSON captured requests (reads stdin if omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Treat --input as one raw HTTP/1.x request instead of NDJSON
    #[arg(long, requires = "input")]
    pub raw: bool,

    /// Number of extraction workers
    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..=256))]
    pub workers: u16,

    /// Output format: "text" (default, span attributes) or "json" (one object per line)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Override the GraphQL extractor switch
    #[arg(long, value_name = "BOOL", value_parser = parse_flag)]
    pub graphql: Option<bool>,

    /// Override the Elasticsearch extractor switch
    #[arg(long, value_name = "BOOL", value_parser = parse_flag)]
    pub elasticsearch: Option<bool>,
}

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// YAML configuration file (environment variables still override it)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Accept the same boolean spellings as the environment overrides.
fn parse_flag(value: &str) -> Result<bool, String> {
    spanlift_extract::config::parse_bool(value)
        .ok_or_else(|| format!("expected a boolean (true/false/1/0), got {:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_extract() {
        let cli = Cli::try_parse_from(["spanlift", "extract"]).unwrap();
        if let Command::Extract(args) = cli.command {
            assert!(args.config.is_none());
            assert!(args.input.is_none());
            assert!(!args.raw);
            assert_eq!(args.workers, 4);
            assert_eq!(args.format, "text");
            assert!(args.graphql.is_none());
            assert!(args.elasticsearch.is_none());
        } else {
            panic!("Expected Extract command");
        }
    }

    #[test]
    fn cli_parses_extract_with_flags() {
        let cli = Cli::try_parse_from([
            "spanlift",
            "-v",
            "extract",
            "--config",
            "/etc/spanlift.yml",
            "-i",
            "/tmp/captures.ndjson",
            "-w",
            "16",
            "-f",
            "json",
            "--graphql",
            "TRUE",
            "--elasticsearch",
            "0",
        ])
        .unwrap();
        assert!(cli.verbose);
        if let Command::Extract(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("/etc/spanlift.yml")));
            assert_eq!(args.input, Some(PathBuf::from("/tmp/captures.ndjson")));
            assert_eq!(args.workers, 16);
            assert_eq!(args.format, "json");
            assert_eq!(args.graphql, Some(true));
            assert_eq!(args.elasticsearch, Some(false));
        } else {
            panic!("Expected Extract command");
        }
    }

    #[test]
    fn cli_raw_requires_input() {
        assert!(Cli::try_parse_from(["spanlift", "extract", "--raw"]).is_err());
        let cli =
            Cli::try_parse_from(["spanlift", "extract", "--raw", "-i", "/tmp/req.http"]).unwrap();
        if let Command::Extract(args) = cli.command {
            assert!(args.raw);
        } else {
            panic!("Expected Extract command");
        }
    }

    #[test]
    fn cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["spanlift", "extract", "--graphql", "yes"]).is_err());
        assert!(Cli::try_parse_from(["spanlift", "extract", "-f", "yaml"]).is_err());
        assert!(Cli::try_parse_from(["spanlift", "extract", "-w", "0"]).is_err());
    }

    #[test]
    fn cli_parses_config() {
        let cli = Cli::try_parse_from(["spanlift", "config", "-c", "/tmp/c.yml"]).unwrap();
        if let Command::Config(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("/tmp/c.yml")));
        } else {
            panic!("Expected Config command");
        }
    }

    #[test]
    fn cli_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["spanlift", "config", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }
}
