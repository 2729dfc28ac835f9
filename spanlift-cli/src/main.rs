mod cli;
mod config;
mod extract;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match args.command {
        cli::Command::Extract(extract_args) => extract::run(extract_args),
        cli::Command::Config(config_args) => config::run(config_args),
    }
}
