//! bundle-cache - session-scoped bundle cache
//!
//! CLI entry point that dispatches to subcommands.

use bundle_cache::cli::{Cli, Commands};
use bundle_cache::config::{Config, ConfigManager};
use bundle_cache::error::CacheResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CacheResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let mut config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    // Command-line overrides
    if let Some(root) = cli.root {
        config.cache.root = Some(root);
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }

    // Dispatch to command
    match cli.command {
        Commands::Produce(args) => bundle_cache::cli::commands::produce(args, &config).await,
        Commands::Sessions(args) => bundle_cache::cli::commands::sessions(args, &config).await,
        Commands::Gc(args) => bundle_cache::cli::commands::gc(args, &config).await,
        Commands::Config(args) => {
            bundle_cache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug; logs go to stderr so stdout stays parseable
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("bundle_cache=warn"),
        1 => EnvFilter::new("bundle_cache=info"),
        _ => EnvFilter::new("bundle_cache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
