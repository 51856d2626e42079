//! CLI argument definitions using clap derive

use crate::bundle::ClassRef;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// bundle-cache - session-scoped bundle cache
///
/// Builds class bundles through a content-addressed cache that is private
/// to each process and reclaimed once the process is gone.
#[derive(Parser, Debug)]
#[command(name = "bundle-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BUNDLE_CACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache root directory (overrides cache.root)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Bypass the cache entirely
    #[arg(long, global = true)]
    pub no_cache: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a bundle through the cache
    Produce(ProduceArgs),

    /// List sessions under the cache root
    Sessions(SessionsArgs),

    /// Remove dead sessions from the cache root
    Gc(GcArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the produce command
#[derive(Parser, Debug)]
pub struct ProduceArgs {
    /// Where to write the bundle
    #[arg(short, long)]
    pub target: PathBuf,

    /// Class to include, as NAME=PATH (repeatable, order matters)
    #[arg(long = "class", value_parser = parse_class_ref, required = true)]
    pub classes: Vec<ClassRef>,

    /// Resource file to include (repeatable, order matters)
    #[arg(long = "resource")]
    pub resources: Vec<PathBuf>,
}

/// Arguments for the sessions command
#[derive(Parser, Debug)]
pub struct SessionsArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the gc command
#[derive(Parser, Debug)]
pub struct GcArgs {
    /// Dry run - show what would be removed
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Parse a class reference in NAME=PATH format
fn parse_class_ref(s: &str) -> Result<ClassRef, String> {
    ClassRef::parse_local(s).map_err(|e| e.to_string())
}
