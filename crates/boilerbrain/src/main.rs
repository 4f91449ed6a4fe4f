//! BoilerBrain - session and query cache operator CLI
//!
//! Main entry point for the boilerbrain CLI.

use std::path::PathBuf;

use anyhow::Result;
use boilerbrain_config::Discovery;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

mod commands;

use commands::{config, query, session};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// BoilerBrain - inspect and drive the session cache and query layer
#[derive(Parser)]
#[command(name = "boilerbrain")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// User config directory (default: platform config dir)
    #[arg(long, global = true, env = "BOILERBRAIN_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// SQLite database path (overrides [store].path)
    #[arg(long, global = true, env = "BOILERBRAIN_DB")]
    pub db: Option<PathBuf>,

    /// Use a throwaway in-memory store instead of SQLite
    #[arg(long, global = true, conflicts_with = "db")]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Session operations
    Session(session::SessionArgs),

    /// Cached table queries
    Query(query::QueryArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

const CRATES: [&str; 6] = [
    "boilerbrain",
    "boilerbrain_session",
    "boilerbrain_query",
    "boilerbrain_store",
    "boilerbrain_config",
    "boilerbrain_types",
];

fn crate_filter(level: &str, fallback: &str) -> String {
    let mut directives: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
    directives.push(fallback.to_string());
    directives.join(",")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Discovery::new()
        .config_dir(cli.config_dir.as_deref())
        .load();
    let logging = loaded.config.logging();

    // Initialize tracing: console (human-readable, stderr) + rolling JSON file
    let console_filter = if cli.verbose {
        crate_filter("debug", "info")
    } else {
        crate_filter(&logging.level, "warn")
    };

    let (file_layer, _guard) = if logging.file {
        let file_appender = tracing_appender::rolling::daily(logging.log_dir(), "boilerbrain.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(tracing_subscriber::EnvFilter::new(crate_filter("trace", "info")));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(console_filter)),
                ),
        )
        .with(file_layer)
        .init();

    // Discovery ran before any subscriber was installed.
    for warning in loaded.warnings() {
        tracing::warn!("{warning}");
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        loaded,
        db: cli.db,
        in_memory: cli.in_memory,
    };

    match cli.command {
        Commands::Session(args) => session::run(args, &ctx).await,
        Commands::Query(args) => query::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
