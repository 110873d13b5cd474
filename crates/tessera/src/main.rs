//! Tessera - session token and identity role cache service
//!
//! Main entry point for the tessera CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

mod commands;

use commands::{config, roles, serve, session};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Tessera - session token and identity role cache service
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: discovered, see `tessera config path`)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(serve::ServeArgs),

    /// Inspect and manage sessions directly in the store
    Session(session::SessionArgs),

    /// Manage the identity role cache
    Roles(roles::RolesArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = tessera_config::load_config(cli.config.as_deref())?;

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "tessera=debug,tessera_session=debug,tessera_store=debug,tessera_server=debug,tessera_config=debug,info"
    } else {
        "tessera=info,tessera_session=info,tessera_server=info,warn"
    };

    let (file_layer, _guard) = if loaded.config.logging.file {
        let log_dir = loaded
            .config
            .logging
            .dir
            .clone()
            .or_else(|| tessera_config::xdg_config_dir().map(|d| d.join("logs")))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "tessera.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(tracing_subscriber::EnvFilter::new(
                "tessera=trace,tessera_session=trace,tessera_store=trace,tessera_server=trace,tessera_config=trace,info",
            ));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer)
        .init();

    let ctx = commands::Context {
        config: loaded.config.clone(),
        config_path: loaded.path().map(|p| p.to_path_buf()),
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Session(args) => session::run(args, &ctx).await,
        Commands::Roles(args) => roles::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
