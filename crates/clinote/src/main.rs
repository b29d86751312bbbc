//! clinote - structured extraction and risk review for therapy session notes
//!
//! Main entry point for the clinote CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, extract, scan};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// clinote - structured extraction and risk review for therapy session notes
#[derive(Parser)]
#[command(name = "clinote")]
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
    #[arg(long, global = true, env = "CLINOTE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full extraction pipeline on a session note
    Extract(extract::ExtractArgs),

    /// Scan a note for risk keywords without calling a model
    Scan(scan::ScanArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = clinote_config::load_config_with_options(None, cli.config_dir.as_deref())
        .context("Failed to load configuration")?;

    // Console (human-readable) + rotating file
    let config_dir = cli.config_dir.clone().or_else(clinote_config::xdg_config_dir);
    let logging = loaded.config.logging();
    let log_dir = logging
        .directory
        .clone()
        .or_else(|| config_dir.as_ref().map(|d| d.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let _guard = init_tracing(cli.verbose, &log_dir, logging.json);

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir,
        loaded,
    };

    match cli.command {
        Commands::Extract(args) => extract::run(args, &ctx).await,
        Commands::Scan(args) => scan::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

fn init_tracing(
    verbose: bool,
    log_dir: &std::path::Path,
    json_file: bool,
) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, Layer, Registry};

    let filter = if verbose {
        "clinote=debug,clinote_pipeline=debug,clinote_agent=debug,clinote_llm=debug,clinote_risk=debug,info"
    } else {
        "clinote=info,clinote_pipeline=info,clinote_risk=warn,warn"
    };
    let file_filter = "clinote=trace,clinote_pipeline=trace,clinote_agent=trace,clinote_llm=trace,clinote_risk=trace,clinote_config=trace,info";

    let file_appender = tracing_appender::rolling::daily(log_dir, "clinote.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer: Box<dyn Layer<Registry> + Send + Sync> = if json_file {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new(file_filter))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new(file_filter))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::new(filter)),
        )
        .init();

    guard
}
