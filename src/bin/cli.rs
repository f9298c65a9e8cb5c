//! smus crawler CLI
//!
//! Local execution entry point. For AWS Lambda, use `smus-crawler-lambda`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use smus_crawler::{
    error::Result,
    models::Config,
    runtime::{JobKind, Jobs},
    storage::{HistoryStore, LocalStorage},
};

/// smus - bus detour watcher and notice crawler
#[derive(Parser, Debug)]
#[command(
    name = "smus-crawler",
    version,
    about = "Bus detour watcher and notice crawler"
)]
struct Cli {
    /// Path to storage directory containing config.toml and stored state
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every job on its schedule until Ctrl-C
    Run,

    /// Run one detour poll cycle
    Detour,

    /// Crawl the transit authority's detour notices once
    BusNotices,

    /// Crawl the university notice board once
    SchoolNotices,

    /// Validate configuration
    Validate,

    /// Show stored detour history
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run a single job cycle against local storage.
async fn run_job(config: &Config, storage: Arc<LocalStorage>, kind: JobKind) -> Result<()> {
    config.validate()?;
    log::info!("Running {} once", kind);
    Jobs::build(config, storage)?.run_once(kind).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path);
    config.apply_env();
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let storage = Arc::new(LocalStorage::new(&cli.storage_dir));

    match cli.command {
        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} routes)", config.bus.routes.len());
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            let history = storage.load_history().await?;
            if history.is_empty() {
                log::info!("No active detours recorded.");
            }
            for (route, fingerprint) in &history {
                log::info!("  {} detoured ({})", route, fingerprint);
            }
            for route in &config.bus.routes {
                if !history.contains_key(&route.display_name) {
                    log::info!("  {} normal", route.display_name);
                }
            }
        }

        Command::Run => {
            config.validate()?;
            let jobs = Jobs::build(&config, storage)?;
            jobs.scheduler(&config).run_until(shutdown_signal()).await;
        }

        Command::Detour => run_job(&config, storage, JobKind::Detour).await?,
        Command::BusNotices => run_job(&config, storage, JobKind::BusNotice).await?,
        Command::SchoolNotices => run_job(&config, storage, JobKind::SchoolNotice).await?,
    }

    log::info!("Done!");

    Ok(())
}
