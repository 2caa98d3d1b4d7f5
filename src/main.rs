//! Main entry point for the Scrim Hall matchmaking service
//!
//! Initializes logging and configuration, wires the service together, and
//! runs it until a shutdown signal arrives.

use anyhow::Result;
use clap::Parser;
use scrim_hall::config::AppConfig;
use scrim_hall::events::LoggingEventSink;
use scrim_hall::service::MatchmakingService;
use scrim_hall::storage::InMemoryRecordStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Scrim Hall Matchmaking Service - queue, match, and rating management
#[derive(Parser)]
#[command(
    name = "scrim-hall",
    version,
    about = "A matchmaking service with supervised match lifecycles and skill ratings",
    long_about = "Scrim Hall manages matchmaking queues for team games: players queue up, \
                 matches form with random or skill-balanced teams, a supervised lifecycle \
                 drives each match through ready-up and result voting, and a Weng-Lin \
                 (OpenSkill) rating system keeps per-mode leaderboards."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup information
fn display_startup_banner(config: &AppConfig) {
    info!("Scrim Hall Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Queues: {}", config.queues.len());
    info!(
        "   Ready timeout: {}s",
        config.matchmaking.ready_timeout_seconds
    );
    info!(
        "   Vote timeout: {}s",
        config.matchmaking.vote_timeout_seconds
    );
    info!(
        "   Sweep interval: {}s",
        config.matchmaking.sweep_interval_seconds
    );
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let store = Arc::new(InMemoryRecordStore::new());
    let events = Arc::new(LoggingEventSink);
    let queues = config.queues.clone();

    let service = match MatchmakingService::new(config.clone(), store, events) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to initialize service: {}", e);
            std::process::exit(1);
        }
    };

    for queue in queues {
        if let Err(e) = service.register_queue(queue) {
            error!("Failed to register queue: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = service.start() {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Scrim Hall is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    match tokio::time::timeout(config.shutdown_timeout(), service.shutdown()).await {
        Ok(()) => {
            info!("Graceful shutdown completed successfully");
        }
        Err(_) => {
            warn!("Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("Scrim Hall Matchmaking Service stopped");
    Ok(())
}
