//! # Hookfeed Service
//!
//! Binary entry point for the hookfeed HTTP service.
//!
//! This executable:
//! - Loads configuration from an optional file and the environment
//! - Initializes structured logging
//! - Loads the feed configuration and opens the message store
//! - Schedules retention enforcement
//! - Starts the HTTP server from hookfeed-api

mod bootstrap;

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

/// Webhook intake service that normalizes events into per-feed messages
#[derive(Debug, Parser)]
#[command(name = "hookfeed-service", version, about)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "HOOKFEED_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logging depends on the configuration, so failures here go to stderr.
    let config = match bootstrap::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hookfeed-service: {}", e);
            std::process::exit(3);
        }
    };

    if let Err(e) = bootstrap::init_logging(&config.logging) {
        eprintln!("hookfeed-service: {:#}", e);
        std::process::exit(3);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        feeds = %config.feeds.path.display(),
        storage = config.storage.backend.as_str(),
        "Starting hookfeed service"
    );

    if let Err(e) = bootstrap::run(config).await {
        error!(error = %e, "Service stopped with an error");
        std::process::exit(e.exit_code());
    }
}
