//! # Service Bootstrap
//!
//! Everything the binary does before it starts serving: configuration
//! layering, log setup, feed loading, store selection and the retention
//! schedule.

use anyhow::Context;
use hookfeed_api::{
    start_server, AppState, ConfigError, LoggingConfig, ServiceConfig, ServiceError,
    ServiceMetrics, StorageBackend, StorageConfig,
};
use hookfeed_core::feeds::{FeedCache, FeedConfigError, FeedFile};
use hookfeed_core::messages::{MessageStore, StoreError};
use hookfeed_core::retention::RetentionEnforcer;
use hookfeed_core::storage::{FilesystemMessageStore, InMemoryMessageStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prefix for environment overrides, e.g. `HOOKFEED__SERVER__PORT=9090`
pub const ENV_PREFIX: &str = "HOOKFEED";

/// Base name of the optional configuration file in the working directory
const DEFAULT_CONFIG_NAME: &str = "hookfeed";

// ============================================================================
// Errors
// ============================================================================

/// Failures that stop the service, each with its own process exit code
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Failed to load feeds from {path}: {source}")]
    Feeds {
        path: String,
        #[source]
        source: FeedConfigError,
    },

    #[error("Failed to open message store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to register metrics: {message}")]
    Metrics { message: String },
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Service(ServiceError::BindFailed { .. }) => 1,
            Self::Service(ServiceError::ServerFailed { .. }) => 2,
            Self::Service(ServiceError::Configuration(_)) => 3,
            Self::Feeds { .. } => 4,
            Self::Store(_) => 5,
            Self::Metrics { .. } => 6,
        }
    }
}

// ============================================================================
// Configuration and Logging
// ============================================================================

/// Build the service configuration.
///
/// Sources, later ones overriding earlier ones:
/// 1. `explicit` when given (required), otherwise `./hookfeed.{toml,yaml,json}`
///    when present
/// 2. Environment variables prefixed `HOOKFEED__`, with `__` between keys
///
/// Absent sources leave the built-in defaults in place.
pub fn load_config(explicit: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let builder = config::Config::builder();
    let builder = match explicit {
        Some(path) => builder.add_source(config::File::from(path).required(true)),
        None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_NAME).required(false)),
    };

    let service_config: ServiceConfig = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })?;

    service_config.validate()?;
    Ok(service_config)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.level.to_ascii_lowercase())
            .with_context(|| format!("invalid log level '{}'", config.level))?,
    };

    let json_layer = config.json_format.then(|| fmt::layer().json());
    let text_layer = (!config.json_format).then(|| fmt::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .context("failed to install tracing subscriber")
}

// ============================================================================
// Wiring
// ============================================================================

pub fn load_feeds(path: &Path) -> Result<FeedCache, StartupError> {
    let file = FeedFile::load_from_file(path).map_err(|source| StartupError::Feeds {
        path: path.display().to_string(),
        source,
    })?;

    let feeds = FeedCache::from_file(&file);
    info!(
        path = %path.display(),
        feeds = feeds.len(),
        global_middleware = feeds.global_middleware().len(),
        "Loaded feed configuration"
    );
    Ok(feeds)
}

pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn MessageStore>, StoreError> {
    match config.backend {
        StorageBackend::Memory => {
            warn!("Using the in-memory message store; messages are lost on restart");
            Ok(Arc::new(InMemoryMessageStore::new()))
        }
        StorageBackend::Filesystem => {
            let store = FilesystemMessageStore::new(config.path.clone()).await?;
            info!(path = %store.base_path().display(), "Using the filesystem message store");
            Ok(Arc::new(store))
        }
    }
}

/// Run retention immediately and then once per `every` until the task is aborted
pub fn spawn_retention(
    enforcer: RetentionEnforcer,
    metrics: Arc<ServiceMetrics>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let report = enforcer.enforce_all().await;
            metrics.record_retention(report.deleted());
        }
    })
}

/// Wire the service from its configuration and serve until shutdown
pub async fn run(config: ServiceConfig) -> Result<(), StartupError> {
    let feeds = Arc::new(load_feeds(&config.feeds.path)?);
    let store = build_store(&config.storage).await?;
    let metrics = ServiceMetrics::new().map_err(|e| StartupError::Metrics {
        message: e.to_string(),
    })?;

    let retention = if config.retention.enabled {
        info!(
            interval_seconds = config.retention.interval_seconds,
            "Scheduling retention enforcement"
        );
        Some(spawn_retention(
            RetentionEnforcer::new(Arc::clone(&feeds), Arc::clone(&store)),
            Arc::clone(&metrics),
            config.retention.interval(),
        ))
    } else {
        None
    };

    let state = AppState::new(config, feeds, store, metrics);
    let result = start_server(state).await;

    if let Some(handle) = retention {
        handle.abort();
    }

    result.map_err(StartupError::from)
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
