//! # Hookfeed CLI
//!
//! Command-line tools for working on a hookfeed deployment without running
//! the service:
//! - Run a transform script once against sample input
//! - Load and validate a feed configuration file
//! - Generate shell completions

use clap::{CommandFactory, Parser, Subcommand};
use hookfeed_core::feeds::{FeedCache, FeedConfigError, FeedFile};
use hookfeed_core::transform::{TransformConfig, TransformEngine, TransformError};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Input used by `validate` when none is given
pub const DEFAULT_INPUT: &str = r#"{"body":{"event":"example.event","timestamp":"2025-10-16T00:00:00Z","data":{"id":"12345","status":"active"}}}"#;

// ============================================================================
// CLI Structure
// ============================================================================

/// hookfeed - webhook intake and feed tooling
#[derive(Debug, Parser)]
#[command(name = "hookfeed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tools for hookfeed transform scripts and feed configuration")]
pub struct Cli {
    /// Logging level for diagnostics written to stderr
    #[arg(short, long, default_value = "warn", env = "HOOKFEED_LOG")]
    pub log_level: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a transform script once and print its input and output
    Validate {
        /// Script file defining `transform(input)`
        script: PathBuf,

        /// Input document as inline JSON
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,

        /// Read the input document from a file
        #[arg(long)]
        input_file: Option<PathBuf>,
    },

    /// Load and validate a feed configuration file
    CheckConfig {
        /// Feed configuration (YAML or JSON)
        path: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Errors
// ============================================================================

/// CLI errors; each kind maps to a process exit code
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Script(#[from] TransformError),

    #[error("{0}")]
    Configuration(#[from] FeedConfigError),

    #[error("Invalid input: {message}")]
    Input { message: String },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Script(_) | Self::Output(_) => 1,
            Self::Configuration(_) => 2,
            Self::Input { .. } => 3,
        }
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parse arguments from the process and execute the command against stdout
pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli.command, &mut out)
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn initialize_logging(cli: &Cli) {
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn execute(command: Commands, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Commands::Validate {
            script,
            input,
            input_file,
        } => execute_validate_command(&script, input.as_deref(), input_file.as_deref(), out),
        Commands::CheckConfig { path } => execute_check_config_command(&path, out),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "hookfeed", out);
            Ok(())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Run `script` once against the input and print both documents
pub fn execute_validate_command(
    script: &Path,
    input: Option<&str>,
    input_file: Option<&Path>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let input = read_input(input, input_file)?;

    let (scripts_dir, name) = split_script_path(script)?;
    let engine = TransformEngine::new(TransformConfig {
        scripts_dir,
        ..Default::default()
    });

    let compiled = engine.load(&name)?;
    debug!(script = %name, "Compiled script");
    let output = engine.transform(&compiled, &input)?;
    info!(script = %name, "Script ran successfully");

    writeln!(out, "Input:")?;
    writeln!(out, "{}", pretty(&input))?;
    writeln!(out)?;
    writeln!(out, "Output:")?;
    writeln!(out, "{}", pretty(&output))?;
    Ok(())
}

/// Load and validate a feed file, then describe each feed
pub fn execute_check_config_command(path: &Path, out: &mut impl Write) -> Result<(), CliError> {
    let file = FeedFile::load_from_file(path)?;
    let cache = FeedCache::from_file(&file);

    writeln!(
        out,
        "Feed configuration OK: {} feed(s) in {}",
        cache.len(),
        path.display()
    )?;
    if !cache.global_middleware().is_empty() {
        writeln!(
            out,
            "Global middleware: {}",
            cache.global_middleware().join(", ")
        )?;
    }

    for feed in cache.list_all() {
        writeln!(out)?;
        writeln!(out, "{} ({})", feed.id, feed.name)?;
        writeln!(out, "  keys:       {}", feed.routing_keys.join(", "))?;
        match feed.primary_adapter() {
            Some(adapter) => writeln!(out, "  adapter:    {}", adapter)?,
            None => writeln!(out, "  adapter:    none (requests stored as captured)")?,
        }
        let middleware: Vec<&str> = cache.middleware_chain(feed).collect();
        if middleware.is_empty() {
            writeln!(out, "  middleware: none")?;
        } else {
            writeln!(out, "  middleware: {}", middleware.join(" -> "))?;
        }
        writeln!(
            out,
            "  retention:  {} messages, {} days",
            feed.retention.max_count, feed.retention.max_age_days
        )?;
    }

    Ok(())
}

fn read_input(inline: Option<&str>, file: Option<&Path>) -> Result<Value, CliError> {
    let text = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| CliError::Input {
            message: format!("cannot read {}: {}", path.display(), e),
        })?,
        (None, None) => DEFAULT_INPUT.to_string(),
    };

    serde_json::from_str(&text).map_err(|e| CliError::Input {
        message: format!("input is not valid JSON: {}", e),
    })
}

/// Split a script path into the directory scripts resolve against and the script name
fn split_script_path(script: &Path) -> Result<(PathBuf, String), CliError> {
    let name = script
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CliError::Input {
            message: format!("'{}' does not name a script file", script.display()),
        })?;

    let dir = match script.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((dir, name.to_string()))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
