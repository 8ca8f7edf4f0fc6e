//! # Transform Scripts
//!
//! User supplied [Rhai](https://rhai.rs) scripts that rewrite a message before
//! it is stored. A script defines a single function:
//!
//! ```rhai
//! fn transform(input) {
//!     input.message = input.message.to_upper();
//!     input
//! }
//! ```
//!
//! The input is the canonical payload as a JSON document (see
//! [`CanonicalPayload::to_json`]) converted to Rhai values; the return value
//! is converted back and applied to the payload.
//!
//! Scripts are read from the configured scripts directory on every use, so
//! edits take effect without a restart. Every call runs with a fresh scope
//! and the engine's resource limits.

use crate::messages::CanonicalPayload;
use crate::ErrorCategory;
use rhai::{Dynamic, Engine, Scope, AST};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub mod value;

/// Name of the function every script must define
pub const TRANSFORM_FUNCTION: &str = "transform";

// ============================================================================
// Configuration
// ============================================================================

/// Script location and engine resource limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Directory that script names are resolved against
    pub scripts_dir: PathBuf,
    /// Maximum number of operations a single call may perform
    pub max_operations: u64,
    /// Maximum function call nesting
    pub max_call_levels: usize,
    /// Maximum string length in bytes
    pub max_string_size: usize,
    /// Maximum number of array elements
    pub max_array_size: usize,
    /// Maximum number of object entries
    pub max_map_size: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("middleware"),
            max_operations: 1_000_000,
            max_call_levels: 64,
            max_string_size: 1024 * 1024, // 1MB
            max_array_size: 10_000,
            max_map_size: 10_000,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// A compiled transform script
#[derive(Debug, Clone)]
pub struct Script {
    name: String,
    ast: Arc<AST>,
}

impl Script {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Loads and runs transform scripts.
///
/// Cheap to clone; clones share the underlying engine.
#[derive(Clone)]
pub struct TransformEngine {
    engine: Arc<Engine>,
    config: Arc<TransformConfig>,
}

impl TransformEngine {
    pub fn new(config: TransformConfig) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(config.max_operations);
        engine.set_max_call_levels(config.max_call_levels);
        engine.set_max_string_size(config.max_string_size);
        engine.set_max_array_size(config.max_array_size);
        engine.set_max_map_size(config.max_map_size);
        engine.on_print(|text| debug!(target: "hookfeed::script", "{}", text));

        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Path of a named script inside the scripts directory.
    ///
    /// Names must be relative and may not leave the directory.
    pub fn resolve_path(&self, name: &str) -> Result<PathBuf, TransformError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if name.trim().is_empty() || escapes {
            return Err(TransformError::InvalidName {
                script: name.to_string(),
                reason: "script names must be relative paths inside the scripts directory"
                    .to_string(),
            });
        }

        Ok(self.config.scripts_dir.join(relative))
    }

    /// Read and compile a script from the scripts directory
    pub fn load(&self, name: &str) -> Result<Script, TransformError> {
        let path = self.resolve_path(name)?;
        if !path.is_file() {
            return Err(TransformError::NotFound {
                script: name.to_string(),
                path: path.display().to_string(),
            });
        }

        let source = std::fs::read_to_string(&path).map_err(|e| TransformError::Unreadable {
            script: name.to_string(),
            message: e.to_string(),
        })?;

        self.compile(name, &source)
    }

    /// Compile script source, checking that it defines `transform(input)`
    pub fn compile(&self, name: &str, source: &str) -> Result<Script, TransformError> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| TransformError::Compilation {
                script: name.to_string(),
                message: e.to_string(),
            })?;

        let defines_transform = ast
            .iter_functions()
            .any(|f| f.name == TRANSFORM_FUNCTION && f.params.len() == 1);
        if !defines_transform {
            return Err(TransformError::MissingFunction {
                script: name.to_string(),
            });
        }

        Ok(Script {
            name: name.to_string(),
            ast: Arc::new(ast),
        })
    }

    /// Run a compiled script against a JSON document.
    ///
    /// Blocks for the duration of the script; async callers should use
    /// [`TransformEngine::apply`].
    pub fn transform(&self, script: &Script, input: &Value) -> Result<Value, TransformError> {
        let mut scope = Scope::new();
        let argument = value::to_dynamic(input);

        let output = self
            .engine
            .call_fn::<Dynamic>(&mut scope, &script.ast, TRANSFORM_FUNCTION, (argument,))
            .map_err(|e| TransformError::Runtime {
                script: script.name.clone(),
                message: e.to_string(),
            })?;

        Ok(value::from_dynamic(&output))
    }

    /// Load a script and apply it to a payload on a blocking worker thread.
    ///
    /// The applied script is recorded in the payload's `logs`.
    pub async fn apply(
        &self,
        name: &str,
        mut payload: CanonicalPayload,
    ) -> Result<CanonicalPayload, TransformError> {
        let engine = self.clone();
        let script_name = name.to_string();
        let input = payload.to_json();

        let output = tokio::task::spawn_blocking(move || {
            let script = engine.load(&script_name)?;
            engine.transform(&script, &input)
        })
        .await
        .map_err(|e| TransformError::Runtime {
            script: name.to_string(),
            message: format!("script task failed: {}", e),
        })??;

        payload
            .apply_json(output)
            .map_err(|e| TransformError::InvalidOutput {
                script: name.to_string(),
                message: e.to_string(),
            })?;
        payload.logs.push(format!("middleware {} applied", name));

        debug!(script = %name, feed_id = %payload.feed_id, "Applied transform script");

        Ok(payload)
    }

    /// Apply scripts in order, feeding each output into the next script
    pub async fn apply_chain(
        &self,
        names: &[String],
        mut payload: CanonicalPayload,
    ) -> Result<CanonicalPayload, TransformError> {
        for name in names {
            payload = self.apply(name, payload).await?;
        }
        Ok(payload)
    }
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while loading or running a transform script.
///
/// Every variant names the script involved.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Invalid script name '{script}': {reason}")]
    InvalidName { script: String, reason: String },

    #[error("Script '{script}' not found at {path}")]
    NotFound { script: String, path: String },

    #[error("Failed to read script '{script}': {message}")]
    Unreadable { script: String, message: String },

    #[error("Failed to compile script '{script}': {message}")]
    Compilation { script: String, message: String },

    #[error("Script '{script}' does not define transform(input)")]
    MissingFunction { script: String },

    #[error("Script '{script}' failed: {message}")]
    Runtime { script: String, message: String },

    #[error("Script '{script}' returned an invalid document: {message}")]
    InvalidOutput { script: String, message: String },
}

impl TransformError {
    /// Name of the script that failed
    pub fn script(&self) -> &str {
        match self {
            Self::InvalidName { script, .. }
            | Self::NotFound { script, .. }
            | Self::Unreadable { script, .. }
            | Self::Compilation { script, .. }
            | Self::MissingFunction { script }
            | Self::Runtime { script, .. }
            | Self::InvalidOutput { script, .. } => script,
        }
    }

    /// Whether the script could not be loaded at all, as opposed to failing on this input
    pub fn is_load_failure(&self) -> bool {
        !matches!(self, Self::Runtime { .. } | Self::InvalidOutput { .. })
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreadable { .. })
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Unreadable { .. } => ErrorCategory::Transient,
            Self::Runtime { .. } | Self::InvalidOutput { .. } => ErrorCategory::Permanent,
            _ => ErrorCategory::Configuration,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
