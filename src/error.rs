//! Unified error hierarchy for dynarun
//!
//! Simulation outcomes (unsafe sessions, the end of an episode) are reported
//! through `StepOutcome` and never show up here. Everything in this module is
//! either a programming error that must fail fast or a rejected external input.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all dynarun operations
#[derive(Debug, Error)]
pub enum DynaRunError {
    /// A caller broke an API contract (bad enumeration value, malformed state, ...)
    #[error("Contract violation: {0}")]
    Contract(#[from] ContractViolation),

    /// Saved model data could not be accepted
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Plan export failed
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Programming errors. These corrupt the Q-table key space if silently
/// coerced, so every one of them is surfaced immediately.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    /// Heart-rate zone outside 1..=5
    #[error("Heart-rate zone out of range: {zone} (expected 1..=5)")]
    InvalidZone { zone: u8 },

    /// Intensity outside [0, 1] or not finite
    #[error("Intensity out of range: {value} (expected 0.0..=1.0)")]
    InvalidIntensity { value: f64 },

    /// Unknown training type name
    #[error("Unknown training type: {name}")]
    UnknownTrainingType { name: String },

    /// A physiological field is negative or not finite
    #[error("Malformed state: {field}={value}")]
    MalformedState { field: &'static str, value: f64 },

    /// `step` was called after the episode reached its terminal state
    #[error("Episode already finished; call reset() before stepping again")]
    EpisodeFinished,

    /// Textual key could not be parsed back
    #[error("Malformed key '{text}': {reason}")]
    MalformedKey { text: String, reason: String },
}

/// Errors raised while loading or saving agent snapshots
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Snapshot written by an incompatible format revision
    #[error("Unsupported snapshot version: found {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Structurally valid JSON with invalid content
    #[error("Malformed snapshot: {reason}")]
    Malformed { reason: String },

    /// JSON syntax or schema errors
    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// File could not be read or written
    #[error("Snapshot file error at {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Plan export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Nothing to export
    #[error("Empty plan: {0}")]
    EmptyPlan(String),
}

/// Result type alias for dynarun operations
pub type Result<T> = std::result::Result<T, DynaRunError>;

impl DynaRunError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DynaRunError::Contract(_) => ErrorSeverity::Critical,
            DynaRunError::Persistence(PersistenceError::File { .. }) => ErrorSeverity::Warning,
            DynaRunError::Persistence(_) => ErrorSeverity::Error,
            DynaRunError::Export(ExportError::EmptyPlan(_)) => ErrorSeverity::Warning,
            DynaRunError::Configuration(_) => ErrorSeverity::Error,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            DynaRunError::Persistence(PersistenceError::File { path, .. }) => {
                format!("Could not access model file: {}", path.display())
            }
            DynaRunError::Persistence(PersistenceError::UnsupportedVersion { found, .. }) => {
                format!(
                    "Model file uses format version {} which this build cannot read. Retrain the agent.",
                    found
                )
            }
            DynaRunError::Persistence(_) => {
                "Model file is corrupted or was not produced by dynarun.".to_string()
            }
            DynaRunError::Configuration(reason) => {
                format!("Invalid configuration: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Programming error, the run cannot be trusted
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
