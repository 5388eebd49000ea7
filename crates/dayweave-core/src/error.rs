//! Core error types for dayweave-core.
//!
//! Only configuration problems are fatal (the engine cannot synthesize a
//! day without a well-formed routine pool). Everything else degrades into
//! run-log entries so a scheduling run always produces a timeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::TimeOfDay;

/// Core error type for dayweave-core.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid time slot construction
    #[error("Invalid time slot '{label}': end ({end}) must be after start ({start})")]
    InvalidSlot {
        label: String,
        start: TimeOfDay,
        end: TimeOfDay,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
