//! Unified error handling for hintd
//!
//! This crate provides the single error type used across all hintd
//! components. It uses thiserror for ergonomic error definitions with proper
//! Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using HintError
pub type Result<T> = std::result::Result<T, HintError>;

/// Unified error type for all hintd operations
#[derive(thiserror::Error, Debug)]
pub enum HintError {
    // ========================================================================
    // I/O and File System Errors
    // ========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to set property {key}: {reason}")]
    PropertyWrite {
        key: String,
        reason: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    #[error("Unknown hint type: {0}")]
    UnknownHint(String),

    #[error("Index {index} out of range for node {node} ({len} values)")]
    IndexOutOfRange {
        node: String,
        index: usize,
        len: usize,
    },

    #[error("Scheduler is not running")]
    NotRunning,

    #[error("{0}")]
    Generic(String),
}

impl HintError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid config error for a specific field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }
}

impl From<String> for HintError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

impl From<&str> for HintError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
