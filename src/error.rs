//! Error handling module for hostprep
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Component functions return these errors; the sequencer turns them into
//! step outcomes so that nothing unwinds past a step boundary.

use thiserror::Error;

/// Main error type for hostprep
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// IO errors (file operations on the host tree)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An external command ran but exited unsuccessfully
    #[error("`{command}` failed (exit code {code}): {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    /// An external command could not be started at all
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file rewrite errors
    #[error("Rewrite error: {0}")]
    Rewrite(String),

    /// General errors (catch-all for edge cases)
    #[error("{0}")]
    General(String),
}

/// Result type alias for hostprep operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a rewrite error
    pub fn rewrite(msg: impl Into<String>) -> Self {
        Self::Rewrite(msg.into())
    }

    /// Create a general error
    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }
}
