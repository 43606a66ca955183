use std::path::PathBuf;
use thiserror::Error;

/// Main error type for qsb
#[derive(Error, Debug)]
pub enum QsbError {
    /// Cursor positioned outside `[0, count)`
    #[error("Position {position} out of range (count: {count})")]
    OutOfRange { position: usize, count: usize },

    /// Operation on a released aggregate or a closed/unpositioned cursor
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Corpus name not known to the registry
    #[error("Unknown corpus: {name}")]
    UnknownCorpus { name: String },

    /// A suggestion source failed to answer a query
    #[error("Source {source_name} failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QsbError {
    /// Shorthand for an [`QsbError::IllegalState`] error
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// Shorthand for a [`QsbError::Source`] error
    pub fn source_failure(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for qsb operations
pub type Result<T> = std::result::Result<T, QsbError>;
