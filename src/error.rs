//! Error types for keygate
//!
//! Each layer has its own `thiserror` enum; the binary wraps them in
//! `anyhow` at the boundary.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading authorized key material
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Malformed authorized key '{key}': {reason}")]
    Malformed { key: String, reason: String },

    #[error("Empty key text")]
    Empty,

    #[error("Failed to read key file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl KeyError {
    pub fn malformed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from the stdio query transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid query line: {0}")]
    InvalidQuery(String),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),
}
