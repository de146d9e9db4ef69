//! Error types for scriptcheck
//!
//! Document problems are never errors here: they become [`Diagnostic`]s.
//! These variants cover failures around a run: configuration and rendering.
//!
//! [`Diagnostic`]: crate::model::Diagnostic

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using scriptcheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// scriptcheck error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
