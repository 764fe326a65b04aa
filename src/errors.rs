// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("Corrupt state record for project '{project}': {reason}")]
    StateCorrupt { project: String, reason: String },

    #[error("Integration queue invariant violated: {0}")]
    QueueViolation(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildloopError>;
