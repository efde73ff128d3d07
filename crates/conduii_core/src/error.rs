//! Error types for the Conduii engine.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration could not be loaded or validated
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("unsupported config format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Offending field path for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Adapter lifecycle and capability failures
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("adapter not initialized")]
    NotInitialized,

    #[error("adapter '{0}' is already registered")]
    DuplicateName(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("adapter initialization failed: {0}")]
    Initialization(String),

    #[error("{0}")]
    Service(String),
}

/// Runner registry and selection failures
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("test '{0}' is already registered")]
    DuplicateTest(String),

    #[error("unknown test '{0}'")]
    UnknownTest(String),
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("project directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("discovery task failed: {0}")]
    Task(String),
}

/// Umbrella error for orchestrator operations
#[derive(Error, Debug)]
pub enum ConduiiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

pub type Result<T, E = ConduiiError> = std::result::Result<T, E>;
