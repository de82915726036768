//! Error types for pipeline stages
//!
//! - Per-document failures ([`StageError`]) are recorded and the batch goes on
//! - Batch failures ([`BatchError`]) stop the run
//! - Dataset and generation failures
//! - Configuration loading

use std::path::PathBuf;
use xosc_model::ParseError;
use xosc_transform::{ConfigError, GateError, InjectionError, ReductionError};

/// Failure of one document inside a batch
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("reduction error: {0}")]
    Reduction(#[from] ReductionError),

    #[error("injection error: {0}")]
    Injection(#[from] InjectionError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("digest encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl StageError {
    /// Schema rejection, as opposed to a processing failure
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Gate(GateError::Rejected(_)))
    }

    /// Reason the whole batch must stop, if any
    #[must_use]
    pub fn fatal_reason(&self) -> Option<&str> {
        match self {
            Self::Gate(GateError::SchemaUnavailable(reason)) => Some(reason),
            _ => None,
        }
    }
}

/// Failure that stops a batch
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("cannot read input directory {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create output directory {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema unavailable, batch aborted: {0}")]
    SchemaUnavailable(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure of a dataset stage
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema unavailable, check aborted: {0}")]
    SchemaUnavailable(String),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of the text-generation service
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("response contained no message")]
    EmptyResponse,

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<GenerateError>,
    },

    #[error("{0}")]
    Other(String),
}

/// Failure loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config syntax: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}
