//! Error types for the sleep metrics engine.
//!
//! Data-sufficiency problems ([`PipelineError`]) are recovered inside the
//! pipeline and surface as null fields plus a recorded degradation. Only
//! collaborator failures ([`StoreError`]) and bad configuration
//! ([`ConfigError`]) reach the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recoverable data-sufficiency conditions detected while computing a session.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("No raw sensor data ({0})")]
    MissingData(String),

    #[error("Insufficient movement bins: {bins} < {required}")]
    InsufficientSamples { bins: usize, required: usize },

    #[error("Invalid heart rate data: {0}")]
    InvalidHeartRate(String),

    #[error("No heart rate sample within {tolerance_secs}s of any epoch")]
    AlignmentFailure { tolerance_secs: i64 },
}

/// Typed failure to decode one raw sample payload.
#[derive(Debug, Error)]
pub enum PayloadFormatError {
    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Accelerometer payload carries neither movement fields nor axes")]
    NoMovementFields,

    #[error("Unknown sensor type: {0}")]
    UnknownSensor(String),
}

/// Failure to parse a `captured_at` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported timestamp: {0}")]
pub struct TimestampError(pub String);

/// Failure of the plain date parsing utility.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateFormatError {
    #[error("Unsupported date format: {0}")]
    Unsupported(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures of the raw-sample and result store collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store config error: {0}")]
    Config(String),

    #[error("Store network error: {0}")]
    Network(String),

    #[error("Store server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Store serialization error: {0}")]
    Serialization(String),

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`crate::pipeline::process_session`].
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
