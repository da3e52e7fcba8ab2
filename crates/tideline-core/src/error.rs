//! Error types for the engine.
//!
//! Index transitions never fail; only loading configuration and decoding
//! recorded events do.

use thiserror::Error;

/// Errors that can occur when configuring or feeding the engine.
#[derive(Debug, Error)]
pub enum TidelineError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A recorded event could not be decoded.
    #[error("bad event on line {line}: {message}")]
    BadEvent { line: usize, message: String },
}
