//! Error types for Gatehouse.

use thiserror::Error;

/// Main error type for Gatehouse operations.
///
/// Only construction and configuration loading can fail. Rejection,
/// cancellation and closure are ordinary boolean outcomes of the limiter.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The limiter was constructed outside of a Tokio runtime
    #[error("No Tokio runtime available to run the decay task")]
    NoRuntime,

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Gatehouse operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
