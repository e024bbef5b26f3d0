//! Error types for the Shiori engine

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error type
///
/// Nothing inside the annotation or reading-state core returns this to a
/// caller as a fatal condition; it exists for the collaborator boundary and
/// for the binary.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors raised by external collaborators (backend, analysis service)
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}
