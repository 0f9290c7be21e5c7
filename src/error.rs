//! Error Module
//!
//! Defines error types and result types used throughout the aggregator.

use thiserror::Error;

/// Main error type for the user-data aggregator
#[derive(Error, Debug, Clone)]
pub enum AggregatorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported output data format: {0}")]
    UnsupportedFormat(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Fragment parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AggregatorError {
    /// True for errors caused by the caller's request (bad format, unknown
    /// column) as opposed to failures of the store or the service itself.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AggregatorError::ConfigError(_)
                | AggregatorError::UnsupportedFormat(_)
                | AggregatorError::ColumnNotFound(_)
        )
    }
}

impl From<std::io::Error> for AggregatorError {
    fn from(err: std::io::Error) -> Self {
        AggregatorError::IoError(err.to_string())
    }
}

impl From<hyper::Error> for AggregatorError {
    fn from(err: hyper::Error) -> Self {
        AggregatorError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for AggregatorError {
    fn from(err: serde_json::Error) -> Self {
        AggregatorError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for AggregatorError {
    fn from(err: serde_yaml::Error) -> Self {
        AggregatorError::SerializationError(err.to_string())
    }
}

impl From<object_store::Error> for AggregatorError {
    fn from(err: object_store::Error) -> Self {
        AggregatorError::StorageError(err.to_string())
    }
}

/// Result type alias for the user-data aggregator
pub type Result<T> = std::result::Result<T, AggregatorError>;
