//! Error handling for the benchmark engine
//!
//! Every failure the engine can raise is a tagged [`BenchError`]. Callers
//! (the CLI, or an HTTP surface built on top of the engine) translate these
//! into their own status codes; the engine never returns a sentinel result.

use std::io;

use thiserror::Error;

/// The main error type for the benchmark engine
#[derive(Error, Debug)]
pub enum BenchError {
    /// Bad chunk size, empty sample, zero query iterations, unknown backend
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The adapter could not establish its connection
    #[error("Adapter connection failure for {backend}: {reason}")]
    AdapterConnection { backend: String, reason: String },

    /// An insert or query raised mid-run
    #[error("Adapter operation failure for {backend} during {operation}: {reason}")]
    AdapterOperation {
        backend: String,
        operation: String,
        reason: String,
    },

    /// A source row could not be mapped onto the backend schema
    #[error("Record conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// A result could not be persisted or reloaded
    #[error("Serialization failure: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Metrics registry errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Failures raised while mapping a raw row onto a typed record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("row {row}: field {field} expected {expected}, got {value}")]
    TypeMismatch {
        row: usize,
        field: String,
        expected: &'static str,
        value: String,
    },

    #[error("row {row}: field {field} has unparseable timestamp {value}")]
    InvalidTimestamp {
        row: usize,
        field: String,
        value: String,
    },

    #[error("mapping table is invalid: {reason}")]
    InvalidMapping { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        BenchError::InvalidConfiguration(reason.into())
    }

    pub fn connection(backend: &str, reason: impl ToString) -> Self {
        BenchError::AdapterConnection {
            backend: backend.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn operation(backend: &str, operation: &str, reason: impl ToString) -> Self {
        BenchError::AdapterOperation {
            backend: backend.to_string(),
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Fatal errors abort the whole invocation instead of one backend's run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BenchError::InvalidConfiguration(_) | BenchError::Metrics(_)
        )
    }

    /// Get the error category for logging and metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            BenchError::InvalidConfiguration(_) => "invalid_configuration",
            BenchError::AdapterConnection { .. } => "adapter_connection",
            BenchError::AdapterOperation { .. } => "adapter_operation",
            BenchError::Conversion(_) => "conversion",
            BenchError::Serialization(_) => "serialization",
            BenchError::Io(_) => "io",
            BenchError::Metrics(_) => "metrics",
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BenchError {
    fn from(err: toml::de::Error) -> Self {
        BenchError::InvalidConfiguration(err.to_string())
    }
}

impl From<toml::ser::Error> for BenchError {
    fn from(err: toml::ser::Error) -> Self {
        BenchError::Serialization(err.to_string())
    }
}
