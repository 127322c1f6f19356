//! Error handling for the master station service
//!
//! Startup and shutdown paths report through [`LoraSrvError`]. Steady-state
//! polling never fails: decode errors stop at the message boundary and a
//! refused transmit is retried on a later pass.

use thiserror::Error;

/// Master station error type
#[derive(Error, Debug, Clone)]
pub enum LoraSrvError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Radio channel errors (port open, task wiring)
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Telemetry sink errors (CSV file creation)
    #[error("Sink error: {0}")]
    SinkError(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the master station service
pub type Result<T> = std::result::Result<T, LoraSrvError>;

impl LoraSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        LoraSrvError::ConfigError(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        LoraSrvError::IoError(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        LoraSrvError::ChannelError(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        LoraSrvError::SinkError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        LoraSrvError::InternalError(msg.into())
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<std::io::Error> for LoraSrvError {
    fn from(err: std::io::Error) -> Self {
        LoraSrvError::IoError(err.to_string())
    }
}

impl From<figment::Error> for LoraSrvError {
    fn from(err: figment::Error) -> Self {
        LoraSrvError::ConfigError(err.to_string())
    }
}

impl From<csv::Error> for LoraSrvError {
    fn from(err: csv::Error) -> Self {
        LoraSrvError::SinkError(format!("CSV: {err}"))
    }
}

impl From<anyhow::Error> for LoraSrvError {
    fn from(err: anyhow::Error) -> Self {
        LoraSrvError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors() {
        assert!(matches!(
            LoraSrvError::config("bad"),
            LoraSrvError::ConfigError(_)
        ));
        assert_eq!(
            LoraSrvError::channel("port gone").to_string(),
            "Channel error: port gone"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: LoraSrvError = std::io::Error::other("boom").into();
        assert!(matches!(err, LoraSrvError::IoError(_)));
    }
}
