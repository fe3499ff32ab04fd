//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Queue full - event dropped
    #[error("queue full for sink '{sink_name}', {kind} event at {stamp} dropped")]
    QueueFull {
        sink_name: String,
        kind: &'static str,
        stamp: f64,
    },

    /// Worker task is gone
    #[error("worker of sink '{0}' closed unexpectedly")]
    WorkerClosed(String),

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DispatcherError::sink_creation("poses", "missing path");
        assert_eq!(err.to_string(), "failed to create sink 'poses': missing path");

        let err = DispatcherError::QueueFull {
            sink_name: "slow".into(),
            kind: "update",
            stamp: 1.5,
        };
        assert!(err.to_string().contains("update event at 1.5"));
    }
}
