//! Layered error definitions
//!
//! Categorized by source: config / modality / bundle / pose / sink

use thiserror::Error;

use crate::LineId;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Modality combination that no synchronization shape can serve
    #[error("invalid modality set: {message}")]
    InvalidModality { message: String },

    // ===== Data Errors =====
    /// Aligned data that cannot be turned into a bundle
    #[error("invalid bundle on line '{line}': {message}")]
    InvalidBundle { line: LineId, message: String },

    /// Pose string that cannot be parsed
    #[error("invalid pose '{input}': expected 6 (x y z roll pitch yaw) or 7 (x y z qx qy qz qw) values")]
    InvalidPose { input: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid modality error
    pub fn invalid_modality(message: impl Into<String>) -> Self {
        Self::InvalidModality {
            message: message.into(),
        }
    }

    /// Create invalid bundle error
    pub fn invalid_bundle(line: LineId, message: impl Into<String>) -> Self {
        Self::InvalidBundle {
            line,
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
