// ── Core error types ──
//
// One enum per layer, folded into `CoreError` at the crate boundary.
// Config errors are fatal at load/compile time. Codec and action errors
// are contained at the attribute handler boundary and only reach callers
// that invoke codecs or pipelines directly. Radio errors surface from the
// controller operations that drive the peripheral.

use thiserror::Error;

/// Malformed or incomplete device configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config missing {field}")]
    MissingField { field: String },

    #[error("config requires at least one service")]
    NoServices,

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no config file to reload from (current config was supplied at runtime)")]
    NoOrigin,
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failures raised while converting values to or from wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid codec input: {0}")]
    InvalidInput(String),

    #[error("invalid codec config: {0}")]
    InvalidConfig(String),

    #[error("unsupported codec format: {0}")]
    UnsupportedFormat(String),
}

/// Failures raised by the write-action pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("parse({kind}) failed for value \"{input}\"")]
    Parse { kind: String, input: String },

    #[error("unsupported {0}")]
    UnsupportedOperation(String),

    #[error("invalid action config: {0}")]
    Config(String),
}

/// Failures reported by the peripheral radio layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("radio {operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },

    #[error("radio unavailable: {0}")]
    Unavailable(String),
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Radio(#[from] RadioError),
}

impl CoreError {
    /// Returns `true` when the failure was caused by the supplied
    /// configuration rather than by the runtime or the radio.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Codec(_) | Self::Action(_))
    }
}
