//! CLI error types with miette diagnostics.
//!
//! Maps settings, device-config and core failures into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use blesim_config::SettingsError;
use blesim_core::{ConfigError, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const BIND: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Failed to load settings")]
    #[diagnostic(
        code(blesim::settings),
        help("Check the settings file and BLESIM_* / HTTP_* environment variables.")
    )]
    Settings(#[source] SettingsError),

    #[error("Invalid device configuration: {path}")]
    #[diagnostic(
        code(blesim::device_config),
        help(
            "The device configuration needs `device.name` and at least one service.\n\
             Point at another file with --config or BLE_DEVICE_CONFIG."
        )
    )]
    DeviceConfig {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("Device configuration rejected")]
    #[diagnostic(
        code(blesim::compile),
        help("Check codec formats, onWrite steps, notify triggers and descriptors.")
    )]
    Compile(#[source] CoreError),

    // ── Runtime ──────────────────────────────────────────────────────

    #[error("Could not bind the control plane to {addr}")]
    #[diagnostic(
        code(blesim::bind),
        help("Is another process using the port? Try --port or HTTP_PORT.")
    )]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(blesim::core))]
    Core(CoreError),

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(blesim::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Settings(_) | Self::DeviceConfig { .. } | Self::Compile(_) => exit_code::CONFIG,
            Self::Bind { .. } => exit_code::BIND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err)
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_config() {
            Self::Compile(err)
        } else {
            Self::Core(err)
        }
    }
}
