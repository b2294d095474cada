//! Settings for the BLE peripheral simulator.
//!
//! Layered process settings (defaults → TOML file → legacy environment
//! variables → `BLESIM_*` environment), JSON device-config loading, and
//! translation to `blesim_core::ControllerConfig`. The binary applies
//! command-line overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use blesim_core::{ConfigLoader, ConfigOrigin, ControllerConfig, DeviceConfig, DriftConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("settings file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Settings structs ────────────────────────────────────────────────

/// Top-level process settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Path of the JSON device configuration.
    #[serde(default = "default_device_config")]
    pub device_config: PathBuf,

    /// Overrides `device.name` from the device configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    /// Upper bound on waiting for the radio to stop advertising.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub drift: DriftSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_config: default_device_config(),
            device_name: None,
            stop_timeout_ms: default_stop_timeout_ms(),
            http: HttpSettings::default(),
            drift: DriftSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl HttpSettings {
    /// `host:port`, suitable for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Random walk applied to one numeric state key.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DriftSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_drift_key")]
    pub key: String,

    #[serde(default = "default_drift_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_drift_amplitude")]
    pub amplitude: f64,

    #[serde(default = "default_drift_min")]
    pub min: f64,

    #[serde(default = "default_drift_max")]
    pub max: f64,
}

impl Default for DriftSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            key: default_drift_key(),
            interval_ms: default_drift_interval_ms(),
            amplitude: default_drift_amplitude(),
            min: default_drift_min(),
            max: default_drift_max(),
        }
    }
}

impl DriftSettings {
    pub fn to_drift_config(&self) -> DriftConfig {
        DriftConfig {
            key: self.key.clone(),
            interval: Duration::from_millis(self.interval_ms),
            amplitude: self.amplitude,
            min: self.min,
            max: self.max,
        }
    }
}

fn default_device_config() -> PathBuf {
    PathBuf::from("config").join("device.json")
}
fn default_stop_timeout_ms() -> u64 {
    1500
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}
fn default_drift_key() -> String {
    "temperatureC".into()
}
fn default_drift_interval_ms() -> u64 {
    2000
}
fn default_drift_amplitude() -> f64 {
    0.2
}
fn default_drift_min() -> f64 {
    -40.0
}
fn default_drift_max() -> f64 {
    125.0
}

// ── Settings file path ──────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn settings_path() -> PathBuf {
    ProjectDirs::from("dev", "blesim", "blesim").map_or_else(
        || PathBuf::from(".blesim.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Settings loading ────────────────────────────────────────────────

/// Unprefixed variables honoured for compatibility with existing
/// deployments, mapped onto settings keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("HTTP_HOST", "http.host"),
    ("HTTP_PORT", "http.port"),
    ("BLE_DEVICE_CONFIG", "device_config"),
    ("BLE_DEVICE_NAME", "device_name"),
];

fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
    })
}

/// Build the layered figment for `file` without extracting it.
pub fn settings_figment(file: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(file))
        .merge(legacy_env())
        .merge(Env::prefixed("BLESIM_").split("__"))
}

impl Settings {
    /// Load settings from `file` (or the platform default path) plus the
    /// environment. An explicitly named file must exist; the default one
    /// is optional.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let path = match file {
            Some(path) if !path.exists() => {
                return Err(SettingsError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Some(path) => path.to_path_buf(),
            None => settings_path(),
        };
        debug!(path = %path.display(), "loading settings");

        let settings: Self = settings_figment(&path).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.http.host.trim().is_empty() {
            return Err(invalid("http.host", "must not be empty"));
        }
        if self.device_config.as_os_str().is_empty() {
            return Err(invalid("device_config", "must not be empty"));
        }
        if self.drift.enabled {
            let drift = &self.drift;
            if drift.key.trim().is_empty() {
                return Err(invalid("drift.key", "must not be empty"));
            }
            if drift.interval_ms == 0 {
                return Err(invalid("drift.interval_ms", "must be greater than zero"));
            }
            if !drift.amplitude.is_finite() || drift.amplitude < 0.0 {
                return Err(invalid("drift.amplitude", "must be a non-negative number"));
            }
            if !(drift.min.is_finite() && drift.max.is_finite()) || drift.min > drift.max {
                return Err(invalid("drift", "min must not exceed max"));
            }
        }
        Ok(())
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Absolute path of the device configuration.
    pub fn device_config_path(&self) -> PathBuf {
        std::path::absolute(&self.device_config).unwrap_or_else(|_| self.device_config.clone())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Load the device configuration and build a `ControllerConfig` with
    /// the name override and stop timeout applied.
    pub fn controller_config(&self) -> Result<ControllerConfig, blesim_core::ConfigError> {
        let path = self.device_config_path();
        let device = load_device_config(&path)?;

        let mut config = ControllerConfig::new(device, ConfigOrigin::File(path))
            .with_stop_timeout(self.stop_timeout());
        if let Some(ref name) = self.device_name {
            config = config.with_device_name(name.clone());
        }
        Ok(config)
    }
}

// ── Device config loading ───────────────────────────────────────────

/// Read, parse and validate a JSON device configuration.
pub fn load_device_config(path: &Path) -> Result<DeviceConfig, blesim_core::ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| blesim_core::ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    DeviceConfig::from_json_str(&raw)
}

/// Filesystem-backed [`ConfigLoader`] used for file-origin reloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileLoader;

impl ConfigLoader for JsonFileLoader {
    fn load(&self, path: &Path) -> Result<DeviceConfig, blesim_core::ConfigError> {
        load_device_config(path)
    }
}
