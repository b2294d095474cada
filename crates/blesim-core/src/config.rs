// ── Controller configuration ──
//
// Runtime settings for the adapter controller, plus the seam through
// which a device configuration is (re)loaded from its origin.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::DeviceConfig;

/// Default upper bound on waiting for the radio to stop advertising.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Where the active device configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Loaded from a file; `reload` re-reads it.
    File(PathBuf),
    /// Supplied over the control plane; there is nothing to re-read.
    Runtime,
}

impl ConfigOrigin {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Runtime => None,
        }
    }
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Runtime => f.write_str("[runtime]"),
        }
    }
}

/// Reads a device configuration from a path. Implemented by the config
/// crate on top of the filesystem; tests supply in-memory loaders.
pub trait ConfigLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<DeviceConfig, ConfigError>;
}

/// Everything the controller needs at construction time.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Initial device configuration.
    pub device: DeviceConfig,
    /// Where `device` came from.
    pub origin: ConfigOrigin,
    /// Takes precedence over `device.device.name` when set.
    pub device_name_override: Option<String>,
    /// How long `restart_advertising` waits for the radio to stop.
    pub stop_timeout: Duration,
}

impl ControllerConfig {
    pub fn new(device: DeviceConfig, origin: ConfigOrigin) -> Self {
        Self {
            device,
            origin,
            device_name_override: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.device_name_override = (!name.trim().is_empty()).then_some(name);
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_origin_displays_marker() {
        assert_eq!(ConfigOrigin::Runtime.to_string(), "[runtime]");
        assert_eq!(
            ConfigOrigin::File(PathBuf::from("config/device.json")).to_string(),
            "config/device.json"
        );
        assert!(ConfigOrigin::Runtime.path().is_none());
    }
}
