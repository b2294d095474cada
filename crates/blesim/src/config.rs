//! Settings resolution with command-line overrides layered on top of
//! `blesim-config`.

use blesim_config::Settings;
use blesim_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load settings (file + environment) and apply global flag overrides.
pub fn load_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let mut settings = Settings::load(global.settings.as_deref())?;

    if let Some(ref path) = global.config {
        settings.device_config.clone_from(path);
    }
    if let Some(ref name) = global.device_name {
        if name.trim().is_empty() {
            return Err(CliError::Validation {
                field: "--device-name".into(),
                reason: "must not be blank".into(),
            });
        }
        settings.device_name = Some(name.clone());
    }
    Ok(settings)
}

/// Load the device configuration named by `settings`.
pub fn controller_config(settings: &Settings) -> Result<ControllerConfig, CliError> {
    settings
        .controller_config()
        .map_err(|source| CliError::DeviceConfig {
            path: settings.device_config_path().display().to_string(),
            source,
        })
}
