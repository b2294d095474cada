use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::service::ServiceConfig;
use crate::error::ConfigError;

/// Root of the device configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(default)]
    pub device: DeviceInfo,

    #[serde(default)]
    pub services: Vec<ServiceConfig>,

    /// Initial / default state values. Only missing keys are filled.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state: Map<String, Value>,
}

/// Advertised identity of the simulated peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub advertise_service_uuids: Vec<String>,
}

impl DeviceConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize and validate an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks the type system can't express: a device name and
    /// at least one service, each with an identifier.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "device.name".into(),
            });
        }
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }
        for (i, service) in self.services.iter().enumerate() {
            if service.uuid.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: format!("services[{i}].uuid"),
                });
            }
            for (j, characteristic) in service.characteristics.iter().enumerate() {
                if characteristic.uuid.trim().is_empty() {
                    return Err(ConfigError::MissingField {
                        field: format!("services[{i}].characteristics[{j}].uuid"),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_document() {
        let config = DeviceConfig::from_value(json!({
            "device": { "name": "TestDevice" },
            "services": [{ "uuid": "1234", "characteristics": [] }]
        }))
        .unwrap();

        assert_eq!(config.device.name, "TestDevice");
        assert!(config.device.advertise_service_uuids.is_empty());
        assert!(config.state.is_empty());
    }

    #[test]
    fn missing_device_name_is_reported_by_path() {
        let err = DeviceConfig::from_value(json!({ "device": {}, "services": [] })).unwrap_err();
        assert!(err.to_string().contains("device.name"), "{err}");
    }

    #[test]
    fn empty_services_rejected() {
        let err = DeviceConfig::from_value(json!({ "device": { "name": "X" }, "services": [] }))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoServices));
    }

    #[test]
    fn characteristic_without_uuid_rejected() {
        let err = DeviceConfig::from_value(json!({
            "device": { "name": "X" },
            "services": [{ "uuid": "1", "characteristics": [{ "uuid": " " }] }]
        }))
        .unwrap_err();
        assert!(
            err.to_string().contains("services[0].characteristics[0].uuid"),
            "{err}"
        );
    }

    #[test]
    fn unknown_property_is_a_parse_error() {
        let err = DeviceConfig::from_json_str(
            r#"{"device":{"name":"X"},"services":[{"uuid":"1","characteristics":[
                {"uuid":"2","properties":["broadcast"]}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
