use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use super::action::ActionStep;

/// A primary GATT service and its ordered characteristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub uuid: String,
    #[serde(default)]
    pub characteristics: Vec<CharacteristicConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicConfig {
    pub uuid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub properties: Vec<Property>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<CodecConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptors: Vec<DescriptorConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_write: Vec<ActionStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<NotifyConfig>,
}

impl CharacteristicConfig {
    pub fn has_property(&self, property: Property) -> bool {
        self.properties.contains(&property)
    }

    pub fn is_writable(&self) -> bool {
        self.has_property(Property::Write) || self.has_property(Property::WriteWithoutResponse)
    }
}

/// GATT characteristic properties understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Property {
    Read,
    Write,
    WriteWithoutResponse,
    Notify,
}

/// Where a readable / notifiable characteristic gets its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum ValueSource {
    /// Look `key` up in the state store, falling back to `default`.
    State {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    /// A fixed value embedded in the configuration.
    Literal {
        #[serde(default)]
        value: Value,
    },
}

impl ValueSource {
    /// The state key this source is bound to, if any.
    pub fn state_key(&self) -> Option<&str> {
        match self {
            Self::State { key, .. } => Some(key),
            Self::Literal { .. } => None,
        }
    }
}

/// Wire format selection plus format-specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    pub format: String,

    /// Fixed-point scale; the wire integer is `value / scale`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,

    /// Parameters for formats registered outside this crate.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl CodecConfig {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            scale: None,
            params: Map::new(),
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorConfig {
    pub uuid: String,
    #[serde(default)]
    pub value: Value,
}

/// When an active subscription receives a fresh value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyConfig {
    #[serde(default)]
    pub triggers: Vec<NotifyTrigger>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum NotifyTrigger {
    OnChange,
    Timer,
}
