// ── Configuration model ──
//
// The declarative device document: device identity, GATT services and
// their characteristics, plus optional default state. Deserialized from
// JSON (camelCase keys) and replaced wholesale on reload.

pub mod action;
pub mod device;
pub mod service;

pub use action::ActionStep;
pub use device::{DeviceConfig, DeviceInfo};
pub use service::{
    CharacteristicConfig, CodecConfig, DescriptorConfig, NotifyConfig, NotifyTrigger, Property,
    ServiceConfig, ValueSource,
};
