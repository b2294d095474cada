// ── Peripheral radio seam ──
//
// The controller drives the radio only through `PeripheralRadio`. A real
// BLE backend would implement it on top of the platform stack;
// `SimulatedRadio` implements it in memory and doubles as a loopback
// central for tests and the control plane.

mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::broadcast;

use crate::error::RadioError;
use crate::gatt::AttributeSet;

pub use simulated::{Advertisement, Faults, SimulatedRadio};

/// Adapter power state as reported by the radio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum PowerState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl PowerState {
    pub fn is_powered_on(self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

/// Events the radio emits towards the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    StateChange(PowerState),
    AdvertisingStart(Result<(), RadioError>),
}

#[async_trait]
pub trait PeripheralRadio: Send + Sync {
    /// Replace the exposed GATT database.
    async fn set_attributes(&self, attributes: Arc<AttributeSet>) -> Result<(), RadioError>;

    async fn start_advertising(&self, name: &str, service_uuids: &[String]) -> Result<(), RadioError>;

    async fn stop_advertising(&self) -> Result<(), RadioError>;

    fn power_state(&self) -> PowerState;

    /// Subscribe to radio events.
    fn events(&self) -> broadcast::Receiver<RadioEvent>;
}
