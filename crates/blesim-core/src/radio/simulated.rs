use std::future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{PeripheralRadio, PowerState, RadioEvent};
use crate::error::RadioError;
use crate::gatt::{AttError, Attribute, AttributeSet, NotifySink};

const EVENT_CAPACITY: usize = 64;

/// Current advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    pub name: String,
    pub service_uuids: Vec<String>,
}

/// Failure injection switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    pub fail_start: bool,
    pub fail_apply: bool,
    pub fail_stop: bool,
    /// `stop_advertising` never completes.
    pub hang_stop: bool,
}

#[derive(Debug, Default)]
struct RadioState {
    power: PowerState,
    advertising: Option<Advertisement>,
    attributes: Option<Arc<AttributeSet>>,
    apply_count: usize,
    faults: Faults,
}

struct RadioInner {
    state: RwLock<RadioState>,
    events: broadcast::Sender<RadioEvent>,
}

/// In-memory radio. Clones share state.
#[derive(Clone)]
pub struct SimulatedRadio {
    inner: Arc<RadioInner>,
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("SimulatedRadio")
            .field("power", &state.power)
            .field("advertising", &state.advertising)
            .field("apply_count", &state.apply_count)
            .finish_non_exhaustive()
    }
}

impl SimulatedRadio {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RadioInner {
                state: RwLock::new(RadioState::default()),
                events,
            }),
        }
    }

    // ── Adapter simulation ───────────────────────────────────────────

    /// Change the power state and announce it.
    pub fn set_power(&self, power: PowerState) {
        {
            let mut state = self.inner.state.write();
            state.power = power;
            if !power.is_powered_on() {
                state.advertising = None;
            }
        }
        info!(%power, "radio power state changed");
        let _ = self.inner.events.send(RadioEvent::StateChange(power));
    }

    pub fn power_on(&self) {
        self.set_power(PowerState::PoweredOn);
    }

    pub fn set_faults(&self, faults: Faults) {
        self.inner.state.write().faults = faults;
    }

    pub fn advertising(&self) -> Option<Advertisement> {
        self.inner.state.read().advertising.clone()
    }

    /// The attribute set most recently applied.
    pub fn attributes(&self) -> Option<Arc<AttributeSet>> {
        self.inner.state.read().attributes.clone()
    }

    /// Number of successful `set_attributes` calls.
    pub fn apply_count(&self) -> usize {
        self.inner.state.read().apply_count
    }

    // ── Loopback central ─────────────────────────────────────────────

    fn lookup(&self, service_uuid: &str, uuid: &str) -> Result<Arc<Attribute>, AttError> {
        self.attributes()
            .and_then(|set| set.find(service_uuid, uuid))
            .ok_or(AttError::AttributeNotFound)
    }

    pub fn read(&self, service_uuid: &str, uuid: &str, offset: usize) -> Result<Bytes, AttError> {
        self.lookup(service_uuid, uuid)?.read(offset)
    }

    pub fn write(
        &self,
        service_uuid: &str,
        uuid: &str,
        data: &[u8],
        without_response: bool,
    ) -> Result<(), AttError> {
        self.lookup(service_uuid, uuid)?.write(data, 0, without_response)
    }

    pub fn subscribe(&self, service_uuid: &str, uuid: &str, sink: NotifySink) -> Result<(), AttError> {
        self.lookup(service_uuid, uuid)?.subscribe(sink)
    }

    pub fn unsubscribe(&self, service_uuid: &str, uuid: &str) -> Result<(), AttError> {
        self.lookup(service_uuid, uuid)?.unsubscribe();
        Ok(())
    }
}

#[async_trait]
impl PeripheralRadio for SimulatedRadio {
    async fn set_attributes(&self, attributes: Arc<AttributeSet>) -> Result<(), RadioError> {
        let mut state = self.inner.state.write();
        if state.faults.fail_apply {
            return Err(RadioError::Operation {
                operation: "setServices",
                message: "injected failure".into(),
            });
        }
        debug!(characteristics = attributes.len(), "attributes applied");
        state.attributes = Some(attributes);
        state.apply_count += 1;
        Ok(())
    }

    async fn start_advertising(&self, name: &str, service_uuids: &[String]) -> Result<(), RadioError> {
        let result = {
            let mut state = self.inner.state.write();
            if !state.power.is_powered_on() {
                Err(RadioError::Unavailable(format!("adapter is {}", state.power)))
            } else if state.faults.fail_start {
                Err(RadioError::Operation {
                    operation: "startAdvertising",
                    message: "injected failure".into(),
                })
            } else {
                state.advertising = Some(Advertisement {
                    name: name.to_owned(),
                    service_uuids: service_uuids.to_vec(),
                });
                Ok(())
            }
        };
        if result.is_ok() {
            info!(name, "advertising started");
        }
        let _ = self
            .inner
            .events
            .send(RadioEvent::AdvertisingStart(result.clone()));
        result
    }

    async fn stop_advertising(&self) -> Result<(), RadioError> {
        let faults = self.inner.state.read().faults;
        if faults.hang_stop {
            future::pending::<()>().await;
        }
        if faults.fail_stop {
            return Err(RadioError::Operation {
                operation: "stopAdvertising",
                message: "injected failure".into(),
            });
        }
        self.inner.state.write().advertising = None;
        debug!("advertising stopped");
        Ok(())
    }

    fn power_state(&self) -> PowerState {
        self.inner.state.read().power
    }

    fn events(&self) -> broadcast::Receiver<RadioEvent> {
        self.inner.events.subscribe()
    }
}
