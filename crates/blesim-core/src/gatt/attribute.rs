// ── Compiled attributes ──
//
// An `Attribute` is the live form of one characteristic. It owns an
// immutable runtime (value source, codec handle, write pipeline, store
// handle) and at most one notify session. Sessions own every resource a
// subscription arms, so tearing one down is a drop.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::AttError;
use super::descriptor::{Descriptor, raw_bytes};
use crate::action::{ActionContext, ActionPipeline};
use crate::codec::Codec;
use crate::error::CoreError;
use crate::model::{CodecConfig, Property, ValueSource};
use crate::store::{StateStore, Subscription};

/// Receives encoded notification payloads for one subscription.
pub type NotifySink = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Resolved notify triggers for one characteristic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Triggers {
    /// State key whose changes re-deliver the value.
    pub on_change: Option<String>,
    pub timer: Option<Duration>,
}

#[derive(Debug, Clone)]
pub(crate) struct BoundCodec {
    pub codec: Arc<dyn Codec>,
    pub config: CodecConfig,
}

/// Everything a handler needs, shared with timer tasks and listeners.
#[derive(Debug)]
pub(crate) struct AttributeRuntime {
    pub device_name: String,
    pub service_uuid: String,
    pub uuid: String,
    pub name: Option<String>,
    pub source: Option<ValueSource>,
    pub codec: Option<BoundCodec>,
    pub on_write: ActionPipeline,
    pub triggers: Triggers,
    pub state: StateStore,
}

impl AttributeRuntime {
    fn resolve(&self) -> Value {
        match &self.source {
            Some(ValueSource::State { key, default }) => self
                .state
                .get(key)
                .or_else(|| default.clone())
                .unwrap_or(Value::Null),
            Some(ValueSource::Literal { value }) => value.clone(),
            None => Value::Null,
        }
    }

    /// Resolve the value source and encode it for the wire.
    fn current_payload(&self) -> Result<Bytes, CoreError> {
        let value = self.resolve();
        match &self.codec {
            Some(bound) => Ok(bound.codec.encode(&value, &bound.config)?),
            None => Ok(raw_bytes(&value)),
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Value, CoreError> {
        match &self.codec {
            Some(bound) => Ok(bound.codec.decode(data, &bound.config)?),
            None => Ok(match std::str::from_utf8(data) {
                Ok(text) => Value::String(text.to_owned()),
                Err(_) => Value::Array(data.iter().map(|b| Value::from(*b)).collect()),
            }),
        }
    }

    fn handle_write(&self, data: &[u8]) -> Result<(), CoreError> {
        let value = self.decode(data)?;
        let mut ctx = ActionContext {
            device_name: self.device_name.clone(),
            service_uuid: self.service_uuid.clone(),
            uuid: self.uuid.clone(),
            characteristic_name: self.name.clone(),
            value,
            parsed: None,
            state: self.state.clone(),
        };
        self.on_write.run(&mut ctx)?;
        Ok(())
    }

    fn notify(&self, sink: &NotifySink) {
        match self.current_payload() {
            Ok(payload) => sink(payload),
            Err(e) => warn!(uuid = %self.uuid, error = %e, "notify encode failed"),
        }
    }
}

/// Resources held by an active subscription.
struct NotifySession {
    cancel: CancellationToken,
    _listener: Option<Subscription>,
}

impl Drop for NotifySession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A live characteristic.
pub struct Attribute {
    properties: Vec<Property>,
    descriptors: Vec<Descriptor>,
    runtime: Arc<AttributeRuntime>,
    session: Mutex<Option<NotifySession>>,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("uuid", &self.runtime.uuid)
            .field("properties", &self.properties)
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}

impl Attribute {
    pub(crate) fn new(
        properties: Vec<Property>,
        descriptors: Vec<Descriptor>,
        runtime: AttributeRuntime,
    ) -> Self {
        Self {
            properties,
            descriptors,
            runtime: Arc::new(runtime),
            session: Mutex::new(None),
        }
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn uuid(&self) -> &str {
        &self.runtime.uuid
    }

    pub fn service_uuid(&self) -> &str {
        &self.runtime.service_uuid
    }

    pub fn name(&self) -> Option<&str> {
        self.runtime.name.as_deref()
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn has_property(&self, property: Property) -> bool {
        self.properties.contains(&property)
    }

    // ── Handlers ─────────────────────────────────────────────────────

    /// Read request. Values are never long, so any non-zero offset is
    /// rejected.
    pub fn read(&self, offset: usize) -> Result<Bytes, AttError> {
        if !self.has_property(Property::Read) {
            return Err(AttError::ReadNotPermitted);
        }
        if offset != 0 {
            return Err(AttError::AttributeNotLong);
        }
        self.runtime.current_payload().map_err(|e| {
            warn!(uuid = %self.runtime.uuid, error = %e, "read failed");
            AttError::UnlikelyError
        })
    }

    /// Write request: decode, then run the `onWrite` pipeline.
    pub fn write(&self, data: &[u8], offset: usize, without_response: bool) -> Result<(), AttError> {
        if !(self.has_property(Property::Write)
            || self.has_property(Property::WriteWithoutResponse))
        {
            return Err(AttError::WriteNotPermitted);
        }
        if offset != 0 {
            return Err(AttError::AttributeNotLong);
        }
        debug!(uuid = %self.runtime.uuid, len = data.len(), without_response, "write request");
        self.runtime.handle_write(data).map_err(|e| {
            warn!(uuid = %self.runtime.uuid, error = %e, "write failed");
            AttError::UnlikelyError
        })
    }

    /// Start notifications to `sink`. Delivers the current value at once,
    /// then arms the configured triggers. Replaces any earlier session.
    pub fn subscribe(&self, sink: NotifySink) -> Result<(), AttError> {
        if !self.has_property(Property::Notify) {
            return Err(AttError::RequestNotSupported);
        }
        // Old session is torn down before the new one delivers anything.
        self.unsubscribe();

        self.runtime.notify(&sink);

        let cancel = CancellationToken::new();
        let listener = self.runtime.triggers.on_change.as_ref().map(|key| {
            let runtime = Arc::clone(&self.runtime);
            let sink = Arc::clone(&sink);
            self.runtime
                .state
                .on_change(key.clone(), move |_| runtime.notify(&sink))
        });
        if let Some(period) = self.runtime.triggers.timer {
            self.spawn_timer(period, sink, cancel.clone());
        }

        debug!(uuid = %self.runtime.uuid, "notify subscribed");
        *self.session.lock() = Some(NotifySession {
            cancel,
            _listener: listener,
        });
        Ok(())
    }

    /// Stop notifications. Idempotent.
    pub fn unsubscribe(&self) {
        let session = self.session.lock().take();
        if session.is_some() {
            debug!(uuid = %self.runtime.uuid, "notify unsubscribed");
        }
        drop(session);
    }

    pub fn is_subscribed(&self) -> bool {
        self.session.lock().is_some()
    }

    fn spawn_timer(&self, period: Duration, sink: NotifySink, cancel: CancellationToken) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(uuid = %self.runtime.uuid, "no async runtime; timer notifications disabled");
            return;
        };
        let runtime = Arc::clone(&self.runtime);
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the subscribe path has
            // already delivered.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => runtime.notify(&sink),
                }
            }
        });
    }
}
