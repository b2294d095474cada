// ── Adapter controller ──
//
// Owns the active device configuration and its compiled attribute set,
// and coordinates the radio around them: applying attributes, restarting
// advertising, reacting to radio power events. Reloads build a complete
// new generation and swap it in as a unit; the previous generation's
// notify sessions are torn down as part of the swap.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, ConfigOrigin, ControllerConfig};
use crate::drift::{DriftConfig, drift_task};
use crate::error::{ConfigError, CoreError};
use crate::gatt::{AttributeEngine, AttributeSet, canonical_uuid};
use crate::model::DeviceConfig;
use crate::radio::{PeripheralRadio, PowerState, RadioEvent};
use crate::store::StateStore;

const EVENT_CHANNEL_SIZE: usize = 256;
const FALLBACK_DEVICE_NAME: &str = "BLE-Adapter";

// ── Snapshots ────────────────────────────────────────────────────

/// One generation of controller state. Replaced wholesale on reload.
#[derive(Debug)]
pub struct ControllerRecord {
    pub config: Arc<DeviceConfig>,
    pub origin: ConfigOrigin,
    pub attributes: Arc<AttributeSet>,
    /// `None` until the first successful `init`.
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub device_name: String,
    pub config_path: String,
    pub last_config_updated: Option<DateTime<Utc>>,
    pub state_keys: Vec<String>,
    pub power_state: PowerState,
    pub services: usize,
    pub characteristics: usize,
    pub active_subscriptions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub path: String,
    pub data: Arc<DeviceConfig>,
}

// ── Builder ──────────────────────────────────────────────────────

pub struct ControllerBuilder {
    config: ControllerConfig,
    radio: Arc<dyn PeripheralRadio>,
    store: Option<StateStore>,
    engine: Option<AttributeEngine>,
    loader: Option<Arc<dyn ConfigLoader>>,
}

impl ControllerBuilder {
    /// Share an existing store instead of creating an empty one.
    pub fn store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use custom codec / action registries.
    pub fn engine(mut self, engine: AttributeEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Loader used by `reload_config(None)` for file origins.
    pub fn loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn build(self) -> AdapterController {
        let ControllerConfig {
            device,
            origin,
            device_name_override,
            stop_timeout,
        } = self.config;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        AdapterController {
            inner: Arc::new(ControllerInner {
                radio: self.radio,
                store: self.store.unwrap_or_default(),
                engine: self.engine.unwrap_or_default(),
                loader: self.loader,
                device_name_override,
                stop_timeout,
                record: ArcSwap::from_pointee(ControllerRecord {
                    config: Arc::new(device),
                    origin,
                    attributes: Arc::new(AttributeSet::empty()),
                    last_updated: None,
                }),
                reload_lock: Mutex::new(()),
                event_tx,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }
}

// ── Controller ───────────────────────────────────────────────────

/// Cheaply cloneable handle; clones share one controller.
#[derive(Clone)]
pub struct AdapterController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    radio: Arc<dyn PeripheralRadio>,
    store: StateStore,
    engine: AttributeEngine,
    loader: Option<Arc<dyn ConfigLoader>>,
    device_name_override: Option<String>,
    stop_timeout: Duration,
    record: ArcSwap<ControllerRecord>,
    reload_lock: Mutex<()>,
    event_tx: broadcast::Sender<Arc<Value>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl AdapterController {
    pub fn builder(config: ControllerConfig, radio: Arc<dyn PeripheralRadio>) -> ControllerBuilder {
        ControllerBuilder {
            config,
            radio,
            store: None,
            engine: None,
            loader: None,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    pub fn radio(&self) -> &Arc<dyn PeripheralRadio> {
        &self.inner.radio
    }

    /// Current generation.
    pub fn record(&self) -> Arc<ControllerRecord> {
        self.inner.record.load_full()
    }

    pub fn attributes(&self) -> Arc<AttributeSet> {
        Arc::clone(&self.inner.record.load().attributes)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Apply config defaults to the store and compile the initial set.
    pub async fn init(&self) -> Result<(), CoreError> {
        let _guard = self.inner.reload_lock.lock().await;
        let current = self.inner.record.load_full();
        self.install(current.config.as_ref().clone(), current.origin.clone())?;
        Ok(())
    }

    /// Reload the configuration.
    ///
    /// With `Some(config)` the document is adopted as runtime-supplied.
    /// With `None` it is re-read from the file it was last loaded from.
    /// Existing state values survive; only missing keys get defaults.
    /// Reloads are serialised: a second call waits for the first.
    pub async fn reload_config(&self, config: Option<DeviceConfig>) -> Result<(), CoreError> {
        let _guard = self.inner.reload_lock.lock().await;

        let (config, origin) = match config {
            Some(config) => (config, ConfigOrigin::Runtime),
            None => {
                let current = self.inner.record.load();
                let path = current.origin.path().ok_or(ConfigError::NoOrigin)?;
                let loader = self.inner.loader.as_ref().ok_or(ConfigError::NoOrigin)?;
                (loader.load(path)?, current.origin.clone())
            }
        };

        self.install(config, origin)?;

        if self.inner.radio.power_state().is_powered_on() {
            self.apply_services().await?;
        }
        Ok(())
    }

    /// Validate, compile, seed defaults and swap in a new generation.
    /// A rejected config leaves the store untouched.
    fn install(&self, config: DeviceConfig, origin: ConfigOrigin) -> Result<(), CoreError> {
        config.validate()?;
        let attributes = self.inner.engine.compile(&config, &self.inner.store)?;
        self.inner.store.ensure_defaults(&config.state);

        info!(
            device = %config.device.name,
            origin = %origin,
            characteristics = attributes.len(),
            "configuration installed"
        );
        let previous = self.inner.record.swap(Arc::new(ControllerRecord {
            config: Arc::new(config),
            origin,
            attributes: Arc::new(attributes),
            last_updated: Some(Utc::now()),
        }));
        previous.attributes.shutdown();
        Ok(())
    }

    /// Push the current attribute set to the radio. No-op when empty.
    pub async fn apply_services(&self) -> Result<(), CoreError> {
        let attributes = self.attributes();
        if attributes.is_empty() {
            debug!("no services to apply");
            return Ok(());
        }
        self.inner.radio.set_attributes(attributes).await?;
        debug!("services applied");
        Ok(())
    }

    /// Stop (bounded wait), re-apply, then start advertising.
    pub async fn restart_advertising(&self) -> Result<(), CoreError> {
        match tokio::time::timeout(self.inner.stop_timeout, self.inner.radio.stop_advertising()).await {
            Ok(Ok(())) => debug!("advertising stopped"),
            Ok(Err(e)) => warn!(error = %e, "stop advertising failed (non-fatal)"),
            Err(_) => warn!(
                timeout_ms = self.inner.stop_timeout.as_millis(),
                "stop advertising timed out, continuing"
            ),
        }

        self.apply_services().await?;

        let name = self.device_name();
        self.inner
            .radio
            .start_advertising(&name, &self.advertised_uuids())
            .await?;
        info!(%name, "advertising restarted");
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Override, then config name, then a fixed fallback.
    pub fn device_name(&self) -> String {
        if let Some(name) = &self.inner.device_name_override {
            return name.clone();
        }
        let record = self.inner.record.load();
        let name = record.config.device.name.trim();
        if name.is_empty() {
            FALLBACK_DEVICE_NAME.to_owned()
        } else {
            name.to_owned()
        }
    }

    pub fn advertised_uuids(&self) -> Vec<String> {
        self.inner
            .record
            .load()
            .config
            .device
            .advertise_service_uuids
            .iter()
            .map(|uuid| canonical_uuid(uuid))
            .collect()
    }

    pub fn has_services(&self) -> bool {
        !self.inner.record.load().attributes.is_empty()
    }

    pub fn health(&self) -> Health {
        let record = self.inner.record.load_full();
        Health {
            status: "ok",
            device_name: self.device_name(),
            config_path: record.origin.to_string(),
            last_config_updated: record.last_updated,
            state_keys: self.inner.store.keys(),
            power_state: self.inner.radio.power_state(),
            services: record.attributes.services().len(),
            characteristics: record.attributes.len(),
            active_subscriptions: record.attributes.active_subscriptions(),
        }
    }

    pub fn state(&self) -> Map<String, Value> {
        self.inner.store.snapshot()
    }

    pub fn config(&self) -> ConfigView {
        let record = self.inner.record.load();
        ConfigView {
            path: record.origin.to_string(),
            data: Arc::clone(&record.config),
        }
    }

    // ── Control-plane operations ─────────────────────────────────

    /// Merge `partial` into the store.
    pub fn set_state(&self, partial: Map<String, Value>) {
        debug!(keys = partial.len(), "state update");
        self.inner.store.set_many(partial);
    }

    /// Reload with `config`; when the radio is powered on, restart
    /// advertising in the background.
    pub async fn set_config(&self, config: DeviceConfig) -> Result<(), CoreError> {
        self.reload_config(Some(config)).await?;

        if self.inner.radio.power_state().is_powered_on() {
            let controller = self.clone();
            tokio::spawn(async move {
                match controller.restart_advertising().await {
                    Ok(()) => info!("advertising restarted after config update"),
                    Err(e) => error!(error = %e, "restart advertising failed"),
                }
            });
        }
        Ok(())
    }

    /// Accept an event from the control plane and fan it out.
    pub fn on_event(&self, event: Value) {
        info!(%event, "event received");
        let _ = self.inner.event_tx.send(Arc::new(event));
    }

    pub fn events(&self) -> broadcast::Receiver<Arc<Value>> {
        self.inner.event_tx.subscribe()
    }

    // ── Radio reactions ──────────────────────────────────────────

    pub async fn handle_radio_event(&self, event: RadioEvent) {
        match event {
            RadioEvent::StateChange(PowerState::PoweredOn) => {
                if !self.has_services() {
                    info!("no services configured yet, waiting for a config update");
                    return;
                }
                let name = self.device_name();
                match self
                    .inner
                    .radio
                    .start_advertising(&name, &self.advertised_uuids())
                    .await
                {
                    Ok(()) => info!(%name, "advertising"),
                    Err(e) => error!(error = %e, "advertising failed to start"),
                }
            }
            RadioEvent::StateChange(power) => {
                debug!(%power, "radio not powered, stopping advertising");
                match tokio::time::timeout(self.inner.stop_timeout, self.inner.radio.stop_advertising())
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "stop advertising failed"),
                    Err(_) => warn!("stop advertising timed out"),
                }
            }
            RadioEvent::AdvertisingStart(Err(e)) => {
                error!(error = %e, "advertising start reported an error");
            }
            RadioEvent::AdvertisingStart(Ok(())) => {
                if !self.has_services() {
                    info!("skipping service setup, no services defined");
                    return;
                }
                match self.apply_services().await {
                    Ok(()) => info!("services set from config"),
                    Err(e) => error!(error = %e, "set services failed"),
                }
            }
        }
    }

    // ── Background tasks ─────────────────────────────────────────

    /// Start reacting to radio events.
    pub async fn start(&self) {
        let rx = self.inner.radio.events();
        let controller = self.clone();
        let cancel = self.inner.cancel.clone();
        self.inner
            .task_handles
            .lock()
            .await
            .push(tokio::spawn(radio_event_task(controller, rx, cancel)));
        debug!("radio event task started");
    }

    /// Start drifting a numeric state value.
    pub async fn start_drift(&self, config: DriftConfig) {
        info!(key = %config.key, interval_ms = config.interval.as_millis(), "value drift enabled");
        let store = self.inner.store.clone();
        let cancel = self.inner.cancel.clone();
        self.inner
            .task_handles
            .lock()
            .await
            .push(tokio::spawn(drift_task(store, config, cancel)));
    }

    /// Cancel background tasks, wait for them, and close notify sessions.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        self.inner.record.load().attributes.shutdown();
        debug!("controller shut down");
    }
}

async fn radio_event_task(
    controller: AdapterController,
    mut rx: broadcast::Receiver<RadioEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(event) => controller.handle_radio_event(event).await,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "radio events lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}
