// ── Attribute engine ──
//
// Compiles a device configuration into an `AttributeSet`. All lookups
// (codec formats, action types, descriptor records, notify triggers) are
// resolved here, so a set that compiles has no configuration errors left
// to discover at request time.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::attribute::{Attribute, AttributeRuntime, BoundCodec, Triggers};
use super::{AttributeSet, Service, canonical_uuid, descriptor};
use crate::action::ActionRegistry;
use crate::codec::CodecRegistry;
use crate::error::{ConfigError, CoreError};
use crate::model::{CharacteristicConfig, DeviceConfig, NotifyTrigger, Property, ServiceConfig};
use crate::store::StateStore;

#[derive(Debug, Clone, Default)]
pub struct AttributeEngine {
    codecs: Arc<CodecRegistry>,
    actions: Arc<ActionRegistry>,
}

impl AttributeEngine {
    pub fn new(codecs: CodecRegistry, actions: ActionRegistry) -> Self {
        Self {
            codecs: Arc::new(codecs),
            actions: Arc::new(actions),
        }
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Build the attribute set for `config`, bound to `state`.
    pub fn compile(&self, config: &DeviceConfig, state: &StateStore) -> Result<AttributeSet, CoreError> {
        let services = config
            .services
            .iter()
            .enumerate()
            .map(|(i, service)| self.compile_service(i, service, config, state))
            .collect::<Result<Vec<_>, _>>()?;

        let set = AttributeSet { services };
        debug!(
            services = set.services.len(),
            characteristics = set.len(),
            "attribute set compiled"
        );
        Ok(set)
    }

    fn compile_service(
        &self,
        index: usize,
        service: &ServiceConfig,
        config: &DeviceConfig,
        state: &StateStore,
    ) -> Result<Service, CoreError> {
        let uuid = canonical_uuid(&service.uuid);
        let characteristics = service
            .characteristics
            .iter()
            .enumerate()
            .map(|(j, characteristic)| {
                let path = format!("services[{index}].characteristics[{j}]");
                self.compile_characteristic(&path, &uuid, characteristic, config, state)
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Service {
            uuid,
            characteristics,
        })
    }

    fn compile_characteristic(
        &self,
        path: &str,
        service_uuid: &str,
        config: &CharacteristicConfig,
        device: &DeviceConfig,
        state: &StateStore,
    ) -> Result<Attribute, CoreError> {
        let codec = config
            .codec
            .as_ref()
            .map(|codec_config| {
                let codec = self.codecs.resolve(codec_config)?;
                codec.validate(codec_config)?;
                Ok::<_, CoreError>(BoundCodec {
                    codec,
                    config: codec_config.clone(),
                })
            })
            .transpose()?;

        let on_write = self.actions.compile(&config.on_write)?;

        let descriptors = config
            .descriptors
            .iter()
            .map(|d| descriptor::build(d, canonical_uuid(&d.uuid)))
            .collect::<Result<Vec<_>, _>>()?;

        let triggers = if config.has_property(Property::Notify) {
            resolve_triggers(path, config)?
        } else {
            Triggers::default()
        };

        let runtime = AttributeRuntime {
            device_name: device.device.name.clone(),
            service_uuid: service_uuid.to_owned(),
            uuid: canonical_uuid(&config.uuid),
            name: config.name.clone(),
            source: config.value.clone(),
            codec,
            on_write,
            triggers,
            state: state.clone(),
        };
        Ok(Attribute::new(config.properties.clone(), descriptors, runtime))
    }
}

/// Default is `onChange` for state-backed values and nothing otherwise.
fn resolve_triggers(path: &str, config: &CharacteristicConfig) -> Result<Triggers, ConfigError> {
    let state_key = config
        .value
        .as_ref()
        .and_then(|source| source.state_key())
        .map(str::to_owned);

    let declared = config
        .notify
        .as_ref()
        .map(|n| n.triggers.as_slice())
        .unwrap_or_default();
    if declared.is_empty() {
        return Ok(Triggers {
            on_change: state_key,
            timer: None,
        });
    }

    let mut triggers = Triggers::default();
    if declared.contains(&NotifyTrigger::OnChange) {
        if state_key.is_none() {
            return Err(ConfigError::invalid(
                format!("{path}.notify.triggers"),
                "onChange requires a state value source",
            ));
        }
        triggers.on_change = state_key;
    }
    if declared.contains(&NotifyTrigger::Timer) {
        let interval = config
            .notify
            .as_ref()
            .and_then(|n| n.interval_ms)
            .filter(|ms| *ms > 0)
            .ok_or_else(|| {
                ConfigError::invalid(
                    format!("{path}.notify.intervalMs"),
                    "timer trigger requires a positive interval",
                )
            })?;
        triggers.timer = Some(Duration::from_millis(interval));
    }
    Ok(triggers)
}
