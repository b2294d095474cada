//! Configuration-driven BLE peripheral engine.
//!
//! Turns a declarative JSON description of GATT services into live
//! read / write / notify behaviour backed by a shared observable store:
//!
//! - **[`StateStore`]**: Key/value map with synchronous per-key and
//!   wildcard change listeners. Listener panics are isolated.
//!
//! - **[`CodecRegistry`]**: Named wire formats (`fixedPointInt16`, `utf8`,
//!   `float32`, plus anything registered at runtime).
//!
//! - **[`ActionRegistry`]**: Builders for `onWrite` pipeline steps (`log`,
//!   `parse`), compiled eagerly so unknown steps fail before going live.
//!
//! - **[`AttributeEngine`]**: Compiles a [`DeviceConfig`] into an
//!   [`AttributeSet`] of live [`Attribute`]s with ATT-style handlers and
//!   notify sessions (state-change and timer triggers).
//!
//! - **[`AdapterController`]**: Owns the active configuration and
//!   attribute generation, drives a [`PeripheralRadio`] (advertising,
//!   attribute application), and serves the control-plane operations.

pub mod action;
pub mod codec;
pub mod config;
pub mod controller;
pub mod drift;
pub mod error;
pub mod gatt;
pub mod model;
pub mod radio;
pub mod store;
pub mod value;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{Action, ActionContext, ActionPipeline, ActionRegistry};
pub use codec::{Codec, CodecRegistry};
pub use config::{ConfigLoader, ConfigOrigin, ControllerConfig, DEFAULT_STOP_TIMEOUT};
pub use controller::{AdapterController, ConfigView, ControllerBuilder, ControllerRecord, Health};
pub use drift::DriftConfig;
pub use error::{ActionError, CodecError, ConfigError, CoreError, RadioError};
pub use gatt::{AttError, Attribute, AttributeEngine, AttributeSet, NotifySink};
pub use radio::{PeripheralRadio, PowerState, RadioEvent, SimulatedRadio};
pub use store::{StateChange, StateStore, Subscription};

pub use model::{
    ActionStep, CharacteristicConfig, CodecConfig, DescriptorConfig, DeviceConfig, DeviceInfo,
    NotifyConfig, NotifyTrigger, Property, ServiceConfig, ValueSource,
};
