// ── Write-action interpreter ──
//
// `onWrite` pipelines are lists of named steps. Each name maps to a
// builder in the `ActionRegistry`; builders validate their parameters and
// produce an `Action` that runs against a per-write `ActionContext`.
// Pipelines are compiled once per characteristic and run in order,
// stopping at the first failing step.

mod log;
mod parse;
mod template;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ActionError;
use crate::model::ActionStep;
use crate::store::StateStore;

pub use log::LogAction;
pub use parse::{Clamp, ParseAction, ParseSource, ParseTarget, ParseType};
pub use template::render;

/// Per-invocation state threaded through every step of a pipeline.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub device_name: String,
    pub service_uuid: String,
    pub uuid: String,
    pub characteristic_name: Option<String>,
    /// Current raw value; a `parse` step targeting the context overwrites it.
    pub value: Value,
    /// Result of the most recent `parse` step.
    pub parsed: Option<Value>,
    pub state: StateStore,
}

impl ActionContext {
    pub fn new(state: StateStore, value: Value) -> Self {
        Self {
            device_name: String::new(),
            service_uuid: String::new(),
            uuid: String::new(),
            characteristic_name: None,
            value,
            parsed: None,
            state,
        }
    }

    /// Look up a context field by its template name. Known fields always
    /// resolve (unset ones as `null`); anything else is `None`.
    pub fn field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "deviceName" => Value::String(self.device_name.clone()),
            "serviceUuid" => Value::String(self.service_uuid.clone()),
            "uuid" => Value::String(self.uuid.clone()),
            "characteristicName" => self
                .characteristic_name
                .clone()
                .map_or(Value::Null, Value::String),
            "value" => self.value.clone(),
            "parsed" => self.parsed.clone().unwrap_or(Value::Null),
            _ => return None,
        };
        Some(value)
    }
}

/// A compiled pipeline step.
pub trait Action: Send + Sync + Debug {
    fn run(&self, ctx: &mut ActionContext) -> Result<(), ActionError>;
}

/// Builds an [`Action`] from a step's parameters.
pub type ActionBuilder = fn(&Map<String, Value>) -> Result<Box<dyn Action>, ActionError>;

/// Ordered, pre-validated list of actions.
#[derive(Debug, Clone, Default)]
pub struct ActionPipeline {
    steps: Arc<[Box<dyn Action>]>,
}

impl ActionPipeline {
    /// Run every step in order, halting at the first failure.
    pub fn run(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        for step in self.steps.iter() {
            step.run(ctx)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ActionRegistry {
    builders: HashMap<String, ActionBuilder>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    /// Registry with the built-in `log` and `parse` steps.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("log", LogAction::build);
        registry.register("parse", ParseAction::build);
        registry
    }

    fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, builder: ActionBuilder) {
        self.builders.insert(name.into(), builder);
    }

    /// Validate and compile a list of steps.
    pub fn compile(&self, steps: &[ActionStep]) -> Result<ActionPipeline, ActionError> {
        let compiled = steps
            .iter()
            .map(|step| {
                let builder = self.builders.get(&step.action).ok_or_else(|| {
                    ActionError::UnsupportedOperation(format!("action type: {}", step.action))
                })?;
                builder(&step.params)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ActionPipeline {
            steps: compiled.into(),
        })
    }

    /// Compile and run in one go.
    pub fn run(&self, steps: &[ActionStep], ctx: &mut ActionContext) -> Result<(), ActionError> {
        self.compile(steps)?.run(ctx)
    }
}
