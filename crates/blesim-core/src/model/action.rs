use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One declarative step of an `onWrite` pipeline.
///
/// Kept untyped here: the `action` name selects a builder in the
/// [`ActionRegistry`](crate::action::ActionRegistry), which validates the
/// remaining parameters when the pipeline is compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub action: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}
