use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use strum::Display;

use super::{Action, ActionContext};
use crate::error::ActionError;
use crate::value::{number_value, to_text};

#[allow(clippy::expect_used)]
static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("float pattern is valid")
});

#[allow(clippy::expect_used)]
static INT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+").expect("int pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParseType {
    Float,
    Int,
}

/// Which context slot feeds the parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseSource {
    #[default]
    Value,
    Parsed,
}

/// Where the parsed number goes besides `ctx.parsed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTarget {
    /// Only `ctx.parsed` is updated.
    None,
    State { key: String },
    Context,
}

/// Independent optional bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Clamp {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Clamp {
    pub fn apply(&self, mut n: f64) -> f64 {
        if let Some(min) = self.min {
            n = n.max(min);
        }
        if let Some(max) = self.max {
            n = n.min(max);
        }
        n
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum TargetKind {
    State,
    Context,
}

#[derive(Deserialize)]
struct Params {
    #[serde(rename = "type", default)]
    kind: Option<Value>,
    #[serde(default)]
    clamp: Option<Clamp>,
    #[serde(default)]
    from: Option<ParseSource>,
    #[serde(default)]
    target: Option<TargetKind>,
    #[serde(default)]
    key: Option<String>,
}

/// Convert the current value to a number, clamp it, then route it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseAction {
    pub kind: ParseType,
    pub clamp: Clamp,
    pub source: ParseSource,
    pub target: ParseTarget,
}

impl ParseAction {
    pub(crate) fn build(params: &Map<String, Value>) -> Result<Box<dyn Action>, ActionError> {
        let params: Params = serde_json::from_value(Value::Object(params.clone()))
            .map_err(|e| ActionError::Config(format!("parse: {e}")))?;

        let kind = match params.kind.as_ref().and_then(Value::as_str) {
            Some("float") => ParseType::Float,
            Some("int") => ParseType::Int,
            _ => {
                let shown = params
                    .kind
                    .as_ref()
                    .map_or_else(|| "(none)".to_owned(), to_text);
                return Err(ActionError::UnsupportedOperation(format!(
                    "parse type: {shown}"
                )));
            }
        };

        let target = match params.target {
            None => ParseTarget::None,
            Some(TargetKind::Context) => ParseTarget::Context,
            Some(TargetKind::State) => match params.key {
                Some(key) if !key.is_empty() => ParseTarget::State { key },
                _ => {
                    return Err(ActionError::Config(
                        "parse action requires \"key\" when target is \"state\"".into(),
                    ));
                }
            },
        };

        Ok(Box::new(Self {
            kind,
            clamp: params.clamp.unwrap_or_default(),
            source: params.from.unwrap_or_default(),
            target,
        }))
    }

    /// Parse `input` as this action's numeric type and clamp it.
    pub fn convert(&self, input: &str) -> Result<f64, ActionError> {
        let trimmed = input.trim_start();
        let pattern = match self.kind {
            ParseType::Float => &*FLOAT_PREFIX,
            ParseType::Int => &*INT_PREFIX,
        };
        let n = pattern
            .find(trimmed)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .ok_or_else(|| ActionError::Parse {
                kind: self.kind.to_string(),
                input: input.to_owned(),
            })?;
        Ok(self.clamp.apply(n))
    }
}

impl Action for ParseAction {
    fn run(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        let source = match self.source {
            ParseSource::Value => to_text(&ctx.value),
            ParseSource::Parsed => ctx.parsed.as_ref().map(to_text).unwrap_or_default(),
        };
        let parsed = number_value(self.convert(&source)?);
        ctx.parsed = Some(parsed.clone());

        match &self.target {
            ParseTarget::None => {}
            ParseTarget::State { key } => {
                ctx.state.set(key.clone(), parsed);
            }
            ParseTarget::Context => ctx.value = parsed,
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(raw: Value) -> Result<Box<dyn Action>, ActionError> {
        ParseAction::build(raw.as_object().unwrap())
    }

    fn float() -> ParseAction {
        ParseAction {
            kind: ParseType::Float,
            clamp: Clamp::default(),
            source: ParseSource::Value,
            target: ParseTarget::None,
        }
    }

    #[test]
    fn float_accepts_leading_numeric_prefix() {
        let p = float();
        assert_eq!(p.convert("12.5").unwrap(), 12.5);
        assert_eq!(p.convert("  -3e2xyz").unwrap(), -300.0);
        assert_eq!(p.convert(".5").unwrap(), 0.5);
        assert_eq!(p.convert("7.").unwrap(), 7.0);
    }

    #[test]
    fn float_rejects_non_numbers() {
        let p = float();
        for input in ["", "abc", "Infinity", "-", "."] {
            let err = p.convert(input).unwrap_err();
            assert!(err.to_string().starts_with("parse(float) failed"), "{input}: {err}");
        }
    }

    #[test]
    fn int_truncates_at_first_non_digit() {
        let p = ParseAction {
            kind: ParseType::Int,
            ..float()
        };
        assert_eq!(p.convert("42.9").unwrap(), 42.0);
        assert_eq!(p.convert("0x1A").unwrap(), 0.0);
        assert!(p.convert("x1").is_err());
    }

    #[test]
    fn clamp_bounds_are_independent() {
        assert_eq!(Clamp { min: Some(0.0), max: None }.apply(-5.0), 0.0);
        assert_eq!(Clamp { min: None, max: Some(1.0) }.apply(5.0), 1.0);
        assert_eq!(Clamp::default().apply(5.0), 5.0);
    }

    #[test]
    fn state_target_requires_key() {
        let err = action(json!({ "type": "float", "target": "state" })).unwrap_err();
        assert!(matches!(err, ActionError::Config(_)));
    }

    #[test]
    fn unsupported_type_is_reported() {
        let err = action(json!({ "type": "hex" })).unwrap_err();
        assert_eq!(err, ActionError::UnsupportedOperation("parse type: hex".into()));
    }

    #[test]
    fn unknown_target_rejected() {
        assert!(action(json!({ "type": "int", "target": "disk" })).is_err());
    }

    #[test]
    fn without_target_only_parsed_is_set() {
        let state = crate::store::StateStore::new();
        let mut ctx = ActionContext::new(state.clone(), json!(" 8 "));
        action(json!({ "type": "int" })).unwrap().run(&mut ctx).unwrap();
        assert_eq!(ctx.parsed, Some(json!(8)));
        assert_eq!(ctx.value, json!(" 8 "));
        assert!(state.is_empty());
    }
}
