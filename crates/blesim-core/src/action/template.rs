use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::ActionContext;
use crate::value::to_text;

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Substitute `{{name}}` placeholders.
///
/// `state` expands to the JSON snapshot of the store. Other names resolve
/// against the context fields first, then `extra`. Unknown names expand to
/// the empty string.
pub fn render(template: &str, ctx: &ActionContext, extra: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            if name == "state" {
                return Value::Object(ctx.state.snapshot()).to_string();
            }
            ctx.field(name)
                .or_else(|| extra.get(name).cloned())
                .map(|value| to_text(&value))
                .unwrap_or_default()
        })
        .into_owned()
}
