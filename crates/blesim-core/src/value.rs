// ── Untyped value helpers ──
//
// State, literals and decoded payloads are all `serde_json::Value`.
// These helpers give them consistent numeric and textual views.

use serde_json::{Number, Value};

/// Largest integer an `f64` represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Convert an `f64` into a JSON value, preferring the integer form when the
/// number is integral so `40.0` and `40` compare equal after a round trip.
///
/// Non-finite numbers have no JSON representation and become `null`.
pub fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        return Value::from(n as i64);
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// Numeric view of a value; only JSON numbers qualify.
pub fn as_finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

/// Structural equality where numbers compare by value, so `20` and `20.0`
/// are the same.
#[allow(clippy::float_cmp)]
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| same_value(x, y)))
        }
        _ => a == b,
    }
}

/// Textual view of a value as used by templates, the text codec and the
/// parse action. `null` renders as the empty string, strings render
/// verbatim, and structured values render as compact JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
