// ── Descriptor payloads ──
//
// The Characteristic Presentation Format descriptor (0x2904) carries a
// structured record packed into 7 bytes:
//
//   [0]    format        u8
//   [1]    exponent      i8
//   [2..4] unit          u16 LE
//   [4]    namespace     u8
//   [5..7] description   u16 LE
//
// Every other descriptor value is turned into raw bytes.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

use crate::error::{CodecError, ConfigError, CoreError};
use crate::model::DescriptorConfig;
use crate::value::to_text;

const PRESENTATION_FORMAT_SHORT: &str = "2904";
const PRESENTATION_FORMAT_FULL: &str = "00002904-0000-1000-8000-00805f9b34fb";

/// GATT format type names and their codes.
const FORMATS: &[(&str, u8)] = &[
    ("boolean", 0x01),
    ("uint8", 0x04),
    ("uint16", 0x06),
    ("uint24", 0x07),
    ("uint32", 0x08),
    ("uint48", 0x09),
    ("uint64", 0x0a),
    ("uint128", 0x0b),
    ("sint8", 0x0c),
    ("sint16", 0x0e),
    ("sint24", 0x0f),
    ("sint32", 0x10),
    ("float32", 0x14),
    ("float64", 0x15),
    ("utf8", 0x19),
];

/// GATT unit names and their assigned numbers.
const UNITS: &[(&str, u16)] = &[
    ("unitless", 0x2700),
    ("meter", 0x2701),
    ("kilogram", 0x2702),
    ("second", 0x2703),
    ("ampere", 0x2704),
    ("kelvin", 0x2705),
    ("hertz", 0x2722),
    ("pascal", 0x2724),
    ("watt", 0x2726),
    ("volt", 0x2728),
    ("fahrenheit", 0x27ac),
    ("percent", 0x27ad),
    ("celsius", 0x272f),
    ("lux", 0x2731),
];

/// A compiled descriptor with its final payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub uuid: String,
    pub value: Bytes,
}

pub(crate) fn is_presentation_format(uuid: &str) -> bool {
    uuid == PRESENTATION_FORMAT_SHORT || uuid == PRESENTATION_FORMAT_FULL
}

pub(crate) fn build(config: &DescriptorConfig, uuid: String) -> Result<Descriptor, CoreError> {
    let value = match &config.value {
        Value::Object(record) if is_presentation_format(&uuid) => presentation_format(record)?,
        other => raw_bytes(other),
    };
    Ok(Descriptor { uuid, value })
}

fn presentation_format(record: &Map<String, Value>) -> Result<Bytes, CoreError> {
    let format = match record.get("format") {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Some(Value::String(name)) => lookup(FORMATS, name),
        _ => None,
    }
    .ok_or_else(|| {
        CodecError::UnsupportedFormat(format!(
            "presentation format {}",
            record.get("format").map_or_else(String::new, to_text)
        ))
    })?;

    let unit = match record.get("unit") {
        Some(Value::String(name)) => lookup(UNITS, name).unwrap_or(0),
        Some(value) => int_field::<u16>(value, "unit")?,
        None => 0,
    };
    let exponent = optional_int::<i8>(record, "exponent")?.unwrap_or(0);
    let namespace = optional_int::<u8>(record, "namespace")?
        .filter(|n| *n != 0)
        .unwrap_or(1);
    let description = optional_int::<u16>(record, "description")?.unwrap_or(0);

    let mut buf = BytesMut::with_capacity(7);
    buf.put_u8(format);
    buf.put_i8(exponent);
    buf.put_u16_le(unit);
    buf.put_u8(namespace);
    buf.put_u16_le(description);
    Ok(buf.freeze())
}

fn lookup<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    table
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

fn optional_int<T: TryFrom<i64>>(
    record: &Map<String, Value>,
    field: &str,
) -> Result<Option<T>, ConfigError> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => int_field(value, field).map(Some),
    }
}

fn int_field<T: TryFrom<i64>>(value: &Value, field: &str) -> Result<T, ConfigError> {
    value
        .as_i64()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| {
            ConfigError::invalid(
                format!("descriptor.{field}"),
                format!("{value} is not in range"),
            )
        })
}

/// Raw payload for non-structured descriptor values: byte arrays pass
/// through, numbers become a u32 LE word (wrapping), `null` is empty and
/// anything else is its text form.
pub(crate) fn raw_bytes(value: &Value) -> Bytes {
    match value {
        Value::Null => Bytes::new(),
        Value::Array(items) => match byte_array(items) {
            Some(bytes) => Bytes::from(bytes),
            None => Bytes::from(value.to_string()),
        },
        Value::Number(n) => {
            let word = n.as_f64().map_or(0, wrap_u32);
            Bytes::copy_from_slice(&word.to_le_bytes())
        }
        other => Bytes::from(to_text(other)),
    }
}

fn byte_array(items: &[Value]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn wrap_u32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}
