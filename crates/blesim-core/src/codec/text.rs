use bytes::Bytes;
use serde_json::Value;

use super::Codec;
use crate::error::CodecError;
use crate::model::CodecConfig;
use crate::value::to_text;

/// UTF-8 text. Non-string values are stringified; `null` encodes to an
/// empty payload. Invalid sequences decode with replacement characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl Codec for Utf8 {
    fn encode(&self, value: &Value, _config: &CodecConfig) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(to_text(value)))
    }

    fn decode(&self, bytes: &[u8], _config: &CodecConfig) -> Result<Value, CodecError> {
        Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
    }
}
