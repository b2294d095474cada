use bytes::Bytes;
use serde_json::Value;

use super::Codec;
use crate::error::CodecError;
use crate::model::CodecConfig;
use crate::value::{as_finite_number, number_value};

/// IEEE-754 single precision, little endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct Float32;

impl Codec for Float32 {
    fn encode(&self, value: &Value, _config: &CodecConfig) -> Result<Bytes, CodecError> {
        let n = as_finite_number(value).ok_or_else(|| {
            CodecError::InvalidInput(format!("expected a finite number, got {value}"))
        })?;
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        let single = n as f32;
        if !single.is_finite() {
            return Err(CodecError::InvalidInput(format!(
                "{n} is out of range for float32"
            )));
        }
        Ok(Bytes::copy_from_slice(&single.to_le_bytes()))
    }

    fn decode(&self, bytes: &[u8], _config: &CodecConfig) -> Result<Value, CodecError> {
        let word: [u8; 4] = bytes
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| CodecError::InvalidInput(format!("need 4 bytes, got {}", bytes.len())))?;
        Ok(number_value(f64::from(f32::from_le_bytes(word))))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg() -> CodecConfig {
        CodecConfig::new("float32")
    }

    #[test]
    fn round_trips_within_single_precision() {
        for v in [0.0_f64, 1.5, -273.15, 2.75, 1.0e-3] {
            let bytes = Float32.encode(&json!(v), &cfg()).unwrap();
            assert_eq!(bytes.len(), 4);
            let back = Float32.decode(&bytes, &cfg()).unwrap().as_f64().unwrap();
            #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
            let expected = f64::from(v as f32);
            assert!((back - expected).abs() < f64::EPSILON, "{v} -> {back}");
        }
    }

    #[test]
    fn rejects_non_numbers() {
        let err = Float32.encode(&json!("1.0"), &cfg()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput(_)));
    }

    #[test]
    fn rejects_values_beyond_single_precision_range() {
        for v in [1.0e39_f64, -1.0e39] {
            let err = Float32.encode(&json!(v), &cfg()).unwrap_err();
            assert!(matches!(err, CodecError::InvalidInput(_)), "{v}");
        }
        assert!(Float32.encode(&json!(f64::from(f32::MAX)), &cfg()).is_ok());
    }

    #[test]
    fn short_buffer_rejected() {
        assert!(Float32.decode(&[0, 0, 0], &cfg()).is_err());
    }
}
