use bytes::Bytes;
use serde_json::Value;

use super::Codec;
use crate::error::CodecError;
use crate::model::CodecConfig;
use crate::value::{as_finite_number, number_value};

/// Signed 16-bit little-endian fixed point: `wire = round(value / scale)`.
///
/// Out-of-range values saturate at the `i16` bounds. Rounding is half-up,
/// so `-2.5` becomes `-2` and `2.5` becomes `3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPointInt16;

impl FixedPointInt16 {
    fn scale(config: &CodecConfig) -> Result<f64, CodecError> {
        let scale = config.scale.unwrap_or(1.0);
        if scale == 0.0 || !scale.is_finite() {
            return Err(CodecError::InvalidConfig(format!(
                "fixed-point scale must be a finite non-zero number, got {scale}"
            )));
        }
        Ok(scale)
    }
}

impl Codec for FixedPointInt16 {
    fn encode(&self, value: &Value, config: &CodecConfig) -> Result<Bytes, CodecError> {
        let scale = Self::scale(config)?;
        let n = as_finite_number(value).ok_or_else(|| {
            CodecError::InvalidInput(format!("expected a finite number, got {value}"))
        })?;

        let raw = (n / scale + 0.5)
            .floor()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX));
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        let raw = raw as i16;
        Ok(Bytes::copy_from_slice(&raw.to_le_bytes()))
    }

    fn decode(&self, bytes: &[u8], config: &CodecConfig) -> Result<Value, CodecError> {
        let scale = Self::scale(config)?;
        let [lo, hi] = bytes.get(..2).and_then(|b| <[u8; 2]>::try_from(b).ok()).ok_or_else(
            || CodecError::InvalidInput(format!("need 2 bytes, got {}", bytes.len())),
        )?;
        let raw = i16::from_le_bytes([lo, hi]);
        Ok(number_value(f64::from(raw) * scale))
    }

    fn validate(&self, config: &CodecConfig) -> Result<(), CodecError> {
        Self::scale(config).map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(scale: f64) -> CodecConfig {
        CodecConfig::new("fixedPointInt16").with_scale(scale)
    }

    fn raw(bytes: &Bytes) -> i16 {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }

    #[test]
    fn encodes_scaled_value_little_endian() {
        let bytes = FixedPointInt16.encode(&json!(12.34), &cfg(0.01)).unwrap();
        assert_eq!(raw(&bytes), 1234);
        assert_eq!(bytes.as_ref(), &1234_i16.to_le_bytes());
    }

    #[test]
    fn default_scale_is_one() {
        let bytes = FixedPointInt16
            .encode(&json!(-7), &CodecConfig::new("fixedPointInt16"))
            .unwrap();
        assert_eq!(raw(&bytes), -7);
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(
            raw(&FixedPointInt16.encode(&json!(1000), &cfg(0.01)).unwrap()),
            i16::MAX
        );
        assert_eq!(
            raw(&FixedPointInt16.encode(&json!(-1000), &cfg(0.01)).unwrap()),
            i16::MIN
        );
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(raw(&FixedPointInt16.encode(&json!(2.5), &cfg(1.0)).unwrap()), 3);
        assert_eq!(raw(&FixedPointInt16.encode(&json!(-2.5), &cfg(1.0)).unwrap()), -2);
    }

    #[test]
    fn round_trip_matches_quantized_value() {
        let config = cfg(0.5);
        for v in [0.0, 1.2, -3.7, 100.26, -16383.5] {
            let bytes = FixedPointInt16.encode(&json!(v), &config).unwrap();
            let back = FixedPointInt16.decode(&bytes, &config).unwrap();
            let expected = (v / 0.5 + 0.5_f64).floor() * 0.5;
            assert_eq!(back.as_f64().unwrap(), expected, "value {v}");
        }
    }

    #[test]
    fn non_numeric_input_rejected() {
        for input in [json!("12"), Value::Null, json!(true)] {
            let err = FixedPointInt16.encode(&input, &cfg(1.0)).unwrap_err();
            assert!(matches!(err, CodecError::InvalidInput(_)), "{input}");
        }
    }

    #[test]
    fn zero_scale_rejected() {
        let err = FixedPointInt16.encode(&json!(1), &cfg(0.0)).unwrap_err();
        assert!(matches!(err, CodecError::InvalidConfig(_)));
        assert!(FixedPointInt16.validate(&cfg(0.0)).is_err());
    }

    #[test]
    fn short_buffer_rejected() {
        let err = FixedPointInt16.decode(&[0x01], &cfg(1.0)).unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput(_)));
    }
}
