// ── Codec registry ──
//
// Open registry of wire formats keyed by name. The attribute engine looks
// codecs up once at compile time and holds on to the resolved handle, so
// unknown formats are rejected before any attribute goes live.

mod fixed_point;
mod float;
mod text;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::error::CodecError;
use crate::model::CodecConfig;

pub use fixed_point::FixedPointInt16;
pub use float::Float32;
pub use text::Utf8;

/// Bidirectional converter between a JSON value and wire bytes.
pub trait Codec: Send + Sync + Debug {
    fn encode(&self, value: &Value, config: &CodecConfig) -> Result<Bytes, CodecError>;

    fn decode(&self, bytes: &[u8], config: &CodecConfig) -> Result<Value, CodecError>;

    /// Check format parameters ahead of time. Called once per
    /// characteristic when the attribute set is compiled.
    fn validate(&self, _config: &CodecConfig) -> Result<(), CodecError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// Registry with the built-in formats.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        let fixed: Arc<dyn Codec> = Arc::new(FixedPointInt16);
        let float: Arc<dyn Codec> = Arc::new(Float32);
        registry.register_shared("fixedPointInt16", Arc::clone(&fixed));
        registry.register_shared("sint16", fixed);
        registry.register_shared("float32", Arc::clone(&float));
        registry.register_shared("float", float);
        registry.register("utf8", Utf8);
        registry
    }

    fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Add or replace a format.
    pub fn register(&mut self, format: impl Into<String>, codec: impl Codec + 'static) {
        self.register_shared(format, Arc::new(codec));
    }

    pub fn register_shared(&mut self, format: impl Into<String>, codec: Arc<dyn Codec>) {
        self.codecs.insert(format.into(), codec);
    }

    pub fn get(&self, format: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(format).cloned()
    }

    /// Registered format names, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the codec for `config.format`.
    pub fn resolve(&self, config: &CodecConfig) -> Result<Arc<dyn Codec>, CodecError> {
        self.get(&config.format)
            .ok_or_else(|| CodecError::UnsupportedFormat(config.format.clone()))
    }

    pub fn encode(&self, value: &Value, config: &CodecConfig) -> Result<Bytes, CodecError> {
        self.resolve(config)?.encode(value, config)
    }

    pub fn decode(&self, bytes: &[u8], config: &CodecConfig) -> Result<Value, CodecError> {
        self.resolve(config)?.decode(bytes, config)
    }
}
