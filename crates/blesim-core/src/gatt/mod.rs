// ── GATT attribute layer ──
//
// Compiled, live attributes and the engine that builds them. The radio
// layer calls into `Attribute` handlers; handlers never panic or
// propagate errors past the ATT result code.

mod attribute;
mod descriptor;
mod engine;

use std::sync::Arc;

use thiserror::Error;

pub use attribute::{Attribute, NotifySink};
pub use descriptor::Descriptor;
pub use engine::AttributeEngine;

/// ATT error results reported back to the radio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttError {
    #[error("read not permitted")]
    ReadNotPermitted,
    #[error("write not permitted")]
    WriteNotPermitted,
    #[error("request not supported")]
    RequestNotSupported,
    #[error("attribute not found")]
    AttributeNotFound,
    #[error("attribute not long")]
    AttributeNotLong,
    #[error("unlikely error")]
    UnlikelyError,
}

impl AttError {
    /// Wire result code.
    pub fn code(self) -> u8 {
        match self {
            Self::ReadNotPermitted => 0x02,
            Self::WriteNotPermitted => 0x03,
            Self::RequestNotSupported => 0x06,
            Self::AttributeNotFound => 0x0a,
            Self::AttributeNotLong => 0x0b,
            Self::UnlikelyError => 0x0e,
        }
    }
}

/// Lower-case identifier; full 128-bit UUIDs are normalized to the
/// hyphenated form, short ones are kept as given.
pub fn canonical_uuid(raw: &str) -> String {
    let trimmed = raw.trim();
    match uuid::Uuid::try_parse(trimmed) {
        Ok(parsed) => parsed.hyphenated().to_string(),
        Err(_) => trimmed.to_ascii_lowercase(),
    }
}

/// A primary service and its compiled characteristics.
#[derive(Debug)]
pub struct Service {
    pub uuid: String,
    pub characteristics: Vec<Arc<Attribute>>,
}

/// One generation of compiled attributes.
#[derive(Debug, Default)]
pub struct AttributeSet {
    services: Vec<Service>,
}

impl AttributeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Total characteristic count.
    pub fn len(&self) -> usize {
        self.services.iter().map(|s| s.characteristics.len()).sum()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.services.iter().flat_map(|s| s.characteristics.iter())
    }

    /// Find a characteristic by service and characteristic identifier.
    /// Identifiers are matched in canonical form.
    pub fn find(&self, service_uuid: &str, uuid: &str) -> Option<Arc<Attribute>> {
        let service_uuid = canonical_uuid(service_uuid);
        let uuid = canonical_uuid(uuid);
        self.services
            .iter()
            .filter(|s| s.uuid == service_uuid)
            .flat_map(|s| s.characteristics.iter())
            .find(|a| a.uuid() == uuid)
            .cloned()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.attributes().filter(|a| a.is_subscribed()).count()
    }

    /// Tear down every notify session. Called when a newer generation
    /// replaces this one.
    pub fn shutdown(&self) {
        for attribute in self.attributes() {
            attribute.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_identifiers() {
        assert_eq!(canonical_uuid("ABCD"), "abcd");
        assert_eq!(
            canonical_uuid("0000180F00001000800000805F9B34FB"),
            "0000180f-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            canonical_uuid(" 12345678-1234-5678-1234-56789ABCDEF0 "),
            "12345678-1234-5678-1234-56789abcdef0"
        );
    }

    #[test]
    fn att_codes() {
        assert_eq!(AttError::AttributeNotLong.code(), 0x0b);
        assert_eq!(AttError::UnlikelyError.code(), 0x0e);
    }
}
