//! The audit event record.

use crate::error::{LogError, LogResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// One immutable audit event.
///
/// An event is identified by its `(target_id, store_id, event_id)` triple;
/// `event_id` is unique and strictly increasing within a `(target, store)`
/// pair and is assigned by the [`crate::LogStore`] on `put`. Everything else
/// is descriptive payload: a wall-clock timestamp, a small numeric type
/// code, and free-form string properties.
///
/// The CBOR encoding produced by [`LogEvent::encode`] is self-contained and
/// doubles as the wire representation handed to log-sync consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// The device/target this event belongs to.
    pub target_id: String,
    /// The log store within the target.
    pub store_id: u64,
    /// Position in the store; 0 until assigned by `put`.
    pub event_id: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Application-defined event type code.
    pub kind: u32,
    /// Free-form properties.
    pub properties: BTreeMap<String, String>,
}

impl LogEvent {
    /// Creates an unassigned event stamped with the current wall clock.
    #[must_use]
    pub fn new(
        target_id: impl Into<String>,
        store_id: u64,
        kind: u32,
        properties: BTreeMap<String, String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            store_id,
            event_id: 0,
            timestamp_ms: now_millis(),
            kind,
            properties,
        }
    }

    /// Serializes the event to CBOR.
    ///
    /// # Errors
    ///
    /// Returns a codec error if serialization fails.
    pub fn encode(&self) -> LogResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf).map_err(|e| LogError::codec(e.to_string()))?;
        Ok(buf)
    }

    /// Deserializes an event from CBOR.
    pub fn decode(bytes: &[u8]) -> LogResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| LogError::codec(e.to_string()))
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn encode_decode_round_trip() {
        let event = LogEvent {
            target_id: "gateway-7".into(),
            store_id: 1_700_000_000_000,
            event_id: 42,
            timestamp_ms: 1_700_000_123_456,
            kind: 3,
            properties: props(&[("bundle", "io.convoy.agent"), ("outcome", "installed")]),
        };
        let bytes = event.encode().unwrap();
        assert_eq!(LogEvent::decode(&bytes).unwrap(), event);
    }

    #[test]
    fn empty_properties_round_trip() {
        let event = LogEvent::new("t", 1, 0, BTreeMap::new());
        let decoded = LogEvent::decode(&event.encode().unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(matches!(
            LogEvent::decode(&[0xFF, 0x00, 0x13]),
            Err(LogError::Codec { .. })
        ));
    }

    #[test]
    fn new_event_is_unassigned() {
        let event = LogEvent::new("t", 9, 1, BTreeMap::new());
        assert_eq!(event.event_id, 0);
        assert!(event.timestamp_ms > 0);
    }
}
