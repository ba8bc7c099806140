//! Record types persisted for each key.
//!
//! Every write wraps the caller's value in an [`Envelope`] carrying an
//! optional absolute expiration timestamp, serialized to JSON. Reads decode
//! raw bytes through [`StoredRecord`], which also accepts pre-envelope
//! legacy data so stores written before this layer keep working.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// JSON field name carrying the expiration timestamp inside a stored record.
///
/// Reserved at the top level of every record this layer writes. Caller
/// values live under the `value` field, so a caller type with its own
/// `expires_at` field round-trips untouched.
pub const EXPIRES_AT_KEY: &str = "expires_at";

/// Record persisted for each key: the caller's value plus optional
/// expiration metadata.
///
/// The timestamp is absolute Unix epoch time in **milliseconds**. `None`
/// means the entry never expires, and the field is omitted from the
/// serialized JSON entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The caller's value, opaque to this layer.
    pub value: T,
    /// Absolute expiration time (Unix epoch milliseconds). None = never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl<T> Envelope<T> {
    /// Creates an envelope without expiration.
    pub const fn new(value: T) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates an envelope expiring `ttl` after `now_ms`.
    ///
    /// Taking the current time as an argument keeps batch writes on a
    /// single clock reading and lets `update` stamp the deadline at
    /// commit time.
    pub fn with_ttl(value: T, ttl: Duration, now_ms: u64) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Self {
            value,
            expires_at: Some(now_ms.saturating_add(ttl_ms)),
        }
    }

    /// Returns true if this envelope expired strictly before `now_ms`.
    ///
    /// A deadline equal to `now_ms` is still fresh.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|at| at < now_ms)
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serializes the envelope to its stored JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized to JSON.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to serialize envelope to JSON")
    }
}

/// Decoded form of raw bytes fetched from a backend.
///
/// Envelope-shaped JSON decodes as [`StoredRecord::Envelope`]; anything
/// that instead deserializes directly as `T` is pre-envelope legacy data
/// and decodes as [`StoredRecord::Legacy`]. Bytes matching neither shape
/// decode to `None` and are treated as absent, never as an error.
// Variant order matters: untagged decoding tries Envelope first, so a
// TTL-less envelope never falls through to Legacy for map-typed values.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StoredRecord<T> {
    /// A record written by this layer.
    Envelope(Envelope<T>),
    /// Pre-envelope data that deserializes directly as the caller's type.
    Legacy(T),
}

impl<T: DeserializeOwned> StoredRecord<T> {
    /// Decodes raw stored bytes, tolerating any shape.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }
}

/// Current wall-clock time as Unix epoch milliseconds.
///
/// # Errors
///
/// Returns an error if the system clock reads before the UNIX epoch.
pub(crate) fn now_millis() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System time before UNIX epoch")?;
    Ok(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = Envelope::with_ttl("hello".to_string(), Duration::from_secs(60), 1_000);
        let raw = envelope.encode().unwrap();

        let decoded: Envelope<String> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.expires_at, Some(61_000));
    }

    #[test]
    fn test_serialized_field_name_matches_constant() {
        let envelope = Envelope::with_ttl(1_i64, Duration::from_secs(1), 0);
        let json: serde_json::Value = serde_json::from_slice(&envelope.encode().unwrap()).unwrap();
        assert!(json.get(EXPIRES_AT_KEY).is_some());
    }

    #[test]
    fn test_no_ttl_omits_expiration_field() {
        let envelope = Envelope::new(1_i64);
        let json: serde_json::Value = serde_json::from_slice(&envelope.encode().unwrap()).unwrap();
        assert!(json.get(EXPIRES_AT_KEY).is_none());
        assert_eq!(json.get("value"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn test_expiry_is_strict() {
        let envelope = Envelope {
            value: 1_i64,
            expires_at: Some(500),
        };
        assert!(!envelope.is_expired(499));
        assert!(!envelope.is_expired(500));
        assert!(envelope.is_expired(501));
    }

    #[test]
    fn test_without_deadline_never_expires() {
        let envelope = Envelope::new(1_i64);
        assert!(!envelope.is_expired(u64::MAX));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let envelope = Envelope::with_ttl(1_i64, Duration::MAX, u64::MAX - 1);
        assert_eq!(envelope.expires_at, Some(u64::MAX));
        assert!(!envelope.is_expired(u64::MAX));
    }

    #[test]
    fn test_decode_envelope_shape() {
        let record = StoredRecord::<i64>::decode(br#"{"value":5,"expires_at":1000}"#);
        match record {
            Some(StoredRecord::Envelope(envelope)) => {
                assert_eq!(envelope.value, 5);
                assert_eq!(envelope.expires_at, Some(1_000));
            },
            other => panic!("expected envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_envelope_without_deadline() {
        let record = StoredRecord::<i64>::decode(br#"{"value":5}"#);
        assert!(matches!(
            record,
            Some(StoredRecord::Envelope(Envelope {
                value: 5,
                expires_at: None,
            }))
        ));
    }

    #[test]
    fn test_decode_legacy_bare_value() {
        let record = StoredRecord::<i64>::decode(b"5");
        assert!(matches!(record, Some(StoredRecord::Legacy(5))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(StoredRecord::<i64>::decode(b"not json").is_none());
        assert!(StoredRecord::<i64>::decode(br#"{"value":"text"}"#).is_none());
    }

    #[test]
    fn test_envelope_wins_for_map_values() {
        // A map-typed caller could also absorb the envelope shape whole;
        // the Envelope variant must claim it first.
        let raw = br#"{"value":{"a":1}}"#;
        let record = StoredRecord::<std::collections::HashMap<String, i64>>::decode(raw);
        match record {
            Some(StoredRecord::Envelope(envelope)) => {
                assert_eq!(envelope.value.get("a"), Some(&1));
            },
            other => panic!("expected envelope, got {other:?}"),
        }
    }
}
