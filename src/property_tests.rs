//! Property-based tests for the TTL store.
//!
//! These tests verify the envelope-layer invariants over arbitrary keys
//! and values:
//! - Set then get returns the same value
//! - Entries with a future deadline are fresh, past deadlines read absent
//! - Batch reads stay positionally aligned with their keys
//! - Update always restamps the expiration from the current call
//!
//! The store runs against the in-memory backend; the properties under
//! test are backend-independent.

use proptest::prelude::*;

use super::backend::StoreBackend;
use super::envelope::{EXPIRES_AT_KEY, Envelope};
use super::memory::MemoryBackend;
use super::store::TtlStore;
use std::future::Future;
use std::time::Duration;

/// Drives an async store call from inside a proptest case.
fn run<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build test runtime")
        .block_on(future)
}

// ============================================================================
// Test Strategies - Input Generation
// ============================================================================

/// Strategy for generating valid store keys.
fn valid_key() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_:-]{0,100}".prop_filter("must not be empty", |s| !s.is_empty())
}

/// Strategy for generating string values.
fn string_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,500}"
}

/// Strategy for generating TTL durations long enough to stay fresh
/// for the lifetime of a test case.
fn long_ttl() -> impl Strategy<Value = Duration> {
    (60u64..=86_400u64).prop_map(Duration::from_secs)
}

/// Strategy for generating expiration timestamps that are firmly in the
/// past (epoch milliseconds well before any plausible test clock).
fn stale_deadline() -> impl Strategy<Value = u64> {
    1u64..1_000_000_000u64
}

// ============================================================================
// Envelope Layer Invariants
// ============================================================================

proptest! {
    /// Invariant: Set then get returns the same value.
    #[test]
    fn set_get_roundtrip(key in valid_key(), value in string_value()) {
        let store = TtlStore::memory();

        run(store.set(&key, &value, None)).unwrap();
        let retrieved = run(store.get::<String>(&key)).unwrap();

        prop_assert_eq!(retrieved, Some(value), "Retrieved value should match set value");
    }

    /// Invariant: An entry whose deadline lies in the future reads back.
    #[test]
    fn entry_with_future_deadline_is_fresh(
        key in valid_key(),
        value in string_value(),
        ttl in long_ttl()
    ) {
        let store = TtlStore::memory();

        run(store.set(&key, &value, Some(ttl))).unwrap();
        let retrieved = run(store.get::<String>(&key)).unwrap();

        prop_assert_eq!(retrieved, Some(value), "Entry should be fresh before its deadline");
    }

    /// Invariant: An entry whose deadline lies in the past reads absent
    /// and is physically removed.
    #[test]
    fn entry_with_past_deadline_reads_absent(
        key in valid_key(),
        value in string_value(),
        deadline in stale_deadline()
    ) {
        let backend = MemoryBackend::new();
        let store = TtlStore::custom(backend.clone());

        let record = Envelope {
            value,
            expires_at: Some(deadline),
        };
        run(backend.set(&key, record.encode().unwrap())).unwrap();

        let retrieved = run(store.get::<String>(&key)).unwrap();
        prop_assert!(retrieved.is_none(), "Expired entry should read absent");

        let raw = run(backend.get(&key)).unwrap();
        prop_assert!(raw.is_none(), "Expired entry should be removed on read");
    }

    /// Invariant: Overwriting a key replaces the value.
    #[test]
    fn set_overwrites_previous(
        key in valid_key(),
        value1 in string_value(),
        value2 in string_value()
    ) {
        let store = TtlStore::memory();

        run(store.set(&key, &value1, None)).unwrap();
        run(store.set(&key, &value2, None)).unwrap();

        let retrieved = run(store.get::<String>(&key)).unwrap();
        prop_assert_eq!(retrieved, Some(value2), "Should get the overwritten value");
    }

    /// Invariant: Delete removes the key completely.
    #[test]
    fn delete_removes_key(key in valid_key(), value in string_value()) {
        let store = TtlStore::memory();

        run(store.set(&key, &value, None)).unwrap();
        let deleted = run(store.delete(&key)).unwrap();
        prop_assert!(deleted, "Delete should return true for existing key");

        let retrieved = run(store.get::<String>(&key)).unwrap();
        prop_assert!(retrieved.is_none(), "Get should return None after delete");
    }

    /// Invariant: Legacy bare values surface unwrapped.
    #[test]
    fn legacy_record_surfaces(key in valid_key(), value in any::<i64>()) {
        let backend = MemoryBackend::new();
        let store = TtlStore::custom(backend.clone());

        run(backend.set(&key, serde_json::to_vec(&value).unwrap())).unwrap();

        let retrieved = run(store.get::<i64>(&key)).unwrap();
        prop_assert_eq!(retrieved, Some(value), "Legacy value should surface as-is");
    }
}

// ============================================================================
// Batch Read Alignment
// ============================================================================

proptest! {
    /// Invariant: `get_many` results line up positionally with the
    /// queried keys, present or not.
    #[test]
    fn get_many_stays_aligned(
        present in prop::collection::hash_set(valid_key(), 1..8),
        extras in prop::collection::vec(valid_key(), 0..8)
    ) {
        let store = TtlStore::memory();

        let present: Vec<String> = present.into_iter().collect();
        let extras: Vec<String> = extras
            .into_iter()
            .filter(|key| !present.contains(key))
            .collect();

        // Each key stores its own length, so every position is checkable
        for key in &present {
            run(store.set(key, &(key.len() as i64), None)).unwrap();
        }

        let query: Vec<&str> = present
            .iter()
            .map(String::as_str)
            .chain(extras.iter().map(String::as_str))
            .collect();
        let values = run(store.get_many::<i64>(&query)).unwrap();

        prop_assert_eq!(values.len(), query.len(), "Result length should match query length");
        for (i, key) in present.iter().enumerate() {
            prop_assert_eq!(values[i], Some(key.len() as i64), "Present key out of position");
        }
        for i in present.len()..query.len() {
            prop_assert_eq!(values[i], None, "Missing key should read None");
        }
    }
}

// ============================================================================
// Update Expiration Policy
// ============================================================================

proptest! {
    /// Invariant: Update without a TTL clears any prior deadline.
    #[test]
    fn update_without_ttl_clears_deadline(
        key in valid_key(),
        value in any::<i64>(),
        ttl in long_ttl()
    ) {
        let backend = MemoryBackend::new();
        let store = TtlStore::custom(backend.clone());

        run(store.set(&key, &value, Some(ttl))).unwrap();
        run(store.update(&key, |current: Option<i64>| current.unwrap_or(0), None)).unwrap();

        let raw = run(backend.get(&key)).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        prop_assert!(
            json.get(EXPIRES_AT_KEY).is_none(),
            "TTL-less update should clear the stored deadline"
        );
    }

    /// Invariant: Update with a TTL stamps a fresh deadline.
    #[test]
    fn update_with_ttl_stamps_deadline(
        key in valid_key(),
        value in any::<i64>(),
        ttl in long_ttl()
    ) {
        let backend = MemoryBackend::new();
        let store = TtlStore::custom(backend.clone());

        run(store.set(&key, &value, None)).unwrap();
        run(store.update(&key, |current: Option<i64>| current.unwrap_or(0), Some(ttl))).unwrap();

        let raw = run(backend.get(&key)).unwrap().unwrap();
        let record: Envelope<i64> = serde_json::from_slice(&raw).unwrap();
        prop_assert!(
            record.expires_at.is_some(),
            "Update with TTL should stamp a deadline"
        );
    }
}
