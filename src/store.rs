//! High-level `TtlStore` wrapper over backend implementations.
//!
//! The expiration layer itself: values are wrapped in envelopes on write,
//! expired entries read as absent and are lazily deleted from the backend,
//! and `update` delegates its read-modify-write atomicity to the backend.

use crate::backend::{StoreBackend, UpdateFn};
use crate::envelope::{Envelope, StoredRecord, now_millis};
use crate::memory::MemoryBackend;
use crate::redb::RedbBackend;
use anyhow::Result;
use futures::future::try_join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Expiration-aware key-value store.
///
/// Wraps a `StoreBackend` implementation and adds time-to-live semantics:
/// every value is stored inside an envelope carrying an optional absolute
/// expiration timestamp, expired entries behave as absent and are lazily
/// deleted on read, and `update` provides an atomic read-modify-write.
///
/// # Thread Safety
///
/// `TtlStore` is `Clone` and can be shared across threads; clones share
/// the same backend.
///
/// # Example
///
/// ```ignore
/// use ttl_kv::TtlStore;
/// use std::time::Duration;
///
/// let store = TtlStore::memory();
///
/// // Expires an hour from now
/// store.set("session:123", &"user data", Some(Duration::from_secs(3600))).await?;
///
/// if let Some(data) = store.get::<String>("session:123").await? {
///     println!("Found: {data}");
/// }
/// ```
#[derive(Clone)]
pub struct TtlStore {
    backend: Arc<dyn StoreBackend>,
}

impl TtlStore {
    /// Creates a new `TtlStore` backed by a file-based redb database.
    ///
    /// Use this where persistence is required.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = TtlStore::file("~/.app/store.redb")?;
    /// ```
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let backend = RedbBackend::open(path)?;
        Ok(Self {
            backend: Arc::new(backend),
        })
    }

    /// Creates a new `TtlStore` backed by an in-memory store.
    ///
    /// Ideal for testing, development, and embedded applications.
    /// All data is lost when the process exits.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = TtlStore::memory();
    /// ```
    pub fn memory() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new()),
        }
    }

    /// Creates a new `TtlStore` with a custom backend.
    ///
    /// Use this to integrate custom storage backends like Redis, SQL, etc.
    ///
    /// # Example
    ///
    /// ```ignore
    /// struct RedisBackend { /* ... */ }
    /// impl StoreBackend for RedisBackend { /* ... */ }
    ///
    /// let store = TtlStore::custom(RedisBackend::new());
    /// ```
    pub fn custom<B: StoreBackend>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Stores a value under a key with an optional TTL.
    ///
    /// With `Some(ttl)` the entry expires `ttl` from now; with `None` it
    /// never expires. Overwrites any existing entry, including its
    /// expiration. Resolves once the backend confirms the write.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized, the system
    /// clock reads before the UNIX epoch, or the backend write fails.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let envelope = match ttl {
            Some(ttl) => Envelope::with_ttl(value, ttl, now_millis()?),
            None => Envelope::new(value),
        };
        self.backend.set(key, envelope.encode()?).await
    }

    /// Retrieves the value for a key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist, its entry has
    /// expired, or the stored bytes don't decode as `T`. Reading an
    /// expired entry deletes it from the backend before resolving, and a
    /// failure of that delete propagates. Pre-envelope legacy data that
    /// deserializes directly as `T` is returned unwrapped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails, the system clock
    /// reads before the UNIX epoch, or the expired-entry delete fails.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(None);
        };

        match StoredRecord::<T>::decode(&raw) {
            Some(StoredRecord::Envelope(envelope)) => {
                if envelope.is_expired(now_millis()?) {
                    tracing::debug!(key, "Removing expired entry on read");
                    self.backend.delete(key).await?;
                    Ok(None)
                } else {
                    Ok(Some(envelope.value))
                }
            },
            Some(StoredRecord::Legacy(value)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    /// Retrieves the values for several keys in one backend round trip.
    ///
    /// The result has the same length as `keys`, with position `i`
    /// holding the value for `keys[i]` (duplicates allowed). Each
    /// position follows the same rules as [`get`](Self::get). Expired
    /// entries found in the batch are deleted concurrently; the call
    /// resolves once every position has settled, and the first delete
    /// failure fails the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails, the system clock
    /// reads before the UNIX epoch, or an expired-entry delete fails.
    pub async fn get_many<T>(&self, keys: &[&str]) -> Result<Vec<Option<T>>>
    where
        T: DeserializeOwned,
    {
        let records = self.backend.get_many(keys).await?;
        let now = now_millis()?;

        let lookups = keys.iter().copied().zip(records).map(|(key, raw)| async move {
            let Some(raw) = raw else {
                return Ok(None);
            };

            match StoredRecord::<T>::decode(&raw) {
                Some(StoredRecord::Envelope(envelope)) => {
                    if envelope.is_expired(now) {
                        tracing::debug!(key, "Removing expired entry on read");
                        self.backend.delete(key).await?;
                        Ok(None)
                    } else {
                        Ok(Some(envelope.value))
                    }
                },
                Some(StoredRecord::Legacy(value)) => Ok(Some(value)),
                None => Ok(None),
            }
        });

        try_join_all(lookups).await
    }

    /// Stores several key-value pairs in one batch write.
    ///
    /// Each entry carries its own optional TTL and is enveloped exactly
    /// as [`set`](Self::set) would, all against a single clock reading.
    /// Atomicity across the batch is whatever the backend provides.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be serialized, the system
    /// clock reads before the UNIX epoch, or the backend write fails.
    pub async fn set_many<T>(&self, entries: &[(&str, T, Option<Duration>)]) -> Result<()>
    where
        T: Serialize,
    {
        let now = now_millis()?;

        let mut records = Vec::with_capacity(entries.len());
        for (key, value, ttl) in entries {
            let envelope = match ttl {
                Some(ttl) => Envelope::with_ttl(value, *ttl, now),
                None => Envelope::new(value),
            };
            records.push(((*key).to_string(), envelope.encode()?));
        }

        self.backend.set_many(records).await
    }

    /// Atomically updates the value for a key.
    ///
    /// Delegates the read-modify-write to the backend: `updater` receives
    /// the current value (`None` if the key is absent, its entry has
    /// expired, or the stored bytes don't decode as `T`) and returns the
    /// value to store. An expired entry is simply overwritten, with no
    /// separate delete.
    ///
    /// The stored expiration always comes from this call's `ttl`:
    /// `Some(ttl)` stamps a deadline `ttl` from now and `None` stores the
    /// entry without one. Passing `None` therefore clears any previous
    /// TTL rather than preserving it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend update fails, the system clock
    /// reads before the UNIX epoch, or the new value cannot be
    /// serialized.
    pub async fn update<T, F>(&self, key: &str, updater: F, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + DeserializeOwned + 'static,
        F: FnOnce(Option<T>) -> T + Send + 'static,
    {
        let transform: UpdateFn = Box::new(move |raw| {
            // Clock is read inside the transform so the deadline is
            // stamped at commit time, not call time
            let now = now_millis()?;

            let current = raw.and_then(|raw| match StoredRecord::<T>::decode(&raw) {
                Some(StoredRecord::Envelope(envelope)) if !envelope.is_expired(now) => {
                    Some(envelope.value)
                },
                Some(StoredRecord::Legacy(value)) => Some(value),
                _ => None,
            });

            let value = updater(current);
            let envelope = match ttl {
                Some(ttl) => Envelope::with_ttl(value, ttl, now),
                None => Envelope::new(value),
            };
            envelope.encode()
        });

        self.backend.update(key, transform).await
    }

    /// Deletes the entry for a key.
    ///
    /// Returns `Ok(true)` if the key existed, `Ok(false)` otherwise.
    /// Expiration state is not consulted; an expired entry that is still
    /// physically present reports `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.backend.delete(key).await
    }

    /// Deletes the entries for several keys in one batch.
    ///
    /// Missing keys are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn delete_many(&self, keys: &[&str]) -> Result<()> {
        self.backend.delete_many(keys).await
    }

    /// Removes every entry in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn clear(&self) -> Result<()> {
        self.backend.clear().await
    }
}
