//! Backend trait for raw record storage.
//!
//! Defines the interface the envelope layer requires of its underlying
//! store, enabling pluggable storage (redb, memory, Redis, etc.). Backends
//! traffic in opaque byte records and never interpret their contents;
//! expiration semantics live entirely in the layer above.

use anyhow::Result;
use async_trait::async_trait;

/// Transform passed to [`StoreBackend::update`].
///
/// Receives the current raw record for the key (`None` if absent) and
/// returns the bytes to store in its place. An `Err` aborts the update
/// without writing.
pub type UpdateFn = Box<dyn FnOnce(Option<Vec<u8>>) -> Result<Vec<u8>> + Send>;

/// Backend trait for raw key-value storage.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
/// Implementations handle their own concurrency and document the
/// atomicity they provide for `update` and the batch operations.
///
/// # Example
///
/// ```ignore
/// use ttl_kv::{MemoryBackend, StoreBackend};
///
/// let backend = MemoryBackend::new();
/// backend.set("key", b"value".to_vec()).await?;
/// let raw = backend.get("key").await?;
/// ```
#[async_trait]
pub trait StoreBackend: Send + Sync + 'static {
    /// Retrieves the raw record for a key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Retrieves raw records for several keys in one round trip.
    ///
    /// The result has the same length as `keys`, with position `i`
    /// holding the record for `keys[i]`. Duplicate keys are allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Stores a raw record, overwriting any existing record for the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn set(&self, key: &str, raw: Vec<u8>) -> Result<()>;

    /// Stores several records in one batch write.
    ///
    /// Atomicity across the batch is backend-defined; the redb backend
    /// writes all entries in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()>;

    /// Atomically replaces the record for a key.
    ///
    /// Reads the current record, passes it to `transform`, and stores
    /// the returned bytes. No concurrent write to the same key may
    /// interleave between the read and the write. An `Err` from the
    /// transform aborts the update without writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails or the
    /// transform fails.
    async fn update(&self, key: &str, transform: UpdateFn) -> Result<()>;

    /// Deletes a record.
    ///
    /// Returns `Ok(true)` if the key existed and was removed,
    /// `Ok(false)` if it didn't exist. Idempotent - safe to call
    /// multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Deletes several records in one batch.
    ///
    /// Missing keys are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn delete_many(&self, keys: &[&str]) -> Result<()>;

    /// Removes every record in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn clear(&self) -> Result<()>;
}
