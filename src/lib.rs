//! Expiration-aware key-value storage with pluggable backends.
//!
//! A thin time-to-live (TTL) layer over an asynchronous key-value
//! backend. Values are stored inside a JSON envelope carrying an optional
//! absolute expiration timestamp; expired entries read as absent and are
//! lazily deleted on access. Ships with two backends:
//!
//! - **RedbBackend**: Persistent storage with ACID guarantees
//! - **MemoryBackend**: Fast, non-persistent storage (ideal for testing/embedding)
//!
//! # Example
//!
//! ```ignore
//! use ttl_kv::TtlStore;
//! use std::time::Duration;
//!
//! // In-memory (testing/embedding)
//! let store = TtlStore::memory();
//! store.set("greeting", &"hello", Some(Duration::from_secs(60))).await?;
//! assert_eq!(store.get::<String>("greeting").await?, Some("hello".into()));
//!
//! // Persistent (production)
//! let store = TtlStore::file("~/.app/store.redb")?;
//! store.set("greeting", &"hello", None).await?;
//! ```
//!
//! # Custom Backends
//!
//! Implement the `StoreBackend` trait to use custom storage:
//!
//! ```ignore
//! use ttl_kv::{StoreBackend, TtlStore};
//!
//! struct RedisBackend { /* ... */ }
//! impl StoreBackend for RedisBackend { /* ... */ }
//!
//! let store = TtlStore::custom(RedisBackend::new());
//! ```

mod backend;
mod envelope;
mod memory;
mod redb;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export the public API
pub use backend::{StoreBackend, UpdateFn};
pub use envelope::{EXPIRES_AT_KEY, Envelope, StoredRecord};
pub use memory::MemoryBackend;
pub use redb::RedbBackend;
pub use store::TtlStore;
