//! In-memory storage backend.
//!
//! Provides a fast, non-persistent record store using DashMap for
//! concurrent access. Ideal for testing, development, and embedded use
//! cases.

use crate::backend::{StoreBackend, UpdateFn};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// In-memory record storage backend using DashMap.
///
/// Provides fast, concurrent access without persistence. All data is lost
/// when the process exits. Ideal for:
/// - Testing and development
/// - Embedded applications
/// - Temporary caching
///
/// # Thread Safety
///
/// `MemoryBackend` is `Clone`; clones share the same underlying map, so a
/// cloned handle observes writes made through a store wrapping the
/// original. `update` runs its transform under the key's shard lock,
/// which makes the read-modify-write atomic per key.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in the store.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|entry| entry.value().clone()))
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        Ok(keys
            .iter()
            .map(|key| self.data.get(*key).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn set(&self, key: &str, raw: Vec<u8>) -> Result<()> {
        self.data.insert(key.to_string(), raw);
        Ok(())
    }

    async fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        for (key, raw) in entries {
            self.data.insert(key, raw);
        }
        Ok(())
    }

    async fn update(&self, key: &str, transform: UpdateFn) -> Result<()> {
        // The entry guard holds the key's shard lock across the transform,
        // so no concurrent write to this key can interleave. The transform
        // must not call back into this backend.
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = transform(Some(occupied.get().clone()))?;
                occupied.insert(next);
            },
            Entry::Vacant(vacant) => {
                let next = transform(None)?;
                vacant.insert(next);
            },
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.remove(key).is_some())
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.data.remove(*key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.data.clear();
        Ok(())
    }
}
