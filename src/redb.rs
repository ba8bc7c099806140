//! Redb-backed storage backend.
//!
//! Provides persistent record storage using redb with ACID guarantees.

use crate::backend::{StoreBackend, UpdateFn};
use anyhow::{Context, Result};
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

/// Table name for stored records
const RECORDS_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("records");

/// Redb-backed record storage backend.
///
/// Provides persistent storage with ACID guarantees. Suitable for
/// production use where durability is required.
///
/// # Thread Safety
///
/// `RedbBackend` is `Clone` and can be shared across threads; clones
/// share the same database handle. Redb serializes write transactions,
/// and `update` performs its read and write inside a single one, which
/// makes the read-modify-write atomic.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates parent directories if needed. Uses redb's ACID guarantees
    /// to prevent corruption on crashes or unclean shutdowns.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - Database file cannot be opened or created (permissions, disk full, etc.)
    /// - Initialization transaction fails to begin or commit
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists before opening database
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory: {}", parent.display())
            })?;
        }

        let db = Database::create(path)
            .with_context(|| format!("Failed to open store database: {}", path.display()))?;

        // Initialize table on first open to ensure it exists for reads
        let write_txn = db
            .begin_write()
            .context("Failed to begin initialization transaction")?;
        {
            let _table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to initialize records table")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initialization transaction")?;

        tracing::debug!(path = %path.display(), "Opened record store database");

        Ok(Self { db: Arc::new(db) })
    }

    /// Internal helper to get a record synchronously.
    fn get_sync(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;

        let table = read_txn
            .open_table(RECORDS_TABLE)
            .context("Failed to open records table")?;

        let raw = table
            .get(key)
            .with_context(|| format!("Failed to read key '{key}'"))?
            .map(|guard| guard.value().to_vec());

        Ok(raw)
    }

    /// Internal helper to get several records in one read transaction.
    fn get_many_sync(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;

        let table = read_txn
            .open_table(RECORDS_TABLE)
            .context("Failed to open records table")?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let raw = table
                .get(key.as_str())
                .with_context(|| format!("Failed to read key '{key}'"))?
                .map(|guard| guard.value().to_vec());
            records.push(raw);
        }

        Ok(records)
    }

    /// Internal helper to set a record synchronously.
    fn set_sync(&self, key: &str, raw: &[u8]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        {
            let mut table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;

            table
                .insert(key, raw)
                .with_context(|| format!("Failed to insert key '{key}'"))?;
        }

        write_txn
            .commit()
            .context("Failed to commit set transaction")?;

        Ok(())
    }

    /// Internal helper to write a batch of records in one transaction.
    fn set_many_sync(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        {
            let mut table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;

            for (key, raw) in entries {
                table
                    .insert(key.as_str(), raw.as_slice())
                    .with_context(|| format!("Failed to insert key '{key}'"))?;
            }
        }

        write_txn
            .commit()
            .context("Failed to commit batch set transaction")?;

        Ok(())
    }

    /// Internal helper to run a read-modify-write in one transaction.
    fn update_sync(&self, key: &str, transform: UpdateFn) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        {
            let mut table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;

            let current = table
                .get(key)
                .with_context(|| format!("Failed to read key '{key}'"))?
                .map(|guard| guard.value().to_vec());

            // A transform error drops the transaction without committing
            let next = transform(current)?;

            table
                .insert(key, next.as_slice())
                .with_context(|| format!("Failed to insert key '{key}'"))?;
        }

        write_txn
            .commit()
            .context("Failed to commit update transaction")?;

        Ok(())
    }

    /// Internal helper to delete a record synchronously.
    fn delete_sync(&self, key: &str) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        let removed = {
            let mut table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;

            table
                .remove(key)
                .with_context(|| format!("Failed to remove key '{key}'"))?
                .is_some()
        };

        write_txn
            .commit()
            .context("Failed to commit delete transaction")?;

        Ok(removed)
    }

    /// Internal helper to delete a batch of records in one transaction.
    fn delete_many_sync(&self, keys: &[String]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        {
            let mut table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to open records table")?;

            for key in keys {
                table
                    .remove(key.as_str())
                    .with_context(|| format!("Failed to remove key '{key}'"))?;
            }
        }

        write_txn
            .commit()
            .context("Failed to commit batch delete transaction")?;

        Ok(())
    }

    /// Internal helper to drop every record synchronously.
    fn clear_sync(&self) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        write_txn
            .delete_table(RECORDS_TABLE)
            .context("Failed to drop records table")?;

        // Recreate the table so later reads find it
        {
            let _table = write_txn
                .open_table(RECORDS_TABLE)
                .context("Failed to recreate records table")?;
        }

        write_txn
            .commit()
            .context("Failed to commit clear transaction")?;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for RedbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.get_sync(&key))
            .await
            .context("Task join error")?
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let backend = self.clone();
        let keys: Vec<String> = keys.iter().map(|key| (*key).to_string()).collect();
        tokio::task::spawn_blocking(move || backend.get_many_sync(&keys))
            .await
            .context("Task join error")?
    }

    async fn set(&self, key: &str, raw: Vec<u8>) -> Result<()> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.set_sync(&key, &raw))
            .await
            .context("Task join error")?
    }

    async fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.set_many_sync(&entries))
            .await
            .context("Task join error")?
    }

    async fn update(&self, key: &str, transform: UpdateFn) -> Result<()> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.update_sync(&key, transform))
            .await
            .context("Task join error")?
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.delete_sync(&key))
            .await
            .context("Task join error")?
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<()> {
        let backend = self.clone();
        let keys: Vec<String> = keys.iter().map(|key| (*key).to_string()).collect();
        tokio::task::spawn_blocking(move || backend.delete_many_sync(&keys))
            .await
            .context("Task join error")?
    }

    async fn clear(&self) -> Result<()> {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.clear_sync())
            .await
            .context("Task join error")?
    }
}
