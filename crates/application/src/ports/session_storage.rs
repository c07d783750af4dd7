//! Session storage port
//!
//! Durable, string-valued key-value storage the session mirrors its
//! credentials into. Only `AuthSession` reads or writes these entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Errors that can occur during session storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Key-value storage for the persisted session record.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Reads a single entry. Missing entries are `Ok(None)`.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a single entry, overwriting any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes a single entry. Removing a missing entry is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Writes several entries.
    ///
    /// Adapters that can write atomically should override this so readers
    /// never see part of a batch.
    async fn set_items(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set_item(key, value).await?;
        }
        Ok(())
    }

    /// Removes several entries.
    async fn remove_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        for key in keys {
            self.remove_item(key).await?;
        }
        Ok(())
    }
}

/// In-memory session storage.
///
/// Sessions do not survive a restart; useful for tests and for processes
/// that should never write credentials to disk. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStorage {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemorySessionStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every entry.
    pub async fn entries(&self) -> BTreeMap<String, String> {
        self.entries.read().await.clone()
    }

    /// Get count of stored entries.
    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn set_items(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let mut map = self.entries.write().await;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut map = self.entries.write().await;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}
