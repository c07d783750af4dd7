//! File-based session storage.
//!
//! The whole session record lives in one JSON file, by default
//! `<data dir>/keystone/session.json`. Every write replaces the file via a
//! temporary sibling and a rename, so a crash never leaves half a record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use keystone_application::ports::{FileSystem, FileSystemError, SessionStorage, StorageError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::serialization::{from_json_bytes, to_json_stable_bytes};

const SCHEMA_VERSION: u32 = 1;

/// On-disk layout:
/// ```json
/// {
///   "entries": {
///     "accessToken": "eyJhbGciOi...",
///     "refreshToken": "d4c1..."
///   },
///   "schema_version": 1
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SessionFile {
    schema_version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl Default for SessionFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Session storage backed by a single JSON file.
#[derive(Debug)]
pub struct FileSessionStorage<F> {
    fs: F,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl<F: FileSystem> FileSessionStorage<F> {
    /// Creates storage persisting to `path`. Nothing is read or written
    /// until the first operation.
    pub fn new(fs: F, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    async fn load(&self) -> Result<SessionFile, StorageError> {
        let content = match self.fs.read_file(&self.path).await {
            Ok(content) => content,
            Err(FileSystemError::NotFound(_)) => return Ok(SessionFile::default()),
            Err(e) => return Err(e.into()),
        };
        from_json_bytes(&content).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn save(&self, file: &SessionFile) -> Result<(), StorageError> {
        if file.entries.is_empty() {
            if self.fs.exists(&self.path).await {
                self.fs.remove_file(&self.path).await?;
                debug!(path = %self.path.display(), "removed empty session file");
            }
            return Ok(());
        }

        let content =
            to_json_stable_bytes(file).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let temp = self.temp_path();
        self.fs.write_file(&temp, &content).await?;
        self.fs.rename(&temp, &self.path).await?;
        Ok(())
    }

    /// Read-modify-write under the write lock. An unreadable file is
    /// replaced rather than blocking every future write.
    async fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) + Send,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut file = match self.load().await {
            Ok(file) => file,
            Err(StorageError::Serialization(e)) => {
                warn!(path = %self.path.display(), error = %e, "replacing corrupt session file");
                SessionFile::default()
            }
            Err(e) => return Err(e),
        };
        apply(&mut file.entries);
        file.schema_version = SCHEMA_VERSION;
        self.save(&file).await
    }
}

#[async_trait]
impl<F: FileSystem> SessionStorage for FileSessionStorage<F> {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load().await?.entries.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.remove(key);
        })
        .await
    }

    async fn set_items(&self, items: &[(&str, String)]) -> Result<(), StorageError> {
        self.update(|entries| {
            for (key, value) in items {
                entries.insert((*key).to_string(), value.clone());
            }
        })
        .await
    }

    async fn remove_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.update(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
        .await
    }
}
