//! Durable local storage for client state.
//!
//! The cart and the sign-in session both outlive the process. [`Storage`] is
//! the seam; [`JsonFileStorage`] writes pretty JSON next to the other client
//! data and [`MemoryStorage`] keeps everything in memory for tests and
//! ephemeral sessions.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted data could not be (de)serialized.
    #[error("storage format error at {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A single persisted value.
#[async_trait]
pub trait Storage<T>: Send + Sync
where
    T: Send + Sync,
{
    /// Load the stored value, `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<T>, StorageError>;

    /// Replace the stored value.
    async fn save(&self, value: &T) -> Result<(), StorageError>;

    /// Remove the stored value. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), StorageError>;
}

// =============================================================================
// JSON file storage
// =============================================================================

/// Stores a value as a JSON document on disk.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct JsonFileStorage<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStorage<T> {
    /// Create a storage backed by `path`. The file is not touched until used.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn format_error(&self, source: serde_json::Error) -> StorageError {
        StorageError::Format {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl<T> Storage<T> for JsonFileStorage<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self) -> Result<Option<T>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| self.format_error(e))
    }

    async fn save(&self, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(value).map_err(|e| self.format_error(e))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, &json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Write `bytes` to `path`, readable by the owner only on unix.
///
/// Persisted sessions carry bearer and refresh tokens.
#[cfg(unix)]
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    // A leftover temp file keeps its old mode
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}

#[cfg(not(unix))]
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, bytes).await
}

// =============================================================================
// In-memory storage
// =============================================================================

/// Keeps the value in memory only.
#[derive(Debug)]
pub struct MemoryStorage<T> {
    value: Mutex<Option<T>>,
}

impl<T> Default for MemoryStorage<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> MemoryStorage<T> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `value`.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        Self {
            value: Mutex::new(Some(value)),
        }
    }

    /// Current stored value.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl<T> Storage<T> for MemoryStorage<T>
where
    T: Clone + Send + Sync,
{
    async fn load(&self) -> Result<Option<T>, StorageError> {
        Ok(self.value())
    }

    async fn save(&self, value: &T) -> Result<(), StorageError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    #[tokio::test]
    async fn test_file_storage_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::<Note>::new(dir.path().join("absent.json"));
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_storage_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::<Note>::new(dir.path().join("nested/note.json"));

        let note = Note {
            text: "two tiers, no nuts".to_string(),
        };
        storage.save(&note).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(note));
        assert!(!dir.path().join("nested/note.json.tmp").exists());

        storage.clear().await.unwrap();
        assert!(storage.load().await.unwrap().is_none());
        // Clearing twice is fine
        storage.clear().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        // Stale temp file from an earlier crash
        std::fs::write(path.with_extension("json.tmp"), b"{}").unwrap();
        std::fs::set_permissions(
            path.with_extension("json.tmp"),
            std::fs::Permissions::from_mode(0o644),
        )
        .unwrap();

        let storage = JsonFileStorage::<Note>::new(&path);
        storage
            .save(&Note {
                text: "access token".to_string(),
            })
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(storage.load().await.unwrap().unwrap().text, "access token");
    }

    #[tokio::test]
    async fn test_file_storage_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.json");
        std::fs::write(&path, b"{not json").unwrap();

        let storage = JsonFileStorage::<Note>::new(&path);
        assert!(matches!(
            storage.load().await,
            Err(StorageError::Format { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        storage
            .save(&Note {
                text: "hi".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(storage.value().unwrap().text, "hi");
        storage.clear().await.unwrap();
        assert!(storage.value().is_none());
    }
}
