use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{validate_key, PhotoStorage, StorageBackend, StorageError, StorageResult, StoredPhoto};

/// Stores photos as flat files in one directory.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Creates the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create upload directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl PhotoStorage for LocalStorage {
    async fn store(&self, key: &str, _content_type: &str, data: Bytes) -> StorageResult<StoredPhoto> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Photo written to local storage"
        );

        Ok(StoredPhoto {
            key: key.to_string(),
            public_url: None,
        })
    }

    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Photo removed from local storage");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Photo file already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn store_then_read_returns_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let stored = storage
            .store("1-2.jpg", "image/jpeg", Bytes::from_static(b"jpeg-bytes"))
            .await
            .unwrap();

        assert_eq!(stored.key, "1-2.jpg");
        assert!(stored.public_url.is_none());
        assert_eq!(storage.read("1-2.jpg").await.unwrap(), Bytes::from_static(b"jpeg-bytes"));
        assert!(dir.path().join("1-2.jpg").exists());
    }

    #[actix_rt::test]
    async fn read_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        assert!(matches!(storage.read("missing.jpg").await, Err(StorageError::NotFound(_))));
    }

    #[actix_rt::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        storage.store("a.png", "image/png", Bytes::from_static(b"png")).await.unwrap();

        storage.remove("a.png").await.unwrap();
        storage.remove("a.png").await.unwrap();

        assert!(!dir.path().join("a.png").exists());
    }

    #[actix_rt::test]
    async fn traversal_keys_never_touch_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("uploads")).await.unwrap();

        let result = storage
            .store("../escape.jpg", "image/jpeg", Bytes::from_static(b"x"))
            .await;

        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        assert!(!dir.path().join("escape.jpg").exists());
    }
}
