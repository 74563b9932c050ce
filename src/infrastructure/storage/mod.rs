//! Photo byte storage.
//!
//! One [`PhotoStorage`] implementation is chosen at startup from
//! [`AppConfig::storage_backend`] and shared by every request.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use derive_more::Display;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::settings::AppConfig;

pub mod gcs;
pub mod local;

pub use gcs::GcsStorage;
pub use local::LocalStorage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Gcs,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Gcs => write!(f, "gcs"),
        }
    }
}

#[derive(Debug, Display)]
pub enum StorageError {
    #[display("Upload failed: {_0}")]
    UploadFailed(String),

    #[display("Read failed: {_0}")]
    ReadFailed(String),

    #[display("Delete failed: {_0}")]
    DeleteFailed(String),

    #[display("File not found: {_0}")]
    NotFound(String),

    #[display("Invalid storage key: {_0}")]
    InvalidKey(String),

    #[display("Storage configuration error: {_0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Where a stored photo ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    pub key: String,
    /// Publicly readable URL, when the backend provides one.
    pub public_url: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Persists `data` under `key`.
    async fn store(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<StoredPhoto>;

    async fn read(&self, key: &str) -> StorageResult<Bytes>;

    /// Removes the object. Removing a missing object succeeds.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    fn backend(&self) -> StorageBackend;
}

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,254}$").expect("storage key pattern is valid")
});

/// Keys are flat file names: no separators, no traversal.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.contains("..") || !KEY_PATTERN.is_match(key) {
        return Err(StorageError::InvalidKey(format!("'{}' is not a valid photo file name", key)));
    }
    Ok(())
}

/// Builds the configured storage backend.
pub async fn from_config(config: &AppConfig) -> StorageResult<Arc<dyn PhotoStorage>> {
    match config.storage_backend {
        StorageBackend::Local => {
            let storage = LocalStorage::new(&config.upload_dir).await?;
            tracing::info!(upload_dir = %config.upload_dir, "Using local storage for photo uploads");
            Ok(Arc::new(storage))
        }
        StorageBackend::Gcs => {
            let bucket = config.gcs_bucket.clone().ok_or_else(|| {
                StorageError::ConfigError("gcs_bucket must be set for the gcs backend".into())
            })?;
            let storage = GcsStorage::new(
                bucket.clone(),
                config.gcs_credentials_path.as_deref(),
                &config.gcs_public_base_url,
            )?;
            tracing::info!(bucket = %bucket, "Using Google Cloud Storage for photo uploads");
            Ok(Arc::new(storage))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_are_valid_keys() {
        assert!(validate_key("1718000000000-123456789.jpg").is_ok());
        assert!(validate_key("IMG_0001.JPEG").is_ok());
    }

    #[test]
    fn traversal_and_separators_are_rejected() {
        for key in ["../etc/passwd", "a/b.jpg", "a\\b.jpg", ".hidden", "", "photo..jpg", "a b.jpg"] {
            assert!(
                matches!(validate_key(key), Err(StorageError::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn backend_names_match_config_values() {
        assert_eq!(StorageBackend::Local.to_string(), "local");
        assert_eq!(StorageBackend::Gcs.to_string(), "gcs");
        assert_eq!(StorageBackend::default(), StorageBackend::Local);
    }
}
