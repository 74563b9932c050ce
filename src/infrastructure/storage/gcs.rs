use async_trait::async_trait;
use bytes::Bytes;
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStoreExt, PutOptions, PutPayload};

use super::{validate_key, PhotoStorage, StorageBackend, StorageError, StorageResult, StoredPhoto};

/// Google Cloud Storage backend.
///
/// Objects are expected to be publicly readable through the bucket's
/// uniform access policy; the returned URL is the bucket's public URL.
#[derive(Clone)]
pub struct GcsStorage {
    store: GoogleCloudStorage,
    bucket: String,
    public_base_url: String,
}

impl GcsStorage {
    pub fn new(
        bucket: String,
        credentials_path: Option<&str>,
        public_base_url: &str,
    ) -> StorageResult<Self> {
        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket.clone());

        if let Some(path) = credentials_path {
            builder = builder.with_service_account_path(path);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(GcsStorage {
            store,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn public_url(&self, key: &str) -> String {
        public_object_url(&self.public_base_url, &self.bucket, key)
    }
}

pub(crate) fn public_object_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        urlencoding::encode(key)
    )
}

/// Objects carry their MIME type so the public URL serves them as images.
pub(crate) fn put_options(content_type: &str) -> PutOptions {
    let attributes = Attributes::from_iter([(
        Attribute::ContentType,
        AttributeValue::from(content_type.to_string()),
    )]);

    PutOptions {
        attributes,
        ..PutOptions::default()
    }
}

impl std::fmt::Debug for GcsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStorage")
            .field("bucket", &self.bucket)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PhotoStorage for GcsStorage {
    async fn store(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<StoredPhoto> {
        validate_key(key)?;
        let location = Path::from(key);
        let size = data.len();
        let start = std::time::Instant::now();

        object_store::ObjectStore::put_opts(&self.store, &location, PutPayload::from(data), put_options(content_type))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    "GCS upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            content_type = %content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Photo uploaded to GCS"
        );

        Ok(StoredPhoto {
            key: key.to_string(),
            public_url: Some(self.public_url(key)),
        })
    }

    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        let location = Path::from(key);

        let result = self.store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::ReadFailed(other.to_string()),
        })?;

        result
            .bytes()
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let location = Path::from(key);

        match self.store.delete(&location).await {
            Ok(()) => {
                tracing::info!(bucket = %self.bucket, key = %key, "Photo removed from GCS");
                Ok(())
            }
            Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "GCS delete failed");
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Gcs
    }
}
