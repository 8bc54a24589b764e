//! Object-store gateway: the operations exposed to the HTTP layer.

use bytes::Bytes;
use objgate_shared::StorageSettings;
use tracing::{debug, info, warn};

use super::backend::{BackendErrorKind, ObjectBackend};
use super::config::{GatewayConfig, S3Connection};
use super::error::StorageError;
use super::key::{KeyUse, key_defect};
use super::public_url::public_url;
use super::s3::S3Backend;
use super::types::{ByteStream, ObjectSummary, UploadRequest};

/// Stateless facade over an object backend.
///
/// Every operation names its bucket explicitly. Nothing is retried: a
/// failure is mapped to a [`StorageError`] and returned as is.
pub struct ObjectStoreGateway<B = S3Backend> {
    backend: B,
    config: GatewayConfig,
}

impl ObjectStoreGateway<S3Backend> {
    /// Create an S3-backed gateway from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(
            S3Backend::new(S3Connection::from(settings)),
            GatewayConfig::from(settings),
        )
    }
}

impl<B: ObjectBackend> ObjectStoreGateway<B> {
    /// Create a gateway over any backend.
    #[must_use]
    pub fn new(backend: B, config: GatewayConfig) -> Self {
        Self { backend, config }
    }

    /// Gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The configured fallback bucket, for callers that do not name one.
    #[must_use]
    pub fn default_bucket(&self) -> Option<&str> {
        self.config.default_bucket.as_deref()
    }

    /// List every object in a bucket, in backend order.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` or `BackendUnavailable`.
    pub async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>, StorageError> {
        require("bucket", bucket)?;
        debug!(bucket, "Listing objects");

        let objects = self
            .backend
            .list(bucket)
            .await
            .map_err(|e| StorageError::from_backend(e, bucket, None))?;

        debug!(bucket, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    /// Stream an object to the backend, replacing any existing one.
    ///
    /// Returns the key the object was stored under.
    ///
    /// # Errors
    ///
    /// Returns `UploadFailed` if the payload stream fails or its length does
    /// not match the declared size, `BucketNotFound` or `BackendUnavailable`
    /// otherwise.
    pub async fn upload_object(&self, request: UploadRequest) -> Result<String, StorageError> {
        require("bucket", &request.bucket)?;
        require_key("key", &request.key, KeyUse::Object)?;

        let bucket = request.bucket.clone();
        let key = request.key.clone();
        let content_type = request.content_type.clone();
        let size = request.size;
        debug!(bucket, key, content_type, size, "Uploading object");

        self.backend
            .put(&bucket, &key, &content_type, size, request.into_body())
            .await
            .map_err(|e| match e.kind() {
                BackendErrorKind::Stream
                | BackendErrorKind::Rejected
                | BackendErrorKind::ObjectNotFound => StorageError::UploadFailed {
                    bucket: bucket.clone(),
                    key: key.clone(),
                    source: e,
                },
                _ => StorageError::from_backend(e, &bucket, None),
            })?;

        info!(bucket, key, size, "Uploaded object");
        Ok(key)
    }

    /// Upload, then return a signed GET URL valid for the configured TTL.
    ///
    /// # Errors
    ///
    /// Any `upload_object` error, or `PresignFailed` when the object was
    /// stored but could not be signed. The object is left in place.
    pub async fn upload_and_get_presigned_url(
        &self,
        request: UploadRequest,
    ) -> Result<String, StorageError> {
        let bucket = request.bucket.clone();
        let key = self.upload_object(request).await?;

        match self
            .backend
            .presign_read(&bucket, &key, self.config.presign_ttl())
            .await
        {
            Ok(url) => {
                debug!(bucket, key, ttl_secs = self.config.presign_ttl_secs, "Presigned object");
                Ok(url)
            }
            Err(e) => {
                warn!(bucket, key, error = %e, "Object stored but presigning failed");
                Err(StorageError::PresignFailed {
                    bucket,
                    key,
                    source: e,
                })
            }
        }
    }

    /// Upload, then return the unsigned public URL of the object.
    ///
    /// The bucket's read ACL is not checked.
    ///
    /// # Errors
    ///
    /// Any `upload_object` error.
    pub async fn upload_and_get_public_url(
        &self,
        request: UploadRequest,
    ) -> Result<String, StorageError> {
        let bucket = request.bucket.clone();
        let key = self.upload_object(request).await?;
        Ok(self.public_url(&bucket, &key))
    }

    /// Public URL of `bucket/key` on the configured domain.
    #[must_use]
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        public_url(bucket, &self.config.public_domain, key)
    }

    /// Read a whole object into memory.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound`, `BucketNotFound` or `BackendUnavailable`.
    pub async fn download_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        require("bucket", bucket)?;
        require_key("key", key, KeyUse::Object)?;
        debug!(bucket, key, "Downloading object");

        let data = self
            .backend
            .get(bucket, key)
            .await
            .map_err(|e| StorageError::from_backend(e, bucket, Some(key)))?;

        debug!(bucket, key, size = data.len(), "Downloaded object");
        Ok(data)
    }

    /// Open an object as a stream of chunks instead of buffering it.
    ///
    /// The stream yields the same bytes as [`Self::download_object`]. A
    /// failure after the first chunk surfaces as an `io::Error` item.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound`, `BucketNotFound` or `BackendUnavailable`
    /// when the object cannot be opened.
    pub async fn download_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ByteStream, StorageError> {
        require("bucket", bucket)?;
        require_key("key", key, KeyUse::Object)?;
        debug!(bucket, key, "Opening object stream");

        self.backend
            .get_stream(bucket, key)
            .await
            .map_err(|e| StorageError::from_backend(e, bucket, Some(key)))
    }

    /// Delete an object. Deleting a missing key succeeds.
    ///
    /// Folder markers (keys ending in `/`) can be deleted like any object.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` or `BackendUnavailable`.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        require("bucket", bucket)?;
        require_key("key", key, KeyUse::Delete)?;

        match self.backend.delete(bucket, key).await {
            Ok(()) => {}
            Err(e) if e.kind() == BackendErrorKind::ObjectNotFound => {
                debug!(bucket, key, "Delete of missing object");
            }
            Err(e) => return Err(StorageError::from_backend(e, bucket, Some(key))),
        }

        info!(bucket, key, "Deleted object");
        Ok(())
    }

    /// Move an object within a bucket: copy to `dest_key`, then delete
    /// `source_key`. The two steps are not atomic.
    ///
    /// # Errors
    ///
    /// `MoveFailed` if the copy fails (source untouched), `MovePartial` if the
    /// copy succeeded but the source could not be deleted (both keys exist).
    pub async fn move_object(
        &self,
        bucket: &str,
        source_key: &str,
        dest_key: &str,
    ) -> Result<(), StorageError> {
        require("bucket", bucket)?;
        require_key("source key", source_key, KeyUse::Object)?;
        require_key("destination key", dest_key, KeyUse::Object)?;
        if source_key == dest_key {
            return Err(StorageError::invalid_argument(format!(
                "source and destination are both '{source_key}'"
            )));
        }
        debug!(bucket, source_key, dest_key, "Moving object");

        if let Err(e) = self.backend.copy(bucket, source_key, dest_key).await {
            return Err(StorageError::MoveFailed {
                bucket: bucket.to_string(),
                source_key: source_key.to_string(),
                dest_key: dest_key.to_string(),
                source: e,
            });
        }

        match self.backend.delete(bucket, source_key).await {
            Ok(()) => {}
            Err(e) if e.kind() == BackendErrorKind::ObjectNotFound => {}
            Err(e) => {
                warn!(
                    bucket,
                    source_key,
                    dest_key,
                    error = %e,
                    "Object copied but source delete failed, both keys exist"
                );
                return Err(StorageError::MovePartial {
                    bucket: bucket.to_string(),
                    source_key: source_key.to_string(),
                    dest_key: dest_key.to_string(),
                    source: e,
                });
            }
        }

        info!(bucket, source_key, dest_key, "Moved object");
        Ok(())
    }
}

fn require(what: &str, value: &str) -> Result<(), StorageError> {
    if value.is_empty() {
        return Err(StorageError::invalid_argument(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}

/// Keys are stored byte for byte, so anything OpenDAL would rewrite is refused.
fn require_key(what: &str, key: &str, usage: KeyUse) -> Result<(), StorageError> {
    match key_defect(key, usage) {
        Some(defect) => Err(StorageError::invalid_argument(format!(
            "{what} {key:?} {defect}"
        ))),
        None => Ok(()),
    }
}
