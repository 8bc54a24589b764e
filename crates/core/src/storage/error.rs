//! Storage error types.

use objgate_shared::AppError;
use thiserror::Error;

use super::backend::{BackendError, BackendErrorKind};

/// Gateway operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Bucket does not exist.
    #[error("bucket not found: {bucket}")]
    BucketNotFound {
        /// Bucket that was not found.
        bucket: String,
    },

    /// Object does not exist in the bucket.
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound {
        /// Bucket that was searched.
        bucket: String,
        /// Key that was not found.
        key: String,
    },

    /// Transport, authentication or other backend-side failure.
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    /// The payload could not be read or the backend refused the write.
    #[error("upload of {bucket}/{key} failed: {source}")]
    UploadFailed {
        /// Destination bucket.
        bucket: String,
        /// Destination key.
        key: String,
        /// Underlying backend failure.
        source: BackendError,
    },

    /// The object was stored but no presigned URL could be produced.
    #[error("{bucket}/{key} was stored but presigning failed: {source}")]
    PresignFailed {
        /// Bucket holding the stored object.
        bucket: String,
        /// Key of the stored object.
        key: String,
        /// Underlying backend failure.
        source: BackendError,
    },

    /// The copy step of a move failed; the source is untouched.
    #[error("move {bucket}/{source_key} -> {dest_key} failed: {source}")]
    MoveFailed {
        /// Bucket of both keys.
        bucket: String,
        /// Key that was to be moved.
        source_key: String,
        /// Intended destination key.
        dest_key: String,
        /// Underlying backend failure.
        source: BackendError,
    },

    /// The copy succeeded but deleting the source failed: both keys exist.
    #[error(
        "move {bucket}/{source_key} -> {dest_key} left a duplicate, source delete failed: {source}"
    )]
    MovePartial {
        /// Bucket of both keys.
        bucket: String,
        /// Key still present at the source.
        source_key: String,
        /// Key holding the copy.
        dest_key: String,
        /// Underlying backend failure.
        source: BackendError,
    },

    /// Empty bucket or key, or otherwise unusable arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage client configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Map a backend error on a read-style call to the gateway error set.
    ///
    /// `key` is the object the call addressed, if any.
    #[must_use]
    pub fn from_backend(err: BackendError, bucket: &str, key: Option<&str>) -> Self {
        match (err.kind(), key) {
            (BackendErrorKind::BucketNotFound, _) => Self::BucketNotFound {
                bucket: bucket.to_string(),
            },
            (BackendErrorKind::ObjectNotFound, Some(key)) => Self::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            (BackendErrorKind::Configuration, _) => Self::Configuration(err.message().to_string()),
            _ => Self::BackendUnavailable(err),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BucketNotFound { .. } | StorageError::ObjectNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            StorageError::InvalidArgument(msg) => Self::Validation(msg),
            StorageError::MovePartial { .. } | StorageError::Configuration(_) => {
                Self::Internal(err.to_string())
            }
            _ => Self::ExternalService(err.to_string()),
        }
    }
}
