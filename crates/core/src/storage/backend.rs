//! Backend seam: bucket-addressed object-storage primitives.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use super::types::{ByteStream, ObjectSummary};

/// Classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The bucket does not exist.
    BucketNotFound,
    /// The key does not exist in the bucket.
    ObjectNotFound,
    /// Transport, authentication or throttling failure.
    Unavailable,
    /// Reading the caller's payload stream failed.
    Stream,
    /// The backend refused the request (size mismatch, unsupported, ...).
    Rejected,
    /// The client for the bucket could not be built.
    Configuration,
}

impl BackendErrorKind {
    /// Stable lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BucketNotFound => "bucket_not_found",
            Self::ObjectNotFound => "object_not_found",
            Self::Unavailable => "unavailable",
            Self::Stream => "stream",
            Self::Rejected => "rejected",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by an [`ObjectBackend`].
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
}

impl BackendError {
    /// Create a backend error of the given kind.
    #[must_use]
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unavailable, message)
    }

    /// Create a payload stream error.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Stream, message)
    }

    /// Create a rejected-request error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Rejected, message)
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Configuration, message)
    }

    /// The failure classification.
    #[must_use]
    pub const fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    /// The backend-provided message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Object-storage primitives the gateway is built on.
///
/// Every call names its bucket; implementations hold no per-object state.
/// Implementations must not retry on their own.
pub trait ObjectBackend: Send + Sync {
    /// List every object in the bucket, draining pagination.
    fn list(
        &self,
        bucket: &str,
    ) -> impl Future<Output = Result<Vec<ObjectSummary>, BackendError>> + Send;

    /// Stream `body` into `bucket/key`, replacing any existing object.
    ///
    /// Fails with [`BackendErrorKind::Rejected`] when the stream length
    /// differs from `size`.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        size: u64,
        body: ByteStream,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Read a whole object.
    fn get(&self, bucket: &str, key: &str)
    -> impl Future<Output = Result<Bytes, BackendError>> + Send;

    /// Open an object as a stream of chunks.
    fn get_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = Result<ByteStream, BackendError>> + Send;

    /// Delete an object. Deleting a missing key succeeds.
    fn delete(&self, bucket: &str, key: &str)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Server-side copy of `source` to `dest` inside one bucket.
    fn copy(
        &self,
        bucket: &str,
        source: &str,
        dest: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Produce a signed GET URL for `bucket/key` valid for `ttl`.
    fn presign_read(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}
