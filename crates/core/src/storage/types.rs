//! Storage DTOs and upload payloads.

use std::fmt;
use std::io;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Owned stream of payload chunks fed to the backend during an upload.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Summary of one stored object, as returned by bucket listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    /// Object key, unique within its bucket.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time, when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectSummary {
    /// Create a new object summary.
    #[must_use]
    pub fn new(key: impl Into<String>, size: u64, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified,
        }
    }
}

/// A single upload: destination, metadata and the payload stream.
///
/// The request is consumed by value; the stream is dropped as soon as the
/// upload returns, whatever the outcome.
pub struct UploadRequest {
    /// Destination bucket.
    pub bucket: String,
    /// Destination key.
    pub key: String,
    /// MIME type stored with the object.
    pub content_type: String,
    /// Declared payload length in bytes. Must match the stream length.
    pub size: u64,
    body: ByteStream,
}

impl UploadRequest {
    /// Create an upload request from a chunk stream.
    pub fn new<S>(
        bucket: impl Into<String>,
        key: impl Into<String>,
        content_type: impl Into<String>,
        size: u64,
        body: S,
    ) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            content_type: content_type.into(),
            size,
            body: body.boxed(),
        }
    }

    /// Create an upload request from an in-memory payload.
    pub fn from_bytes(
        bucket: impl Into<String>,
        key: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data: Bytes = data.into();
        let size = u64::try_from(data.len()).unwrap_or(u64::MAX);
        Self::new(bucket, key, content_type, size, stream::iter([Ok(data)]))
    }

    /// Split the request into its payload stream, dropping the metadata.
    #[must_use]
    pub fn into_body(self) -> ByteStream {
        self.body
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
