//! S3 backend built on Apache OpenDAL.

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use moka::sync::Cache;
use opendal::{Entry, ErrorKind, Operator, Writer, services};
use tracing::{debug, warn};

use super::backend::{BackendError, BackendErrorKind, ObjectBackend};
use super::config::S3Connection;
use super::key::{KeyUse, key_defect};
use super::types::{ByteStream, ObjectSummary};

/// Default number of bucket operators kept alive.
const DEFAULT_OPERATOR_CACHE_CAPACITY: u64 = 64;

/// Operators unused for this long are dropped (10 minutes).
const OPERATOR_IDLE_SECS: u64 = 600;

/// S3 object backend.
///
/// OpenDAL operators are bound to a single bucket, so one is built lazily per
/// bucket. Built operators live in a bounded cache: bucket names come from
/// callers, and an operator can be built for a bucket that does not exist.
pub struct S3Backend {
    connection: S3Connection,
    operators: Cache<String, Operator>,
}

impl S3Backend {
    /// Create a backend from connection settings. No network access happens here.
    #[must_use]
    pub fn new(connection: S3Connection) -> Self {
        Self::with_cache_capacity(connection, DEFAULT_OPERATOR_CACHE_CAPACITY)
    }

    /// Create a backend keeping at most `max_buckets` operators cached.
    #[must_use]
    pub fn with_cache_capacity(connection: S3Connection, max_buckets: u64) -> Self {
        let operators = Cache::builder()
            .max_capacity(max_buckets)
            .time_to_idle(Duration::from_secs(OPERATOR_IDLE_SECS))
            .build();

        Self {
            connection,
            operators,
        }
    }

    /// Number of buckets with a cached operator.
    #[must_use]
    pub fn cached_buckets(&self) -> u64 {
        self.operators.run_pending_tasks();
        self.operators.entry_count()
    }

    /// Get (or build) the operator for a bucket.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if OpenDAL rejects the S3 settings.
    pub fn operator(&self, bucket: &str) -> Result<Operator, BackendError> {
        if let Some(op) = self.operators.get(bucket) {
            return Ok(op);
        }

        let op = self.create_operator(bucket)?;
        self.operators.insert(bucket.to_string(), op.clone());
        Ok(op)
    }

    fn create_operator(&self, bucket: &str) -> Result<Operator, BackendError> {
        let mut builder = services::S3::default()
            .root("/")
            .bucket(bucket)
            .region(&self.connection.region);

        if let Some(endpoint) = &self.connection.endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let (Some(access_key_id), Some(secret_access_key)) = (
            &self.connection.access_key_id,
            &self.connection.secret_access_key,
        ) {
            builder = builder
                .access_key_id(access_key_id)
                .secret_access_key(secret_access_key);
        }

        let op = Operator::new(builder)
            .map_err(|e| BackendError::configuration(e.to_string()))?
            .finish();
        debug!(bucket, region = %self.connection.region, "Created S3 operator");
        Ok(op)
    }
}

impl ObjectBackend for S3Backend {
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectSummary>, BackendError> {
        let op = self.operator(bucket)?;
        list_objects(&op).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        size: u64,
        body: ByteStream,
    ) -> Result<(), BackendError> {
        verbatim(key, KeyUse::Object)?;
        let op = self.operator(bucket)?;
        let mut writer = op.writer_with(key).content_type(content_type).await?;
        write_body(&mut writer, key, size, body).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, BackendError> {
        verbatim(key, KeyUse::Object)?;
        let op = self.operator(bucket)?;
        let buffer = op.read(key).await?;
        Ok(buffer.to_bytes())
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> Result<ByteStream, BackendError> {
        verbatim(key, KeyUse::Object)?;
        let op = self.operator(bucket)?;
        read_stream(&op, key).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        verbatim(key, KeyUse::Delete)?;
        let op = self.operator(bucket)?;
        op.delete(key).await.map_err(BackendError::from)
    }

    async fn copy(&self, bucket: &str, source: &str, dest: &str) -> Result<(), BackendError> {
        verbatim(source, KeyUse::Object)?;
        verbatim(dest, KeyUse::Object)?;
        let op = self.operator(bucket)?;
        op.copy(source, dest).await.map_err(BackendError::from)
    }

    async fn presign_read(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, BackendError> {
        verbatim(key, KeyUse::Object)?;
        let op = self.operator(bucket)?;
        let presigned = op.presign_read(key, ttl).await?;
        Ok(presigned.uri().to_string())
    }
}

/// OpenDAL would rewrite the key, addressing some other object.
fn verbatim(key: &str, usage: KeyUse) -> Result<(), BackendError> {
    match key_defect(key, usage) {
        Some(defect) => Err(BackendError::rejected(format!("key {key:?} {defect}"))),
        None => Ok(()),
    }
}

/// Every object under the root, folder markers included.
async fn list_objects(op: &Operator) -> Result<Vec<ObjectSummary>, BackendError> {
    let entries = op.list_with("/").recursive(true).await?;

    // The root itself is not an object.
    Ok(entries
        .iter()
        .filter(|entry| entry.path() != "/")
        .map(summary_from_entry)
        .collect())
}

/// Copy `body` into `writer`, checking its length against `size` as it goes.
///
/// Nothing is committed unless exactly `size` bytes arrive: on any failure
/// the writer is aborted.
async fn write_body(
    writer: &mut Writer,
    key: &str,
    size: u64,
    mut body: ByteStream,
) -> Result<(), BackendError> {
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                abort(writer, key).await;
                return Err(BackendError::stream(e.to_string()));
            }
        };

        written = written.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
        if written > size {
            abort(writer, key).await;
            return Err(size_mismatch(size, written));
        }

        if let Err(e) = writer.write(chunk).await {
            abort(writer, key).await;
            return Err(e.into());
        }
    }

    if written != size {
        abort(writer, key).await;
        return Err(size_mismatch(size, written));
    }

    writer.close().await?;
    Ok(())
}

/// Open `key` as a chunk stream. The stat up front turns a missing object
/// into an error here rather than on the first poll.
async fn read_stream(op: &Operator, key: &str) -> Result<ByteStream, BackendError> {
    let meta = op.stat(key).await?;
    let stream = op
        .reader(key)
        .await?
        .into_bytes_stream(0..meta.content_length())
        .await?;
    Ok(stream.boxed())
}

fn summary_from_entry(entry: &Entry) -> ObjectSummary {
    let meta = entry.metadata();
    ObjectSummary {
        key: entry.path().to_string(),
        size: meta.content_length(),
        last_modified: meta
            .last_modified()
            .map(|ts| DateTime::<Utc>::from(SystemTime::from(ts))),
    }
}

fn size_mismatch(declared: u64, actual: u64) -> BackendError {
    BackendError::rejected(format!(
        "payload length {actual} does not match declared size {declared}"
    ))
}

async fn abort(writer: &mut Writer, key: &str) {
    if let Err(e) = writer.abort().await {
        warn!(key, error = %e, "Failed to abort S3 upload");
    }
}

impl From<opendal::Error> for BackendError {
    fn from(err: opendal::Error) -> Self {
        let kind = match err.kind() {
            ErrorKind::NotFound if err.to_string().contains("NoSuchBucket") => {
                BackendErrorKind::BucketNotFound
            }
            ErrorKind::NotFound => BackendErrorKind::ObjectNotFound,
            ErrorKind::ConfigInvalid => BackendErrorKind::Configuration,
            ErrorKind::PermissionDenied | ErrorKind::RateLimited | ErrorKind::Unexpected => {
                BackendErrorKind::Unavailable
            }
            _ => BackendErrorKind::Rejected,
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{TryStreamExt, stream};
    use rstest::rstest;
    use std::io;

    fn backend() -> S3Backend {
        S3Backend::new(
            S3Connection::new("us-east-1").with_credentials("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG"),
        )
    }

    fn memory() -> Operator {
        Operator::new(services::Memory::default())
            .expect("memory operator should build")
            .finish()
    }

    fn body(chunks: Vec<io::Result<&'static str>>) -> ByteStream {
        stream::iter(
            chunks
                .into_iter()
                .map(|chunk| chunk.map(|s| Bytes::from_static(s.as_bytes()))),
        )
        .boxed()
    }

    async fn is_absent(op: &Operator, key: &str) -> bool {
        matches!(op.stat(key).await, Err(e) if e.kind() == ErrorKind::NotFound)
    }

    #[rstest]
    #[case(ErrorKind::NotFound, "NoSuchKey: key does not exist", BackendErrorKind::ObjectNotFound)]
    #[case(
        ErrorKind::NotFound,
        "NoSuchBucket: bucket does not exist",
        BackendErrorKind::BucketNotFound
    )]
    #[case(ErrorKind::PermissionDenied, "AccessDenied", BackendErrorKind::Unavailable)]
    #[case(ErrorKind::RateLimited, "SlowDown", BackendErrorKind::Unavailable)]
    #[case(ErrorKind::Unexpected, "connection reset", BackendErrorKind::Unavailable)]
    #[case(ErrorKind::ConfigInvalid, "region is missing", BackendErrorKind::Configuration)]
    #[case(ErrorKind::Unsupported, "presign", BackendErrorKind::Rejected)]
    #[case(ErrorKind::ConditionNotMatch, "precondition", BackendErrorKind::Rejected)]
    fn test_error_classification(
        #[case] kind: ErrorKind,
        #[case] message: &'static str,
        #[case] expected: BackendErrorKind,
    ) {
        let err = BackendError::from(opendal::Error::new(kind, message));
        assert_eq!(err.kind(), expected);
        assert!(err.message().contains(message));
    }

    #[test]
    fn test_operator_cached_per_bucket() {
        let backend = backend();
        assert_eq!(backend.cached_buckets(), 0);

        backend.operator("bucketdyc").expect("operator should build");
        backend.operator("bucketdyc").expect("operator should build");
        assert_eq!(backend.cached_buckets(), 1);

        backend.operator("otro-bucket").expect("operator should build");
        assert_eq!(backend.cached_buckets(), 2);
    }

    #[test]
    fn test_operator_cache_is_bounded() {
        let backend = S3Backend::with_cache_capacity(
            S3Connection::new("us-east-1").with_credentials("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG"),
            2,
        );

        for i in 0..50 {
            backend
                .operator(&format!("bucket-{i}"))
                .expect("operator should build");
        }
        assert!(backend.cached_buckets() <= 2);
    }

    #[test]
    fn test_operator_with_custom_endpoint() {
        let backend = S3Backend::new(
            S3Connection::new("us-east-1")
                .with_endpoint("http://localhost:9000")
                .with_credentials("minioadmin", "minioadmin"),
        );
        assert!(backend.operator("bucketdyc").is_ok());
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let err = size_mismatch(5, 3);
        assert_eq!(err.kind(), BackendErrorKind::Rejected);
        assert!(err.message().contains("declared size 5"));
    }

    #[rstest]
    #[case(" lead.txt")]
    #[case("trail.txt ")]
    #[case("/abs.txt")]
    #[case("a//b.txt")]
    #[tokio::test]
    async fn test_rewritten_keys_never_reach_opendal(#[case] key: &str) {
        let backend = backend();
        let ttl = Duration::from_secs(60);

        let presign = backend.presign_read("bucketdyc", key, ttl).await.unwrap_err();
        assert_eq!(presign.kind(), BackendErrorKind::Rejected);
        let get = backend.get("bucketdyc", key).await.unwrap_err();
        assert_eq!(get.kind(), BackendErrorKind::Rejected);
        let delete = backend.delete("bucketdyc", key).await.unwrap_err();
        assert_eq!(delete.kind(), BackendErrorKind::Rejected);
        assert_eq!(backend.cached_buckets(), 0);
    }

    #[tokio::test]
    async fn test_presigned_path_keeps_inner_spaces() {
        let url = backend()
            .presign_read("bucketdyc", "mi espacio.txt", Duration::from_secs(60))
            .await
            .expect("presigning should not need the network");
        assert!(url.contains("mi%20espacio.txt"));
    }

    #[tokio::test]
    async fn test_write_body_commits_exact_length() {
        let op = memory();
        let mut writer = op.writer("datos.txt").await.unwrap();

        write_body(&mut writer, "datos.txt", 5, body(vec![Ok("da"), Ok("tos")]))
            .await
            .unwrap();

        assert_eq!(op.read("datos.txt").await.unwrap().to_vec(), b"datos");
    }

    #[tokio::test]
    async fn test_write_body_aborts_over_long_stream() {
        let op = memory();
        let mut writer = op.writer("largo.txt").await.unwrap();

        let err = write_body(&mut writer, "largo.txt", 3, body(vec![Ok("ab"), Ok("cd")]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), BackendErrorKind::Rejected);
        assert!(err.message().contains("payload length 4"));
        assert!(is_absent(&op, "largo.txt").await);
    }

    #[tokio::test]
    async fn test_write_body_aborts_short_stream() {
        let op = memory();
        let mut writer = op.writer("corto.txt").await.unwrap();

        let err = write_body(&mut writer, "corto.txt", 5, body(vec![Ok("abc")]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), BackendErrorKind::Rejected);
        assert!(is_absent(&op, "corto.txt").await);
    }

    #[tokio::test]
    async fn test_write_body_aborts_on_stream_error() {
        let op = memory();
        let mut writer = op.writer("roto.txt").await.unwrap();
        let chunks = body(vec![
            Ok("ab"),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "client went away")),
        ]);

        let err = write_body(&mut writer, "roto.txt", 4, chunks).await.unwrap_err();

        assert_eq!(err.kind(), BackendErrorKind::Stream);
        assert!(err.message().contains("client went away"));
        assert!(is_absent(&op, "roto.txt").await);
    }

    #[tokio::test]
    async fn test_read_stream_matches_read() {
        let op = memory();
        op.write("mi espacio.txt", vec![7u8; 10_000]).await.unwrap();

        let whole = op.read("mi espacio.txt").await.unwrap().to_vec();
        let chunks: Vec<Bytes> = read_stream(&op, "mi espacio.txt")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.concat(), whole);
    }

    #[tokio::test]
    async fn test_read_stream_missing_object() {
        let op = memory();
        let err = read_stream(&op, "nada.txt").await.err().unwrap();
        assert_eq!(err.kind(), BackendErrorKind::ObjectNotFound);
    }

    #[tokio::test]
    async fn test_list_keeps_folder_markers() {
        let op = memory();
        op.create_dir("carpeta/").await.unwrap();
        op.write("carpeta/foto.png", vec![1u8; 3]).await.unwrap();
        op.write("a.txt", vec![1u8; 5]).await.unwrap();

        let objects = list_objects(&op).await.unwrap();

        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert!(keys.contains(&"carpeta/"));
        assert!(keys.contains(&"carpeta/foto.png"));
        assert!(keys.contains(&"a.txt"));
        assert!(!keys.contains(&"/"));
        let marker = objects.iter().find(|o| o.key == "carpeta/");
        assert_eq!(marker.map(|o| o.size), Some(0));
    }
}
