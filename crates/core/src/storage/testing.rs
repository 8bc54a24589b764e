//! In-memory backend with failure injection for gateway tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};

use super::backend::{BackendError, BackendErrorKind, ObjectBackend};
use super::public_url::encode_key;
use super::types::{ByteStream, ObjectSummary};

/// Backend call kinds, for failure injection and call recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Call {
    List,
    Put,
    Get,
    Delete,
    Copy,
    Presign,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

/// Buckets are created on demand by `create_bucket`; keys are kept sorted
/// like an S3 listing.
#[derive(Default)]
pub(crate) struct FakeBackend {
    buckets: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    failures: Mutex<HashMap<Call, BackendErrorKind>>,
    calls: Mutex<Vec<(Call, String)>>,
    break_streams: AtomicBool,
}

/// Chunk size used by `get_stream`, small enough to split test payloads.
const STREAM_CHUNK: usize = 4;

impl FakeBackend {
    pub(crate) fn with_bucket(bucket: &str) -> Self {
        let backend = Self::default();
        backend.create_bucket(bucket);
        backend
    }

    pub(crate) fn create_bucket(&self, bucket: &str) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default();
    }

    pub(crate) fn insert(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        last_modified: DateTime<Utc>,
    ) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    data: data.into(),
                    last_modified,
                },
            );
    }

    pub(crate) fn contains(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key))
    }

    pub(crate) fn fail_on(&self, call: Call, kind: BackendErrorKind) {
        self.failures.lock().unwrap().insert(call, kind);
    }

    /// Make every later `get_stream` fail after yielding one chunk.
    pub(crate) fn fail_stream_after_first_chunk(&self) {
        self.break_streams.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<(Call, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn enter(&self, call: Call, target: String) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push((call, target));
        match self.failures.lock().unwrap().get(&call) {
            Some(kind) => Err(BackendError::new(*kind, format!("injected {call:?} failure"))),
            None => Ok(()),
        }
    }

    fn with_objects<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&mut BTreeMap<String, StoredObject>) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets.get_mut(bucket).ok_or_else(|| {
            BackendError::new(BackendErrorKind::BucketNotFound, format!("NoSuchBucket: {bucket}"))
        })?;
        f(objects)
    }
}

impl ObjectBackend for FakeBackend {
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectSummary>, BackendError> {
        self.enter(Call::List, bucket.to_string())?;
        self.with_objects(bucket, |objects| {
            Ok(objects
                .iter()
                .map(|(key, obj)| {
                    ObjectSummary::new(
                        key.clone(),
                        obj.data.len() as u64,
                        Some(obj.last_modified),
                    )
                })
                .collect())
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        _content_type: &str,
        size: u64,
        mut body: ByteStream,
    ) -> Result<(), BackendError> {
        self.enter(Call::Put, format!("{bucket}/{key}"))?;
        self.with_objects(bucket, |_| Ok(()))?;

        let mut data = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| BackendError::stream(e.to_string()))?;
            data.extend_from_slice(&chunk);
        }
        if data.len() as u64 != size {
            return Err(BackendError::rejected(format!(
                "payload length {} does not match declared size {size}",
                data.len()
            )));
        }

        self.insert(bucket, key, data.freeze(), Utc::now());
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, BackendError> {
        self.enter(Call::Get, format!("{bucket}/{key}"))?;
        self.with_objects(bucket, |objects| {
            objects.get(key).map(|obj| obj.data.clone()).ok_or_else(|| {
                BackendError::new(BackendErrorKind::ObjectNotFound, format!("NoSuchKey: {key}"))
            })
        })
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> Result<ByteStream, BackendError> {
        let data = self.get(bucket, key).await?;
        let mut chunks: Vec<io::Result<Bytes>> = (0..data.len())
            .step_by(STREAM_CHUNK)
            .map(|start| Ok(data.slice(start..(start + STREAM_CHUNK).min(data.len()))))
            .collect();
        if self.break_streams.load(Ordering::SeqCst) {
            chunks.truncate(1);
            chunks.push(Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")));
        }
        Ok(stream::iter(chunks).boxed())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        self.enter(Call::Delete, format!("{bucket}/{key}"))?;
        self.with_objects(bucket, |objects| {
            objects.remove(key);
            Ok(())
        })
    }

    async fn copy(&self, bucket: &str, source: &str, dest: &str) -> Result<(), BackendError> {
        self.enter(Call::Copy, format!("{bucket}/{source}->{dest}"))?;
        self.with_objects(bucket, |objects| {
            let obj = objects.get(source).cloned().ok_or_else(|| {
                BackendError::new(BackendErrorKind::ObjectNotFound, format!("NoSuchKey: {source}"))
            })?;
            objects.insert(dest.to_string(), obj);
            Ok(())
        })
    }

    async fn presign_read(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, BackendError> {
        self.enter(Call::Presign, format!("{bucket}/{key}"))?;
        Ok(format!(
            "https://{bucket}.s3.amazonaws.com/{}?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Expires={}&X-Amz-Signature=0f1e2d3c",
            encode_key(key),
            ttl.as_secs()
        ))
    }
}

/// Distinct call kinds the fake has received.
pub(crate) fn touched(backend: &FakeBackend) -> HashSet<Call> {
    backend.calls().into_iter().map(|(call, _)| call).collect()
}
