//! Object-storage gateway over S3 using Apache OpenDAL.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     ObjectStoreGateway                           │
//! │  list_objects / upload_object / upload_and_get_*_url /           │
//! │  download_object / download_stream / delete_object / move_object │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                 ObjectBackend (bucket, key)                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   S3Backend: one OpenDAL operator per bucket (bounded cache)     │
//! │ op.list_with("/")        │ op.presign_read(key, ttl)             │
//! │ op.writer_with(key)      │ op.copy(src, dst)                     │
//! │ op.read(key)             │ op.delete(key)                        │
//! │ op.reader(key)           │                                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod backend;
mod config;
mod error;
mod gateway;
mod key;
mod public_url;
mod s3;
#[cfg(test)]
mod testing;
mod types;

pub use backend::{BackendError, BackendErrorKind, ObjectBackend};
pub use config::{GatewayConfig, S3Connection};
pub use error::StorageError;
pub use gateway::ObjectStoreGateway;
pub use public_url::{encode_key, public_url};
pub use s3::S3Backend;
pub use types::{ByteStream, ObjectSummary, UploadRequest};
