//! Core object-storage logic for objgate.
//!
//! This crate holds the gateway over the object store: the operations, their
//! key-encoding rules and their failure semantics. It has no HTTP surface.
//!
//! # Modules
//!
//! - `storage` - Gateway, backend seam, S3 backend and DTOs

pub mod storage;

pub use storage::{ObjectStoreGateway, ObjectSummary, StorageError, UploadRequest};
