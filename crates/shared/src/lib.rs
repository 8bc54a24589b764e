//! Shared configuration and error types for objgate.
//!
//! This crate provides common types used across all other crates:
//! - Application-wide error types with HTTP status mapping
//! - Layered configuration management

pub mod config;
pub mod error;

pub use config::{AppConfig, StorageSettings};
pub use error::AppError;
