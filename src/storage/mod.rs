//! Storage layer.
//!
//! A pluggable blob backend (local filesystem by default, S3-compatible
//! object storage optionally) plus the repository store client that lays
//! push snapshots out under `{base}/{user_id}/{repository_id}`.

#![allow(dead_code)] // Public API methods for future use

mod backend;
mod config;
mod local;
mod repo;
mod s3;

pub use backend::{StorageBackend, StorageError, StorageResult};
pub use config::{StorageConfig, StorageType};
pub use local::LocalStorage;
pub use repo::{RepoStore, METADATA_MARKER};
pub use s3::{S3Config, S3Storage};
