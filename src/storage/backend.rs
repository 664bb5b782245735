//! Storage backend trait definition.
//!
//! Provides an abstraction over different storage backends (local filesystem,
//! S3, etc.) addressed by hierarchical `/`-separated keys. A repository's
//! files all live under one key prefix, so recursive delete and listing are
//! prefix operations.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// Storage error types
#[derive(Debug)]
pub enum StorageError {
    /// Object not found
    NotFound(String),
    /// IO error
    Io(std::io::Error),
    /// Backend-specific error
    Backend(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(key) => write!(f, "Object not found: {}", key),
            StorageError::Io(e) => write!(f, "IO error: {}", e),
            StorageError::Backend(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage backend trait for pluggable storage.
///
/// Keys are hierarchical paths like `vega-push/42/repo-1/src/lib.rs`.
/// `put` overwrites any existing object at the same key, which is what makes
/// retried pushes idempotent at the path level.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write an object, creating parent hierarchy as needed and overwriting
    /// any existing object at this key.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Read an object's full contents.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Recursively delete every object under a prefix. Deleting a prefix
    /// with no objects is a no-op, not an error.
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<()>;

    /// Check whether any object exists under a prefix.
    async fn exists_prefix(&self, prefix: &str) -> StorageResult<bool>;

    /// Recursively list object keys under a prefix, relative to that prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}
