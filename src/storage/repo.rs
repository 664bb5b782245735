//! Repository blob store client.
//!
//! Maps a user's repository snapshot onto the storage backend under the
//! deterministic prefix `{base}/{user_id}/{repository_id}`. Writes are
//! per-file and not transactional across the tree: a failure partway through
//! leaves earlier files durably written, and a retried push overwrites the
//! same keys.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::backend::{StorageBackend, StorageError, StorageResult};
use crate::api::types::PushRequest;

/// Marker object written at the repository root after all files, making the
/// storage location self-describing independent of the database.
pub const METADATA_MARKER: &str = ".vega-metadata";

/// Client for reading and writing repository trees in blob storage.
pub struct RepoStore {
    backend: Arc<dyn StorageBackend>,
    base: String,
    compress: bool,
}

impl RepoStore {
    pub fn new(backend: Arc<dyn StorageBackend>, base: impl Into<String>) -> Self {
        Self {
            backend,
            base: base.into(),
            compress: false,
        }
    }

    /// Gzip file bodies at rest (the wire format is unchanged).
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Deterministic storage root for a repository
    pub fn storage_path(&self, user_id: i64, repository_id: &str) -> String {
        format!("{}/{}/{}", self.base, user_id, repository_id)
    }

    /// Write every file of a push, then the metadata marker. Returns the
    /// repository's storage path.
    pub async fn write(&self, user_id: i64, request: &PushRequest) -> StorageResult<String> {
        let root = self.storage_path(user_id, &request.repository_id);

        for file in &request.files {
            let key = format!("{}/{}", root, file.path);
            let body = if self.compress {
                Bytes::from(gzip(file.content.as_bytes())?)
            } else {
                Bytes::copy_from_slice(file.content.as_bytes())
            };
            self.backend.put(&key, body).await?;
            tracing::debug!(key = %key, "stored file");
        }

        let marker = format!(
            "repository_id={}\nrepository_name={}\ncommit_hash={}\nfile_count={}\n",
            request.repository_id,
            request.repository_name,
            request.commit_hash,
            request.files.len()
        );
        self.backend
            .put(&format!("{}/{}", root, METADATA_MARKER), Bytes::from(marker))
            .await?;

        Ok(root)
    }

    /// Remove a repository's entire subtree. Idempotent.
    pub async fn delete(&self, user_id: i64, repository_id: &str) -> StorageResult<()> {
        self.backend
            .delete_prefix(&self.storage_path(user_id, repository_id))
            .await
    }

    pub async fn exists(&self, user_id: i64, repository_id: &str) -> StorageResult<bool> {
        self.backend
            .exists_prefix(&self.storage_path(user_id, repository_id))
            .await
    }

    /// Relative paths of everything stored for a repository, marker included.
    pub async fn list_paths(&self, user_id: i64, repository_id: &str) -> StorageResult<Vec<String>> {
        self.backend
            .list(&self.storage_path(user_id, repository_id))
            .await
    }

    /// Read one stored file back, transparently decompressing when this
    /// store was configured with compression.
    pub async fn read_file(&self, user_id: i64, repository_id: &str, path: &str) -> StorageResult<Bytes> {
        let key = format!("{}/{}", self.storage_path(user_id, repository_id), path);
        let raw = self.backend.get(&key).await?;
        if self.compress && path != METADATA_MARKER {
            Ok(Bytes::from(gunzip(&raw)?))
        } else {
            Ok(raw)
        }
    }
}

fn gzip(data: &[u8]) -> StorageResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(StorageError::Io)?;
    encoder.finish().map_err(StorageError::Io)
}

fn gunzip(data: &[u8]) -> StorageResult<Vec<u8>> {
    use std::io::Read;
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(StorageError::Io)?;
    Ok(out)
}
