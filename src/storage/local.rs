//! Local filesystem storage backend.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::backend::{StorageBackend, StorageError, StorageResult};

/// Local filesystem storage backend.
///
/// Keys map directly onto a directory tree under the base path:
/// `{base_path}/{key}` with `/` separators becoming path components.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Get the full filesystem path for a key
    fn key_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        for component in key.split('/').filter(|c| !c.is_empty()) {
            path.push(component);
        }
        path
    }

    /// Ensure parent directory exists
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn map_not_found(key: &str, e: std::io::Error) -> StorageError {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.key_path(key);
        self.ensure_parent(&path).await?;
        fs::write(&path, &data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(key);
        let data = fs::read(&path)
            .await
            .map_err(|e| Self::map_not_found(key, e))?;
        Ok(Bytes::from(data))
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<()> {
        let path = self.key_path(prefix);
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()), // Already deleted
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn exists_prefix(&self, prefix: &str) -> StorageResult<bool> {
        let path = self.key_path(prefix);
        Ok(path.exists())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let root = self.key_path(prefix);
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        // Iterative walk; (dir, relative-prefix) pairs still to visit
        let mut pending = vec![(root, String::new())];

        while let Some((dir, rel)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child_rel = if rel.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel, name)
                };

                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), child_rel));
                } else {
                    keys.push(child_rel);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_storage_basic() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_path_buf());

        // Put and get
        let data = Bytes::from("hello world");
        storage.put("repos/1/demo/a.txt", data.clone()).await.unwrap();

        let retrieved = storage.get("repos/1/demo/a.txt").await.unwrap();
        assert_eq!(retrieved, data);

        // Overwrite
        storage.put("repos/1/demo/a.txt", Bytes::from("v2")).await.unwrap();
        assert_eq!(storage.get("repos/1/demo/a.txt").await.unwrap(), Bytes::from("v2"));

        // Exists
        assert!(storage.exists_prefix("repos/1/demo").await.unwrap());
        assert!(!storage.exists_prefix("repos/1/other").await.unwrap());

        // Missing object
        assert!(matches!(
            storage.get("repos/1/demo/missing.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_storage_list() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_path_buf());

        storage.put("r/1/a.txt", Bytes::from("1")).await.unwrap();
        storage.put("r/1/src/lib.rs", Bytes::from("2")).await.unwrap();
        storage.put("r/1/src/nested/deep.rs", Bytes::from("3")).await.unwrap();
        storage.put("r/2/other.txt", Bytes::from("4")).await.unwrap();

        let keys = storage.list("r/1").await.unwrap();
        assert_eq!(keys, vec!["a.txt", "src/lib.rs", "src/nested/deep.rs"]);

        // Listing a missing prefix is empty, not an error
        let keys = storage.list("r/none").await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_local_storage_delete_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_path_buf());

        storage.put("r/1/a.txt", Bytes::from("1")).await.unwrap();
        storage.put("r/1/src/lib.rs", Bytes::from("2")).await.unwrap();

        storage.delete_prefix("r/1").await.unwrap();
        assert!(!storage.exists_prefix("r/1").await.unwrap());
        assert!(storage.list("r/1").await.unwrap().is_empty());

        // Idempotent
        storage.delete_prefix("r/1").await.unwrap();
    }
}
