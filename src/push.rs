//! Push orchestration: composes the identity verifier, blob store, ledger,
//! and catalog into the push, history, status, and delete workflows, and
//! owns their consistency invariants.
//!
//! A push moves its ledger row through
//! `PENDING -> IN_PROGRESS -> {COMPLETED | FAILED}`. The row is created
//! before any storage I/O so a crash mid-upload shows up as a stuck
//! IN_PROGRESS record instead of a silently lost attempt. Storage writes are
//! not all-or-nothing: a failed push may leave some files written, but the
//! ledger reports it FAILED and the catalog is only touched after the whole
//! tree (marker included) is durably stored.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::types::{PushRequest, PushResponse, RepositoryInfo};
use crate::auth::IdentityVerifier;
use crate::catalog::RepositoryCatalog;
use crate::db::entities::push_operation;
use crate::db::unix_timestamp;
use crate::error::{Result, ServerError};
use crate::ledger::{OperationDraft, OperationLedger, PushStatus};
use crate::storage::RepoStore;

pub struct PushService {
    verifier: IdentityVerifier,
    store: RepoStore,
    ledger: OperationLedger,
    catalog: RepositoryCatalog,
    /// Per-(user, repository) locks serializing the storage-write span of
    /// pushes and deletes. Entries are never reaped; the registry is bounded
    /// by the number of distinct keys this process has seen.
    repo_locks: Mutex<HashMap<(i64, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl PushService {
    pub fn new(
        verifier: IdentityVerifier,
        store: RepoStore,
        ledger: OperationLedger,
        catalog: RepositoryCatalog,
    ) -> Self {
        Self {
            verifier,
            store,
            ledger,
            catalog,
            repo_locks: Mutex::new(HashMap::new()),
        }
    }

    fn repo_lock(&self, user_id: i64, repository_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.repo_locks.lock();
        locks
            .entry((user_id, repository_id.to_string()))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Run one push to completion. Any failure after the PENDING row exists
    /// is recorded in the ledger before being surfaced.
    pub async fn push_repository(
        &self,
        credential: &str,
        request: PushRequest,
    ) -> Result<PushResponse> {
        let user_id = self.verifier.verify(credential).await?;
        request.validate().map_err(ServerError::ValidationFailed)?;

        let storage_path = self.store.storage_path(user_id, &request.repository_id);
        let total_size: i64 = request.files.iter().map(|f| f.size).sum();

        let op = self
            .ledger
            .create(OperationDraft {
                user_id,
                repository_id: request.repository_id.clone(),
                repository_name: request.repository_name.clone(),
                storage_path: storage_path.clone(),
                file_count: request.files.len() as i32,
                total_size,
            })
            .await?;

        let lock = self.repo_lock(user_id, &request.repository_id);
        let _guard = lock.lock().await;

        let outcome = async {
            self.ledger
                .update_status(op.id, PushStatus::InProgress, None)
                .await?;

            let path = self.store.write(user_id, &request).await?;

            self.catalog
                .upsert(
                    user_id,
                    &request.repository_id,
                    &request.repository_name,
                    &path,
                    &request.commit_hash,
                    request.files.len() as i32,
                    total_size,
                )
                .await?;

            self.ledger
                .update_status(op.id, PushStatus::Completed, Some(unix_timestamp()))
                .await?;
            Ok::<(), ServerError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                tracing::info!(
                    user_id,
                    repository_id = %request.repository_id,
                    operation = op.id,
                    "repository pushed"
                );
                Ok(PushResponse {
                    push_id: op.id,
                    repository_id: request.repository_id,
                    repository_name: request.repository_name,
                    storage_path,
                    status: PushStatus::Completed.as_str().to_string(),
                    file_count: op.file_count,
                    total_size: op.total_size,
                    created_at: op.created_at,
                    message: "Repository pushed successfully".to_string(),
                })
            }
            Err(err) => {
                if let Err(update_err) = self
                    .ledger
                    .update_status(op.id, PushStatus::Failed, Some(unix_timestamp()))
                    .await
                {
                    tracing::error!(
                        operation = op.id,
                        "failed to record push failure: {}",
                        update_err
                    );
                }
                tracing::error!(
                    user_id,
                    repository_id = %request.repository_id,
                    operation = op.id,
                    "push failed: {}",
                    err
                );
                Err(err)
            }
        }
    }

    /// All of the caller's push attempts, most recent first.
    pub async fn push_history(&self, credential: &str) -> Result<Vec<PushResponse>> {
        let user_id = self.verifier.verify(credential).await?;
        let operations = self.ledger.list_for_user(user_id).await?;
        Ok(operations.into_iter().map(to_response).collect())
    }

    /// One push attempt, scoped to the caller.
    pub async fn push_status(&self, credential: &str, push_id: i64) -> Result<PushResponse> {
        let user_id = self.verifier.verify(credential).await?;
        let operation = self.ledger.get(push_id, user_id).await?;
        Ok(to_response(operation))
    }

    /// The caller's repositories, most recently updated first.
    pub async fn list_repositories(&self, credential: &str) -> Result<Vec<RepositoryInfo>> {
        let user_id = self.verifier.verify(credential).await?;
        let rows = self.catalog.list_for_user(user_id).await?;
        Ok(rows.into_iter().map(RepositoryInfo::from).collect())
    }

    /// Relative paths stored for one of the caller's repositories.
    pub async fn list_repository_files(
        &self,
        credential: &str,
        repository_id: &str,
    ) -> Result<Vec<String>> {
        let user_id = self.verifier.verify(credential).await?;
        self.catalog.get(user_id, repository_id).await?;

        if !self.store.exists(user_id, repository_id).await? {
            tracing::warn!(
                user_id,
                repository_id,
                "catalog row present but storage tree missing"
            );
            return Ok(Vec::new());
        }
        Ok(self.store.list_paths(user_id, repository_id).await?)
    }

    /// Delete a repository's storage and catalog row. Ledger history for the
    /// repository is preserved.
    pub async fn delete_repository(&self, credential: &str, repository_id: &str) -> Result<()> {
        let user_id = self.verifier.verify(credential).await?;
        self.catalog.get(user_id, repository_id).await?;

        let lock = self.repo_lock(user_id, repository_id);
        let _guard = lock.lock().await;

        self.store.delete(user_id, repository_id).await?;
        self.catalog.delete(user_id, repository_id).await?;

        tracing::info!(user_id, repository_id, "repository deleted");
        Ok(())
    }
}

fn to_response(op: push_operation::Model) -> PushResponse {
    let message = match PushStatus::parse(&op.status) {
        Some(PushStatus::Completed) => "Repository pushed successfully".to_string(),
        _ => format!("Push operation {}", op.status.to_lowercase()),
    };
    PushResponse {
        push_id: op.id,
        repository_id: op.repository_id,
        repository_name: op.repository_name,
        storage_path: op.storage_path,
        status: op.status,
        file_count: op.file_count,
        total_size: op.total_size,
        created_at: op.created_at,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{FileEntry, FileKind};
    use crate::auth::testing::StaticAuthProvider;
    use crate::db;
    use crate::storage::{LocalStorage, StorageBackend, StorageError, StorageResult};
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::TempDir;

    const ALICE: &str = "alice-token";
    const BOB: &str = "bob-token";

    /// Delegates to local storage but fails any put whose key ends with the
    /// configured suffix, to exercise mid-upload failures.
    struct FlakyStorage {
        inner: LocalStorage,
        fail_suffix: String,
    }

    #[async_trait]
    impl StorageBackend for FlakyStorage {
        async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
            if key.ends_with(&self.fail_suffix) {
                return Err(StorageError::Backend("injected write failure".to_string()));
            }
            self.inner.put(key, data).await
        }

        async fn get(&self, key: &str) -> StorageResult<Bytes> {
            self.inner.get(key).await
        }

        async fn delete_prefix(&self, prefix: &str) -> StorageResult<()> {
            self.inner.delete_prefix(prefix).await
        }

        async fn exists_prefix(&self, prefix: &str) -> StorageResult<bool> {
            self.inner.exists_prefix(prefix).await
        }

        async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
            self.inner.list(prefix).await
        }
    }

    async fn service(backend: Arc<dyn StorageBackend>) -> PushService {
        let db = Arc::new(db::connect_memory().await.unwrap());
        let provider = Arc::new(StaticAuthProvider::with_users(&[(ALICE, 1), (BOB, 2)]));
        PushService::new(
            IdentityVerifier::new(provider),
            RepoStore::new(backend, "vega-push"),
            OperationLedger::new(db.clone()),
            RepositoryCatalog::new(db),
        )
    }

    async fn local_service(dir: &TempDir) -> PushService {
        service(Arc::new(LocalStorage::new(dir.path().to_path_buf()))).await
    }

    fn entry(path: &str, content: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            content: content.to_string(),
            hash: String::new(),
            size: content.len() as i64,
            kind: FileKind::Blob,
        }
    }

    fn request(commit: &str, files: Vec<FileEntry>) -> PushRequest {
        PushRequest {
            repository_id: "repo-1".to_string(),
            repository_name: "Demo".to_string(),
            commit_hash: commit.to_string(),
            files,
        }
    }

    #[tokio::test]
    async fn test_push_completes_and_stores_files() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(LocalStorage::new(dir.path().to_path_buf()));
        let service = service(backend.clone()).await;

        let response = service
            .push_repository(ALICE, request("abc123", vec![entry("a.txt", "hi")]))
            .await
            .unwrap();

        assert_eq!(response.status, "COMPLETED");
        assert_eq!(response.file_count, 1);
        assert_eq!(response.total_size, 2);
        assert_eq!(response.storage_path, "vega-push/1/repo-1");
        assert_eq!(response.message, "Repository pushed successfully");

        // Stored bytes match pushed bytes
        let stored = backend.get("vega-push/1/repo-1/a.txt").await.unwrap();
        assert_eq!(stored, Bytes::from("hi"));

        // Ledger reached COMPLETED with a completion timestamp
        let status = service.push_status(ALICE, response.push_id).await.unwrap();
        assert_eq!(status.status, "COMPLETED");

        // Exactly one catalog row with the request's values
        let repos = service.list_repositories(ALICE).await.unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].repository_id, "repo-1");
        assert_eq!(repos[0].last_commit_hash, "abc123");
        assert_eq!(repos[0].file_count, 1);
        assert_eq!(repos[0].total_size, 2);
    }

    #[tokio::test]
    async fn test_failed_upload_marks_ledger_failed_and_skips_catalog() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FlakyStorage {
            inner: LocalStorage::new(dir.path().to_path_buf()),
            fail_suffix: "b.txt".to_string(),
        });
        let service = service(backend.clone()).await;

        let err = service
            .push_repository(
                ALICE,
                request("abc123", vec![entry("a.txt", "one"), entry("b.txt", "two")]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::UploadFailed(_)));

        // The attempt is durably recorded as FAILED
        let history = service.push_history(ALICE).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "FAILED");
        assert_eq!(history[0].message, "Push operation failed");

        // No catalog row was created
        assert!(service.list_repositories(ALICE).await.unwrap().is_empty());

        // Files before the failure were still written
        assert_eq!(
            backend.get("vega-push/1/repo-1/a.txt").await.unwrap(),
            Bytes::from("one")
        );
    }

    #[tokio::test]
    async fn test_sequential_repush_updates_catalog_appends_ledger() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir).await;

        let first = service
            .push_repository(ALICE, request("commit-1", vec![entry("a.txt", "v1")]))
            .await
            .unwrap();
        let second = service
            .push_repository(ALICE, request("commit-2", vec![entry("a.txt", "v2-longer")]))
            .await
            .unwrap();

        let repos = service.list_repositories(ALICE).await.unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].last_commit_hash, "commit-2");
        assert_eq!(repos[0].total_size, 9);

        // Reverse chronological history, both attempts kept
        let history = service.push_history(ALICE).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].push_id, second.push_id);
        assert_eq!(history[1].push_id, first.push_id);
    }

    #[tokio::test]
    async fn test_ownership_isolation() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir).await;

        let response = service
            .push_repository(ALICE, request("abc123", vec![entry("a.txt", "hi")]))
            .await
            .unwrap();

        assert!(matches!(
            service.push_status(BOB, response.push_id).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_repository(BOB, "repo-1").await,
            Err(ServerError::NotFound(_))
        ));

        // Alice's repository is untouched by Bob's attempts
        assert_eq!(service.list_repositories(ALICE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_list_pushes_cleanly() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir).await;

        let response = service
            .push_repository(ALICE, request("abc123", vec![]))
            .await
            .unwrap();

        assert_eq!(response.status, "COMPLETED");
        assert_eq!(response.file_count, 0);
        assert_eq!(response.total_size, 0);

        // Only the metadata marker exists
        let files = service.list_repository_files(ALICE, "repo-1").await.unwrap();
        assert_eq!(files, vec![crate::storage::METADATA_MARKER.to_string()]);
    }

    #[tokio::test]
    async fn test_total_size_is_sum_of_declared_sizes() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir).await;

        // Declared sizes are trusted, not recomputed from content
        let mut big = entry("a.txt", "hi");
        big.size = 1000;
        let response = service
            .push_repository(ALICE, request("abc123", vec![big, entry("b.txt", "four")]))
            .await
            .unwrap();

        assert_eq!(response.total_size, 1004);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_any_ledger_write() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir).await;

        let mut bad = request("abc123", vec![entry("a.txt", "hi")]);
        bad.repository_id = String::new();
        assert!(matches!(
            service.push_repository(ALICE, bad).await,
            Err(ServerError::ValidationFailed(_))
        ));

        let mut escape = request("abc123", vec![entry("a.txt", "hi")]);
        escape.files[0].path = "../../etc/passwd".to_string();
        assert!(matches!(
            service.push_repository(ALICE, escape).await,
            Err(ServerError::ValidationFailed(_))
        ));

        // Neither attempt left a trace
        assert!(service.push_history(ALICE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_credential_is_rejected_without_a_record() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir).await;

        assert!(matches!(
            service
                .push_repository("not-a-token", request("abc123", vec![]))
                .await,
            Err(ServerError::Unauthorized)
        ));
        assert!(matches!(
            service.push_history("not-a-token").await,
            Err(ServerError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_identity() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(db::connect_memory().await.unwrap());
        let mut provider = StaticAuthProvider::with_users(&[(ALICE, 1)]);
        provider.omit_profile_id = true;
        let service = PushService::new(
            IdentityVerifier::new(Arc::new(provider)),
            RepoStore::new(Arc::new(LocalStorage::new(dir.path().to_path_buf())), "vega-push"),
            OperationLedger::new(db.clone()),
            RepositoryCatalog::new(db),
        );

        assert!(matches!(
            service.push_repository(ALICE, request("abc123", vec![])).await,
            Err(ServerError::IdentityResolutionFailed)
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_storage_and_catalog_but_not_history() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(LocalStorage::new(dir.path().to_path_buf()));
        let service = service(backend.clone()).await;

        service
            .push_repository(ALICE, request("abc123", vec![entry("a.txt", "hi")]))
            .await
            .unwrap();

        service.delete_repository(ALICE, "repo-1").await.unwrap();

        assert!(!backend.exists_prefix("vega-push/1/repo-1").await.unwrap());
        assert!(service.list_repositories(ALICE).await.unwrap().is_empty());

        // Operation history survives the delete
        let history = service.push_history(ALICE).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "COMPLETED");
    }

    #[tokio::test]
    async fn test_delete_never_pushed_repository_is_not_found() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir).await;

        assert!(matches!(
            service.delete_repository(ALICE, "repo-1").await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_repository_files() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir).await;

        service
            .push_repository(
                ALICE,
                request("abc123", vec![entry("a.txt", "hi"), entry("src/lib.rs", "x")]),
            )
            .await
            .unwrap();

        let files = service.list_repository_files(ALICE, "repo-1").await.unwrap();
        assert_eq!(
            files,
            vec![
                crate::storage::METADATA_MARKER.to_string(),
                "a.txt".to_string(),
                "src/lib.rs".to_string(),
            ]
        );

        assert!(matches!(
            service.list_repository_files(ALICE, "never-pushed").await,
            Err(ServerError::NotFound(_))
        ));
    }
}
