//! Repository catalog: the current-state view of each user's repositories.
//!
//! One row per (user_id, repository_id), upserted on every successful push.
//! The upsert is a single atomic insert-or-update against the table's unique
//! constraint, so two concurrent pushes to the same repository cannot leave
//! duplicate rows or lose an update between a lookup and a write.

use std::sync::Arc;

use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::db::entities::repository_metadata::{self, Entity as RepositoryMetadata};
use crate::db::unix_timestamp;
use crate::error::{Result, ServerError};

/// Persists repository metadata records.
pub struct RepositoryCatalog {
    db: Arc<DatabaseConnection>,
}

impl RepositoryCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert the repository's metadata, or update every mutable field in
    /// place if a row for (user_id, repository_id) already exists.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        &self,
        user_id: i64,
        repository_id: &str,
        repository_name: &str,
        storage_path: &str,
        commit_hash: &str,
        file_count: i32,
        total_size: i64,
    ) -> Result<()> {
        let row = repository_metadata::ActiveModel {
            repository_id: Set(repository_id.to_string()),
            user_id: Set(user_id),
            repository_name: Set(repository_name.to_string()),
            storage_path: Set(storage_path.to_string()),
            last_commit_hash: Set(commit_hash.to_string()),
            file_count: Set(file_count),
            total_size: Set(total_size),
            updated_at: Set(unix_timestamp()),
            ..Default::default()
        };

        RepositoryMetadata::insert(row)
            .on_conflict(
                OnConflict::columns([
                    repository_metadata::Column::UserId,
                    repository_metadata::Column::RepositoryId,
                ])
                .update_columns([
                    repository_metadata::Column::RepositoryName,
                    repository_metadata::Column::StoragePath,
                    repository_metadata::Column::LastCommitHash,
                    repository_metadata::Column::FileCount,
                    repository_metadata::Column::TotalSize,
                    repository_metadata::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(self.db.as_ref())
            .await?;

        Ok(())
    }

    /// Fetch one repository, scoped to its owner. Not-owned is reported the
    /// same as absent.
    pub async fn get(&self, user_id: i64, repository_id: &str) -> Result<repository_metadata::Model> {
        RepositoryMetadata::find()
            .filter(repository_metadata::Column::UserId.eq(user_id))
            .filter(repository_metadata::Column::RepositoryId.eq(repository_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("repository {}", repository_id)))
    }

    /// All of a user's repositories, most recently updated first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<repository_metadata::Model>> {
        Ok(RepositoryMetadata::find()
            .filter(repository_metadata::Column::UserId.eq(user_id))
            .order_by_desc(repository_metadata::Column::UpdatedAt)
            .order_by_desc(repository_metadata::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    /// Delete a repository's metadata row. Returns whether a row existed.
    pub async fn delete(&self, user_id: i64, repository_id: &str) -> Result<bool> {
        let result = RepositoryMetadata::delete_many()
            .filter(repository_metadata::Column::UserId.eq(user_id))
            .filter(repository_metadata::Column::RepositoryId.eq(repository_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }
}
