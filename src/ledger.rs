//! Operation ledger: the append-only audit trail of push attempts.
//!
//! Every push creates a row before any storage I/O happens, so an attempt is
//! observable even when everything downstream fails. Status transitions are
//! monotonic: `PENDING -> IN_PROGRESS -> {COMPLETED | FAILED}`, and a
//! terminal row is never updated again.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::db::entities::push_operation::{self, Entity as PushOperation};
use crate::db::unix_timestamp;
use crate::error::{Result, ServerError};

/// Lifecycle status of a push operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl PushStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PushStatus::Pending => "PENDING",
            PushStatus::InProgress => "IN_PROGRESS",
            PushStatus::Completed => "COMPLETED",
            PushStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PushStatus::Pending),
            "IN_PROGRESS" => Some(PushStatus::InProgress),
            "COMPLETED" => Some(PushStatus::Completed),
            "FAILED" => Some(PushStatus::Failed),
            _ => None,
        }
    }

    /// COMPLETED and FAILED are final; no operation transitions out of either.
    pub fn is_terminal(self) -> bool {
        matches!(self, PushStatus::Completed | PushStatus::Failed)
    }
}

/// Fields of a new ledger row; id and created_at are assigned on insert.
#[derive(Debug, Clone)]
pub struct OperationDraft {
    pub user_id: i64,
    pub repository_id: String,
    pub repository_name: String,
    pub storage_path: String,
    pub file_count: i32,
    pub total_size: i64,
}

/// Persists and mutates push operation records.
pub struct OperationLedger {
    db: Arc<DatabaseConnection>,
}

impl OperationLedger {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a new PENDING row and return it (with its assigned id).
    pub async fn create(&self, draft: OperationDraft) -> Result<push_operation::Model> {
        let row = push_operation::ActiveModel {
            user_id: Set(draft.user_id),
            repository_id: Set(draft.repository_id),
            repository_name: Set(draft.repository_name),
            storage_path: Set(draft.storage_path),
            status: Set(PushStatus::Pending.as_str().to_string()),
            file_count: Set(draft.file_count),
            total_size: Set(draft.total_size),
            created_at: Set(unix_timestamp()),
            completed_at: Set(None),
            ..Default::default()
        };
        Ok(row.insert(self.db.as_ref()).await?)
    }

    /// Move an operation to a new status, stamping `completed_at` when given.
    /// Runs in a transaction so the read-check-write is atomic with respect
    /// to concurrent readers, and refuses to touch a terminal row.
    pub async fn update_status(
        &self,
        id: i64,
        status: PushStatus,
        completed_at: Option<i64>,
    ) -> Result<()> {
        let txn = self.db.begin().await?;

        let Some(row) = PushOperation::find_by_id(id).one(&txn).await? else {
            return Err(ServerError::NotFound(format!("push operation {}", id)));
        };

        if PushStatus::parse(&row.status).is_some_and(|s| s.is_terminal()) {
            return Err(ServerError::PersistenceFailed(sea_orm::DbErr::Custom(
                format!("push operation {} is already {}", id, row.status),
            )));
        }

        let mut row: push_operation::ActiveModel = row.into();
        row.status = Set(status.as_str().to_string());
        if let Some(at) = completed_at {
            row.completed_at = Set(Some(at));
        }
        row.update(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Fetch one operation, scoped to its owner. An id owned by somebody
    /// else is reported as absent, never as forbidden.
    pub async fn get(&self, id: i64, user_id: i64) -> Result<push_operation::Model> {
        PushOperation::find_by_id(id)
            .filter(push_operation::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("push operation {}", id)))
    }

    /// All of a user's operations, most recent first. `created_at` has
    /// second granularity, so id breaks ties in insertion order.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<push_operation::Model>> {
        Ok(PushOperation::find()
            .filter(push_operation::Column::UserId.eq(user_id))
            .order_by_desc(push_operation::Column::CreatedAt)
            .order_by_desc(push_operation::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }
}
