//! Push operation entity: one row per push attempt, append-only.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "push_operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who made the push attempt
    pub user_id: i64,
    /// Caller-chosen repository id
    pub repository_id: String,
    pub repository_name: String,
    /// Deterministic storage root the push wrote (or was writing) to
    pub storage_path: String,
    /// PENDING | IN_PROGRESS | COMPLETED | FAILED
    pub status: String,
    pub file_count: i32,
    pub total_size: i64,
    /// Creation timestamp (unix seconds)
    pub created_at: i64,
    /// Set when the operation reaches a terminal status
    pub completed_at: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
