//! Repository metadata entity: current known state of a repository,
//! at most one row per (user_id, repository_id).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "repository_metadata")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub repository_id: String,
    pub user_id: i64,
    pub repository_name: String,
    pub storage_path: String,
    /// Commit hash of the most recent successful push
    pub last_commit_hash: String,
    pub file_count: i32,
    pub total_size: i64,
    /// Last successful push timestamp (unix seconds)
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
