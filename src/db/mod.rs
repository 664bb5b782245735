//! Database module for SQLite persistence using SeaORM

pub mod entities;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as unix seconds, the timestamp convention for every table.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Initialize database connection and create tables
pub async fn init_database(db_path: &Path) -> Result<DatabaseConnection, DbErr> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    tracing::info!("Connecting to database: {}", db_url);

    connect(&db_url).await
}

/// Connect to a database URL and create tables
pub async fn connect(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(db_url).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Open an in-memory database for tests. Pinned to a single pooled
/// connection: every fresh sqlite `:memory:` connection is a separate
/// database.
#[cfg(test)]
pub async fn connect_memory() -> Result<DatabaseConnection, DbErr> {
    let mut options = sea_orm::ConnectOptions::new("sqlite::memory:".to_owned());
    options.max_connections(1).min_connections(1);
    let db = Database::connect(options).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Create all tables if they don't exist
async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Push operations table: the append-only ledger of push attempts.
    // Rows are created PENDING, mutated through the status state machine,
    // and never deleted.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS push_operations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            repository_id TEXT NOT NULL,
            repository_name TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            file_count INTEGER NOT NULL DEFAULT 0,
            total_size INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        )
        "#
        .to_string(),
    ))
    .await?;

    // Index for per-user history queries
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"CREATE INDEX IF NOT EXISTS idx_push_operations_user ON push_operations(user_id, created_at)"#
            .to_string(),
    ))
    .await?;

    // Repository metadata table: current-state view, one row per
    // (user_id, repository_id). The unique constraint is what makes the
    // catalog's insert-or-update atomic.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS repository_metadata (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repository_id TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            repository_name TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            last_commit_hash TEXT NOT NULL,
            file_count INTEGER NOT NULL DEFAULT 0,
            total_size INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL,
            UNIQUE(user_id, repository_id)
        )
        "#
        .to_string(),
    ))
    .await?;

    // Index for per-user repository listings
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"CREATE INDEX IF NOT EXISTS idx_repository_metadata_user ON repository_metadata(user_id, updated_at)"#
            .to_string(),
    ))
    .await?;

    tracing::info!("Database tables initialized");
    Ok(())
}
