pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

pub use handlers::AppState;

/// Create the push API router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/push/repository", post(handlers::push_repository))
        .route("/api/push/history", get(handlers::push_history))
        .route("/api/push/status/:id", get(handlers::push_status))
        .route("/api/repositories", get(handlers::list_repositories))
        .route(
            "/api/repositories/:id/files",
            get(handlers::list_repository_files),
        )
        .route("/api/repositories/:id", delete(handlers::delete_repository))
        .route("/health", get(handlers::health))
}
