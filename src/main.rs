mod api;
mod auth;
mod catalog;
mod db;
mod error;
mod ledger;
mod push;
mod storage;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use auth::{HttpAuthProvider, IdentityVerifier};
use catalog::RepositoryCatalog;
use ledger::OperationLedger;
use push::PushService;
use storage::{RepoStore, StorageConfig};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vega_push_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Local working directory: storage root for the local backend and the
    // default home of the sqlite file
    let storage_path = std::env::var("VEGA_STORAGE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("vega-push-storage"));

    // Initialize database
    let db_path = std::env::var("VEGA_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| storage_path.join("vega-push.db"));
    let db = db::init_database(&db_path)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);
    tracing::info!("Database initialized at {:?}", db_path);

    // Pick the blob storage backend: S3-compatible when a bucket is
    // configured, local filesystem otherwise
    let storage_config = match std::env::var("VEGA_S3_BUCKET") {
        Ok(bucket) => match std::env::var("VEGA_S3_ENDPOINT") {
            Ok(endpoint) => StorageConfig::minio(bucket, endpoint),
            Err(_) => {
                let region =
                    std::env::var("VEGA_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
                StorageConfig::s3(bucket, region)
            }
        },
        Err(_) => StorageConfig::local(storage_path.clone()),
    };
    let backend = storage_config.build().await;

    let base = std::env::var("VEGA_STORAGE_BASE").unwrap_or_else(|_| "vega-push".to_string());
    let compress = std::env::var("VEGA_COMPRESS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let store = RepoStore::new(backend, base).with_compression(compress);

    // The user service that verifies credentials and resolves identities
    let user_service_url =
        std::env::var("VEGA_USER_SERVICE_URL").unwrap_or_else(|_| "http://127.0.0.1:8081".into());
    let verifier = IdentityVerifier::new(Arc::new(HttpAuthProvider::new(user_service_url.clone())));

    let state = Arc::new(AppState {
        push: PushService::new(
            verifier,
            store,
            OperationLedger::new(db.clone()),
            RepositoryCatalog::new(db),
        ),
    });

    let app = api::router()
        .with_state(state)
        // Allow large batch pushes (1GB limit)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 1024))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = std::env::var("VEGA_LISTEN_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()
        .expect("Invalid VEGA_LISTEN_ADDR");
    tracing::info!("Vega Push Server starting on http://{}", addr);
    tracing::info!("Verifying credentials against {}", user_service_url);
    tracing::info!("");
    tracing::info!("API Endpoints:");
    tracing::info!("  POST   /api/push/repository     - Push a repository snapshot");
    tracing::info!("  GET    /api/push/history        - List your push attempts");
    tracing::info!("  GET    /api/push/status/:id     - One push attempt");
    tracing::info!("  GET    /api/repositories        - List your repositories");
    tracing::info!("  GET    /api/repositories/:id/files - Stored file paths");
    tracing::info!("  DELETE /api/repositories/:id    - Delete a repository");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
