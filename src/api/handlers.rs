//! HTTP handlers for the push API.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};

use super::types::{PushRequest, PushResponse, RepositoryInfo};
use crate::error::{Result, ServerError};
use crate::push::PushService;

/// Application state shared across handlers
pub struct AppState {
    pub push: PushService,
}

/// Extract the credential from the Authorization header. The raw token is
/// passed through to the push service; a `Bearer ` prefix is stripped.
fn credential(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ServerError::Unauthorized)?
        .to_str()
        .map_err(|_| ServerError::Unauthorized)?;
    Ok(value.strip_prefix("Bearer ").unwrap_or(value))
}

/// POST /api/push/repository
pub async fn push_repository(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>> {
    let token = credential(&headers)?;
    let response = state.push.push_repository(token, request).await?;
    Ok(Json(response))
}

/// GET /api/push/history
pub async fn push_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PushResponse>>> {
    let token = credential(&headers)?;
    Ok(Json(state.push.push_history(token).await?))
}

/// GET /api/push/status/:id
pub async fn push_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(push_id): Path<i64>,
) -> Result<Json<PushResponse>> {
    let token = credential(&headers)?;
    Ok(Json(state.push.push_status(token, push_id).await?))
}

/// GET /api/repositories
pub async fn list_repositories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<RepositoryInfo>>> {
    let token = credential(&headers)?;
    Ok(Json(state.push.list_repositories(token).await?))
}

/// GET /api/repositories/:id/files
pub async fn list_repository_files(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(repository_id): Path<String>,
) -> Result<Json<Vec<String>>> {
    let token = credential(&headers)?;
    Ok(Json(
        state
            .push
            .list_repository_files(token, &repository_id)
            .await?,
    ))
}

/// DELETE /api/repositories/:id
pub async fn delete_repository(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(repository_id): Path<String>,
) -> Result<StatusCode> {
    let token = credential(&headers)?;
    state.push.delete_repository(token, &repository_id).await?;
    Ok(StatusCode::OK)
}

/// Health check
pub async fn health() -> &'static str {
    "OK"
}
