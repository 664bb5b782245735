use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid or expired token")]
    Unauthorized,

    #[error("Unable to determine user identity")]
    IdentityResolutionFailed,

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Database error: {0}")]
    PersistenceFailed(#[from] sea_orm::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        ServerError::UploadFailed(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::IdentityResolutionFailed => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::ValidationFailed(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::UploadFailed(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ServerError::PersistenceFailed(e) => {
                tracing::error!("database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
        };

        (status, message).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
