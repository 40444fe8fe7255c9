use crate::adapters::directory::DirectoryError;
use crate::adapters::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Authentication failed")]
    AuthError,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidArgument(msg) => {
                tracing::debug!(message = %msg, "Invalid argument");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::AuthError => {
                tracing::debug!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Self::PermissionDenied => {
                tracing::debug!("Permission denied");
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }
            Self::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            Self::Conflict(msg) => {
                tracing::debug!(message = %msg, "Conflict");
                (StatusCode::CONFLICT, msg)
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            Self::Store(e) => {
                tracing::error!(error = %e, "Content store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            Self::Directory(e) => {
                tracing::error!(error = %e, "Recipient directory error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
