use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Upstream generation error: {0}")]
    UpstreamGeneration(String),

    #[error("Malformed specification: {0}")]
    MalformedSpecification(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Auth(_) => "auth",
            AppError::Validation(_) => "validation",
            AppError::QuotaExceeded(_) => "quota_exceeded",
            AppError::NotFound => "not_found",
            AppError::Forbidden => "forbidden",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::UpstreamGeneration(_) => "upstream_generation",
            AppError::MalformedSpecification(_) => "malformed_specification",
            AppError::Filesystem(_) => "filesystem",
            AppError::Archive(_) => "archive",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            AppError::Auth(ref msg) => (StatusCode::UNAUTHORIZED, msg.as_str()),
            AppError::Validation(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::QuotaExceeded(ref msg) => (StatusCode::FORBIDDEN, msg.as_str()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Resource not found"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Access denied"),
            AppError::InvalidTransition(ref msg) => (StatusCode::CONFLICT, msg.as_str()),
            AppError::UpstreamGeneration(ref msg) => {
                tracing::error!("Upstream generation error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Generation service error")
            }
            AppError::MalformedSpecification(ref msg) => {
                tracing::error!("Malformed specification: {}", msg);
                (StatusCode::BAD_GATEWAY, "Generation service returned an invalid project")
            }
            AppError::Filesystem(ref msg) => {
                tracing::error!("Filesystem error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
            }
            AppError::Archive(ref msg) => {
                tracing::error!("Archive error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Archive error")
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
