//! API error taxonomy and its HTTP mapping.
//!
//! Five kinds cover every failure a client can see: `BadRequest`,
//! `NotFound`, `Conflict`, `Unavailable`, `Internal`. Dependency errors are
//! converted here, once, so handlers and the orchestration layer can use
//! `?` and no raw store or signer error ever reaches a response body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::grant_issuer::GrantError;
use crate::services::kv_store::KvError;
use crate::services::metadata_repository::RepoError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input. Not retryable.
    #[error("{0}")]
    BadRequest(String),
    /// Referenced record absent, or a write precondition failed. Not
    /// retryable.
    #[error("{0}")]
    NotFound(String),
    /// Generated-identifier collision on create; retry yields a fresh id.
    #[error("{0}")]
    Conflict(String),
    /// Store or signer unreachable; retryable with backoff.
    #[error("{0}")]
    Unavailable(String),
    /// Unexpected failure. The payload is logged, never returned.
    #[error("internal error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));
        (status, body).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(id) => ApiError::NotFound(format!("file `{id}` not found")),
            RepoError::Conflict(id) => {
                ApiError::Conflict(format!("identifier collision for file `{id}`"))
            }
            RepoError::Store(err) => err.into(),
        }
    }
}

impl From<KvError> for ApiError {
    fn from(err: KvError) -> Self {
        match err {
            KvError::Sqlx(err) if is_unreachable(&err) => {
                ApiError::Unavailable("metadata store unreachable".into())
            }
            // A surfaced precondition failure means a repository bug; treat
            // it like any other unexpected error.
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GrantError> for ApiError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::Unavailable(msg) => ApiError::Unavailable(msg),
        }
    }
}

fn is_unreachable(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}
