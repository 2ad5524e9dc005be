//! Authenticated-principal extraction.
//!
//! Identity is established upstream: the gateway in front of this service
//! verifies the caller and injects an opaque principal identifier in the
//! `x-principal-id` header. This subsystem performs no validation of that
//! identifier beyond requiring its presence.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::ApiError;

pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Opaque identifier of the already-authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal(pub String);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Principal(value.to_string()))
            .ok_or_else(|| ApiError::BadRequest(format!("{PRINCIPAL_HEADER} header required")))
    }
}
