//! Represents an issued access grant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// The object-store operation a grant permits.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum GrantMethod {
    /// Write the object once.
    Put,
    /// Read the object.
    Get,
}

impl GrantMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantMethod::Put => "PUT",
            GrantMethod::Get => "GET",
        }
    }
}

/// A time-boxed, bearer-style credential for exactly one operation on
/// exactly one object-store key.
///
/// Possession of `url` is sufficient to perform the operation until
/// `expires_at`; nothing tracks issued grants and nothing can revoke one
/// before it expires naturally.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    /// Presigned URL the client uses directly against the object store.
    pub url: String,

    /// The single permitted HTTP method.
    pub method: GrantMethod,

    /// Object key the grant is scoped to (`{ownerId}/{fileId}`).
    pub key: String,

    /// Natural expiry of the credential.
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
}
