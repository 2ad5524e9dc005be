//! Represents a file registered in the catalog.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timestamp;

/// The single metadata record for one file.
///
/// Created when an upload grant is issued, mutated only by tag updates, and
/// never deleted. The record describes the object; the bytes live in the
/// external object store under `{ownerId}/{fileId}`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Server-generated identifier, immutable for the record's lifetime.
    pub file_id: Uuid,

    /// Principal that created the file; immutable after creation.
    pub owner_id: String,

    /// Declared MIME type, captured at upload-grant time.
    pub content_type: String,

    /// Creation instant; doubles as the reverse-index sort key.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,

    /// User-supplied tags. Updates replace the whole set, never merge.
    pub tags: BTreeSet<String>,

    /// Version descriptors. Reserved; always empty in this release.
    pub versions: Vec<FileVersion>,
}

/// One stored version of a file's content. Reserved for future use.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub version_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}
