//! Schema owner for file records and download-ledger entries.
//!
//! Key layout, shared with the `by_owner` index declaration:
//!
//! - file record: `pk = FILE#{fileId}`, `sk = OWNER#{ownerId}`
//! - ledger row:  `pk = FILE#{fileId}`, `sk = DOWNLOAD#{millis}#{suffix}`
//!
//! Binding the owner into the record's sort key means a caller can only
//! address a record for writing if it knows the owner; the repository still
//! checks the stored owner explicitly before any mutation rather than
//! trusting key construction alone.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{download_event::DownloadEvent, file_record::FileRecord};
use crate::services::kv_store::{
    IndexDefinition, Item, ItemKey, KvError, KvStore, Precondition, SortDirection,
};

/// Reverse index over file records: `ownerId` partitions, `createdAt` sorts.
/// Ledger rows carry neither attribute and are never projected.
pub const BY_OWNER_INDEX: IndexDefinition = IndexDefinition {
    name: "by_owner",
    pk_attr: "ownerId",
    sk_attr: "createdAt",
};

const METADATA_SK_PREFIX: &str = "OWNER#";
const LEDGER_SK_PREFIX: &str = "DOWNLOAD#";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("file `{0}` not found")]
    NotFound(Uuid),
    #[error("identifier collision for file `{0}`")]
    Conflict(Uuid),
    #[error(transparent)]
    Store(#[from] KvError),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Clone)]
pub struct FileMetadataRepository {
    kv: KvStore,
}

impl FileMetadataRepository {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Register a new file for `owner_id` and return its record.
    ///
    /// The write is guarded with must-not-exist; a generated-identifier
    /// collision surfaces as `Conflict` and the caller may retry with a
    /// fresh request.
    pub async fn create_file(&self, owner_id: &str, content_type: &str) -> RepoResult<FileRecord> {
        let record = FileRecord {
            file_id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            content_type: content_type.to_string(),
            created_at: Utc::now(),
            tags: BTreeSet::new(),
            versions: Vec::new(),
        };
        let item = Item {
            key: ItemKey::new(file_pk(&record.file_id), owner_sk(owner_id)),
            attrs: serde_json::to_value(&record).map_err(KvError::from)?,
        };
        match self.kv.put(&item, Precondition::MustNotExist).await {
            Ok(()) => Ok(record),
            Err(KvError::PreconditionFailed { .. }) => Err(RepoError::Conflict(record.file_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch the one metadata row for a file, whoever owns it.
    ///
    /// The owner is embedded in the sort key, so this is a prefix query over
    /// the metadata namespace with limit 1 rather than an exact-key read.
    pub async fn get_file(&self, file_id: &Uuid) -> RepoResult<Option<FileRecord>> {
        let items = self
            .kv
            .query(
                &file_pk(file_id),
                METADATA_SK_PREFIX,
                SortDirection::Ascending,
                1,
            )
            .await?;
        items
            .into_iter()
            .next()
            .map(|item| serde_json::from_value(item.attrs).map_err(KvError::from))
            .transpose()
            .map_err(RepoError::from)
    }

    /// Resolve the owning principal of a file, if the record exists.
    pub async fn owner_of(&self, file_id: &Uuid) -> RepoResult<Option<String>> {
        Ok(self.get_file(file_id).await?.map(|record| record.owner_id))
    }

    /// Replace a file's tag set. The caller must be the stored owner.
    ///
    /// Fails with `NotFound` when the record is absent or owned by someone
    /// else; the final write is guarded with must-exist against the exact
    /// `(fileId, ownerId)` key. Last writer wins between concurrent updates.
    pub async fn update_tags(
        &self,
        file_id: &Uuid,
        principal: &str,
        new_tags: BTreeSet<String>,
    ) -> RepoResult<FileRecord> {
        let key = ItemKey::new(file_pk(file_id), owner_sk(principal));
        let existing = self
            .kv
            .get(&key)
            .await?
            .ok_or(RepoError::NotFound(*file_id))?;
        let mut record: FileRecord =
            serde_json::from_value(existing.attrs).map_err(KvError::from)?;
        // The key shape already encodes ownership; still compare against the
        // stored owner rather than trusting key construction alone.
        if record.owner_id != principal {
            return Err(RepoError::NotFound(*file_id));
        }
        record.tags = new_tags;
        let item = Item {
            key,
            attrs: serde_json::to_value(&record).map_err(KvError::from)?,
        };
        match self.kv.put(&item, Precondition::MustExist).await {
            Ok(()) => Ok(record),
            Err(KvError::PreconditionFailed { .. }) => Err(RepoError::NotFound(*file_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// All files owned by `owner_id`, newest first, via the reverse index.
    pub async fn list_files_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> RepoResult<Vec<FileRecord>> {
        let items = self
            .kv
            .query_index(BY_OWNER_INDEX.name, owner_id, SortDirection::Descending, limit)
            .await?;
        items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item.attrs)
                    .map_err(KvError::from)
                    .map_err(RepoError::from)
            })
            .collect()
    }

    /// Append one download event to a file's ledger.
    ///
    /// No referential check against the file record: the ledger accepts
    /// events for ids whose record never existed or was removed out of band.
    pub async fn append_download_event(
        &self,
        file_id: &Uuid,
        downloaded_by: &str,
    ) -> RepoResult<DownloadEvent> {
        let event = DownloadEvent {
            file_id: *file_id,
            downloaded_by: downloaded_by.to_string(),
            at: Utc::now(),
        };
        let item = Item {
            key: ItemKey::new(file_pk(file_id), ledger_sk(&event.at)),
            attrs: serde_json::to_value(&event).map_err(KvError::from)?,
        };
        self.kv.put(&item, Precondition::None).await?;
        Ok(event)
    }

    /// A file's download events, newest first, capped at `limit`.
    pub async fn get_history(
        &self,
        file_id: &Uuid,
        limit: usize,
    ) -> RepoResult<Vec<DownloadEvent>> {
        let items = self
            .kv
            .query(
                &file_pk(file_id),
                LEDGER_SK_PREFIX,
                SortDirection::Descending,
                limit,
            )
            .await?;
        items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item.attrs)
                    .map_err(KvError::from)
                    .map_err(RepoError::from)
            })
            .collect()
    }

    /// Store connectivity probe for readiness checks.
    pub async fn ping(&self) -> RepoResult<()> {
        Ok(self.kv.ping().await?)
    }
}

fn file_pk(file_id: &Uuid) -> String {
    format!("FILE#{file_id}")
}

fn owner_sk(owner_id: &str) -> String {
    format!("{METADATA_SK_PREFIX}{owner_id}")
}

/// Zero-padded millis keep lexicographic order aligned with time; the
/// random suffix breaks ties under coarse clock resolution.
fn ledger_sk(at: &DateTime<Utc>) -> String {
    format!(
        "{LEDGER_SK_PREFIX}{:016}#{}",
        at.timestamp_millis(),
        Uuid::new_v4().simple()
    )
}
