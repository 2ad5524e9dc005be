//! Orchestration for the five client-facing catalog operations.
//!
//! Each operation is a single stateless sequence over the repository, the
//! ledger, and the grant issuer. Every dependency error is mapped to the
//! `ApiError` taxonomy at this boundary; nothing below it reaches a client
//! raw.

use std::collections::BTreeSet;

use tracing::warn;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::models::{download_event::DownloadEvent, file_record::FileRecord, grant::AccessGrant};
use crate::services::download_ledger::DownloadLedger;
use crate::services::grant_issuer::GrantIssuer;
use crate::services::metadata_repository::FileMetadataRepository;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Result of a successful upload request: the registered file plus the
/// credential to write its content.
#[derive(Clone, Debug)]
pub struct UploadTicket {
    pub file_id: Uuid,
    pub key: String,
    pub grant: AccessGrant,
}

/// Result of a download request. `ledger_recorded` is false when the grant
/// was issued but the audit append failed; callers decide what to do with
/// that partial success.
#[derive(Clone, Debug)]
pub struct DownloadTicket {
    pub grant: AccessGrant,
    pub ledger_recorded: bool,
}

#[derive(Clone)]
pub struct CatalogService {
    repo: FileMetadataRepository,
    ledger: DownloadLedger,
    grants: GrantIssuer,
}

impl CatalogService {
    pub fn new(repo: FileMetadataRepository, ledger: DownloadLedger, grants: GrantIssuer) -> Self {
        Self {
            repo,
            ledger,
            grants,
        }
    }

    /// Register a new file and hand out a write credential for it.
    ///
    /// The metadata row is created first so a listing immediately after a
    /// successful call already includes the file; if registration fails no
    /// credential is ever issued. Never idempotent: every call yields a
    /// fresh identifier.
    pub async fn request_upload(
        &self,
        principal: &str,
        content_type: Option<&str>,
    ) -> Result<UploadTicket, ApiError> {
        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let record = self.repo.create_file(principal, content_type).await?;
        let grant = self
            .grants
            .issue_upload_grant(principal, &record.file_id, content_type)?;
        Ok(UploadTicket {
            file_id: record.file_id,
            key: grant.key.clone(),
            grant,
        })
    }

    /// Issue a read credential for a file and record the download.
    ///
    /// The signed key is derived from the stored owner, not the requester,
    /// so the grant always addresses the real object. The ledger append is
    /// best-effort relative to issuance: a failed append downgrades the
    /// result instead of discarding the grant.
    pub async fn request_download(
        &self,
        principal: &str,
        file_id: &Uuid,
    ) -> Result<DownloadTicket, ApiError> {
        let owner = self
            .repo
            .owner_of(file_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("file `{file_id}` not found")))?;
        let grant = self.grants.issue_download_grant(&owner, file_id)?;
        let ledger_recorded = match self.ledger.record(file_id, principal).await {
            Ok(_) => true,
            Err(err) => {
                warn!(%file_id, error = %err, "download ledger append failed");
                false
            }
        };
        Ok(DownloadTicket {
            grant,
            ledger_recorded,
        })
    }

    /// The caller's files, newest first.
    pub async fn list_files(
        &self,
        principal: &str,
        limit: usize,
    ) -> Result<Vec<FileRecord>, ApiError> {
        Ok(self.repo.list_files_by_owner(principal, limit).await?)
    }

    /// Replace a file's tags with a well-formed set.
    ///
    /// Duplicates collapse, the empty set is permitted, blank tags are
    /// rejected before the store is touched.
    pub async fn update_tags(
        &self,
        principal: &str,
        file_id: &Uuid,
        tags: Vec<String>,
    ) -> Result<FileRecord, ApiError> {
        if tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(ApiError::BadRequest("tags must be non-empty strings".into()));
        }
        let tags: BTreeSet<String> = tags.into_iter().collect();
        Ok(self.repo.update_tags(file_id, principal, tags).await?)
    }

    /// A file's download ledger, newest first. Only the owner may read it;
    /// anyone else sees the same `NotFound` as for an absent file.
    pub async fn get_history(
        &self,
        principal: &str,
        file_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<DownloadEvent>, ApiError> {
        let owner = self
            .repo
            .owner_of(file_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("file `{file_id}` not found")))?;
        if owner != principal {
            return Err(ApiError::NotFound(format!("file `{file_id}` not found")));
        }
        Ok(self.ledger.history(file_id, limit).await?)
    }

    /// Store connectivity probe for readiness checks.
    pub async fn ping_store(&self) -> Result<(), ApiError> {
        Ok(self.repo.ping().await?)
    }

    /// Signer-material probe for readiness checks.
    pub fn signer_ready(&self) -> Result<(), ApiError> {
        Ok(self.grants.ready()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::grant::GrantMethod;
    use crate::services::kv_store::KvStore;
    use crate::services::metadata_repository::BY_OWNER_INDEX;
    use crate::services::test_support::{memory_pool, test_catalog, test_issuer};

    #[tokio::test]
    async fn upload_registers_before_granting() {
        let catalog = test_catalog().await;
        let ticket = catalog
            .request_upload("u1", Some("image/png"))
            .await
            .unwrap();

        assert_eq!(ticket.key, format!("u1/{}", ticket.file_id));
        assert_eq!(ticket.grant.method, GrantMethod::Put);

        let files = catalog.list_files("u1", 50).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_id, ticket.file_id);
        assert_eq!(files[0].content_type, "image/png");
        assert!(files[0].tags.is_empty());
    }

    #[tokio::test]
    async fn upload_is_never_idempotent() {
        let catalog = test_catalog().await;
        let a = catalog.request_upload("u1", None).await.unwrap();
        let b = catalog.request_upload("u1", None).await.unwrap();
        assert_ne!(a.file_id, b.file_id);
    }

    #[tokio::test]
    async fn upload_defaults_the_content_type() {
        let catalog = test_catalog().await;
        catalog.request_upload("u1", None).await.unwrap();
        let files = catalog.list_files("u1", 50).await.unwrap();
        assert_eq!(files[0].content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn download_grants_against_the_owner_key_and_appends() {
        let catalog = test_catalog().await;
        let ticket = catalog.request_upload("u1", None).await.unwrap();

        let download = catalog
            .request_download("u2", &ticket.file_id)
            .await
            .unwrap();
        assert!(download.ledger_recorded);
        assert_eq!(download.grant.method, GrantMethod::Get);
        // Key derives from the stored owner, not the requester.
        assert_eq!(download.grant.key, format!("u1/{}", ticket.file_id));

        let history = catalog.get_history("u1", &ticket.file_id, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].downloaded_by, "u2");
    }

    #[tokio::test]
    async fn history_grows_by_one_per_download() {
        let catalog = test_catalog().await;
        let ticket = catalog.request_upload("u1", None).await.unwrap();

        for round in 1..=3 {
            catalog.request_download("u1", &ticket.file_id).await.unwrap();
            let history = catalog.get_history("u1", &ticket.file_id, 50).await.unwrap();
            assert_eq!(history.len(), round);
            assert!(history.windows(2).all(|pair| pair[0].at >= pair[1].at));
        }
    }

    #[tokio::test]
    async fn ledger_failure_downgrades_the_download_result() {
        // Metadata lives on a healthy pool; the ledger writes through a
        // repository whose pool is closed, so every append fails.
        let live =
            FileMetadataRepository::new(KvStore::new(memory_pool().await, vec![BY_OWNER_INDEX]));
        let dead_pool = memory_pool().await;
        let dead =
            FileMetadataRepository::new(KvStore::new(dead_pool.clone(), vec![BY_OWNER_INDEX]));
        dead_pool.close().await;
        let catalog = CatalogService::new(live.clone(), DownloadLedger::new(dead), test_issuer());

        let ticket = catalog.request_upload("u1", None).await.unwrap();
        let download = catalog
            .request_download("u2", &ticket.file_id)
            .await
            .unwrap();

        // The grant survives the failed append and stays correctly scoped.
        assert!(!download.ledger_recorded);
        assert_eq!(download.grant.method, GrantMethod::Get);
        assert_eq!(download.grant.key, format!("u1/{}", ticket.file_id));

        // Nothing was recorded.
        let history = live.get_history(&ticket.file_id, 50).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn download_of_unknown_file_is_not_found() {
        let catalog = test_catalog().await;
        let err = catalog
            .request_download("u1", &Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn tags_collapse_duplicates_and_replace() {
        let catalog = test_catalog().await;
        let ticket = catalog.request_upload("u1", None).await.unwrap();

        let updated = catalog
            .update_tags(
                "u1",
                &ticket.file_id,
                vec!["a".into(), "b".into(), "a".into()],
            )
            .await
            .unwrap();
        let expected: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
        assert_eq!(updated.tags, expected);

        let cleared = catalog
            .update_tags("u1", &ticket.file_id, Vec::new())
            .await
            .unwrap();
        assert!(cleared.tags.is_empty());
    }

    #[tokio::test]
    async fn blank_tags_are_rejected() {
        let catalog = test_catalog().await;
        let ticket = catalog.request_upload("u1", None).await.unwrap();
        let err = catalog
            .update_tags("u1", &ticket.file_id, vec!["ok".into(), "  ".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn tag_update_by_non_owner_is_not_found() {
        let catalog = test_catalog().await;
        let ticket = catalog.request_upload("u1", None).await.unwrap();
        let err = catalog
            .update_tags("u2", &ticket.file_id, vec!["x".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn history_is_gated_on_ownership() {
        let catalog = test_catalog().await;
        let ticket = catalog.request_upload("u1", None).await.unwrap();
        catalog.request_download("u2", &ticket.file_id).await.unwrap();

        let err = catalog
            .get_history("u2", &ticket.file_id, 50)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
