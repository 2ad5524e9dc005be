//! Append-only download audit ledger.
//!
//! Thin facade over the repository's ledger namespace; exists so the
//! orchestration layer talks about "recording a download" rather than key
//! schemas.

use uuid::Uuid;

use crate::models::download_event::DownloadEvent;
use crate::services::metadata_repository::{FileMetadataRepository, RepoResult};

#[derive(Clone)]
pub struct DownloadLedger {
    repo: FileMetadataRepository,
}

impl DownloadLedger {
    pub fn new(repo: FileMetadataRepository) -> Self {
        Self { repo }
    }

    /// Record that a download grant was issued to `downloaded_by`.
    pub async fn record(&self, file_id: &Uuid, downloaded_by: &str) -> RepoResult<DownloadEvent> {
        self.repo.append_download_event(file_id, downloaded_by).await
    }

    /// A file's download events, newest first.
    pub async fn history(&self, file_id: &Uuid, limit: usize) -> RepoResult<Vec<DownloadEvent>> {
        self.repo.get_history(file_id, limit).await
    }
}
