//! Shared fixtures for service-layer tests: an in-memory SQLite store with
//! the real migration applied, and a catalog wired against dummy signing
//! material.

use std::sync::Arc;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::config::ObjectStoreConfig;
use crate::services::catalog_service::CatalogService;
use crate::services::download_ledger::DownloadLedger;
use crate::services::grant_issuer::GrantIssuer;
use crate::services::kv_store::KvStore;
use crate::services::metadata_repository::{BY_OWNER_INDEX, FileMetadataRepository};

/// Pool over a private in-memory database with the schema applied.
///
/// A single connection keeps every statement on the same `:memory:`
/// database.
pub async fn memory_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    for stmt in include_str!("../../migrations/0001_init.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(stmt).execute(&pool).await.expect("schema");
    }
    Arc::new(pool)
}

pub async fn memory_kv() -> KvStore {
    KvStore::new(memory_pool().await, vec![BY_OWNER_INDEX])
}

pub async fn memory_repo() -> FileMetadataRepository {
    FileMetadataRepository::new(memory_kv().await)
}

pub fn test_issuer() -> GrantIssuer {
    GrantIssuer::new(ObjectStoreConfig {
        endpoint: "http://localhost:9000".into(),
        bucket: "files".into(),
        region: "us-east-1".into(),
        access_key: "test-access-key".into(),
        secret_key: "test-secret-key".into(),
        grant_ttl_secs: 300,
    })
}

pub async fn test_catalog() -> CatalogService {
    let repo = memory_repo().await;
    let ledger = DownloadLedger::new(repo.clone());
    CatalogService::new(repo, ledger, test_issuer())
}
