//! HTTP handlers for the catalog operations.
//!
//! Thin request/response shims: parse and validate input, call
//! `CatalogService`, serialize the result. All policy lives in the service
//! layer.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::ApiError;
use crate::models::{download_event::DownloadEvent, file_record::FileRecord, timestamp};
use crate::services::catalog_service::CatalogService;

const DEFAULT_PAGE: usize = 50;
const MAX_PAGE: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub content_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub upload_url: String,
    pub file_id: Uuid,
    pub key: String,
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    pub file_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub download_url: String,
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
    /// False when the grant was issued but the audit append failed.
    pub ledger_recorded: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ListFilesResponse {
    pub items: Vec<FileRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagsRequest {
    pub file_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub file_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub items: Vec<DownloadEvent>,
}

/// POST `/files/upload` — register a file and return a write grant.
///
/// The body is optional: a bodyless request gets the default content type
/// rather than a media-type rejection.
pub async fn request_upload(
    State(catalog): State<CatalogService>,
    principal: Principal,
    body: Option<Json<UploadRequest>>,
) -> Result<Json<UploadResponse>, ApiError> {
    let content_type = body.and_then(|Json(b)| b.content_type);
    let ticket = catalog
        .request_upload(&principal.0, content_type.as_deref())
        .await?;
    Ok(Json(UploadResponse {
        upload_url: ticket.grant.url,
        file_id: ticket.file_id,
        key: ticket.key,
        expires_at: ticket.grant.expires_at,
    }))
}

/// GET `/files/download?fileId=` — return a read grant, recording it.
pub async fn request_download(
    State(catalog): State<CatalogService>,
    principal: Principal,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let file_id = parse_file_id(query.file_id.as_deref())?;
    let ticket = catalog.request_download(&principal.0, &file_id).await?;
    Ok(Json(DownloadResponse {
        download_url: ticket.grant.url,
        expires_at: ticket.grant.expires_at,
        ledger_recorded: ticket.ledger_recorded,
    }))
}

/// GET `/files?limit=` — the caller's files, newest first.
pub async fn list_files(
    State(catalog): State<CatalogService>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListFilesResponse>, ApiError> {
    let items = catalog
        .list_files(&principal.0, page_limit(query.limit))
        .await?;
    Ok(Json(ListFilesResponse { items }))
}

/// POST `/files/tags` — replace a file's tag set.
pub async fn update_tags(
    State(catalog): State<CatalogService>,
    principal: Principal,
    Json(body): Json<UpdateTagsRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let file_id = parse_file_id(body.file_id.as_deref())?;
    let tags = body
        .tags
        .ok_or_else(|| ApiError::BadRequest("tags[] is required".into()))?;
    catalog.update_tags(&principal.0, &file_id, tags).await?;
    Ok(Json(AckResponse { ok: true }))
}

/// GET `/files/history?fileId=&limit=` — a file's download ledger.
pub async fn get_history(
    State(catalog): State<CatalogService>,
    principal: Principal,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let file_id = parse_file_id(query.file_id.as_deref())?;
    let items = catalog
        .get_history(&principal.0, &file_id, page_limit(query.limit))
        .await?;
    Ok(Json(HistoryResponse { items }))
}

fn parse_file_id(raw: Option<&str>) -> Result<Uuid, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("fileId is required".into()))?;
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::BadRequest(format!("fileId `{raw}` is not a valid identifier")))
}

fn page_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
}
