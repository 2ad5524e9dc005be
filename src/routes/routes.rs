//! Defines routes for the catalog and access-grant API.
//!
//! ## Structure
//! - `POST /files/upload`          — register a file, return a write grant
//! - `GET  /files/download?fileId=`— return a read grant, record it
//! - `GET  /files`                 — list the caller's files, newest first
//! - `POST /files/tags`            — replace a file's tag set
//! - `GET  /files/history?fileId=` — a file's download ledger (owner only)
//!
//! Every `/files` route expects the gateway-injected `x-principal-id`
//! header. Health endpoints are mounted at the root.

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{
    catalog_handlers::{get_history, list_files, request_download, request_upload, update_tags},
    health_handlers::{healthz, readyz},
};
use crate::services::catalog_service::CatalogService;

/// Build and return the router for all catalog routes.
///
/// The router carries shared state (`CatalogService`) to all handlers.
pub fn routes() -> Router<CatalogService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // catalog operations
        .route("/files", get(list_files))
        .route("/files/upload", post(request_upload))
        .route("/files/download", get(request_download))
        .route("/files/tags", post(update_tags))
        .route("/files/history", get(get_history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PRINCIPAL_HEADER;
    use crate::services::test_support::test_catalog;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        routes().with_state(test_catalog().await)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn upload_request(principal: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/files/upload")
            .header(PRINCIPAL_HEADER, principal)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(principal: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .header(PRINCIPAL_HEADER, principal)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn missing_principal_header_is_bad_request() {
        let app = test_router().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_then_list_roundtrip() {
        let app = test_router().await;

        let response = app
            .clone()
            .oneshot(upload_request("u1", r#"{"contentType":"image/png"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let upload = body_json(response).await;
        let file_id = upload["fileId"].as_str().unwrap().to_string();
        assert_eq!(upload["key"], format!("u1/{file_id}"));
        assert!(
            upload["uploadUrl"]
                .as_str()
                .unwrap()
                .contains("X-Amz-Signature=")
        );

        let response = app.oneshot(get_request("u1", "/files")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listing = body_json(response).await;
        let items = listing["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["fileId"], file_id.as_str());
        assert_eq!(items[0]["contentType"], "image/png");
        assert_eq!(items[0]["tags"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn bodyless_upload_defaults_the_content_type() {
        let app = test_router().await;

        // No body and no content-type header at all.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/files/upload")
                    .header(PRINCIPAL_HEADER, "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let upload = body_json(response).await;
        assert!(upload["fileId"].as_str().is_some());

        let response = app.oneshot(get_request("u1", "/files")).await.unwrap();
        let listing = body_json(response).await;
        assert_eq!(
            listing["items"][0]["contentType"],
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn download_requires_file_id() {
        let app = test_router().await;
        let response = app
            .oneshot(get_request("u1", "/files/download"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn download_then_history_roundtrip() {
        let app = test_router().await;

        let response = app
            .clone()
            .oneshot(upload_request("u1", "{}"))
            .await
            .unwrap();
        let file_id = body_json(response).await["fileId"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(get_request("u2", &format!("/files/download?fileId={file_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let download = body_json(response).await;
        assert_eq!(download["ledgerRecorded"], true);
        assert!(
            download["downloadUrl"]
                .as_str()
                .unwrap()
                .contains(&format!("u1/{file_id}"))
        );

        // Owner reads the ledger.
        let response = app
            .clone()
            .oneshot(get_request("u1", &format!("/files/history?fileId={file_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let history = body_json(response).await;
        let items = history["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["downloadedBy"], "u2");

        // A non-owner sees NotFound.
        let response = app
            .oneshot(get_request("u2", &format!("/files/history?fileId={file_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tag_update_collapses_duplicates() {
        let app = test_router().await;

        let response = app
            .clone()
            .oneshot(upload_request("u1", "{}"))
            .await
            .unwrap();
        let file_id = body_json(response).await["fileId"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/files/tags")
                    .header(PRINCIPAL_HEADER, "u1")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(
                        r#"{{"fileId":"{file_id}","tags":["a","b","a"]}}"#
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["ok"], true);

        let response = app.oneshot(get_request("u1", "/files")).await.unwrap();
        let listing = body_json(response).await;
        assert_eq!(listing["items"][0]["tags"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn healthz_is_always_ok() {
        let app = test_router().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
