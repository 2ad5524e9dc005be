//! Access-grant issuance: presigned object-store URLs.
//!
//! A grant is an AWS Signature v4 query-presigned URL scoped to one object
//! key and one method, computed entirely from key material held locally —
//! issuing never touches the store. Grants are bearer credentials: nothing
//! tracks what was issued and nothing can revoke a grant before its expiry.
//!
//! Upload grants additionally sign the declared `Content-Type` header, so
//! the store rejects writes that claim a different type.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ObjectStoreConfig;
use crate::models::grant::{AccessGrant, GrantMethod};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

#[derive(Debug, Error)]
pub enum GrantError {
    #[error("signing material unavailable: {0}")]
    Unavailable(String),
}

pub type GrantResult<T> = Result<T, GrantError>;

#[derive(Clone)]
pub struct GrantIssuer {
    endpoint: String,
    host: String,
    bucket: String,
    region: String,
    access_key: String,
    secret_key: String,
    ttl_secs: u32,
}

impl GrantIssuer {
    pub fn new(config: ObjectStoreConfig) -> Self {
        let host = host_of(&config.endpoint);
        Self {
            endpoint: config.endpoint,
            host,
            bucket: config.bucket,
            region: config.region,
            access_key: config.access_key,
            secret_key: config.secret_key,
            ttl_secs: config.grant_ttl_secs,
        }
    }

    /// The object-store key a file's content lives under.
    pub fn object_key(owner_id: &str, file_id: &Uuid) -> String {
        format!("{owner_id}/{file_id}")
    }

    /// Presigned `PUT` for exactly one object key and declared content type.
    pub fn issue_upload_grant(
        &self,
        owner_id: &str,
        file_id: &Uuid,
        content_type: &str,
    ) -> GrantResult<AccessGrant> {
        let key = Self::object_key(owner_id, file_id);
        self.presign(GrantMethod::Put, &key, Some(content_type))
    }

    /// Presigned `GET` for exactly one object key.
    pub fn issue_download_grant(&self, owner_id: &str, file_id: &Uuid) -> GrantResult<AccessGrant> {
        let key = Self::object_key(owner_id, file_id);
        self.presign(GrantMethod::Get, &key, None)
    }

    /// Verify signing material is present; used by issuance and readiness.
    pub fn ready(&self) -> GrantResult<()> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(GrantError::Unavailable(
                "object-store access key or secret key not configured".into(),
            ));
        }
        Ok(())
    }

    fn presign(
        &self,
        method: GrantMethod,
        key: &str,
        content_type: Option<&str>,
    ) -> GrantResult<AccessGrant> {
        self.ready()?;
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let canonical_uri = format!(
            "/{}/{}",
            uri_encode_path(&self.bucket),
            uri_encode_path(key)
        );
        let (canonical_headers, signed_headers) = match content_type {
            Some(ct) => (
                format!("content-type:{}\nhost:{}\n", ct, self.host),
                "content-type;host",
            ),
            None => (format!("host:{}\n", self.host), "host"),
        };

        // Query parameters in canonical (byte-sorted) order.
        let credential = format!("{}/{}/{}/s3/aws4_request", self.access_key, date_stamp, self.region);
        let query = format!(
            "X-Amz-Algorithm={}&X-Amz-Credential={}&X-Amz-Date={}&X-Amz-Expires={}&X-Amz-SignedHeaders={}",
            ALGORITHM,
            urlencoding::encode(&credential),
            amz_date,
            self.ttl_secs,
            urlencoding::encode(signed_headers),
        );

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            query,
            canonical_headers,
            signed_headers,
            UNSIGNED_PAYLOAD,
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes())),
        );
        let signature = self.signature(&date_stamp, &string_to_sign)?;

        Ok(AccessGrant {
            url: format!(
                "{}{}?{}&X-Amz-Signature={}",
                self.endpoint, canonical_uri, query, signature
            ),
            method,
            key: key.to_string(),
            expires_at: now + Duration::seconds(i64::from(self.ttl_secs)),
        })
    }

    /// Derive the SigV4 signing key chain and sign.
    fn signature(&self, date_stamp: &str, string_to_sign: &str) -> GrantResult<String> {
        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_key).as_bytes(),
            date_stamp.as_bytes(),
        )?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, b"s3")?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        Ok(hex::encode(hmac_sha256(
            &k_signing,
            string_to_sign.as_bytes(),
        )?))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> GrantResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| GrantError::Unavailable(format!("hmac key error: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Percent-encode each path segment, leaving separators intact.
fn uri_encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn host_of(endpoint: &str) -> String {
    let trimmed = endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    trimmed
        .split('/')
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::test_issuer;

    #[test]
    fn upload_grant_scopes_key_method_and_content_type() {
        let issuer = test_issuer();
        let file_id = Uuid::new_v4();
        let grant = issuer
            .issue_upload_grant("u1", &file_id, "image/png")
            .unwrap();

        assert_eq!(grant.key, format!("u1/{file_id}"));
        assert_eq!(grant.method, GrantMethod::Put);
        assert!(grant.url.starts_with(&format!(
            "http://localhost:9000/files/u1/{file_id}?"
        )));
        assert!(grant.url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(grant.url.contains("X-Amz-Credential=test-access-key%2F"));
        assert!(grant.url.contains("X-Amz-Expires=300"));
        // Content type is a signed header on uploads.
        assert!(grant.url.contains("X-Amz-SignedHeaders=content-type%3Bhost"));
        assert!(grant.url.contains("&X-Amz-Signature="));
        assert!(grant.expires_at > Utc::now());
    }

    #[test]
    fn download_grant_signs_host_only() {
        let issuer = test_issuer();
        let file_id = Uuid::new_v4();
        let grant = issuer.issue_download_grant("u1", &file_id).unwrap();

        assert_eq!(grant.method, GrantMethod::Get);
        assert!(grant.url.contains("X-Amz-SignedHeaders=host"));
        assert!(!grant.url.contains("content-type"));
    }

    #[test]
    fn distinct_scopes_get_distinct_signatures() {
        let issuer = test_issuer();
        let file_id = Uuid::new_v4();
        let read = issuer.issue_download_grant("u1", &file_id).unwrap();
        let write = issuer.issue_upload_grant("u1", &file_id, "text/plain").unwrap();

        let sig = |url: &str| {
            url.split("X-Amz-Signature=")
                .nth(1)
                .map(str::to_string)
                .unwrap_or_default()
        };
        assert_ne!(sig(&read.url), sig(&write.url));
    }

    #[test]
    fn missing_signing_material_is_unavailable() {
        let issuer = GrantIssuer::new(crate::config::ObjectStoreConfig {
            endpoint: "http://localhost:9000".into(),
            bucket: "files".into(),
            region: "us-east-1".into(),
            access_key: "ak".into(),
            secret_key: String::new(),
            grant_ttl_secs: 300,
        });
        let err = issuer
            .issue_download_grant("u1", &Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, GrantError::Unavailable(_)));
    }
}
