//! Service layer: the key-value substrate, the metadata schema above it,
//! grant signing, the download ledger, and request orchestration.

pub mod catalog_service;
pub mod download_ledger;
pub mod grant_issuer;
pub mod kv_store;
pub mod metadata_repository;

#[cfg(test)]
pub(crate) mod test_support;
