//! Core data models for the file catalog.
//!
//! These entities represent the logical structure of file records, the
//! download ledger, and issued access grants. They serialize naturally as
//! JSON via `serde`, which is also how they are stored as key-value item
//! attributes.

pub mod download_event;
pub mod file_record;
pub mod grant;
pub(crate) mod timestamp;
