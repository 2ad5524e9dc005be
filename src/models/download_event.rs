//! Represents one entry in a file's download ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timestamp;

/// Append-only audit record, written once per issued download grant.
///
/// The ledger keeps no referential link back to the file record beyond the
/// shared primary key component; an event may outlive its record.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DownloadEvent {
    /// The file the grant was issued for.
    pub file_id: Uuid,

    /// Principal the grant was issued to.
    pub downloaded_by: String,

    /// When the grant was issued.
    #[serde(with = "timestamp")]
    pub at: DateTime<Utc>,
}
