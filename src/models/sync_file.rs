use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata for a file synced by a user. `filepath` is the user-facing
/// logical path; `etag` is the hex content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFile {
    pub id: i64,
    pub user_id: i64,
    pub filepath: String,
    pub etag: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
