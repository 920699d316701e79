//! Domain service for synced files: metadata rows plus the bytes behind them.
//!
//! Rows and bytes are kept consistent on a best-effort basis; there is no
//! transaction spanning the database and the file store.

use thiserror::Error;

use crate::error::ErrorKind;
use crate::filestore::FileStoreError;
use crate::models::SyncFile;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Unknown file, or a path that escapes the user's directory.
    #[error("file not found")]
    NotFound,

    #[error("filepath already exists")]
    FilepathExists,

    #[error(transparent)]
    Store(#[from] FileStoreError),

    #[error("Database error: {0}")]
    Database(String),
}

impl SyncError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::FilepathExists => ErrorKind::Conflict,
            Self::Store(e) => e.kind(),
            Self::Database(_) => ErrorKind::Internal,
        }
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

#[async_trait::async_trait]
pub trait SyncService: Send + Sync {
    /// Stores a new file. Fails with [`SyncError::FilepathExists`] if the
    /// user already has a file at `path`.
    async fn upload(&self, user_id: i64, path: &str, bytes: &[u8])
    -> Result<SyncFile, SyncError>;

    /// Replaces the bytes of an existing file and refreshes its etag.
    async fn update(&self, user_id: i64, path: &str, bytes: &[u8])
    -> Result<SyncFile, SyncError>;

    async fn download(&self, user_id: i64, path: &str) -> Result<(SyncFile, Vec<u8>), SyncError>;

    async fn remove(&self, user_id: i64, path: &str) -> Result<(), SyncError>;

    /// All files of the user, ordered by path.
    async fn list(&self, user_id: i64) -> Result<Vec<SyncFile>, SyncError>;

    async fn rename(&self, user_id: i64, from: &str, to: &str) -> Result<SyncFile, SyncError>;

    /// Deletes every stored byte of the user. Rows are left to the cascade
    /// on user deletion.
    async fn purge_user(&self, user_id: i64) -> Result<(), SyncError>;
}
