//! `SeaORM` + [`FileStore`] implementation of the `SyncService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{Store, unique_violation};
use crate::filestore::{FileStore, FileStoreError, clean_logical_path};
use crate::models::SyncFile;
use crate::services::sync_service::{SyncError, SyncService};

/// Normalized logical path, used as the row key.
fn logical_key(path: &str) -> Result<String, SyncError> {
    clean_logical_path(path).ok_or(SyncError::NotFound)
}

/// Location in the file store: each user gets a directory named by their ID.
fn physical_path(user_id: i64, key: &str) -> String {
    format!("{user_id}/{key}")
}

fn path_taken_or_store(err: FileStoreError) -> SyncError {
    match err {
        FileStoreError::AlreadyExists => SyncError::FilepathExists,
        other => other.into(),
    }
}

pub struct SeaOrmSyncService {
    store: Store,
    files: Arc<dyn FileStore>,
}

impl SeaOrmSyncService {
    #[must_use]
    pub fn new(store: Store, files: Arc<dyn FileStore>) -> Self {
        Self { store, files }
    }

    async fn existing(&self, user_id: i64, key: &str) -> Result<SyncFile, SyncError> {
        self.store
            .get_sync_file_by_path(user_id, key)
            .await?
            .ok_or(SyncError::NotFound)
    }
}

#[async_trait]
impl SyncService for SeaOrmSyncService {
    async fn upload(
        &self,
        user_id: i64,
        path: &str,
        bytes: &[u8],
    ) -> Result<SyncFile, SyncError> {
        let key = logical_key(path)?;
        if self.store.get_sync_file_by_path(user_id, &key).await?.is_some() {
            return Err(SyncError::FilepathExists);
        }

        let physical = physical_path(user_id, &key);
        self.files
            .save(&physical, bytes)
            .await
            .map_err(path_taken_or_store)?;
        let etag = self.files.fingerprint(&physical).await?;

        match self.store.create_sync_file(user_id, &key, &etag).await {
            Ok(file) => {
                info!(event = "file.uploaded", user_id, size = bytes.len(), "File uploaded");
                Ok(file)
            }
            Err(e) if unique_violation(&e).is_some() => Err(SyncError::FilepathExists),
            Err(e) => {
                if let Err(cleanup) = self.files.delete(&physical).await {
                    warn!(error = %cleanup, user_id, "Failed to remove bytes of unrecorded upload");
                }
                Err(e.into())
            }
        }
    }

    async fn update(
        &self,
        user_id: i64,
        path: &str,
        bytes: &[u8],
    ) -> Result<SyncFile, SyncError> {
        let key = logical_key(path)?;
        self.existing(user_id, &key).await?;

        let physical = physical_path(user_id, &key);
        self.files.save(&physical, bytes).await?;
        let etag = self.files.fingerprint(&physical).await?;

        let file = self
            .store
            .update_sync_file_etag(user_id, &key, &etag)
            .await?
            .ok_or(SyncError::NotFound)?;

        info!(event = "file.updated", user_id, size = bytes.len(), "File updated");
        Ok(file)
    }

    async fn download(&self, user_id: i64, path: &str) -> Result<(SyncFile, Vec<u8>), SyncError> {
        let key = logical_key(path)?;
        let file = self.existing(user_id, &key).await?;
        let bytes = self.files.load(&physical_path(user_id, &key)).await?;
        Ok((file, bytes))
    }

    async fn remove(&self, user_id: i64, path: &str) -> Result<(), SyncError> {
        let key = logical_key(path)?;
        self.existing(user_id, &key).await?;

        match self.files.delete(&physical_path(user_id, &key)).await {
            Ok(()) => {}
            Err(FileStoreError::NotFound) => {
                warn!(user_id, "Removing file row whose bytes were already gone");
            }
            Err(e) => return Err(e.into()),
        }

        self.store.delete_sync_file(user_id, &key).await?;
        info!(event = "file.removed", user_id, "File removed");
        Ok(())
    }

    async fn list(&self, user_id: i64) -> Result<Vec<SyncFile>, SyncError> {
        Ok(self.store.list_sync_files(user_id).await?)
    }

    async fn rename(&self, user_id: i64, from: &str, to: &str) -> Result<SyncFile, SyncError> {
        let from_key = logical_key(from)?;
        let to_key = logical_key(to)?;

        self.existing(user_id, &from_key).await?;
        if self
            .store
            .get_sync_file_by_path(user_id, &to_key)
            .await?
            .is_some()
        {
            return Err(SyncError::FilepathExists);
        }

        let from_physical = physical_path(user_id, &from_key);
        let to_physical = physical_path(user_id, &to_key);
        self.files
            .rename(&from_physical, &to_physical)
            .await
            .map_err(path_taken_or_store)?;

        match self
            .store
            .update_sync_file_path(user_id, &from_key, &to_key)
            .await
        {
            Ok(Some(file)) => {
                info!(event = "file.renamed", user_id, "File renamed");
                Ok(file)
            }
            result => {
                if let Err(e) = self.files.rename(&to_physical, &from_physical).await {
                    warn!(error = %e, user_id, "Failed to move bytes back after failed rename");
                }
                match result {
                    Err(e) if unique_violation(&e).is_some() => Err(SyncError::FilepathExists),
                    Err(e) => Err(e.into()),
                    Ok(_) => Err(SyncError::NotFound),
                }
            }
        }
    }

    async fn purge_user(&self, user_id: i64) -> Result<(), SyncError> {
        match self.files.delete_all(&user_id.to_string()).await {
            Ok(()) => {
                info!(event = "file.purged", user_id, "Removed all stored files of user");
                Ok(())
            }
            Err(FileStoreError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
