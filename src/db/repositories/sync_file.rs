use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::db::timestamp;
use crate::entities::file_syncs;
use crate::models::SyncFile;

impl TryFrom<file_syncs::Model> for SyncFile {
    type Error = anyhow::Error;

    fn try_from(model: file_syncs::Model) -> Result<Self> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            created_at: timestamp::parse(&model.created_at)?,
            updated_at: timestamp::parse(&model.updated_at)?,
            filepath: model.filepath,
            etag: model.etag,
        })
    }
}

pub struct SyncFileRepository {
    conn: DatabaseConnection,
}

impl SyncFileRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, user_id: i64, filepath: &str, etag: &str) -> Result<SyncFile> {
        let now = timestamp::format(timestamp::now());
        let active = file_syncs::ActiveModel {
            filepath: Set(filepath.to_string()),
            etag: Set(etag.to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            user_id: Set(user_id),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert sync file")?;

        SyncFile::try_from(model)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<SyncFile>> {
        let model = file_syncs::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query sync file by ID")?;

        model.map(SyncFile::try_from).transpose()
    }

    pub async fn get_by_path(&self, user_id: i64, filepath: &str) -> Result<Option<SyncFile>> {
        let model = self.find_model(user_id, filepath).await?;
        model.map(SyncFile::try_from).transpose()
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<SyncFile>> {
        let models = file_syncs::Entity::find()
            .filter(file_syncs::Column::UserId.eq(user_id))
            .order_by_asc(file_syncs::Column::Filepath)
            .all(&self.conn)
            .await
            .context("Failed to list sync files")?;

        models.into_iter().map(SyncFile::try_from).collect()
    }

    /// Stores a new fingerprint and bumps `updated_at`.
    pub async fn update_etag(
        &self,
        user_id: i64,
        filepath: &str,
        etag: &str,
    ) -> Result<Option<SyncFile>> {
        let Some(model) = self.find_model(user_id, filepath).await? else {
            return Ok(None);
        };

        let mut active: file_syncs::ActiveModel = model.into();
        active.etag = Set(etag.to_string());
        active.updated_at = Set(timestamp::format(timestamp::now()));
        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update sync file etag")?;

        SyncFile::try_from(model).map(Some)
    }

    /// Moves a row to a new logical path. A clash with another row of the
    /// same user fails on the `(user_id, filepath)` unique index.
    pub async fn update_path(
        &self,
        user_id: i64,
        filepath: &str,
        new_filepath: &str,
    ) -> Result<Option<SyncFile>> {
        let Some(model) = self.find_model(user_id, filepath).await? else {
            return Ok(None);
        };

        let mut active: file_syncs::ActiveModel = model.into();
        active.filepath = Set(new_filepath.to_string());
        active.updated_at = Set(timestamp::format(timestamp::now()));
        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update sync file path")?;

        SyncFile::try_from(model).map(Some)
    }

    pub async fn delete(&self, user_id: i64, filepath: &str) -> Result<bool> {
        let result = file_syncs::Entity::delete_many()
            .filter(file_syncs::Column::UserId.eq(user_id))
            .filter(file_syncs::Column::Filepath.eq(filepath))
            .exec(&self.conn)
            .await
            .context("Failed to delete sync file")?;

        Ok(result.rows_affected > 0)
    }

    async fn find_model(&self, user_id: i64, filepath: &str) -> Result<Option<file_syncs::Model>> {
        file_syncs::Entity::find()
            .filter(file_syncs::Column::UserId.eq(user_id))
            .filter(file_syncs::Column::Filepath.eq(filepath))
            .one(&self.conn)
            .await
            .context("Failed to query sync file by path")
    }
}
