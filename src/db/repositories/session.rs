use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};

use crate::db::timestamp;
use crate::entities::sessions;
use crate::models::Session;

impl TryFrom<sessions::Model> for Session {
    type Error = anyhow::Error;

    fn try_from(model: sessions::Model) -> Result<Self> {
        Ok(Self {
            id: model.id,
            expires: timestamp::parse(&model.expires)?,
            token: model.session_key,
            user_id: model.user_id,
        })
    }
}

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn key_exists(&self, session_key: &str) -> Result<bool> {
        let count = sessions::Entity::find()
            .filter(sessions::Column::SessionKey.eq(session_key))
            .count(&self.conn)
            .await
            .context("Failed to count sessions by key")?;

        Ok(count > 0)
    }

    pub async fn insert(
        &self,
        session_key: &str,
        user_id: i64,
        expires: DateTime<Utc>,
    ) -> Result<Session> {
        let active = sessions::ActiveModel {
            session_key: Set(session_key.to_string()),
            expires: Set(timestamp::format(expires)),
            user_id: Set(user_id),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert session")?;

        Session::try_from(model)
    }

    pub async fn get_by_key(&self, session_key: &str) -> Result<Option<Session>> {
        let model = sessions::Entity::find()
            .filter(sessions::Column::SessionKey.eq(session_key))
            .one(&self.conn)
            .await
            .context("Failed to query session by key")?;

        model.map(Session::try_from).transpose()
    }

    pub async fn delete_by_key(&self, session_key: &str) -> Result<u64> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::SessionKey.eq(session_key))
            .exec(&self.conn)
            .await
            .context("Failed to delete session")?;

        Ok(result.rows_affected)
    }

    /// Deletes every session with `expires <= now`.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::Expires.lte(timestamp::format(now)))
            .exec(&self.conn)
            .await
            .context("Failed to delete expired sessions")?;

        Ok(result.rows_affected)
    }

    pub async fn count_for_user(&self, user_id: i64) -> Result<u64> {
        sessions::Entity::find()
            .filter(sessions::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count sessions for user")
    }
}
