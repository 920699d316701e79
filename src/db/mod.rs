use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, SqlErr, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::models::{Session, SyncFile, User};

pub mod migrator;
pub mod repositories;
pub mod timestamp;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn session_repo(&self) -> repositories::session::SessionRepository {
        repositories::session::SessionRepository::new(self.conn.clone())
    }

    fn sync_file_repo(&self) -> repositories::sync_file::SyncFileRepository {
        repositories::sync_file::SyncFileRepository::new(self.conn.clone())
    }

    pub async fn create_user(&self, username: &str, email: &str, passhash: &str) -> Result<User> {
        self.user_repo().create(username, email, passhash).await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn update_username(&self, id: i64, username: &str) -> Result<bool> {
        self.user_repo().update_username(id, username).await
    }

    pub async fn update_email(&self, id: i64, email: &str) -> Result<bool> {
        self.user_repo().update_email(id, email).await
    }

    pub async fn update_passhash(&self, id: i64, passhash: &str) -> Result<bool> {
        self.user_repo().update_passhash(id, passhash).await
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    pub async fn session_key_exists(&self, session_key: &str) -> Result<bool> {
        self.session_repo().key_exists(session_key).await
    }

    pub async fn insert_session(
        &self,
        session_key: &str,
        user_id: i64,
        expires: DateTime<Utc>,
    ) -> Result<Session> {
        self.session_repo()
            .insert(session_key, user_id, expires)
            .await
    }

    pub async fn get_session(&self, session_key: &str) -> Result<Option<Session>> {
        self.session_repo().get_by_key(session_key).await
    }

    pub async fn delete_session(&self, session_key: &str) -> Result<u64> {
        self.session_repo().delete_by_key(session_key).await
    }

    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        self.session_repo().delete_expired(now).await
    }

    pub async fn count_sessions_for_user(&self, user_id: i64) -> Result<u64> {
        self.session_repo().count_for_user(user_id).await
    }

    pub async fn create_sync_file(
        &self,
        user_id: i64,
        filepath: &str,
        etag: &str,
    ) -> Result<SyncFile> {
        self.sync_file_repo().create(user_id, filepath, etag).await
    }

    pub async fn get_sync_file(&self, id: i64) -> Result<Option<SyncFile>> {
        self.sync_file_repo().get_by_id(id).await
    }

    pub async fn get_sync_file_by_path(
        &self,
        user_id: i64,
        filepath: &str,
    ) -> Result<Option<SyncFile>> {
        self.sync_file_repo().get_by_path(user_id, filepath).await
    }

    pub async fn list_sync_files(&self, user_id: i64) -> Result<Vec<SyncFile>> {
        self.sync_file_repo().list_for_user(user_id).await
    }

    pub async fn update_sync_file_etag(
        &self,
        user_id: i64,
        filepath: &str,
        etag: &str,
    ) -> Result<Option<SyncFile>> {
        self.sync_file_repo()
            .update_etag(user_id, filepath, etag)
            .await
    }

    pub async fn update_sync_file_path(
        &self,
        user_id: i64,
        filepath: &str,
        new_filepath: &str,
    ) -> Result<Option<SyncFile>> {
        self.sync_file_repo()
            .update_path(user_id, filepath, new_filepath)
            .await
    }

    pub async fn delete_sync_file(&self, user_id: i64, filepath: &str) -> Result<bool> {
        self.sync_file_repo().delete(user_id, filepath).await
    }
}

/// Returns the constraint message when `err` was caused by a UNIQUE violation.
#[must_use]
pub fn unique_violation(err: &anyhow::Error) -> Option<String> {
    err.chain().find_map(|cause| {
        match cause.downcast_ref::<DbErr>()?.sql_err()? {
            SqlErr::UniqueConstraintViolation(message) => Some(message),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Store {
        Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_user_crud() {
        let store = store().await;
        let user = store
            .create_user("alice", "alice@example.com", "$argon2id$fake")
            .await
            .unwrap();
        assert!(user.id > 0);

        let by_name = store.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.email, "alice@example.com");
        assert!(store.get_user_by_email("nobody@example.com").await.unwrap().is_none());

        assert!(store.update_email(user.id, "a@example.com").await.unwrap());
        assert!(!store.update_email(user.id + 100, "x@example.com").await.unwrap());
        let reloaded = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.email, "a@example.com");

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(store.get_user(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let store = store().await;
        store.create_user("bob", "bob@example.com", "h").await.unwrap();

        let err = store
            .create_user("bob", "other@example.com", "h")
            .await
            .unwrap_err();
        let message = unique_violation(&err).unwrap();
        assert!(message.contains("username"), "{message}");

        let err = store
            .create_user("bobby", "bob@example.com", "h")
            .await
            .unwrap_err();
        assert!(unique_violation(&err).unwrap().contains("email"));
    }

    #[tokio::test]
    async fn test_expired_sessions_are_swept() {
        let store = store().await;
        let user = store.create_user("carol", "c@example.com", "h").await.unwrap();
        let now = timestamp::now();

        store
            .insert_session("old", user.id, now - chrono::Duration::minutes(1))
            .await
            .unwrap();
        store
            .insert_session("fresh", user.id, now + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 1);
        assert!(store.get_session("old").await.unwrap().is_none());
        let fresh = store.get_session("fresh").await.unwrap().unwrap();
        assert_eq!(fresh.user_id, user.id);
    }

    #[tokio::test]
    async fn test_deleting_user_cascades() {
        let store = store().await;
        let user = store.create_user("dave", "d@example.com", "h").await.unwrap();
        store
            .insert_session("k", user.id, timestamp::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        store.create_sync_file(user.id, "a.md", "etag").await.unwrap();

        store.delete_user(user.id).await.unwrap();

        assert_eq!(store.count_sessions_for_user(user.id).await.unwrap(), 0);
        assert!(store.list_sync_files(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filepaths_are_unique_per_user() {
        let store = store().await;
        let a = store.create_user("erin", "e@example.com", "h").await.unwrap();
        let b = store.create_user("frank", "f@example.com", "h").await.unwrap();

        store.create_sync_file(a.id, "notes/today.md", "1").await.unwrap();
        store.create_sync_file(b.id, "notes/today.md", "2").await.unwrap();

        let err = store
            .create_sync_file(a.id, "notes/today.md", "3")
            .await
            .unwrap_err();
        assert!(unique_violation(&err).is_some());

        store.create_sync_file(a.id, "b.md", "4").await.unwrap();
        let err = store
            .update_sync_file_path(a.id, "b.md", "notes/today.md")
            .await
            .unwrap_err();
        assert!(unique_violation(&err).is_some());

        let listed: Vec<_> = store
            .list_sync_files(a.id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.filepath)
            .collect();
        assert_eq!(listed, vec!["b.md", "notes/today.md"]);
    }
}
