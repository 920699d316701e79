//! `SeaORM` implementation of the `SessionService` trait.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::credential::random_bytes;
use crate::db::{Store, timestamp, unique_violation};
use crate::models::Session;
use crate::services::session_service::{SessionError, SessionService};

/// Upper bound on token generation attempts before giving up.
pub const MAX_TOKEN_ATTEMPTS: usize = 8;

pub type KeyGenerator = Arc<dyn Fn() -> String + Send + Sync>;

pub struct SeaOrmSessionService {
    store: Store,
    lifetime: Duration,
    generate_key: KeyGenerator,
}

impl SeaOrmSessionService {
    /// Tokens are `key_bytes` random bytes, base64 without padding.
    #[must_use]
    pub fn new(store: Store, lifetime: Duration, key_bytes: usize) -> Self {
        Self {
            store,
            lifetime,
            generate_key: Arc::new(move || STANDARD_NO_PAD.encode(random_bytes(key_bytes))),
        }
    }

    #[must_use]
    pub fn with_key_generator(mut self, generate_key: KeyGenerator) -> Self {
        self.generate_key = generate_key;
        self
    }
}

#[async_trait]
impl SessionService for SeaOrmSessionService {
    async fn create_session(&self, user_id: i64) -> Result<Session, SessionError> {
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let token = (self.generate_key)();

            if self.store.session_key_exists(&token).await? {
                debug!(attempt, "Session token collision, regenerating");
                continue;
            }

            let expires = timestamp::now() + self.lifetime;
            match self.store.insert_session(&token, user_id, expires).await {
                Ok(session) => {
                    info!(event = "session.created", user_id, "Session created");
                    return Ok(session);
                }
                // Lost a race with a concurrent insert of the same token.
                Err(e) if unique_violation(&e).is_some() => {
                    debug!(attempt, "Session token taken on insert, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(user_id, "Exhausted session token attempts");
        Err(SessionError::TokenExhausted)
    }

    async fn validate(&self, token: &str) -> Result<Session, SessionError> {
        let session = self
            .store
            .get_session(token)
            .await?
            .ok_or(SessionError::NotFound)?;

        if session.is_expired_at(timestamp::now()) {
            self.store.delete_session(token).await?;
            debug!(
                event = "session.expired",
                user_id = session.user_id,
                "Removed expired session"
            );
            return Err(SessionError::Expired);
        }

        Ok(session)
    }

    async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        let removed = self.store.delete_session(token).await?;
        if removed > 0 {
            info!(event = "session.revoked", "Session revoked");
        }
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<u64, SessionError> {
        let removed = self
            .store
            .delete_expired_sessions(timestamp::now())
            .await?;
        Ok(removed)
    }
}
