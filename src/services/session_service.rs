//! Domain service for session tokens.
//!
//! A session is Active until it expires or is revoked; both are terminal.
//! Expiry is detected lazily on lookup, and `sweep_expired` exists for
//! periodic maintenance.

use thiserror::Error;

use crate::error::ErrorKind;
use crate::models::Session;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,

    #[error("Could not generate a unique session token")]
    TokenExhausted,

    #[error("Database error: {0}")]
    Database(String),
}

impl SessionError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotAuthenticated,
            Self::Expired => ErrorKind::Expired,
            Self::TokenExhausted | Self::Database(_) => ErrorKind::Internal,
        }
    }
}

impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    /// Mints a session for `user_id`. The returned record is the only place
    /// the plaintext token is ever handed out.
    async fn create_session(&self, user_id: i64) -> Result<Session, SessionError>;

    /// Looks a token up.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] for unknown tokens. [`SessionError::Expired`]
    /// when the session is past its expiry; the row is deleted as a side effect.
    async fn validate(&self, token: &str) -> Result<Session, SessionError>;

    /// Deletes the session. Unknown tokens are not an error.
    async fn revoke(&self, token: &str) -> Result<(), SessionError>;

    /// Deletes every expired session and returns how many were removed.
    async fn sweep_expired(&self) -> Result<u64, SessionError>;
}
