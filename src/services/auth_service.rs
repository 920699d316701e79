//! Domain service for user accounts and login.

use thiserror::Error;

use crate::credential::CredentialError;
use crate::error::ErrorKind;
use crate::models::{Session, User};
use crate::services::session_service::SessionError;

pub const USERNAME_MAX_CHARS: usize = 100;
pub const EMAIL_MAX_CHARS: usize = 200;
pub const PASSWORD_MIN_CHARS: usize = 8;

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username must be between 1 and {USERNAME_MAX_CHARS} characters")]
    UsernameFormat,

    #[error("email format invalid")]
    EmailFormat,

    #[error("password is too short (must be at least {PASSWORD_MIN_CHARS} characters)")]
    PasswordLength,

    #[error("username already taken")]
    UsernameTaken,

    #[error("email already registered")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("username or password incorrect")]
    IncorrectCredentials,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UsernameFormat | Self::EmailFormat | Self::PasswordLength => {
                ErrorKind::InvalidInput
            }
            Self::UsernameTaken | Self::EmailTaken => ErrorKind::Conflict,
            Self::UserNotFound => ErrorKind::NotFound,
            Self::IncorrectCredentials => ErrorKind::NotAuthenticated,
            Self::Session(e) => e.kind(),
            Self::Credential(_) | Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Domain service trait for accounts.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Validates the fields, hashes the password and stores the user.
    ///
    /// # Errors
    ///
    /// Format errors are checked in the order username, email, password.
    /// Duplicates yield [`AuthError::UsernameTaken`] or [`AuthError::EmailTaken`].
    async fn create_user(&self, username: &str, email: &str, password: &str)
    -> Result<User, AuthError>;

    async fn get_user(&self, id: i64) -> Result<User, AuthError>;

    async fn get_user_by_username(&self, username: &str) -> Result<User, AuthError>;

    async fn get_user_by_email(&self, email: &str) -> Result<User, AuthError>;

    /// Verifies the password and mints a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::IncorrectCredentials`] for an unknown username or
    /// a wrong password alike.
    async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError>;

    /// Revokes the session. Idempotent.
    async fn logout(&self, token: &str) -> Result<(), AuthError>;

    async fn update_username(&self, id: i64, username: &str) -> Result<User, AuthError>;

    async fn update_email(&self, id: i64, email: &str) -> Result<User, AuthError>;

    /// Replaces the credential after checking `current_password`.
    async fn change_password(
        &self,
        id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Deletes the user; sessions and file rows go with it.
    async fn delete_user(&self, id: i64) -> Result<(), AuthError>;
}
