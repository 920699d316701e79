//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::credential::{self, CredentialError, HashParams};
use crate::db::{Store, unique_violation};
use crate::models::{Session, User};
use crate::services::auth_service::{
    AuthError, AuthService, EMAIL_MAX_CHARS, PASSWORD_MIN_CHARS, USERNAME_MAX_CHARS,
};
use crate::services::session_service::SessionService;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*$")
            .expect("Invalid regex")
    })
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if len == 0 || len > USERNAME_MAX_CHARS {
        return Err(AuthError::UsernameFormat);
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.chars().count() > EMAIL_MAX_CHARS || !email_regex().is_match(email) {
        return Err(AuthError::EmailFormat);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(AuthError::PasswordLength);
    }
    Ok(())
}

/// Maps a failed user insert/update to a conflict when a UNIQUE index fired.
fn conflict_or_database(err: anyhow::Error) -> AuthError {
    match unique_violation(&err) {
        Some(message) if message.contains("email") => AuthError::EmailTaken,
        Some(_) => AuthError::UsernameTaken,
        None => err.into(),
    }
}

pub struct SeaOrmAuthService {
    store: Store,
    sessions: Arc<dyn SessionService>,
    hash_params: HashParams,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, sessions: Arc<dyn SessionService>, hash_params: HashParams) -> Self {
        Self {
            store,
            sessions,
            hash_params,
        }
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let params = self.hash_params;
        tokio::task::spawn_blocking(move || credential::hash_password(&password, &params))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task failed: {e}")))?
            .map_err(AuthError::from)
    }

    /// Checks `password` against the stored credential. Only a mismatch maps
    /// to `IncorrectCredentials`; anything else is an internal failure.
    async fn verify(&self, password: &str, encoded: &str) -> Result<(), AuthError> {
        let password = password.to_string();
        let encoded = encoded.to_string();
        let result =
            tokio::task::spawn_blocking(move || credential::verify_password(&password, &encoded))
                .await
                .map_err(|e| AuthError::Internal(format!("Verification task failed: {e}")))?;

        match result {
            Ok(()) => Ok(()),
            Err(CredentialError::InvalidPassword) => Err(AuthError::IncorrectCredentials),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        validate_username(username)?;
        validate_email(email)?;
        validate_password(password)?;

        let passhash = self.hash(password).await?;
        let user = self
            .store
            .create_user(username, email, &passhash)
            .await
            .map_err(conflict_or_database)?;

        info!(event = "user.created", user_id = user.id, "User created");
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<User, AuthError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, AuthError> {
        validate_username(username)?;
        self.store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, AuthError> {
        validate_email(email)?;
        self.store
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let Some(user) = self.store.get_user_by_username(username).await? else {
            info!(event = "user.login_failed", "Login for unknown username");
            return Err(AuthError::IncorrectCredentials);
        };

        if let Err(e) = self.verify(password, &user.credential).await {
            info!(event = "user.login_failed", user_id = user.id, "Login rejected");
            return Err(e);
        }

        let session = self.sessions.create_session(user.id).await?;
        info!(event = "user.login", user_id = user.id, "User logged in");
        Ok(session)
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.revoke(token).await?;
        Ok(())
    }

    async fn update_username(&self, id: i64, username: &str) -> Result<User, AuthError> {
        validate_username(username)?;

        let updated = self
            .store
            .update_username(id, username)
            .await
            .map_err(conflict_or_database)?;
        if !updated {
            return Err(AuthError::UserNotFound);
        }

        info!(event = "user.username_changed", user_id = id, "Username changed");
        self.get_user(id).await
    }

    async fn update_email(&self, id: i64, email: &str) -> Result<User, AuthError> {
        validate_email(email)?;

        let updated = self
            .store
            .update_email(id, email)
            .await
            .map_err(conflict_or_database)?;
        if !updated {
            return Err(AuthError::UserNotFound);
        }

        info!(event = "user.email_changed", user_id = id, "Email changed");
        self.get_user(id).await
    }

    async fn change_password(
        &self,
        id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;

        let user = self.get_user(id).await?;
        self.verify(current_password, &user.credential).await?;

        let passhash = self.hash(new_password).await?;
        if !self.store.update_passhash(id, &passhash).await? {
            return Err(AuthError::UserNotFound);
        }

        info!(event = "user.password_changed", user_id = id, "Password changed");
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<(), AuthError> {
        if !self.store.delete_user(id).await? {
            return Err(AuthError::UserNotFound);
        }

        info!(event = "user.deleted", user_id = id, "User deleted");
        Ok(())
    }
}
