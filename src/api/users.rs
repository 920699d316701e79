use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookie::{Cookie, SameSite};
use std::sync::Arc;
use time::OffsetDateTime;

use super::{
    ApiError, ApiResponse, AppState, ChangePasswordRequest, CreateUserRequest, LoginRequest,
    MessageResponse, SessionDto, UpdateEmailRequest, UpdateUsernameRequest, UserDto,
};
use crate::models::Session;
use crate::services::SessionError;

pub const SESSION_COOKIE: &str = "OBSYNC_SESSION_ID";

/// The authenticated caller, inserted by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
}

// ============================================================================
// Cookies
// ============================================================================

pub fn session_cookie(session: &Session, secure: bool) -> Result<Cookie<'static>, ApiError> {
    let expires = OffsetDateTime::from_unix_timestamp(session.expires.timestamp())
        .map_err(|e| ApiError::internal(format!("Session expiry out of range: {e}")))?;

    Ok(Cookie::build((SESSION_COOKIE, session.token.clone()))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(expires)
        .build())
}

pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .build();
    cookie.make_removal();
    cookie
}

/// Session token from the request's `Cookie` headers, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

// ============================================================================
// Middleware
// ============================================================================

/// Requires a live session cookie and exposes the caller as [`CurrentUser`].
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let session = state.sessions.validate(&token).await.map_err(|e| match e {
        SessionError::NotFound => ApiError::unauthorized("Not authenticated"),
        other => other.into(),
    })?;

    tracing::Span::current().record("user_id", session.user_id);
    request.extensions_mut().insert(CurrentUser {
        id: session.user_id,
    });

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /user
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>), ApiError> {
    let user = state
        .auth
        .create_user(&payload.username, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserDto::from(user))),
    ))
}

/// POST /user/login
/// Sets the session cookie on success.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let session = state
        .auth
        .login(&payload.username, &payload.password)
        .await?;
    let cookie = session_cookie(&session, state.config.secure_cookies)?;

    Ok((
        [(header::SET_COOKIE, cookie.to_string())],
        Json(ApiResponse::success(SessionDto::from(&session))),
    ))
}

/// POST /user/logout
/// Always clears the cookie; revoking an unknown session is not an error.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = session_token(&headers) {
        state.auth.logout(&token).await?;
    }

    Ok((
        [(
            header::SET_COOKIE,
            removal_cookie(state.config.secure_cookies).to_string(),
        )],
        Json(ApiResponse::success(MessageResponse::new("Logged out"))),
    ))
}

/// GET /user
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state.auth.get_user(current.id).await?;
    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /user/username
pub async fn update_username(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UpdateUsernameRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state
        .auth
        .update_username(current.id, &payload.username)
        .await?;
    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /user/email
pub async fn update_email(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UpdateEmailRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state.auth.update_email(current.id, &payload.email).await?;
    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /user/password
/// Requires the current password.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .auth
        .change_password(
            current.id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password changed successfully",
    ))))
}

/// DELETE /user
/// Removes the account (sessions and file rows cascade), then its stored
/// bytes, then clears the cookie. A failed purge only leaves orphaned bytes.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.delete_user(current.id).await?;

    if let Err(e) = state.sync.purge_user(current.id).await {
        tracing::warn!(
            error = %e,
            user_id = current.id,
            "Account deleted but its stored files could not be removed"
        );
    }

    Ok((
        [(
            header::SET_COOKIE,
            removal_cookie(state.config.secure_cookies).to_string(),
        )],
        Json(ApiResponse::success(MessageResponse::new("Account deleted"))),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};

    #[test]
    fn test_session_cookie_attributes() {
        let session = Session {
            id: 1,
            token: "abc+/def".to_string(),
            user_id: 7,
            expires: Utc::now() + Duration::hours(72),
        };

        let cookie = session_cookie(&session, true).unwrap();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc+/def");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert!(cookie.expires_datetime().is_some());
    }

    #[test]
    fn test_removal_cookie_is_empty_and_expired() {
        let cookie = removal_cookie(false);
        assert_eq!(cookie.value(), "");
        assert!(cookie.expires_datetime().unwrap() < OffsetDateTime::now_utc());
    }

    #[test]
    fn test_session_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; OBSYNC_SESSION_ID=tok123; other=1"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("OBSYNC_SESSION_ID="));
        assert_eq!(session_token(&headers), None);
    }
}
