//! Request extractors for authenticated handlers.
//!
//! ```rust,ignore
//! async fn profile(CurrentUser { user, .. }: CurrentUser) -> Json<User> {
//!     Json(user)
//! }
//!
//! async fn ships(StaffUser(staff): StaffUser) -> ... { }
//! ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use naviera_web::{AppError, SessionToken};
use tracing::{debug, warn};

use super::session::{Session, SessionError, SessionId};
use crate::server::AppState;
use crate::types::User;

const LOGIN_REQUIRED: &str = "Authentication credentials were not provided or have expired.";

/// A request with a valid session of an active user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The user, as stored now
    pub user: User,
    /// The session the request came with
    pub session: Session,
}

async fn resolve(parts: &mut Parts, state: &AppState) -> Result<CurrentUser, AppError> {
    let SessionToken(token) = SessionToken::from_request_parts(parts, state)
        .await
        .unwrap_or(SessionToken(None));
    let id: SessionId = token
        .as_deref()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| AppError::unauthorized(LOGIN_REQUIRED))?;

    let session = match state.sessions.get(id).await {
        Ok(session) => session,
        Err(SessionError::NotFound | SessionError::Expired) => {
            debug!(session = %id, "Unknown or expired session");
            return Err(AppError::unauthorized(LOGIN_REQUIRED));
        },
        Err(other) => {
            return Err(AppError::internal("Could not read the session").with_source(other.into()));
        },
    };

    let user = state
        .storage
        .accounts
        .user(session.user_id)
        .await
        .map_err(|e| AppError::internal("Could not load the user").with_source(e.into()))?;
    match user {
        Some(user) if user.is_active => Ok(CurrentUser { user, session }),
        _ => {
            // The account was disabled or removed after login.
            if let Err(error) = state.sessions.delete(id).await {
                warn!(session = %id, %error, "Could not drop the session of an inactive account");
            }
            Err(AppError::unauthorized(LOGIN_REQUIRED))
        },
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<Self>() {
            return Ok(existing.clone());
        }
        let current = resolve(parts, state).await?;
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

/// A [`CurrentUser`] with back-office access.
#[derive(Debug, Clone)]
pub struct StaffUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.user.is_staff {
            return Err(AppError::forbidden("Staff access is required."));
        }
        Ok(Self(current))
    }
}
