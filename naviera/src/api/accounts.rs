//! Account endpoints: sign-up, login/logout, the account menu, profile,
//! password and client profile.
//!
//! Writes are commands to the account reducer; each handler waits for the
//! outcome of its own command.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use naviera_web::{
    cookies::{clear_session_cookie, session_cookie},
    AppError, ClientIp, SessionToken, UserAgent,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::{body, command_failed};
use crate::aggregates::account::{AccountAction, LoginAttempt};
use crate::auth::forms::{ClientForm, LoginForm, PasswordChangeForm, ProfileForm, RegistrationForm};
use crate::auth::session::SessionId;
use crate::auth::CurrentUser;
use crate::booking::views::reservation_counts;
use crate::booking::wizard::WizardStep;
use crate::server::{state::COMMAND_TIMEOUT, AppState};
use crate::types::{Client, ReservationStatus, User};

/// Send an account command and wait for its outcome. A refusal becomes the
/// error response.
async fn run(state: &AppState, action: AccountAction) -> Result<AccountAction, AppError> {
    let request = action.request();
    let outcome = state
        .accounts
        .send_and_wait_for(action, move |a| a.is_outcome_for(request), COMMAND_TIMEOUT)
        .await
        .map_err(command_failed)?;
    match outcome {
        AccountAction::Rejected { error, .. } => Err(error.into()),
        other => Ok(other),
    }
}

fn unexpected(outcome: &AccountAction) -> AppError {
    AppError::internal(format!("Unexpected account outcome: {outcome:?}"))
}

/// `POST /api/auth/register` → 201
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationForm>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let form = body(payload)?;
    match run(&state, AccountAction::Register { request: Uuid::new_v4(), form }).await? {
        AccountAction::Registered { user, .. } => Ok((StatusCode::CREATED, Json(user))),
        other => Err(unexpected(&other)),
    }
}

/// Successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Session token (also set as the session cookie)
    pub token: SessionId,
    /// Session end
    pub expires_at: DateTime<Utc>,
    /// Logged-in user
    pub user: User,
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    payload: Result<Json<LoginForm>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let form = body(payload)?;
    let attempt = LoginAttempt {
        identifier: form.username,
        password: form.password,
        ip: Some(ip.to_string()),
        user_agent: Some(user_agent),
    };
    let AccountAction::LoggedIn { user, session, .. } =
        run(&state, AccountAction::Login { request: Uuid::new_v4(), attempt }).await?
    else {
        return Err(AppError::internal("Unexpected login outcome"));
    };

    let max_age = session.remaining_seconds(state.clock.now());
    let cookie = session_cookie(&session.id.to_string(), max_age, state.settings.cookie_secure)
        .ok_or_else(|| AppError::internal("Session token is not a valid cookie value"))?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            token: session.id,
            expires_at: session.expires_at,
            user,
        }),
    ))
}

/// Plain message reply.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Message for the user
    pub message: String,
}

/// `POST /api/auth/logout`
///
/// Always succeeds; an unknown or missing session is simply not there to
/// delete.
pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, AppError> {
    if let Some(id) = token.as_deref().and_then(|t| t.parse::<SessionId>().ok()) {
        state.sessions.delete(id).await.map_err(crate::error::NavieraError::from)?;
        info!(session = %id, "Logged out");
    }
    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse {
            message: "You have been logged out. We hope to see you on board soon.".to_string(),
        }),
    ))
}

/// The account menu.
#[derive(Debug, Serialize)]
pub struct AccountMenu {
    /// Profile
    pub user: User,
    /// Client profile, when created
    pub client: Option<Client>,
    /// Reservations per status
    pub reservations: HashMap<ReservationStatus, usize>,
    /// Step of the booking in progress, if any
    pub wizard_step: Option<WizardStep>,
}

/// `GET /api/account`
pub async fn menu(
    State(state): State<AppState>,
    CurrentUser { user, session }: CurrentUser,
) -> Result<Json<AccountMenu>, AppError> {
    let client = state
        .storage
        .accounts
        .client_for_user(user.id)
        .await
        .map_err(crate::error::NavieraError::from)?;
    let reservations = reservation_counts(&state.storage, user.id).await?;
    let now = state.clock.now();
    let wizard_step = session
        .wizard
        .filter(|w| !w.is_stale(now, state.settings.wizard_ttl))
        .map(|w| w.step());
    Ok(Json(AccountMenu {
        user,
        client,
        reservations,
        wizard_step,
    }))
}

/// `PUT /api/account/profile`
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    payload: Result<Json<ProfileForm>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let form = body(payload)?;
    let command = AccountAction::UpdateProfile {
        request: Uuid::new_v4(),
        user_id: user.id,
        form,
    };
    match run(&state, command).await? {
        AccountAction::ProfileUpdated { user, .. } => Ok(Json(user)),
        other => Err(unexpected(&other)),
    }
}

/// Password change result.
#[derive(Debug, Serialize)]
pub struct PasswordChanged {
    /// Message for the user
    pub message: &'static str,
    /// Other sessions that were logged out
    pub sessions_revoked: usize,
}

/// `POST /api/account/password`
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser { user, session }: CurrentUser,
    payload: Result<Json<PasswordChangeForm>, JsonRejection>,
) -> Result<Json<PasswordChanged>, AppError> {
    let form = body(payload)?;
    let command = AccountAction::ChangePassword {
        request: Uuid::new_v4(),
        user_id: user.id,
        current_session: session.id,
        form,
    };
    match run(&state, command).await? {
        AccountAction::PasswordChanged { sessions_revoked, .. } => Ok(Json(PasswordChanged {
            message: "Your password was changed.",
            sessions_revoked,
        })),
        other => Err(unexpected(&other)),
    }
}

/// `POST /api/account/client` → 201
pub async fn create_client(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    payload: Result<Json<ClientForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let form = body(payload)?;
    let command = AccountAction::CreateClient {
        request: Uuid::new_v4(),
        user_id: user.id,
        form,
    };
    match run(&state, command).await? {
        AccountAction::ClientCreated { client, .. } => Ok((StatusCode::CREATED, Json(client))),
        other => Err(unexpected(&other)),
    }
}
