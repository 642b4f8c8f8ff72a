//! Server-side sessions.
//!
//! A session is created at login and identified by an opaque token (a v4
//! UUID) carried in the `naviera_session` cookie or a bearer header. It also
//! carries the booking wizard, so the wizard survives between requests
//! without touching the database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use naviera_core::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::booking::wizard::WizardSession;
use crate::types::{User, UserId};

/// Session token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Errors raised by session stores.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// No session with that token
    #[error("session not found")]
    NotFound,

    /// The session existed but its lifetime has passed
    #[error("session expired")]
    Expired,

    /// Backend failure
    #[error("session backend error: {0}")]
    Backend(String),

    /// Stored bytes could not be decoded
    #[error("session serialization error: {0}")]
    Serialization(String),
}

/// A logged-in user's server-side state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Token
    pub id: SessionId,
    /// Owner
    pub user_id: UserId,
    /// Owner's username at login
    pub username: String,
    /// Owner's staff flag at login
    pub is_staff: bool,
    /// Login time
    pub created_at: DateTime<Utc>,
    /// End of life
    pub expires_at: DateTime<Utc>,
    /// Client address at login
    pub ip: Option<String>,
    /// Client user agent at login
    pub user_agent: Option<String>,
    /// Booking in progress
    pub wizard: Option<WizardSession>,
}

impl Session {
    /// New session for `user` living `ttl` from `now`.
    #[must_use]
    pub fn new(
        user: &User,
        now: DateTime<Utc>,
        ttl: Duration,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
            created_at: now,
            expires_at: now + ttl,
            ip,
            user_agent,
            wizard: None,
        }
    }

    /// Whether the session is past its lifetime at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Seconds left, clamped at zero.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((self.expires_at - now).num_seconds()).unwrap_or(0)
    }
}

/// Storage for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session.
    ///
    /// # Errors
    ///
    /// Backend failures, or a token collision.
    async fn create(&self, session: &Session) -> Result<(), SessionError>;

    /// Load a live session.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`], or [`SessionError::Expired`] (the
    /// session is removed).
    async fn get(&self, id: SessionId) -> Result<Session, SessionError>;

    /// Replace a session's contents (wizard changes). Lifetime is unchanged.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] if it no longer exists.
    async fn update(&self, session: &Session) -> Result<(), SessionError>;

    /// Remove a session. Missing sessions are ignored.
    ///
    /// # Errors
    ///
    /// Backend failures.
    async fn delete(&self, id: SessionId) -> Result<(), SessionError>;

    /// Remove every session of `user` except `keep`. Returns how many went.
    ///
    /// # Errors
    ///
    /// Backend failures.
    async fn delete_for_user_except(
        &self,
        user: UserId,
        keep: Option<SessionId>,
    ) -> Result<usize, SessionError>;

    /// Readiness probe.
    ///
    /// # Errors
    ///
    /// Backend failures.
    async fn ping(&self) -> Result<(), SessionError>;
}

/// Sessions in a map. Expired entries are dropped when read, and swept
/// whenever a new session is created.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    /// Empty store judging expiry with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let now = self.clock.now();
        sessions.retain(|_, s| !s.is_expired(now));
        if sessions.contains_key(&session.id) {
            return Err(SessionError::Backend("session id already exists".to_string()));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get(&id).ok_or(SessionError::NotFound)?;
        if session.is_expired(self.clock.now()) {
            sessions.remove(&id);
            return Err(SessionError::Expired);
        }
        Ok(session.clone())
    }

    async fn update(&self, session: &Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions.get_mut(&session.id).ok_or(SessionError::NotFound)?;
        if stored.user_id != session.user_id {
            return Err(SessionError::Backend("session owner cannot change".to_string()));
        }
        *stored = session.clone();
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), SessionError> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    async fn delete_for_user_except(
        &self,
        user: UserId,
        keep: Option<SessionId>,
    ) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, s| s.user_id != user || Some(*id) == keep);
        Ok(before - sessions.len())
    }

    async fn ping(&self) -> Result<(), SessionError> {
        Ok(())
    }
}
