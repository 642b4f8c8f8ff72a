//! Redis session store.
//!
//! Layout:
//! - `session:{id}` holds the bincode-encoded [`Session`] with a TTL equal to
//!   its remaining lifetime
//! - `user:{user_id}:sessions` is a set of the user's session ids, used to
//!   log out other devices after a password change

use async_trait::async_trait;
use naviera_core::Clock;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use tracing::{debug, info};

use super::session::{Session, SessionError, SessionId, SessionStore};
use crate::types::UserId;

/// Extra lifetime of the per-user index over the session it was last
/// touched for.
const INDEX_GRACE_SECONDS: u64 = 86_400;

fn backend(context: &str) -> impl Fn(redis::RedisError) -> SessionError + '_ {
    move |e| SessionError::Backend(format!("{context}: {e}"))
}

/// Sessions in Redis.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn_manager: ConnectionManager,
    clock: Arc<dyn Clock>,
}

impl RedisSessionStore {
    /// Connect to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Backend`] if the connection cannot be made.
    pub async fn connect(redis_url: &str, clock: Arc<dyn Clock>) -> Result<Self, SessionError> {
        let client = Client::open(redis_url).map_err(backend("Failed to create Redis client"))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(backend("Failed to connect to Redis"))?;
        Ok(Self {
            conn_manager,
            clock,
        })
    }

    fn session_key(id: SessionId) -> String {
        format!("session:{id}")
    }

    fn user_sessions_key(user: UserId) -> String {
        format!("user:{user}:sessions")
    }

    fn encode(session: &Session) -> Result<Vec<u8>, SessionError> {
        bincode::serialize(session).map_err(|e| SessionError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &Session) -> Result<(), SessionError> {
        let mut conn = self.conn_manager.clone();
        let key = Self::session_key(session.id);
        let ttl = session.remaining_seconds(self.clock.now()).max(1);
        let index = Self::user_sessions_key(session.user_id);

        let created: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(Self::encode(session)?)
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await
            .map_err(backend("Failed to create session"))?;
        if created.is_none() {
            return Err(SessionError::Backend("session id already exists".to_string()));
        }

        let index_ttl = i64::try_from(ttl + INDEX_GRACE_SECONDS).unwrap_or(i64::MAX);
        let _: () = redis::pipe()
            .atomic()
            .sadd(&index, session.id.to_string())
            .ignore()
            .expire(&index, index_ttl)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(backend("Failed to index session"))?;

        info!(session_id = %session.id, user_id = %session.user_id, ttl, "Session created");
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Session, SessionError> {
        let mut conn = self.conn_manager.clone();
        let bytes: Option<Vec<u8>> = conn
            .get(Self::session_key(id))
            .await
            .map_err(backend("Failed to read session"))?;
        let bytes = bytes.ok_or(SessionError::NotFound)?;
        let session: Session =
            bincode::deserialize(&bytes).map_err(|e| SessionError::Serialization(e.to_string()))?;

        if session.is_expired(self.clock.now()) {
            self.delete(id).await?;
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    async fn update(&self, session: &Session) -> Result<(), SessionError> {
        let mut conn = self.conn_manager.clone();
        let key = Self::session_key(session.id);
        let ttl = session.remaining_seconds(self.clock.now());
        if ttl == 0 {
            return Err(SessionError::Expired);
        }

        // XX: only overwrite a session that still exists.
        let updated: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(Self::encode(session)?)
            .arg("XX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await
            .map_err(backend("Failed to update session"))?;
        if updated.is_none() {
            return Err(SessionError::NotFound);
        }
        debug!(session_id = %session.id, ttl, "Session updated");
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), SessionError> {
        let mut conn = self.conn_manager.clone();
        let key = Self::session_key(id);
        let bytes: Option<Vec<u8>> = conn.get(&key).await.map_err(backend("Failed to read session"))?;

        if let Some(session) = bytes.and_then(|b| bincode::deserialize::<Session>(&b).ok()) {
            let _: () = conn
                .srem(Self::user_sessions_key(session.user_id), id.to_string())
                .await
                .map_err(backend("Failed to unindex session"))?;
        }
        let _: () = conn.del(&key).await.map_err(backend("Failed to delete session"))?;
        info!(session_id = %id, "Session deleted");
        Ok(())
    }

    async fn delete_for_user_except(
        &self,
        user: UserId,
        keep: Option<SessionId>,
    ) -> Result<usize, SessionError> {
        // Atomic so a session created concurrently is never half-removed.
        let script = redis::Script::new(
            r"
            local index = KEYS[1]
            local keep = ARGV[1]
            local removed = 0
            for _, id in ipairs(redis.call('SMEMBERS', index)) do
                if id ~= keep then
                    removed = removed + redis.call('DEL', 'session:' .. id)
                    redis.call('SREM', index, id)
                end
            end
            return removed
            ",
        );
        let mut conn = self.conn_manager.clone();
        let removed: usize = script
            .key(Self::user_sessions_key(user))
            .arg(keep.map(|k| k.to_string()).unwrap_or_default())
            .invoke_async(&mut conn)
            .await
            .map_err(backend("Failed to delete user sessions"))?;
        info!(user_id = %user, removed, "User sessions deleted");
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), SessionError> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend("Redis ping failed"))?;
        Ok(())
    }
}
