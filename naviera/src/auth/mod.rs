//! Accounts, passwords and sessions.
//!
//! - [`forms`]: sign-up, login, profile and client forms with their field rules
//! - [`password`]: bcrypt hashing and password strength checks
//! - [`session`]: server-side sessions and the in-memory store
//! - [`session_redis`]: Redis session store
//! - [`extract`]: `CurrentUser` / `StaffUser` extractors

pub mod extract;
pub mod forms;
pub mod password;
pub mod session;
pub mod session_redis;

pub use extract::{CurrentUser, StaffUser};
pub use password::PasswordHasher;
pub use session::{MemorySessionStore, Session, SessionError, SessionId, SessionStore};
pub use session_redis::RedisSessionStore;
