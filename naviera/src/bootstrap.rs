//! Startup wiring: backends chosen by configuration, the first staff
//! account and the optional demo catalog.
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let resources = Resources::from_config(&config).await?;
//! resources.prepare(&config).await?;
//! let state = resources.into_state(&config);
//! ```

use anyhow::Context;
use naviera_core::environment::{Clock, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::{MemorySessionStore, PasswordHasher, RedisSessionStore, SessionStore};
use crate::catalog::Catalog;
use crate::config::{BootstrapConfig, Config, MailConfig, SessionBackend, StorageBackend};
use crate::error::NavieraError;
use crate::mail::{LogMailer, Mailer, SmtpMailer, SmtpSettings};
use crate::seed;
use crate::server::AppState;
use crate::storage::postgres::PgStorage;
use crate::storage::Storage;
use crate::types::{User, UserId};

/// Infrastructure the application runs on.
#[derive(Clone)]
pub struct Resources {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Repositories
    pub storage: Storage,
    /// Sessions
    pub sessions: Arc<dyn SessionStore>,
    /// Outgoing mail
    pub mailer: Arc<dyn Mailer>,
}

impl Resources {
    /// Connect the configured backends. Postgres migrations run here.
    ///
    /// # Errors
    ///
    /// Unreachable database or Redis, a failed migration, or bad SMTP settings.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = open_storage(config).await?;
        let sessions = open_sessions(config, clock.clone()).await?;
        let mailer = open_mailer(&config.mail)?;
        Ok(Self {
            clock,
            storage,
            sessions,
            mailer,
        })
    }

    /// Create the configured staff account and seed the demo catalog.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn prepare(&self, config: &Config) -> anyhow::Result<()> {
        let hasher = PasswordHasher::new(config.sessions.bcrypt_cost);
        ensure_staff_account(&self.storage, hasher, &config.bootstrap, self.clock.as_ref()).await?;
        if config.bootstrap.seed_demo_catalog {
            let catalog = Catalog::new(&self.storage);
            if seed::seed_if_empty(&catalog, self.clock.today()).await?.is_some() {
                info!("Demo catalog loaded");
            }
        }
        Ok(())
    }

    /// Build the handlers' state over these resources.
    #[must_use]
    pub fn into_state(self, config: &Config) -> AppState {
        AppState::new(self.storage, self.sessions, self.mailer, self.clock, config)
    }
}

async fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Ok(Storage::memory())
        },
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .as_deref()
                .context("DATABASE_URL is not set")?;
            info!("Connecting to PostgreSQL...");
            let pool = PgPoolOptions::new()
                .max_connections(config.storage.max_connections)
                .acquire_timeout(Duration::from_secs(config.storage.connect_timeout))
                .connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            PgStorage::migrate(&pool).await?;
            info!("PostgreSQL connected, migrations applied");
            Ok(Storage::postgres(pool))
        },
    }
}

async fn open_sessions(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<Arc<dyn SessionStore>> {
    match config.sessions.backend {
        SessionBackend::Memory => Ok(Arc::new(MemorySessionStore::new(clock))),
        SessionBackend::Redis => {
            let url = config
                .sessions
                .redis_url
                .as_deref()
                .context("REDIS_URL is not set")?;
            info!("Connecting to Redis...");
            let store = RedisSessionStore::connect(url, clock).await?;
            info!("Redis connected");
            Ok(Arc::new(store))
        },
    }
}

fn open_mailer(config: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    let Some(host) = &config.smtp_host else {
        info!("SMTP_HOST not set, outgoing mail is only logged");
        return Ok(Arc::new(LogMailer));
    };
    let mailer = SmtpMailer::new(&SmtpSettings {
        host: host.clone(),
        port: config.smtp_port,
        username: config.smtp_username.clone(),
        password: config.smtp_password.clone(),
        from: config.from.clone(),
    })?;
    Ok(Arc::new(mailer))
}

/// Create the staff account named by `ADMIN_USERNAME` if it does not exist.
///
/// Returns whether an account was created.
///
/// # Errors
///
/// Storage failures, or a hashing failure.
pub async fn ensure_staff_account(
    storage: &Storage,
    hasher: PasswordHasher,
    settings: &BootstrapConfig,
    clock: &dyn Clock,
) -> Result<bool, NavieraError> {
    let (Some(username), Some(password)) = (&settings.admin_username, &settings.admin_password) else {
        return Ok(false);
    };
    if storage.accounts.username_taken(username).await? {
        return Ok(false);
    }

    let password = password.clone();
    let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| NavieraError::Internal(format!("hashing task failed: {e}")))??;
    let user = User {
        id: UserId::new(),
        username: username.clone(),
        first_name: String::new(),
        last_name: String::new(),
        email: settings.admin_email.clone().unwrap_or_default(),
        phone: String::new(),
        country: String::new(),
        preferred_payment_method: None,
        role_id: None,
        is_staff: true,
        is_active: true,
        date_joined: clock.now(),
        last_login: None,
    };
    storage.accounts.create_user(&user, &hash).await?;
    info!(user = %user.id, username = %user.username, "Staff account created");
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use naviera_testing::test_clock;

    fn settings(username: Option<&str>) -> BootstrapConfig {
        BootstrapConfig {
            admin_username: username.map(str::to_string),
            admin_email: Some("admin@naviera.test".to_string()),
            admin_password: Some("Harbour-Light-42".to_string()),
            seed_demo_catalog: false,
        }
    }

    #[tokio::test]
    async fn staff_account_is_created_once() {
        let storage = Storage::memory();
        let clock = test_clock();
        let hasher = PasswordHasher::new(4);

        assert!(ensure_staff_account(&storage, hasher, &settings(Some("admin")), &clock).await.unwrap());
        assert!(!ensure_staff_account(&storage, hasher, &settings(Some("admin")), &clock).await.unwrap());

        let (user, hash) = storage.accounts.credentials("admin").await.unwrap().unwrap();
        assert!(user.is_staff);
        assert!(hasher.verify("Harbour-Light-42", &hash));
    }

    #[tokio::test]
    async fn nothing_happens_without_a_username() {
        let storage = Storage::memory();
        let created = ensure_staff_account(&storage, PasswordHasher::new(4), &settings(None), &test_clock())
            .await
            .unwrap();
        assert!(!created);
        assert!(storage.accounts.list_users().await.unwrap().is_empty());
    }
}
