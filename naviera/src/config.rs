//! Configuration loaded from environment variables.
//!
//! `.env` is read first when present. Every setting has a default that runs
//! the service fully in memory on port 8080.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// A setting that is present but unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Value did not parse
    #[error("invalid value for {name}: {value:?}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },

    /// A backend was chosen without the setting it needs
    #[error("{name} is required when {because}")]
    Missing {
        /// Variable name
        name: &'static str,
        /// Why it is needed
        because: &'static str,
    },
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server
    pub server: ServerConfig,
    /// Catalog, account and booking storage
    pub storage: StorageConfig,
    /// Sessions and the booking wizard
    pub sessions: SessionConfig,
    /// Outgoing mail
    pub mail: MailConfig,
    /// First staff account and demo data
    pub bootstrap: BootstrapConfig,
    /// Booking behaviour
    pub booking: BookingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Prometheus exporter port; no exporter when unset
    pub metrics_port: Option<u16>,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Where data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process memory, lost on restart
    Memory,
    /// `PostgreSQL`
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(()),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend
    pub backend: StorageBackend,
    /// `PostgreSQL` connection URL
    pub database_url: Option<String>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

/// Where sessions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    /// Process memory
    Memory,
    /// Redis
    Redis,
}

impl FromStr for SessionBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            _ => Err(()),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend
    pub backend: SessionBackend,
    /// Redis connection URL
    pub redis_url: Option<String>,
    /// Session lifetime in seconds (default: 14 days)
    pub ttl: u64,
    /// Idle lifetime of a booking wizard in seconds (default: 30 minutes)
    pub wizard_ttl: u64,
    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,
    /// bcrypt cost for new password hashes
    pub bcrypt_cost: u32,
}

/// Mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP relay; mail is only logged when unset
    pub smtp_host: Option<String>,
    /// SMTP port
    pub smtp_port: u16,
    /// SMTP login
    pub smtp_username: Option<String>,
    /// SMTP password
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    /// Sender address
    pub from: String,
    /// Where contact-form messages go
    pub contact_inbox: String,
}

/// Bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Username of the first staff account
    pub admin_username: Option<String>,
    /// Its email
    pub admin_email: Option<String>,
    /// Its password
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
    /// Load the demo fleet into an empty catalog
    pub seed_demo_catalog: bool,
}

/// Booking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Cabins tried before a confirmation gives up
    pub max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                metrics_port: None,
                shutdown_timeout: 30,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database_url: None,
                max_connections: 10,
                connect_timeout: 30,
            },
            sessions: SessionConfig {
                backend: SessionBackend::Memory,
                redis_url: None,
                ttl: 1_209_600, // 14 days
                wizard_ttl: 1_800,
                cookie_secure: false,
                bcrypt_cost: 12,
            },
            mail: MailConfig {
                smtp_host: None,
                smtp_port: 587,
                smtp_username: None,
                smtp_password: None,
                from: "Naviera <no-reply@naviera.example>".to_string(),
                contact_inbox: "contact@naviera.example".to_string(),
            },
            bootstrap: BootstrapConfig {
                admin_username: None,
                admin_email: None,
                admin_password: None,
                seed_demo_catalog: false,
            },
            booking: BookingConfig { max_attempts: 3 },
        }
    }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parsed_optional<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    optional(name)
        .map(|value| value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }))
        .transpose()
}

impl Config {
    /// Load configuration from the environment (and `.env`).
    ///
    /// # Errors
    ///
    /// A variable that does not parse, or a backend chosen without its URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            server: ServerConfig {
                host: optional("HOST").unwrap_or(defaults.server.host),
                port: parsed("PORT", defaults.server.port)?,
                metrics_port: parsed_optional("METRICS_PORT")?,
                shutdown_timeout: parsed("SHUTDOWN_TIMEOUT", defaults.server.shutdown_timeout)?,
            },
            storage: StorageConfig {
                backend: parsed("STORAGE_BACKEND", defaults.storage.backend)?,
                database_url: optional("DATABASE_URL"),
                max_connections: parsed("DATABASE_MAX_CONNECTIONS", defaults.storage.max_connections)?,
                connect_timeout: parsed("DATABASE_CONNECT_TIMEOUT", defaults.storage.connect_timeout)?,
            },
            sessions: SessionConfig {
                backend: parsed("SESSION_BACKEND", defaults.sessions.backend)?,
                redis_url: optional("REDIS_URL"),
                ttl: parsed("SESSION_TTL", defaults.sessions.ttl)?,
                wizard_ttl: parsed("WIZARD_TTL", defaults.sessions.wizard_ttl)?,
                cookie_secure: parsed("SESSION_COOKIE_SECURE", defaults.sessions.cookie_secure)?,
                bcrypt_cost: parsed("BCRYPT_COST", defaults.sessions.bcrypt_cost)?,
            },
            mail: MailConfig {
                smtp_host: optional("SMTP_HOST"),
                smtp_port: parsed("SMTP_PORT", defaults.mail.smtp_port)?,
                smtp_username: optional("SMTP_USERNAME"),
                smtp_password: optional("SMTP_PASSWORD"),
                from: optional("MAIL_FROM").unwrap_or(defaults.mail.from),
                contact_inbox: optional("CONTACT_INBOX").unwrap_or(defaults.mail.contact_inbox),
            },
            bootstrap: BootstrapConfig {
                admin_username: optional("ADMIN_USERNAME"),
                admin_email: optional("ADMIN_EMAIL"),
                admin_password: optional("ADMIN_PASSWORD"),
                seed_demo_catalog: parsed("SEED_DEMO_CATALOG", false)?,
            },
            booking: BookingConfig {
                max_attempts: parsed("BOOKING_MAX_ATTEMPTS", defaults.booking.max_attempts)?,
            },
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Postgres && self.storage.database_url.is_none() {
            return Err(ConfigError::Missing {
                name: "DATABASE_URL",
                because: "STORAGE_BACKEND=postgres",
            });
        }
        if self.sessions.backend == SessionBackend::Redis && self.sessions.redis_url.is_none() {
            return Err(ConfigError::Missing {
                name: "REDIS_URL",
                because: "SESSION_BACKEND=redis",
            });
        }
        if !(4..=31).contains(&self.sessions.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: self.sessions.bcrypt_cost.to_string(),
            });
        }
        Ok(())
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Session lifetime.
    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.sessions.ttl).unwrap_or(i64::MAX))
    }

    /// Booking wizard idle lifetime.
    #[must_use]
    pub fn wizard_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.sessions.wizard_ttl).unwrap_or(i64::MAX))
    }
}
