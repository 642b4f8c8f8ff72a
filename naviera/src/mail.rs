//! Outgoing mail.
//!
//! The contact form is the only sender. Production relays through SMTP with
//! STARTTLS; without an SMTP host the mail is written to the log instead.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Errors raised while sending mail.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// An address did not parse
    #[error("invalid address {address}: {reason}")]
    Address {
        /// Offending address
        address: String,
        /// Parser message
        reason: String,
    },

    /// The message could not be assembled
    #[error("failed to build message: {0}")]
    Build(String),

    /// The relay refused or could not be reached
    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// A plain-text mail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    /// Recipient
    pub to: String,
    /// Where replies go
    pub reply_to: Option<String>,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

/// Something that delivers mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one mail.
    ///
    /// # Errors
    ///
    /// Address, build or transport failures.
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// SMTP relay settings.
#[derive(Clone, Debug)]
pub struct SmtpSettings {
    /// Relay host
    pub host: String,
    /// Relay port
    pub port: u16,
    /// Login, when the relay wants one
    pub username: Option<String>,
    /// Password for `username`
    pub password: Option<String>,
    /// Sender address
    pub from: String,
}

/// Mailer that relays through SMTP with STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer. No connection is made until the first send.
    ///
    /// # Errors
    ///
    /// An invalid sender address or relay host.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let from = mailbox(&settings.from)?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
            .port(settings.port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(mailbox(&mail.to)?)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        if let Some(reply_to) = &mail.reply_to {
            builder = builder.reply_to(mailbox(reply_to)?);
        }
        let message = builder
            .body(mail.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!(to = %mail.to, subject = %mail.subject, "Mail sent");
        Ok(())
    }
}

/// Mailer that writes mail to the log.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        info!(
            to = %mail.to,
            reply_to = mail.reply_to.as_deref().unwrap_or("-"),
            subject = %mail.subject,
            body = %mail.body,
            "Mail (not sent, no SMTP host configured)"
        );
        Ok(())
    }
}

/// Mailer that keeps everything it is given.
#[derive(Clone, Debug, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
}

impl RecordingMailer {
    /// Empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mail sent so far.
    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        mailbox(&mail.to)?;
        self.sent.lock().await.push(mail);
        Ok(())
    }
}
