//! Application error type.
//!
//! Reducers report failures as [`NavieraError`] values inside their terminal
//! actions, so the type is `Clone`. Handlers convert it into
//! [`naviera_web::AppError`] with `?`.

use naviera_web::{AppError, FieldErrors};
use thiserror::Error;

use crate::auth::session::SessionError;
use crate::mail::MailError;
use crate::storage::StorageError;

/// Field name used for errors that are not tied to a single input.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Errors produced by the application layer.
#[derive(Debug, Clone, Error)]
pub enum NavieraError {
    /// A referenced record does not exist
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Resource name
        resource: &'static str,
        /// Identifier as text
        id: String,
    },

    /// The request clashes with existing data
    #[error("{0}")]
    Conflict(String),

    /// Input failed validation
    #[error("{0}")]
    Validation(FieldErrors),

    /// No valid session
    #[error("{0}")]
    Unauthorized(String),

    /// Session lacks the required permission
    #[error("{0}")]
    Forbidden(String),

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Session backend failure
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Mail delivery failure
    #[error("mail error: {0}")]
    Mail(#[from] MailError),

    /// Anything else that should not happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl NavieraError {
    /// Not-found error for `resource` with `id`.
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Validation error on a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    /// Validation error not tied to one field.
    pub fn rule(message: impl Into<String>) -> Self {
        Self::field(NON_FIELD_ERRORS, message)
    }
}

impl From<FieldErrors> for NavieraError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<NavieraError> for AppError {
    fn from(err: NavieraError) -> Self {
        match err {
            NavieraError::NotFound { resource, id } => Self::not_found(resource, id),
            NavieraError::Conflict(message) => Self::conflict(message),
            NavieraError::Validation(fields) => Self::with_fields(fields),
            NavieraError::Unauthorized(message) => Self::unauthorized(message),
            NavieraError::Forbidden(message) => Self::forbidden(message),
            NavieraError::Storage(StorageError::Conflict { constraint }) => {
                Self::conflict(format!("Conflicting record ({constraint})"))
            },
            NavieraError::Storage(StorageError::Unavailable(message)) => {
                Self::unavailable("Storage is unavailable").with_source(anyhow::anyhow!(message))
            },
            other @ (NavieraError::Storage(_)
            | NavieraError::Session(_)
            | NavieraError::Mail(_)
            | NavieraError::Internal(_)) => {
                Self::internal("An internal error occurred").with_source(anyhow::Error::new(other))
            },
        }
    }
}

/// Result alias for application operations.
pub type Result<T> = std::result::Result<T, NavieraError>;
