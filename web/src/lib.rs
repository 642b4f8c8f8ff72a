//! Axum integration for the Naviera service.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, cookies
//! │  - Request parsing, sessions            │  ← correlation IDs, tracing
//! │  - Response serialization               │  ← error mapping
//! ├─────────────────────────────────────────┤
//! │         Functional Core                 │
//! │  - Reducers (bookings, payments, ...)   │  ← no I/O
//! │  - Effect descriptions (values)         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! This crate holds the shell pieces that do not depend on the cruise domain:
//! [`AppError`] and field-level [`FieldErrors`], request extractors, the
//! correlation-ID layer, session cookies and the probe handlers.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod cookies;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod validation;

pub use error::AppError;
pub use extractors::{ClientIp, CorrelationId, SessionToken, UserAgent};
pub use middleware::{correlate, CORRELATION_ID_HEADER};
pub use validation::FieldErrors;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
