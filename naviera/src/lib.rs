//! Naviera: cruise line reservation service.
//!
//! Customers browse destinations, offers and ships, open an account, and
//! book cabins through a three-step wizard. Staff manage the fleet,
//! itineraries, voyages, crew and payments from a JSON back office.
//!
//! # Architecture
//!
//! ```text
//!            HTTP (axum)                         reads
//!   ┌──────────────────────────┐   ┌──────────────────────────────┐
//!   │ api::*  handlers          │──▶│ catalog / booking::views     │
//!   └────────────┬─────────────┘   └──────────────┬───────────────┘
//!                │ commands                        │
//!                ▼                                 ▼
//!   ┌──────────────────────────┐   ┌──────────────────────────────┐
//!   │ Stores + reducers         │──▶│ storage (memory | postgres)  │
//!   │ account, reservation,     │   │ sessions (memory | redis)    │
//!   │ payment, occupancy        │   └──────────────────────────────┘
//!   └──────────────────────────┘
//! ```
//!
//! Writes are commands to a reducer running in a [`naviera_runtime::Store`].
//! Reducers decide synchronously and describe their I/O as effects; each
//! command ends in exactly one outcome action the handler waits for.
//!
//! ## Double booking
//!
//! A cabin is held on a leg by a single occupancy row. Storage refuses a
//! second one atomically, and the reservation reducer retries a lost race
//! with fresh availability:
//!
//! ```text
//! ConfirmBooking { attempt: 1 } ──▶ commit ──▶ conflict ──▶ ConfirmBooking { attempt: 2 }
//!                                      │
//!                                      └──▶ BookingConfirmed
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod api;
pub mod auth;
pub mod booking;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod mail;
pub mod metrics;
pub mod seed;
pub mod server;
pub mod storage;
pub mod types;

pub use bootstrap::Resources;
pub use config::Config;
pub use error::{NavieraError, Result};
pub use server::{build_router, AppState};
