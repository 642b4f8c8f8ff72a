//! Persistence.
//!
//! Repositories are object-safe `async_trait`s shared as `Arc<dyn ..>`. Two
//! backends implement all of them:
//!
//! - [`memory::MemoryStorage`]: one lock over every table (tests, demos)
//! - [`postgres::PgStorage`]: sqlx over Postgres, with migrations
//!
//! Catalog entities are stored as JSON documents keyed by kind and id
//! ([`RecordStore`]). Accounts, bookings and payments have relational tables so
//! uniqueness (usernames, emails, one occupancy per cabin and leg) is enforced
//! by the backend itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{
    CabinId, CabinOccupancy, Client, ClientId, OccupancyId, Passenger, Payment, PaymentHistory,
    PaymentId, PaymentStatus, Reservation, ReservationHistory, ReservationId, ReservationStatus,
    User, UserId, VoyageShipId,
};

pub mod balance;
pub mod memory;
pub mod postgres;

pub use balance::{outstanding, PAYMENT_BALANCE, PAYMENT_STATUS_STALE, RESERVATION_CANCELLED};

/// Unique username.
pub const USERNAME_UNIQUE: &str = "users_username_key";
/// Unique email (case-insensitive).
pub const EMAIL_UNIQUE: &str = "users_email_lower_key";
/// Unique client document number.
pub const CLIENT_DNI_UNIQUE: &str = "clients_dni_key";
/// One client profile per account.
pub const CLIENT_USER_UNIQUE: &str = "clients_user_id_key";
/// One occupancy per cabin and leg.
pub const OCCUPANCY_UNIQUE: &str = "cabin_occupancies_cabin_leg_key";

/// Errors raised by storage backends.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// A constraint rejected the write
    #[error("constraint violated: {constraint}")]
    Conflict {
        /// Constraint name (see the `*_UNIQUE` and [`balance`] constants)
        constraint: String,
    },

    /// The row to update does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// Query failure
    #[error("database error: {0}")]
    Database(String),

    /// Stored JSON does not match the expected shape
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend cannot be reached
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Conflict on `constraint`.
    #[must_use]
    pub fn conflict(constraint: &str) -> Self {
        Self::Conflict {
            constraint: constraint.to_string(),
        }
    }

    /// `true` if this is a violation of `constraint`.
    #[must_use]
    pub fn is_conflict_on(&self, constraint: &str) -> bool {
        matches!(self, Self::Conflict { constraint: c } if c == constraint)
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// JSON document store for catalog records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one record.
    async fn get_record(&self, kind: &str, id: Uuid) -> StorageResult<Option<Value>>;

    /// Every record of a kind.
    async fn list_records(&self, kind: &str) -> StorageResult<Vec<Value>>;

    /// Insert or replace a record.
    async fn put_record(&self, kind: &str, id: Uuid, data: Value) -> StorageResult<()>;

    /// Delete a record. Returns `false` if it did not exist.
    async fn delete_record(&self, kind: &str, id: Uuid) -> StorageResult<bool>;

    /// Cheap round-trip used by readiness checks.
    async fn ping(&self) -> StorageResult<()>;
}

/// Users and client profiles.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a user with its password hash.
    ///
    /// Fails with [`USERNAME_UNIQUE`] or [`EMAIL_UNIQUE`] conflicts.
    async fn create_user(&self, user: &User, password_hash: &str) -> StorageResult<()>;

    /// User by id.
    async fn user(&self, id: UserId) -> StorageResult<Option<User>>;

    /// User and password hash by username (exact) or email (case-insensitive).
    async fn credentials(&self, identifier: &str) -> StorageResult<Option<(User, String)>>;

    /// Password hash of a user.
    async fn password_hash(&self, id: UserId) -> StorageResult<Option<String>>;

    /// Replace profile fields (everything but the password).
    async fn update_user(&self, user: &User) -> StorageResult<()>;

    /// Replace the password hash.
    async fn set_password(&self, id: UserId, password_hash: &str) -> StorageResult<()>;

    /// Stamp a successful login.
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StorageResult<()>;

    /// Whether a username is registered.
    async fn username_taken(&self, username: &str) -> StorageResult<bool>;

    /// Whether an email is registered to anyone but `except`.
    async fn email_taken(&self, email: &str, except: Option<UserId>) -> StorageResult<bool>;

    /// All users, oldest first.
    async fn list_users(&self) -> StorageResult<Vec<User>>;

    /// Insert a client profile.
    ///
    /// Fails with [`CLIENT_DNI_UNIQUE`] or [`CLIENT_USER_UNIQUE`] conflicts.
    async fn create_client(&self, client: &Client) -> StorageResult<()>;

    /// Client by id.
    async fn client(&self, id: ClientId) -> StorageResult<Option<Client>>;

    /// The client profile of an account.
    async fn client_for_user(&self, user: UserId) -> StorageResult<Option<Client>>;

    /// Whether a document number is registered.
    async fn dni_taken(&self, dni: &str) -> StorageResult<bool>;

    /// All clients.
    async fn list_clients(&self) -> StorageResult<Vec<Client>>;
}

/// Everything written when a booking is confirmed.
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// The reservation
    pub reservation: Reservation,
    /// Its passengers
    pub passengers: Vec<Passenger>,
    /// The cabin claim
    pub occupancy: CabinOccupancy,
    /// First history row
    pub history: ReservationHistory,
}

/// A reservation status change and the history row explaining it.
#[derive(Debug, Clone)]
pub struct ReservationStatusChange {
    /// Reservation
    pub reservation_id: ReservationId,
    /// New status
    pub status: ReservationStatus,
    /// History row
    pub history: ReservationHistory,
}

/// Reservations, passengers and cabin occupancies.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Cabins already occupied on a leg.
    async fn occupied_cabins(&self, leg: VoyageShipId) -> StorageResult<HashSet<CabinId>>;

    /// Passengers on non-cancelled reservations for a leg.
    async fn booked_passengers(&self, leg: VoyageShipId) -> StorageResult<u32>;

    /// Write a booking atomically.
    ///
    /// Fails with an [`OCCUPANCY_UNIQUE`] conflict if the cabin was taken on
    /// the leg in the meantime, in which case nothing is written.
    async fn commit_booking(&self, booking: &NewBooking) -> StorageResult<()>;

    /// Reservation by id.
    async fn reservation(&self, id: ReservationId) -> StorageResult<Option<Reservation>>;

    /// Passengers of a reservation.
    async fn passengers(&self, reservation: ReservationId) -> StorageResult<Vec<Passenger>>;

    /// History of a reservation, oldest first.
    async fn reservation_history(
        &self,
        reservation: ReservationId,
    ) -> StorageResult<Vec<ReservationHistory>>;

    /// Reservations made by an account, newest first.
    async fn reservations_for_user(&self, user: UserId) -> StorageResult<Vec<Reservation>>;

    /// All reservations, newest first.
    async fn list_reservations(&self) -> StorageResult<Vec<Reservation>>;

    /// Cancel a reservation: status and passengers to cancelled, occupancies
    /// deleted, history written. One transaction.
    async fn cancel_reservation(&self, change: &ReservationStatusChange) -> StorageResult<()>;

    /// Occupancies, optionally restricted to one leg.
    async fn occupancies(&self, leg: Option<VoyageShipId>) -> StorageResult<Vec<CabinOccupancy>>;

    /// Occupancy by id.
    async fn occupancy(&self, id: OccupancyId) -> StorageResult<Option<CabinOccupancy>>;

    /// Insert a single occupancy (crew claims). Same conflict as `commit_booking`.
    async fn claim_cabin(&self, occupancy: &CabinOccupancy) -> StorageResult<()>;

    /// Delete an occupancy. Returns `false` if it did not exist.
    async fn release_occupancy(&self, id: OccupancyId) -> StorageResult<bool>;

    /// Whether any reservation or occupancy references the cabin.
    async fn cabin_in_use(&self, cabin: CabinId) -> StorageResult<bool>;

    /// Whether any reservation or occupancy references the leg.
    async fn leg_in_use(&self, leg: VoyageShipId) -> StorageResult<bool>;
}

/// A payment status change. The reservation move it causes is decided by
/// the backend, see [`balance::plan_status_change`].
#[derive(Debug, Clone)]
pub struct PaymentStatusChange {
    /// Payment
    pub payment_id: PaymentId,
    /// Status the change was decided on
    pub expected: PaymentStatus,
    /// New status
    pub status: PaymentStatus,
    /// When
    pub at: DateTime<Utc>,
    /// Payment history row
    pub history: PaymentHistory,
}

/// Payments and their history.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a payment with its first history row.
    ///
    /// The reservation is checked in the same write: [`RESERVATION_CANCELLED`]
    /// or [`PAYMENT_BALANCE`] conflicts leave nothing written.
    async fn create_payment(&self, payment: &Payment, history: &PaymentHistory) -> StorageResult<()>;

    /// Payment by id.
    async fn payment(&self, id: PaymentId) -> StorageResult<Option<Payment>>;

    /// Apply a status change atomically, moving the reservation between
    /// `confirmed` and `paid` when coverage changes. Returns the status the
    /// reservation moved to.
    ///
    /// Fails with [`PAYMENT_STATUS_STALE`] when the payment is no longer in
    /// `change.expected`, or [`RESERVATION_CANCELLED`] when approving on a
    /// cancelled reservation.
    async fn update_payment_status(&self, change: &PaymentStatusChange) -> StorageResult<Option<ReservationStatus>>;

    /// Payments for a reservation, oldest first.
    async fn payments_for_reservation(&self, reservation: ReservationId) -> StorageResult<Vec<Payment>>;

    /// Payments on reservations made by an account, newest first.
    async fn payments_for_user(&self, user: UserId) -> StorageResult<Vec<Payment>>;

    /// All payments, newest first.
    async fn list_payments(&self) -> StorageResult<Vec<Payment>>;

    /// History of a payment, oldest first.
    async fn payment_history(&self, payment: PaymentId) -> StorageResult<Vec<PaymentHistory>>;
}

/// All repositories of one backend.
#[derive(Clone)]
pub struct Storage {
    /// Catalog documents
    pub records: Arc<dyn RecordStore>,
    /// Users and clients
    pub accounts: Arc<dyn AccountRepository>,
    /// Reservations and occupancies
    pub bookings: Arc<dyn BookingRepository>,
    /// Payments
    pub payments: Arc<dyn PaymentRepository>,
}

impl Storage {
    /// In-memory backend.
    #[must_use]
    pub fn memory() -> Self {
        let backend = Arc::new(memory::MemoryStorage::new());
        Self {
            records: backend.clone(),
            accounts: backend.clone(),
            bookings: backend.clone(),
            payments: backend,
        }
    }

    /// Postgres backend over an existing pool.
    #[must_use]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let backend = Arc::new(postgres::PgStorage::new(pool));
        Self {
            records: backend.clone(),
            accounts: backend.clone(),
            bookings: backend.clone(),
            payments: backend,
        }
    }

    /// Readiness probe.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it cannot be reached.
    pub async fn ping(&self) -> StorageResult<()> {
        self.records.ping().await
    }
}
