//! Application state shared by the HTTP handlers.
//!
//! Writes go through the reducer stores. Reads go straight to storage and
//! the catalog.

use naviera_core::environment::Clock;
use naviera_runtime::Store;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregates::{
    AccountAction, AccountEnvironment, AccountReducer, AccountState, OccupancyAction,
    OccupancyEnvironment, OccupancyReducer, PaymentAction, PaymentEnvironment, PaymentReducer,
    PaymentState, ReservationAction, ReservationEnvironment, ReservationReducer, ReservationState,
};
use crate::auth::password::PasswordHasher;
use crate::auth::session::SessionStore;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::mail::Mailer;
use crate::storage::Storage;

/// How long a handler waits for a command's outcome.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Store running the account reducer
pub type AccountStore = Store<AccountState, AccountAction, AccountEnvironment, AccountReducer>;
/// Store running the reservation reducer
pub type ReservationStore =
    Store<ReservationState, ReservationAction, ReservationEnvironment, ReservationReducer>;
/// Store running the payment reducer
pub type PaymentStore = Store<PaymentState, PaymentAction, PaymentEnvironment, PaymentReducer>;
/// Store running the occupancy reducer
pub type OccupancyStore = Store<(), OccupancyAction, OccupancyEnvironment, OccupancyReducer>;

/// Settings handlers need at request time.
#[derive(Clone, Debug)]
pub struct WebSettings {
    /// Session lifetime
    pub session_ttl: chrono::Duration,
    /// Booking wizard idle lifetime
    pub wizard_ttl: chrono::Duration,
    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,
    /// Where contact-form mail goes
    pub contact_inbox: String,
}

/// Application state shared across all HTTP handlers.
///
/// Cloning is cheap: everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Repositories
    pub storage: Storage,
    /// Typed catalog access
    pub catalog: Catalog,
    /// Sessions
    pub sessions: Arc<dyn SessionStore>,
    /// Outgoing mail
    pub mailer: Arc<dyn Mailer>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Accounts
    pub accounts: AccountStore,
    /// Bookings and cancellations
    pub reservations: ReservationStore,
    /// Payments
    pub payments: PaymentStore,
    /// Crew cabins
    pub occupancies: OccupancyStore,
    /// Request-time settings
    pub settings: Arc<WebSettings>,
}

impl AppState {
    /// Wire the stores over the given backends.
    #[must_use]
    pub fn new(
        storage: Storage,
        sessions: Arc<dyn SessionStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let catalog = Catalog::new(&storage);
        let hasher = PasswordHasher::new(config.sessions.bcrypt_cost);

        let accounts = Store::new(
            AccountState::default(),
            AccountReducer::new(),
            AccountEnvironment::new(
                &storage,
                sessions.clone(),
                hasher,
                clock.clone(),
                config.session_ttl(),
            ),
        );
        let reservations = Store::new(
            ReservationState::default(),
            ReservationReducer::new(),
            ReservationEnvironment::new(catalog.clone(), clock.clone(), config.booking.max_attempts),
        );
        let payments = Store::new(
            PaymentState::default(),
            PaymentReducer::new(),
            PaymentEnvironment::new(&storage, clock.clone()),
        );
        let occupancies = Store::new((), OccupancyReducer::new(), OccupancyEnvironment::new(catalog.clone()));

        Self {
            storage,
            catalog,
            sessions,
            mailer,
            clock,
            accounts,
            reservations,
            payments,
            occupancies,
            settings: Arc::new(WebSettings {
                session_ttl: config.session_ttl(),
                wizard_ttl: config.wizard_ttl(),
                cookie_secure: config.sessions.cookie_secure,
                contact_inbox: config.mail.contact_inbox.clone(),
            }),
        }
    }

    /// Stop every store, waiting up to `timeout` for running effects.
    pub async fn shutdown(&self, timeout: Duration) {
        let results = [
            ("accounts", self.accounts.shutdown(timeout).await),
            ("reservations", self.reservations.shutdown(timeout).await),
            ("payments", self.payments.shutdown(timeout).await),
            ("occupancies", self.occupancies.shutdown(timeout).await),
        ];
        for (store, result) in results {
            if let Err(error) = result {
                tracing::warn!(store, %error, "Store did not shut down cleanly");
            }
        }
    }
}
