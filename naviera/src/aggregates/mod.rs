//! Reducers for the write side of the application.
//!
//! - Account: registration, login, profile and client profile
//! - Reservation: booking a cabin and cancelling
//! - Payment: recording payments and moving them through review
//! - Occupancy: crew cabin claims

pub mod account;
pub mod occupancy;
pub mod payment;
pub mod reservation;

pub use account::{AccountAction, AccountEnvironment, AccountReducer, AccountState};
pub use occupancy::{OccupancyAction, OccupancyEnvironment, OccupancyReducer};
pub use payment::{PaymentAction, PaymentEnvironment, PaymentReducer, PaymentState};
pub use reservation::{ReservationAction, ReservationEnvironment, ReservationReducer, ReservationState};
