//! Payment reducer.
//!
//! Payments are recorded by staff against a reservation and then moved through
//! their status machine. Approvals that cover the reservation total mark it
//! paid; a refund that uncovers a paid reservation sends it back to confirmed.

use chrono::{DateTime, Utc};
use naviera_core::{async_effect, effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;
use tracing::info;

use crate::error::{NavieraError, Result};
use crate::storage::{
    outstanding, BookingRepository, PaymentRepository, PaymentStatusChange, Storage, StorageError, PAYMENT_BALANCE,
    PAYMENT_STATUS_STALE, RESERVATION_CANCELLED,
};
use crate::types::{
    HistoryId, Money, Payment, PaymentHistory, PaymentId, PaymentMethod, PaymentStatus, Reservation,
    ReservationId, ReservationStatus, UserId,
};

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the payment reducer
#[derive(Clone, Debug)]
pub enum PaymentAction {
    // Commands
    /// Record a pending payment
    RecordPayment {
        /// Id the payment will have
        payment_id: PaymentId,
        /// Reservation paid for
        reservation_id: ReservationId,
        /// Amount
        amount: Money,
        /// Method
        method: PaymentMethod,
        /// When the money was received (defaults to now)
        paid_at: Option<DateTime<Utc>>,
        /// Staff member recording it
        recorded_by: UserId,
    },

    /// Move a payment to a new status
    ChangeStatus {
        /// Payment
        payment_id: PaymentId,
        /// Target status
        status: PaymentStatus,
        /// Staff member making the change
        changed_by: UserId,
        /// Free-text note for the history
        note: String,
    },

    // Events
    /// The payment was stored as pending
    PaymentRecorded {
        /// The payment
        payment: Payment,
    },

    /// The payment changed status
    StatusChanged {
        /// The payment after the change
        payment: Payment,
        /// Status before the change
        previous: PaymentStatus,
        /// New reservation status, when the change moved it
        reservation_status: Option<ReservationStatus>,
    },

    /// A command was refused
    PaymentRejected {
        /// Payment the command was about
        payment_id: PaymentId,
        /// Why
        error: NavieraError,
    },
}

impl PaymentAction {
    /// The payment this action is about.
    #[must_use]
    pub const fn payment_id(&self) -> PaymentId {
        match self {
            Self::PaymentRecorded { payment } | Self::StatusChanged { payment, .. } => payment.id,
            Self::RecordPayment { payment_id, .. }
            | Self::ChangeStatus { payment_id, .. }
            | Self::PaymentRejected { payment_id, .. } => *payment_id,
        }
    }

    /// Whether this is a final outcome for `payment_id`.
    #[must_use]
    pub fn is_outcome_for(&self, payment_id: PaymentId) -> bool {
        !matches!(self, Self::RecordPayment { .. } | Self::ChangeStatus { .. })
            && self.payment_id() == payment_id
    }
}

// ============================================================================
// State
// ============================================================================

/// Running totals.
#[derive(Clone, Debug, Default)]
pub struct PaymentState {
    /// Payments recorded since start
    pub recorded: u64,
    /// Status changes applied since start
    pub status_changes: u64,
    /// Last refusal
    pub last_error: Option<String>,
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the payment reducer
#[derive(Clone)]
pub struct PaymentEnvironment {
    /// Reservations
    pub bookings: Arc<dyn BookingRepository>,
    /// Payments
    pub payments: Arc<dyn PaymentRepository>,
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
}

impl PaymentEnvironment {
    /// Creates a new `PaymentEnvironment`
    #[must_use]
    pub fn new(storage: &Storage, clock: Arc<dyn Clock>) -> Self {
        Self {
            bookings: storage.bookings.clone(),
            payments: storage.payments.clone(),
            clock,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for payments
#[derive(Clone, Debug)]
pub struct PaymentReducer;

impl PaymentReducer {
    /// Creates a new `PaymentReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for PaymentReducer {
    fn default() -> Self {
        Self::new()
    }
}

fn cancelled_reservation() -> NavieraError {
    NavieraError::field(
        "reservation_id",
        "Payments cannot be recorded against a cancelled reservation.",
    )
}

fn approval_on_cancelled() -> NavieraError {
    NavieraError::rule("The reservation is cancelled; the payment can only be rejected.")
}

async fn load_reservation(bookings: &dyn BookingRepository, id: ReservationId) -> Result<Reservation> {
    bookings
        .reservation(id)
        .await?
        .ok_or_else(|| NavieraError::not_found("Reservation", id))
}

#[allow(clippy::too_many_arguments)]
async fn record(
    env: PaymentEnvironment,
    now: DateTime<Utc>,
    payment_id: PaymentId,
    reservation_id: ReservationId,
    amount: Money,
    method: PaymentMethod,
    paid_at: Option<DateTime<Utc>>,
    recorded_by: UserId,
) -> Result<Payment> {
    let reservation = load_reservation(env.bookings.as_ref(), reservation_id).await?;
    if reservation.status == ReservationStatus::Cancelled {
        return Err(cancelled_reservation());
    }
    let existing = env.payments.payments_for_reservation(reservation_id).await?;
    let owed = outstanding(&reservation, &existing);
    if amount.is_zero() {
        return Err(NavieraError::field("amount", "Ensure this value is greater than 0."));
    }
    if amount > owed {
        return Err(NavieraError::field(
            "amount",
            format!("The amount exceeds the outstanding balance of {owed}."),
        ));
    }

    let payment = Payment {
        id: payment_id,
        reservation_id,
        amount,
        method,
        status: PaymentStatus::Pending,
        paid_at: paid_at.unwrap_or(now),
        created_at: now,
        updated_at: now,
    };
    let history = PaymentHistory {
        id: HistoryId::new(),
        payment_id,
        changed_at: now,
        status: PaymentStatus::Pending,
        changed_by: Some(recorded_by),
        description: format!("Recorded {amount} by {method}"),
    };
    // The storage re-checks the balance with the reservation locked; this
    // catches a concurrent recording that got there first.
    match env.payments.create_payment(&payment, &history).await {
        Ok(()) => Ok(payment),
        Err(e) if e.is_conflict_on(PAYMENT_BALANCE) => Err(NavieraError::field(
            "amount",
            "The amount exceeds the outstanding balance.",
        )),
        Err(e) if e.is_conflict_on(RESERVATION_CANCELLED) => Err(cancelled_reservation()),
        Err(e) => Err(e.into()),
    }
}

async fn change_status(
    env: PaymentEnvironment,
    now: DateTime<Utc>,
    payment_id: PaymentId,
    status: PaymentStatus,
    changed_by: UserId,
    note: String,
) -> Result<(Payment, PaymentStatus, Option<ReservationStatus>)> {
    let mut payment = env
        .payments
        .payment(payment_id)
        .await?
        .ok_or_else(|| NavieraError::not_found("Payment", payment_id))?;
    let previous = payment.status;
    if !previous.can_move_to(status) {
        return Err(NavieraError::field(
            "status",
            format!("A {previous} payment cannot become {status}."),
        ));
    }
    let reservation = load_reservation(env.bookings.as_ref(), payment.reservation_id).await?;
    if status == PaymentStatus::Approved && reservation.status == ReservationStatus::Cancelled {
        return Err(approval_on_cancelled());
    }

    let description = if note.trim().is_empty() {
        format!("{previous} to {status}")
    } else {
        format!("{previous} to {status}: {}", note.trim())
    };
    let change = PaymentStatusChange {
        payment_id,
        expected: previous,
        status,
        at: now,
        history: PaymentHistory {
            id: HistoryId::new(),
            payment_id,
            changed_at: now,
            status,
            changed_by: Some(changed_by),
            description,
        },
    };
    let reservation_status = env
        .payments
        .update_payment_status(&change)
        .await
        .map_err(|e| status_change_error(e, previous))?;

    payment.status = status;
    payment.updated_at = now;
    Ok((payment, previous, reservation_status))
}

fn status_change_error(error: StorageError, previous: PaymentStatus) -> NavieraError {
    if error.is_conflict_on(PAYMENT_STATUS_STALE) {
        NavieraError::Conflict(format!(
            "The payment is no longer {previous}; it was changed by someone else."
        ))
    } else if error.is_conflict_on(RESERVATION_CANCELLED) {
        approval_on_cancelled()
    } else {
        error.into()
    }
}

impl Reducer for PaymentReducer {
    type State = PaymentState;
    type Action = PaymentAction;
    type Environment = PaymentEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            PaymentAction::RecordPayment {
                payment_id,
                reservation_id,
                amount,
                method,
                paid_at,
                recorded_by,
            } => {
                let env = env.clone();
                let now = env.clock.now();
                smallvec![async_effect! {
                    Some(
                        match record(env, now, payment_id, reservation_id, amount, method, paid_at, recorded_by).await {
                            Ok(payment) => PaymentAction::PaymentRecorded { payment },
                            Err(error) => PaymentAction::PaymentRejected { payment_id, error },
                        },
                    )
                }]
            },

            PaymentAction::ChangeStatus {
                payment_id,
                status,
                changed_by,
                note,
            } => {
                let env = env.clone();
                let now = env.clock.now();
                smallvec![async_effect! {
                    Some(match change_status(env, now, payment_id, status, changed_by, note).await {
                        Ok((payment, previous, reservation_status)) => PaymentAction::StatusChanged {
                            payment,
                            previous,
                            reservation_status,
                        },
                        Err(error) => PaymentAction::PaymentRejected { payment_id, error },
                    })
                }]
            },

            PaymentAction::PaymentRecorded { payment } => {
                state.recorded += 1;
                state.last_error = None;
                metrics::counter!("naviera.payments.recorded", "method" => payment.method.as_str())
                    .increment(1);
                info!(payment = %payment.id, reservation = %payment.reservation_id, amount = %payment.amount, "Payment recorded");
                SmallVec::new()
            },

            PaymentAction::StatusChanged {
                payment,
                previous,
                reservation_status,
            } => {
                state.status_changes += 1;
                state.last_error = None;
                metrics::counter!("naviera.payments.status_changes", "status" => payment.status.as_str())
                    .increment(1);
                info!(
                    payment = %payment.id,
                    from = %previous,
                    to = %payment.status,
                    reservation_status = ?reservation_status,
                    "Payment status changed"
                );
                SmallVec::new()
            },

            PaymentAction::PaymentRejected { payment_id, error } => {
                info!(payment = %payment_id, %error, "Payment command rejected");
                state.last_error = Some(error.to_string());
                SmallVec::new()
            },
        }
    }
}
