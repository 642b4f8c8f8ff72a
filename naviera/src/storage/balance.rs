//! Payment rules both backends evaluate inside their write section, against
//! the rows as they are at that moment.

use super::{PaymentStatusChange, ReservationStatusChange, StorageError, StorageResult};
use crate::types::{Money, Payment, PaymentId, PaymentStatus, Reservation, ReservationHistory, ReservationStatus};

/// A new payment would take the reservation past its total.
pub const PAYMENT_BALANCE: &str = "payments_outstanding_balance";
/// The payment is no longer in the status the change was decided on.
pub const PAYMENT_STATUS_STALE: &str = "payments_expected_status";
/// The reservation is cancelled.
pub const RESERVATION_CANCELLED: &str = "reservations_not_cancelled";

/// Sum of the payments in `status`, counting `moved` as already changed.
fn total_in(payments: &[Payment], status: PaymentStatus, moved: Option<(PaymentId, PaymentStatus)>) -> Money {
    let amounts = payments.iter().filter_map(|p| {
        let effective = match moved {
            Some((id, s)) if id == p.id => s,
            _ => p.status,
        };
        (effective == status).then_some(p.amount)
    });
    Money::checked_sum(amounts).unwrap_or(Money::from_cents(u64::MAX))
}

/// What is still owed: total minus approved and pending payments.
#[must_use]
pub fn outstanding(reservation: &Reservation, payments: &[Payment]) -> Money {
    let approved = total_in(payments, PaymentStatus::Approved, None);
    let pending = total_in(payments, PaymentStatus::Pending, None);
    reservation.total.saturating_sub(approved).saturating_sub(pending)
}

/// Where the reservation goes once `payment_id` is `status`: `paid` when
/// approved payments cover the total, back to `confirmed` when they stop
/// covering it. Cancelled reservations never move.
#[must_use]
pub fn status_after_payment(
    reservation: &Reservation,
    payments: &[Payment],
    payment_id: PaymentId,
    status: PaymentStatus,
) -> Option<ReservationStatus> {
    let covered = total_in(payments, PaymentStatus::Approved, Some((payment_id, status))) >= reservation.total;
    match (reservation.status, covered) {
        (ReservationStatus::Confirmed, true) => Some(ReservationStatus::Paid),
        (ReservationStatus::Paid, false) => Some(ReservationStatus::Confirmed),
        _ => None,
    }
}

/// Check a new payment against its reservation and the payments already on it.
///
/// # Errors
///
/// [`RESERVATION_CANCELLED`] or [`PAYMENT_BALANCE`] conflicts.
pub fn check_new_payment(reservation: &Reservation, existing: &[Payment], payment: &Payment) -> StorageResult<()> {
    if reservation.status == ReservationStatus::Cancelled {
        return Err(StorageError::conflict(RESERVATION_CANCELLED));
    }
    if payment.amount > outstanding(reservation, existing) {
        return Err(StorageError::conflict(PAYMENT_BALANCE));
    }
    Ok(())
}

/// Decide a status change against the current payment and reservation rows.
/// Returns the reservation change to write with it, if any.
///
/// # Errors
///
/// [`PAYMENT_STATUS_STALE`] when the payment moved since the change was
/// decided, [`RESERVATION_CANCELLED`] when approving on a cancelled
/// reservation.
pub fn plan_status_change(
    change: &PaymentStatusChange,
    payment: &Payment,
    reservation: &Reservation,
    payments: &[Payment],
) -> StorageResult<Option<ReservationStatusChange>> {
    if payment.status != change.expected {
        return Err(StorageError::conflict(PAYMENT_STATUS_STALE));
    }
    if change.status == PaymentStatus::Approved && reservation.status == ReservationStatus::Cancelled {
        return Err(StorageError::conflict(RESERVATION_CANCELLED));
    }
    Ok(
        status_after_payment(reservation, payments, change.payment_id, change.status).map(|next| {
            ReservationStatusChange {
                reservation_id: reservation.id,
                status: next,
                history: ReservationHistory::new(
                    reservation.id,
                    change.at,
                    format!(
                        "Status {} to {next} after payment {} {}",
                        reservation.status, change.payment_id, change.status
                    ),
                ),
            }
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{ClientId, HistoryId, PaymentHistory, PaymentMethod, ReservationId, UserId, VoyageShipId};
    use chrono::{DateTime, Utc};
    use naviera_core::environment::Clock;
    use naviera_testing::test_clock;

    fn now() -> DateTime<Utc> {
        test_clock().now()
    }

    fn reservation(status: ReservationStatus, total: u64) -> Reservation {
        Reservation {
            id: ReservationId::new(),
            client_id: ClientId::new(),
            user_id: UserId::new(),
            voyage_ship_id: VoyageShipId::new(),
            cabin_id: None,
            status,
            total: Money::from_cents(total),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn payment(reservation: &Reservation, cents: u64, status: PaymentStatus) -> Payment {
        Payment {
            id: PaymentId::new(),
            reservation_id: reservation.id,
            amount: Money::from_cents(cents),
            method: PaymentMethod::Card,
            status,
            paid_at: now(),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn change(payment: &Payment, status: PaymentStatus) -> PaymentStatusChange {
        PaymentStatusChange {
            payment_id: payment.id,
            expected: PaymentStatus::Pending,
            status,
            at: now(),
            history: PaymentHistory {
                id: HistoryId::new(),
                payment_id: payment.id,
                changed_at: now(),
                status,
                changed_by: None,
                description: String::new(),
            },
        }
    }

    #[test]
    fn pending_payments_count_against_the_balance() {
        let r = reservation(ReservationStatus::Confirmed, 10_000);
        let rows = vec![
            payment(&r, 4_000, PaymentStatus::Approved),
            payment(&r, 3_000, PaymentStatus::Pending),
            payment(&r, 9_000, PaymentStatus::Rejected),
        ];
        assert_eq!(outstanding(&r, &rows), Money::from_cents(3_000));

        let too_much = payment(&r, 3_001, PaymentStatus::Pending);
        assert!(check_new_payment(&r, &rows, &too_much)
            .unwrap_err()
            .is_conflict_on(PAYMENT_BALANCE));
        assert!(check_new_payment(&r, &rows, &payment(&r, 3_000, PaymentStatus::Pending)).is_ok());
    }

    #[test]
    fn a_change_decided_on_an_old_status_is_refused() {
        let r = reservation(ReservationStatus::Confirmed, 10_000);
        let rejected = payment(&r, 10_000, PaymentStatus::Rejected);
        let err = plan_status_change(&change(&rejected, PaymentStatus::Approved), &rejected, &r, &[rejected.clone()])
            .unwrap_err();
        assert!(err.is_conflict_on(PAYMENT_STATUS_STALE));
    }

    #[test]
    fn covering_approval_marks_paid_but_not_on_a_cancelled_reservation() {
        let r = reservation(ReservationStatus::Confirmed, 10_000);
        let p = payment(&r, 10_000, PaymentStatus::Pending);
        let planned = plan_status_change(&change(&p, PaymentStatus::Approved), &p, &r, &[p.clone()]).unwrap();
        assert_eq!(planned.map(|c| c.status), Some(ReservationStatus::Paid));

        let cancelled = reservation(ReservationStatus::Cancelled, 10_000);
        let p = payment(&cancelled, 10_000, PaymentStatus::Pending);
        let err = plan_status_change(&change(&p, PaymentStatus::Approved), &p, &cancelled, &[p.clone()]).unwrap_err();
        assert!(err.is_conflict_on(RESERVATION_CANCELLED));
        let rejected = plan_status_change(&change(&p, PaymentStatus::Rejected), &p, &cancelled, &[p.clone()]).unwrap();
        assert!(rejected.is_none());
    }
}
