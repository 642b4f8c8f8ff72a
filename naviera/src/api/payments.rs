//! Payment endpoints.
//!
//! Customers only read their payments. Staff record payments received
//! for a reservation and move them through review; each move is kept in the
//! payment's history and may change the reservation's status.
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/admin/payments -b naviera_session=$TOKEN \
//!   -H "Content-Type: application/json" \
//!   -d '{"reservation_id":"...","amount":125000,"method":"card"}'
//! ```

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use naviera_web::AppError;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{body, command_failed, Page, PageQuery};
use crate::aggregates::payment::PaymentAction;
use crate::auth::{CurrentUser, StaffUser};
use crate::booking::views::{self, PaymentDetail, PaymentFilter};
use crate::error::NavieraError;
use crate::server::{state::COMMAND_TIMEOUT, AppState};
use crate::types::{Money, Payment, PaymentId, PaymentMethod, PaymentStatus, ReservationId, ReservationStatus};

async fn run(state: &AppState, command: PaymentAction) -> Result<PaymentAction, AppError> {
    let payment_id = command.payment_id();
    let outcome = state
        .payments
        .send_and_wait_for(command, move |a| a.is_outcome_for(payment_id), COMMAND_TIMEOUT)
        .await
        .map_err(command_failed)?;
    match outcome {
        PaymentAction::PaymentRejected { error, .. } => Err(error.into()),
        other => Ok(other),
    }
}

/// `GET /api/account/payments`
pub async fn my_payments(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state
        .storage
        .payments
        .payments_for_user(user.id)
        .await
        .map_err(NavieraError::from)?;
    Ok(Json(payments))
}

/// `GET /api/admin/payments?status=pending&method=card&q=4f1c`
pub async fn list(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(filter): Query<PaymentFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Payment>>, AppError> {
    let payments = state
        .storage
        .payments
        .list_payments()
        .await
        .map_err(NavieraError::from)?
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect();
    Ok(Json(Page::of(payments, page)))
}

/// `GET /api/admin/payments/:id`
pub async fn detail(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<PaymentId>,
) -> Result<Json<PaymentDetail>, AppError> {
    Ok(Json(views::payment_detail(&state.storage, id).await?))
}

/// A payment received.
#[derive(Clone, Debug, Deserialize)]
pub struct RecordPaymentRequest {
    /// Reservation paid for
    pub reservation_id: ReservationId,
    /// Amount in cents
    pub amount: Money,
    /// How it was paid
    pub method: PaymentMethod,
    /// When it was paid (defaults to now)
    pub paid_at: Option<DateTime<Utc>>,
}

/// `POST /api/admin/payments` → 201
pub async fn record(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    payload: Result<Json<RecordPaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let request = body(payload)?;
    let command = PaymentAction::RecordPayment {
        payment_id: PaymentId::new(),
        reservation_id: request.reservation_id,
        amount: request.amount,
        method: request.method,
        paid_at: request.paid_at,
        recorded_by: staff.user.id,
    };
    match run(&state, command).await? {
        PaymentAction::PaymentRecorded { payment } => {
            info!(payment = %payment.id, reservation = %payment.reservation_id, amount = %payment.amount, "Payment recorded");
            Ok((StatusCode::CREATED, Json(payment)))
        },
        other => Err(AppError::internal(format!("Unexpected payment outcome: {other:?}"))),
    }
}

/// A review decision.
#[derive(Clone, Debug, Deserialize)]
pub struct StatusChangeRequest {
    /// New status
    pub status: PaymentStatus,
    /// Note for the history
    #[serde(default)]
    pub note: String,
}

/// Result of a review decision.
#[derive(Debug, Serialize)]
pub struct StatusChangeResponse {
    /// The payment after the change
    pub payment: Payment,
    /// Status before the change
    pub previous: PaymentStatus,
    /// New reservation status, when the change moved it
    pub reservation_status: Option<ReservationStatus>,
}

/// `POST /api/admin/payments/:id/status`
pub async fn change_status(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    Path(id): Path<PaymentId>,
    payload: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> Result<Json<StatusChangeResponse>, AppError> {
    let request = body(payload)?;
    let command = PaymentAction::ChangeStatus {
        payment_id: id,
        status: request.status,
        changed_by: staff.user.id,
        note: request.note,
    };
    match run(&state, command).await? {
        PaymentAction::StatusChanged {
            payment,
            previous,
            reservation_status,
        } => Ok(Json(StatusChangeResponse {
            payment,
            previous,
            reservation_status,
        })),
        other => Err(AppError::internal(format!("Unexpected payment outcome: {other:?}"))),
    }
}
