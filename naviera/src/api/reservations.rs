//! Reservation endpoints for customers and the back office.
//!
//! - GET  /api/account/reservations              - the caller's reservations
//! - GET  /api/account/reservations/:id          - one of them, in full
//! - POST /api/account/reservations/:id/cancel   - cancel one of them
//! - GET  /api/admin/reservations                - every reservation (staff)
//! - GET  /api/admin/reservations/:id            - any reservation (staff)
//! - POST /api/admin/reservations/:id/cancel     - cancel any reservation (staff)
//!
//! Cancelling frees the cabin on the leg. A reservation that belongs to
//! someone else reads as not found.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use naviera_web::AppError;
use serde::Serialize;
use tracing::info;

use super::{command_failed, Page, PageQuery};
use crate::aggregates::reservation::ReservationAction;
use crate::auth::{CurrentUser, StaffUser};
use crate::booking::views::{self, ReservationDetail, ReservationFilter, ReservationSummary};
use crate::server::{state::COMMAND_TIMEOUT, AppState};
use crate::types::{ReservationId, UserId};

/// Reply to a cancellation.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// Reservation
    pub reservation_id: ReservationId,
    /// When it was cancelled
    pub cancelled_at: DateTime<Utc>,
    /// Message for the user
    pub message: &'static str,
}

async fn cancel(
    state: &AppState,
    reservation_id: ReservationId,
    user_id: UserId,
    staff: bool,
) -> Result<Json<CancelResponse>, AppError> {
    let command = ReservationAction::CancelReservation {
        reservation_id,
        user_id,
        staff,
    };
    let outcome = state
        .reservations
        .send_and_wait_for(command, move |a| a.is_outcome_for(reservation_id), COMMAND_TIMEOUT)
        .await
        .map_err(command_failed)?;

    match outcome {
        ReservationAction::ReservationCancelled { cancelled_at, .. } => {
            info!(reservation = %reservation_id, user = %user_id, staff, "Reservation cancelled");
            Ok(Json(CancelResponse {
                reservation_id,
                cancelled_at,
                message: "The reservation was cancelled and its cabin released.",
            }))
        },
        ReservationAction::CancellationRejected { error, .. } => Err(error.into()),
        other => Err(AppError::internal(format!("Unexpected cancellation outcome: {other:?}"))),
    }
}

/// `GET /api/account/reservations`
pub async fn my_reservations(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
) -> Result<Json<Vec<ReservationSummary>>, AppError> {
    Ok(Json(views::my_reservations(&state.storage, &state.catalog, user.id).await?))
}

/// `GET /api/account/reservations/:id`
pub async fn my_reservation(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationDetail>, AppError> {
    Ok(Json(
        views::reservation_detail(&state.storage, &state.catalog, id, Some(user.id)).await?,
    ))
}

/// `POST /api/account/reservations/:id/cancel`
pub async fn cancel_mine(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<ReservationId>,
) -> Result<Json<CancelResponse>, AppError> {
    cancel(&state, id, user.id, false).await
}

/// `GET /api/admin/reservations?status=confirmed&q=gomez&page=2`
pub async fn list(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(filter): Query<ReservationFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<ReservationSummary>>, AppError> {
    let all = views::list_reservations(&state.storage, &state.catalog, &filter).await?;
    Ok(Json(Page::of(all, page)))
}

/// `GET /api/admin/reservations/:id`
pub async fn detail(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationDetail>, AppError> {
    Ok(Json(views::reservation_detail(&state.storage, &state.catalog, id, None).await?))
}

/// `POST /api/admin/reservations/:id/cancel`
pub async fn staff_cancel(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    Path(id): Path<ReservationId>,
) -> Result<Json<CancelResponse>, AppError> {
    cancel(&state, id, staff.user.id, true).await
}
