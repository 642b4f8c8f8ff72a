//! The three-step booking wizard.
//!
//! Steps 1 and 2 only change the wizard kept in the caller's session.
//! Confirmation is a command to the reservation reducer.
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/booking/step1 -b naviera_session=$TOKEN \
//!   -H "Content-Type: application/json" \
//!   -d '{"voyage_ship_id":"...","cabin_type_id":"...","passenger_count":2}'
//! ```

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use naviera_web::AppError;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{body, command_failed};
use crate::aggregates::reservation::{BookingRequest, ReservationAction};
use crate::auth::session::Session;
use crate::auth::CurrentUser;
use crate::booking::pricing::Quote;
use crate::booking::wizard::{validate_passengers, CabinSelection, PassengerDraft, WizardSession, WizardStep};
use crate::booking::{check_selection, describe, WizardView};
use crate::error::NavieraError;
use crate::server::{state::COMMAND_TIMEOUT, AppState};
use crate::types::{Reservation, ReservationId};

/// The session's wizard, unless it was abandoned too long ago.
fn live_wizard(state: &AppState, session: &Session) -> Option<WizardSession> {
    let now = state.clock.now();
    session
        .wizard
        .clone()
        .filter(|wizard| !wizard.is_stale(now, state.settings.wizard_ttl))
}

async fn save_wizard(state: &AppState, mut session: Session, wizard: Option<WizardSession>) -> Result<(), AppError> {
    session.wizard = wizard;
    state.sessions.update(&session).await.map_err(NavieraError::from)?;
    Ok(())
}

/// `GET /api/booking`
pub async fn show(
    State(state): State<AppState>,
    CurrentUser { session, .. }: CurrentUser,
) -> Result<Json<WizardView>, AppError> {
    let wizard = live_wizard(&state, &session);
    if wizard.is_none() && session.wizard.is_some() {
        save_wizard(&state, session, None).await?;
    }
    Ok(Json(describe(&state.catalog, wizard, state.clock.today()).await?))
}

/// `DELETE /api/booking`
pub async fn reset(
    State(state): State<AppState>,
    CurrentUser { session, .. }: CurrentUser,
) -> Result<Json<WizardView>, AppError> {
    save_wizard(&state, session, None).await?;
    Ok(Json(describe(&state.catalog, None, state.clock.today()).await?))
}

/// `POST /api/booking/step1`
pub async fn step1(
    State(state): State<AppState>,
    CurrentUser { session, .. }: CurrentUser,
    payload: Result<Json<CabinSelection>, JsonRejection>,
) -> Result<Json<WizardView>, AppError> {
    let selection = body(payload)?;
    let (_, quote) = check_selection(&state.catalog, &selection, state.clock.today()).await?;

    let now = state.clock.now();
    let mut wizard = live_wizard(&state, &session).unwrap_or_else(|| WizardSession::new(now));
    wizard.select(selection, now);
    let step = wizard.step();
    save_wizard(&state, session, Some(wizard.clone())).await?;

    Ok(Json(WizardView {
        step,
        wizard: Some(wizard),
        quote: Some(quote),
    }))
}

/// Step 2 body.
#[derive(Clone, Debug, Deserialize)]
pub struct PassengersForm {
    /// Travellers, lead passenger first
    pub passengers: Vec<PassengerDraft>,
}

/// `POST /api/booking/step2`
pub async fn step2(
    State(state): State<AppState>,
    CurrentUser { session, .. }: CurrentUser,
    payload: Result<Json<PassengersForm>, JsonRejection>,
) -> Result<Json<WizardView>, AppError> {
    let form = body(payload)?;
    let Some(mut wizard) = live_wizard(&state, &session) else {
        return Err(AppError::bad_request("Choose a cabin before entering passengers."));
    };
    let Some(selection) = wizard.selection else {
        return Err(AppError::bad_request("Choose a cabin before entering passengers."));
    };

    validate_passengers(&form.passengers, selection.passenger_count, state.clock.today())
        .map_err(AppError::with_fields)?;
    wizard.register_passengers(form.passengers, state.clock.now());
    save_wizard(&state, session, Some(wizard.clone())).await?;

    Ok(Json(describe(&state.catalog, Some(wizard), state.clock.today()).await?))
}

/// A placed booking.
#[derive(Debug, Serialize)]
pub struct BookingConfirmation {
    /// The reservation
    pub reservation: Reservation,
    /// Assigned cabin
    pub cabin_number: String,
    /// What was charged
    pub quote: Quote,
}

/// `POST /api/booking/confirm` → 201
pub async fn confirm(
    State(state): State<AppState>,
    CurrentUser { user, session }: CurrentUser,
) -> Result<(StatusCode, Json<BookingConfirmation>), AppError> {
    let wizard = live_wizard(&state, &session);
    let Some((selection, passengers)) = wizard
        .as_ref()
        .filter(|w| w.step() == WizardStep::Confirm)
        .and_then(|w| w.selection.map(|s| (s, w.passengers.clone())))
    else {
        return Err(AppError::bad_request("Complete the cabin and passenger steps first."));
    };

    let client = state
        .storage
        .accounts
        .client_for_user(user.id)
        .await
        .map_err(NavieraError::from)?
        .ok_or_else(|| AppError::bad_request("Create your client profile before booking."))?;

    let reservation_id = ReservationId::new();
    let command = ReservationAction::ConfirmBooking {
        request: BookingRequest {
            reservation_id,
            user_id: user.id,
            client_id: client.id,
            selection,
            passengers,
        },
        attempt: 1,
    };
    let outcome = state
        .reservations
        .send_and_wait_for(command, move |a| a.is_outcome_for(reservation_id), COMMAND_TIMEOUT)
        .await
        .map_err(command_failed)?;

    match outcome {
        ReservationAction::BookingConfirmed {
            reservation,
            cabin_number,
            quote,
        } => {
            save_wizard(&state, session, None).await?;
            info!(reservation = %reservation.id, cabin = %cabin_number, "Booking placed");
            Ok((
                StatusCode::CREATED,
                Json(BookingConfirmation {
                    reservation,
                    cabin_number,
                    quote,
                }),
            ))
        },
        // The wizard stays so another cabin type can be chosen.
        ReservationAction::BookingRejected { error, .. } => Err(error.into()),
        other => Err(AppError::internal(format!("Unexpected booking outcome: {other:?}"))),
    }
}
