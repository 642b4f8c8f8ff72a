//! Reservation reducer: confirming bookings and cancelling them.
//!
//! Confirmation is the only place a cabin is handed to a customer. The effect
//! re-reads availability, picks the first free cabin and commits the whole
//! booking in one storage call. Storage refuses a second occupancy of the same
//! cabin on the same leg; when that happens the command is sent again with a
//! bumped `attempt`, so the next try sees the cabin as taken and picks another.

use chrono::{DateTime, Utc};
use naviera_core::{async_effect, effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::booking::availability::{check_room, free_cabins, LegContext};
use crate::booking::pricing::{quote, Quote};
use crate::booking::wizard::{validate_passengers, CabinSelection, PassengerDraft};
use crate::catalog::{Catalog, Voyage, VoyageShip};
use crate::error::NavieraError;
use crate::storage::{NewBooking, ReservationStatusChange, OCCUPANCY_UNIQUE};
use crate::types::{
    CabinId, CabinOccupancy, ClientId, OccupancyId, Occupant, Passenger, PassengerId, PassengerStatus,
    Reservation, ReservationHistory, ReservationId, ReservationStatus, UserId,
};

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// A booking to place, as collected by the wizard.
#[derive(Clone, Debug)]
pub struct BookingRequest {
    /// Id the reservation will have (chosen by the caller so it can wait for it)
    pub reservation_id: ReservationId,
    /// Account booking
    pub user_id: UserId,
    /// Client travelling
    pub client_id: ClientId,
    /// Leg, cabin type and party size
    pub selection: CabinSelection,
    /// Travellers; the first one is the lead passenger
    pub passengers: Vec<PassengerDraft>,
}

/// Why a booking was not placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Every attempt lost its cabin to a concurrent booking
    CabinUnavailable,
    /// No cabin of the type is free on the leg
    NoCabinAvailable,
    /// The voyage has departed
    Departed,
    /// The party does not fit the cabin type or the ship
    CapacityExceeded,
    /// Leg, voyage, ship or cabin type is missing
    NotFound,
    /// The passenger list is invalid
    Invalid,
    /// Storage failed
    Storage,
}

impl RejectionReason {
    /// Metric label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CabinUnavailable => "cabin_unavailable",
            Self::NoCabinAvailable => "no_cabin_available",
            Self::Departed => "departed",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::NotFound => "not_found",
            Self::Invalid => "invalid",
            Self::Storage => "storage",
        }
    }
}

/// Actions for the reservation reducer
#[derive(Clone, Debug)]
pub enum ReservationAction {
    // Commands
    /// Place a booking. `attempt` starts at 1.
    ConfirmBooking {
        /// What to book
        request: BookingRequest,
        /// Which try this is
        attempt: u32,
    },

    /// Cancel a reservation and free its cabin
    CancelReservation {
        /// Reservation
        reservation_id: ReservationId,
        /// Who asks
        user_id: UserId,
        /// Staff may cancel anyone's reservation
        staff: bool,
    },

    // Events
    /// The booking was committed
    BookingConfirmed {
        /// The new reservation
        reservation: Reservation,
        /// Cabin number assigned
        cabin_number: String,
        /// Price breakdown
        quote: Quote,
    },

    /// The booking was not placed
    BookingRejected {
        /// Reservation id that was requested
        reservation_id: ReservationId,
        /// Why
        reason: RejectionReason,
        /// Details for the caller
        error: NavieraError,
    },

    /// The reservation was cancelled
    ReservationCancelled {
        /// Reservation
        reservation_id: ReservationId,
        /// When
        cancelled_at: DateTime<Utc>,
    },

    /// The cancellation was refused
    CancellationRejected {
        /// Reservation
        reservation_id: ReservationId,
        /// Why
        error: NavieraError,
    },
}

impl ReservationAction {
    /// The reservation this action is about.
    #[must_use]
    pub const fn reservation_id(&self) -> ReservationId {
        match self {
            Self::ConfirmBooking { request, .. } => request.reservation_id,
            Self::BookingConfirmed { reservation, .. } => reservation.id,
            Self::CancelReservation { reservation_id, .. }
            | Self::BookingRejected { reservation_id, .. }
            | Self::ReservationCancelled { reservation_id, .. }
            | Self::CancellationRejected { reservation_id, .. } => *reservation_id,
        }
    }

    /// Whether this is a final outcome for `reservation_id`.
    #[must_use]
    pub fn is_outcome_for(&self, reservation_id: ReservationId) -> bool {
        !matches!(self, Self::ConfirmBooking { .. } | Self::CancelReservation { .. })
            && self.reservation_id() == reservation_id
    }
}

// ============================================================================
// State
// ============================================================================

/// Bookings in progress and running totals.
#[derive(Clone, Debug, Default)]
pub struct ReservationState {
    /// Confirmations in flight, with their current attempt
    pub in_flight: HashMap<ReservationId, u32>,
    /// Bookings confirmed since start
    pub confirmed: u64,
    /// Bookings rejected since start
    pub rejected: u64,
    /// Reservations cancelled since start
    pub cancelled: u64,
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the reservation reducer
#[derive(Clone)]
pub struct ReservationEnvironment {
    /// Catalog and booking storage
    pub catalog: Catalog,
    /// Clock for timestamps and departure checks
    pub clock: Arc<dyn Clock>,
    /// Cabins to try before giving up on a contended cabin type
    pub max_attempts: u32,
}

impl ReservationEnvironment {
    /// Creates a new `ReservationEnvironment`
    #[must_use]
    pub fn new(catalog: Catalog, clock: Arc<dyn Clock>, max_attempts: u32) -> Self {
        Self {
            catalog,
            clock,
            max_attempts: max_attempts.max(1),
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for reservations
#[derive(Clone, Debug)]
pub struct ReservationReducer;

impl ReservationReducer {
    /// Creates a new `ReservationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for ReservationReducer {
    fn default() -> Self {
        Self::new()
    }
}

fn rejected(reservation_id: ReservationId, reason: RejectionReason, error: NavieraError) -> ReservationAction {
    ReservationAction::BookingRejected {
        reservation_id,
        reason,
        error,
    }
}

/// What to do after the commit lost the cabin to another booking.
fn after_conflict(request: BookingRequest, attempt: u32, max_attempts: u32) -> ReservationAction {
    if attempt < max_attempts {
        warn!(reservation = %request.reservation_id, attempt, "Cabin taken concurrently, retrying");
        ReservationAction::ConfirmBooking {
            request,
            attempt: attempt + 1,
        }
    } else {
        rejected(
            request.reservation_id,
            RejectionReason::CabinUnavailable,
            NavieraError::Conflict(
                "The cabins of this type were just booked by someone else. Please choose another cabin type."
                    .to_string(),
            ),
        )
    }
}

fn reason_for_load_error(error: &NavieraError) -> RejectionReason {
    match error {
        NavieraError::NotFound { .. } => RejectionReason::NotFound,
        NavieraError::Validation(_) => RejectionReason::CapacityExceeded,
        _ => RejectionReason::Storage,
    }
}

/// Load availability, pick a cabin and commit. Returns the next action.
async fn place_booking(
    catalog: Catalog,
    now: DateTime<Utc>,
    request: BookingRequest,
    attempt: u32,
    max_attempts: u32,
) -> ReservationAction {
    let id = request.reservation_id;
    let selection = request.selection;
    let today = now.date_naive();

    let context =
        match LegContext::load(&catalog, selection.voyage_ship_id, selection.cabin_type_id, today).await {
            Ok(context) => context,
            Err(error) => return rejected(id, reason_for_load_error(&error), error),
        };
    if !context.is_open(today) {
        return rejected(
            id,
            RejectionReason::Departed,
            NavieraError::field("voyage_ship_id", "This voyage has already departed."),
        );
    }
    if let Err(error) = check_room(&catalog, &context, selection.passenger_count).await {
        return rejected(id, reason_for_load_error(&error), error);
    }
    let cabin = match free_cabins(&catalog, &context.leg, context.cabin_type.id).await {
        Ok(cabins) => cabins.into_iter().next(),
        Err(error) => return rejected(id, RejectionReason::Storage, error),
    };
    let Some(cabin) = cabin else {
        return rejected(
            id,
            RejectionReason::NoCabinAvailable,
            NavieraError::field(
                "cabin_type_id",
                format!("No {} cabins are left on this sailing.", context.cabin_type.name),
            ),
        );
    };
    let price = match quote(
        context.leg.price,
        &context.cabin_type,
        context.discount_percent,
        selection.passenger_count,
    ) {
        Ok(price) => price,
        Err(error) => return rejected(id, RejectionReason::Storage, error),
    };

    let booking = build_booking(&request, &context.leg, &context.voyage, cabin.id, &cabin.number, &price, now);
    let reservation = booking.reservation.clone();
    match catalog.bookings().commit_booking(&booking).await {
        Ok(()) => ReservationAction::BookingConfirmed {
            reservation,
            cabin_number: cabin.number,
            quote: price,
        },
        Err(error) if error.is_conflict_on(OCCUPANCY_UNIQUE) => after_conflict(request, attempt, max_attempts),
        Err(error) => rejected(id, RejectionReason::Storage, error.into()),
    }
}

fn build_booking(
    request: &BookingRequest,
    leg: &VoyageShip,
    voyage: &Voyage,
    cabin_id: CabinId,
    cabin_number: &str,
    price: &Quote,
    now: DateTime<Utc>,
) -> NewBooking {
    let id = request.reservation_id;
    let passengers: Vec<Passenger> = request
        .passengers
        .iter()
        .map(|draft| Passenger {
            id: PassengerId::new(),
            reservation_id: id,
            first_name: draft.first_name.trim().to_string(),
            last_name: draft.last_name.trim().to_string(),
            dni: draft.dni.trim().to_string(),
            birth_date: draft.birth_date,
            nationality: draft.nationality.trim().to_string(),
            gender: draft.gender,
            status: PassengerStatus::Registered,
        })
        .collect();
    let lead = passengers.first().map_or_else(PassengerId::new, |p| p.id);

    NewBooking {
        reservation: Reservation {
            id,
            client_id: request.client_id,
            user_id: request.user_id,
            voyage_ship_id: leg.id,
            cabin_id: Some(cabin_id),
            status: ReservationStatus::Confirmed,
            total: price.total,
            created_at: now,
            updated_at: now,
        },
        occupancy: CabinOccupancy {
            id: OccupancyId::new(),
            cabin_id,
            voyage_ship_id: leg.id,
            occupant: Occupant::Passenger(lead),
            reservation_id: Some(id),
            start_date: voyage.departure_date,
            end_date: voyage.end_date,
        },
        history: ReservationHistory::new(
            id,
            now,
            format!(
                "Booked cabin {cabin_number} on {} for {} passengers, total {}",
                voyage.name,
                passengers.len(),
                price.total
            ),
        ),
        passengers,
    }
}

async fn cancel(
    catalog: Catalog,
    now: DateTime<Utc>,
    reservation_id: ReservationId,
    user_id: UserId,
    staff: bool,
) -> ReservationAction {
    match try_cancel(&catalog, now, reservation_id, user_id, staff).await {
        Ok(()) => ReservationAction::ReservationCancelled {
            reservation_id,
            cancelled_at: now,
        },
        Err(error) => ReservationAction::CancellationRejected {
            reservation_id,
            error,
        },
    }
}

async fn try_cancel(
    catalog: &Catalog,
    now: DateTime<Utc>,
    reservation_id: ReservationId,
    user_id: UserId,
    staff: bool,
) -> crate::error::Result<()> {
    let reservation = catalog
        .bookings()
        .reservation(reservation_id)
        .await?
        .filter(|r| staff || r.user_id == user_id)
        .ok_or_else(|| NavieraError::not_found("Reservation", reservation_id))?;
    if reservation.status == ReservationStatus::Cancelled {
        return Err(NavieraError::rule("This reservation is already cancelled."));
    }
    let leg = catalog.require::<VoyageShip>(reservation.voyage_ship_id).await?;
    let voyage = catalog.require::<Voyage>(leg.voyage_id).await?;
    if voyage.departure_date <= now.date_naive() {
        return Err(NavieraError::rule(
            "The voyage has already departed; the reservation can no longer be cancelled.",
        ));
    }
    let who = if staff && reservation.user_id != user_id { "staff" } else { "customer" };
    let change = ReservationStatusChange {
        reservation_id,
        status: ReservationStatus::Cancelled,
        history: ReservationHistory::new(reservation_id, now, format!("Cancelled by {who}")),
    };
    catalog.bookings().cancel_reservation(&change).await?;
    Ok(())
}

impl Reducer for ReservationReducer {
    type State = ReservationState;
    type Action = ReservationAction;
    type Environment = ReservationEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Confirm ==========
            ReservationAction::ConfirmBooking { request, attempt } => {
                let id = request.reservation_id;
                let today = env.clock.today();
                if let Err(fields) =
                    validate_passengers(&request.passengers, request.selection.passenger_count, today)
                {
                    return smallvec![async_effect! {
                        Some(rejected(id, RejectionReason::Invalid, fields.into()))
                    }];
                }
                state.in_flight.insert(id, attempt);

                let catalog = env.catalog.clone();
                let now = env.clock.now();
                let max_attempts = env.max_attempts;
                smallvec![async_effect! {
                    Some(place_booking(catalog, now, request, attempt, max_attempts).await)
                }]
            },

            ReservationAction::BookingConfirmed {
                reservation,
                cabin_number,
                ..
            } => {
                state.in_flight.remove(&reservation.id);
                state.confirmed += 1;
                metrics::counter!("naviera.bookings.confirmed").increment(1);
                info!(
                    reservation = %reservation.id,
                    cabin = %cabin_number,
                    total = %reservation.total,
                    "Booking confirmed"
                );
                SmallVec::new()
            },

            ReservationAction::BookingRejected {
                reservation_id,
                reason,
                error,
            } => {
                state.in_flight.remove(&reservation_id);
                state.rejected += 1;
                metrics::counter!("naviera.bookings.rejected", "reason" => reason.as_str()).increment(1);
                info!(reservation = %reservation_id, reason = reason.as_str(), %error, "Booking rejected");
                SmallVec::new()
            },

            // ========== Cancel ==========
            ReservationAction::CancelReservation {
                reservation_id,
                user_id,
                staff,
            } => {
                let catalog = env.catalog.clone();
                let now = env.clock.now();
                smallvec![async_effect! {
                    Some(cancel(catalog, now, reservation_id, user_id, staff).await)
                }]
            },

            ReservationAction::ReservationCancelled { reservation_id, .. } => {
                state.cancelled += 1;
                metrics::counter!("naviera.reservations.cancelled").increment(1);
                info!(reservation = %reservation_id, "Reservation cancelled");
                SmallVec::new()
            },

            ReservationAction::CancellationRejected { reservation_id, error } => {
                info!(reservation = %reservation_id, %error, "Cancellation rejected");
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::seed::{demo_fleet, DemoFleet};
    use crate::storage::Storage;
    use crate::types::{Gender, Money};
    use chrono::NaiveDate;
    use naviera_testing::{assertions, settle, test_clock, FixedClock, ReducerTest};

    fn draft(dni: &str) -> PassengerDraft {
        PassengerDraft {
            first_name: "Lucía".to_string(),
            last_name: "Pérez".to_string(),
            dni: dni.to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            nationality: "Argentina".to_string(),
            gender: Gender::Female,
        }
    }

    fn request(fleet: &DemoFleet, cabin_type: crate::types::CabinTypeId, count: u32) -> BookingRequest {
        BookingRequest {
            reservation_id: ReservationId::new(),
            user_id: UserId::new(),
            client_id: ClientId::new(),
            selection: CabinSelection {
                voyage_ship_id: fleet.patagonia_leg,
                cabin_type_id: cabin_type,
                passenger_count: count,
            },
            passengers: (0..count).map(|i| draft(&format!("DNI-{i}"))).collect(),
        }
    }

    async fn setup() -> (ReservationEnvironment, DemoFleet) {
        let clock = test_clock();
        let catalog = Catalog::new(&Storage::memory());
        let fleet = demo_fleet(&catalog, clock.today()).await.unwrap();
        (ReservationEnvironment::new(catalog, Arc::new(clock), 3), fleet)
    }

    fn bare_env() -> ReservationEnvironment {
        ReservationEnvironment::new(Catalog::new(&Storage::memory()), Arc::new(test_clock()), 3)
    }

    #[test]
    fn invalid_passenger_list_is_rejected_without_touching_state() {
        let req = BookingRequest {
            reservation_id: ReservationId::new(),
            user_id: UserId::new(),
            client_id: ClientId::new(),
            selection: CabinSelection {
                voyage_ship_id: crate::types::VoyageShipId::new(),
                cabin_type_id: crate::types::CabinTypeId::new(),
                passenger_count: 2,
            },
            passengers: vec![draft("A1")],
        };

        ReducerTest::new(ReservationReducer::new())
            .with_env(bare_env())
            .given_state(ReservationState::default())
            .when_action(ReservationAction::ConfirmBooking { request: req, attempt: 1 })
            .then_state(|state| assert!(state.in_flight.is_empty()))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn confirm_tracks_attempt_in_flight() {
        let req = BookingRequest {
            reservation_id: ReservationId::new(),
            user_id: UserId::new(),
            client_id: ClientId::new(),
            selection: CabinSelection {
                voyage_ship_id: crate::types::VoyageShipId::new(),
                cabin_type_id: crate::types::CabinTypeId::new(),
                passenger_count: 1,
            },
            passengers: vec![draft("A1")],
        };
        let id = req.reservation_id;

        ReducerTest::new(ReservationReducer::new())
            .with_env(bare_env())
            .given_state(ReservationState::default())
            .when_action(ReservationAction::ConfirmBooking { request: req, attempt: 2 })
            .then_state(move |state| assert_eq!(state.in_flight.get(&id), Some(&2)))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn conflict_retries_until_attempts_run_out() {
        let req = BookingRequest {
            reservation_id: ReservationId::new(),
            user_id: UserId::new(),
            client_id: ClientId::new(),
            selection: CabinSelection {
                voyage_ship_id: crate::types::VoyageShipId::new(),
                cabin_type_id: crate::types::CabinTypeId::new(),
                passenger_count: 1,
            },
            passengers: vec![draft("A1")],
        };

        let retry = after_conflict(req.clone(), 1, 3);
        assert!(matches!(retry, ReservationAction::ConfirmBooking { attempt: 2, .. }));

        let given_up = after_conflict(req, 3, 3);
        assert!(matches!(
            given_up,
            ReservationAction::BookingRejected {
                reason: RejectionReason::CabinUnavailable,
                error: NavieraError::Conflict(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn confirm_commits_reservation_passengers_and_occupancy() {
        let (env, fleet) = setup().await;
        let req = request(&fleet, fleet.balcony, 2);
        let id = req.reservation_id;
        let mut state = ReservationState::default();

        let actions = settle(
            &ReservationReducer::new(),
            &mut state,
            ReservationAction::ConfirmBooking { request: req, attempt: 1 },
            &env,
        )
        .await;

        let Some(ReservationAction::BookingConfirmed { reservation, cabin_number, quote }) = actions.last() else {
            unreachable!("expected confirmation, got {actions:?}");
        };
        assert_eq!(reservation.id, id);
        assert_eq!(cabin_number, "201");
        // $1000 + 25% balcony, then 15% early bird, times two
        assert_eq!(quote.unit_price, Money::from_cents(106_250));
        assert_eq!(reservation.total, Money::from_cents(212_500));
        assert_eq!(state.confirmed, 1);
        assert!(state.in_flight.is_empty());

        let bookings = env.catalog.bookings();
        assert_eq!(bookings.passengers(id).await.unwrap().len(), 2);
        assert_eq!(bookings.reservation_history(id).await.unwrap().len(), 1);
        let occupied = bookings.occupied_cabins(fleet.patagonia_leg).await.unwrap();
        assert!(occupied.contains(&fleet.aurora_balcony[0]));
    }

    #[tokio::test]
    async fn last_suite_cannot_be_sold_twice() {
        let (env, fleet) = setup().await;
        let reducer = ReservationReducer::new();
        let mut state = ReservationState::default();

        let first = settle(
            &reducer,
            &mut state,
            ReservationAction::ConfirmBooking { request: request(&fleet, fleet.suite, 1), attempt: 1 },
            &env,
        )
        .await;
        assert!(matches!(first.last(), Some(ReservationAction::BookingConfirmed { .. })));

        let second = settle(
            &reducer,
            &mut state,
            ReservationAction::ConfirmBooking { request: request(&fleet, fleet.suite, 1), attempt: 1 },
            &env,
        )
        .await;
        assert!(matches!(
            second.last(),
            Some(ReservationAction::BookingRejected { reason: RejectionReason::NoCabinAvailable, .. })
        ));
        assert_eq!((state.confirmed, state.rejected), (1, 1));
    }

    #[tokio::test]
    async fn party_larger_than_berths_is_rejected() {
        let (env, fleet) = setup().await;
        let mut state = ReservationState::default();

        let actions = settle(
            &ReservationReducer::new(),
            &mut state,
            ReservationAction::ConfirmBooking { request: request(&fleet, fleet.inside, 3), attempt: 1 },
            &env,
        )
        .await;
        let Some(ReservationAction::BookingRejected { reason, error, .. }) = actions.last() else {
            unreachable!("expected rejection, got {actions:?}");
        };
        assert_eq!(*reason, RejectionReason::CapacityExceeded);
        assert!(matches!(error, NavieraError::Validation(f) if f.contains("passenger_count")));
    }

    #[tokio::test]
    async fn departed_voyage_is_rejected() {
        let (env, fleet) = setup().await;
        let mut req = request(&fleet, fleet.inside, 1);
        req.selection.voyage_ship_id = fleet.past_leg;

        let actions = settle(
            &ReservationReducer::new(),
            &mut ReservationState::default(),
            ReservationAction::ConfirmBooking { request: req, attempt: 1 },
            &env,
        )
        .await;
        assert!(matches!(
            actions.last(),
            Some(ReservationAction::BookingRejected { reason: RejectionReason::Departed, .. })
        ));
    }

    #[tokio::test]
    async fn cancel_frees_the_cabin_once() {
        let (env, fleet) = setup().await;
        let reducer = ReservationReducer::new();
        let mut state = ReservationState::default();
        let req = request(&fleet, fleet.suite, 2);
        let (id, owner) = (req.reservation_id, req.user_id);
        settle(&reducer, &mut state, ReservationAction::ConfirmBooking { request: req, attempt: 1 }, &env).await;

        let stranger = settle(
            &reducer,
            &mut state,
            ReservationAction::CancelReservation { reservation_id: id, user_id: UserId::new(), staff: false },
            &env,
        )
        .await;
        assert!(matches!(
            stranger.last(),
            Some(ReservationAction::CancellationRejected { error: NavieraError::NotFound { .. }, .. })
        ));

        let cancelled = settle(
            &reducer,
            &mut state,
            ReservationAction::CancelReservation { reservation_id: id, user_id: owner, staff: false },
            &env,
        )
        .await;
        assert!(matches!(cancelled.last(), Some(ReservationAction::ReservationCancelled { .. })));
        assert!(env.catalog.bookings().occupied_cabins(fleet.patagonia_leg).await.unwrap().is_empty());
        let reservation = env.catalog.bookings().reservation(id).await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Cancelled);

        let again = settle(
            &reducer,
            &mut state,
            ReservationAction::CancelReservation { reservation_id: id, user_id: owner, staff: false },
            &env,
        )
        .await;
        assert!(matches!(again.last(), Some(ReservationAction::CancellationRejected { .. })));
        assert_eq!(state.cancelled, 1);
    }

    #[tokio::test]
    async fn departed_reservation_cannot_be_cancelled() {
        let (env, fleet) = setup().await;
        let reducer = ReservationReducer::new();
        let req = request(&fleet, fleet.inside, 1);
        let (id, owner) = (req.reservation_id, req.user_id);
        settle(&reducer, &mut ReservationState::default(), ReservationAction::ConfirmBooking { request: req, attempt: 1 }, &env).await;

        let later = ReservationEnvironment {
            clock: Arc::new(FixedClock::new(env.clock.now()).advanced(chrono::Duration::days(31))),
            ..env.clone()
        };
        let actions = settle(
            &reducer,
            &mut ReservationState::default(),
            ReservationAction::CancelReservation { reservation_id: id, user_id: owner, staff: true },
            &later,
        )
        .await;
        assert!(matches!(actions.last(), Some(ReservationAction::CancellationRejected { .. })));
    }
}
