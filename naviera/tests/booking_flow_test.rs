//! Booking flow tests over the reservation store.
//!
//! The suite on the Patagonia leg is a single cabin, so concurrent bookings
//! for it race for one occupancy row.
//!
//! Run with: `cargo test --test booking_flow_test`

#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use naviera::aggregates::reservation::{BookingRequest, RejectionReason};
use naviera::aggregates::{ReservationAction, ReservationEnvironment, ReservationReducer, ReservationState};
use naviera::booking::availability::free_cabins;
use naviera::booking::wizard::{CabinSelection, PassengerDraft};
use naviera::catalog::{Catalog, VoyageShip};
use naviera::error::NavieraError;
use naviera::seed::{demo_fleet, DemoFleet};
use naviera::storage::Storage;
use naviera::types::{CabinTypeId, ClientId, Gender, ReservationId, ReservationStatus, UserId, VoyageShipId};
use naviera_core::environment::Clock;
use naviera_runtime::Store;
use naviera_testing::test_clock;
use std::sync::Arc;
use std::time::Duration;

type ReservationStore = Store<ReservationState, ReservationAction, ReservationEnvironment, ReservationReducer>;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    store: ReservationStore,
    catalog: Catalog,
    storage: Storage,
    fleet: DemoFleet,
}

async fn harness() -> Harness {
    let clock = test_clock();
    let storage = Storage::memory();
    let catalog = Catalog::new(&storage);
    let fleet = demo_fleet(&catalog, clock.today()).await.unwrap();
    let store = Store::new(
        ReservationState::default(),
        ReservationReducer::new(),
        ReservationEnvironment::new(catalog.clone(), Arc::new(clock), 3),
    );
    Harness {
        store,
        catalog,
        storage,
        fleet,
    }
}

fn passenger(dni: &str) -> PassengerDraft {
    PassengerDraft {
        first_name: "Martín".to_string(),
        last_name: "Suárez".to_string(),
        dni: dni.to_string(),
        birth_date: NaiveDate::from_ymd_opt(1984, 11, 2).unwrap(),
        nationality: "Uruguay".to_string(),
        gender: Gender::Male,
    }
}

fn booking(leg: VoyageShipId, cabin_type: CabinTypeId, user: UserId, count: u32) -> BookingRequest {
    BookingRequest {
        reservation_id: ReservationId::new(),
        user_id: user,
        client_id: ClientId::new(),
        selection: CabinSelection {
            voyage_ship_id: leg,
            cabin_type_id: cabin_type,
            passenger_count: count,
        },
        passengers: (0..count).map(|i| passenger(&format!("UY-{i}"))).collect(),
    }
}

async fn confirm(store: &ReservationStore, request: BookingRequest) -> ReservationAction {
    let id = request.reservation_id;
    store
        .send_and_wait_for(
            ReservationAction::ConfirmBooking { request, attempt: 1 },
            move |a| a.is_outcome_for(id),
            WAIT,
        )
        .await
        .unwrap()
}

async fn cancel(store: &ReservationStore, reservation_id: ReservationId, user_id: UserId, staff: bool) -> ReservationAction {
    store
        .send_and_wait_for(
            ReservationAction::CancelReservation {
                reservation_id,
                user_id,
                staff,
            },
            move |a| a.is_outcome_for(reservation_id),
            WAIT,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn concurrent_bookings_for_the_last_suite_confirm_exactly_one() {
    let h = harness().await;
    let first = booking(h.fleet.patagonia_leg, h.fleet.suite, UserId::new(), 2);
    let second = booking(h.fleet.patagonia_leg, h.fleet.suite, UserId::new(), 2);

    let (a, b) = tokio::join!(confirm(&h.store, first), confirm(&h.store, second));

    let confirmed = [&a, &b]
        .iter()
        .filter(|o| matches!(o, ReservationAction::BookingConfirmed { .. }))
        .count();
    assert_eq!(confirmed, 1, "outcomes: {a:?} / {b:?}");
    let loser = if matches!(a, ReservationAction::BookingConfirmed { .. }) { &b } else { &a };
    assert!(matches!(
        loser,
        ReservationAction::BookingRejected {
            reason: RejectionReason::CabinUnavailable | RejectionReason::NoCabinAvailable,
            ..
        }
    ));

    let occupancies = h.storage.bookings.occupancies(Some(h.fleet.patagonia_leg)).await.unwrap();
    assert_eq!(
        occupancies.iter().filter(|o| o.cabin_id == h.fleet.aurora_suite).count(),
        1
    );

    // Outcomes are broadcast before they are reduced; give the counters a moment.
    let mut totals = (0, 0);
    for _ in 0..50 {
        totals = h.store.state(|s| (s.confirmed, s.rejected)).await;
        if totals == (1, 1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(totals, (1, 1));
}

#[tokio::test]
async fn cancelling_frees_the_cabin_for_the_next_booking() {
    let h = harness().await;
    let owner = UserId::new();

    let ReservationAction::BookingConfirmed { reservation, cabin_number, .. } =
        confirm(&h.store, booking(h.fleet.patagonia_leg, h.fleet.suite, owner, 3)).await
    else {
        unreachable!("suite should be free");
    };
    assert_eq!(cabin_number, "210");
    assert_eq!(reservation.status, ReservationStatus::Confirmed);

    let leg = h.catalog.require::<VoyageShip>(h.fleet.patagonia_leg).await.unwrap();
    assert!(free_cabins(&h.catalog, &leg, h.fleet.suite).await.unwrap().is_empty());

    let outcome = cancel(&h.store, reservation.id, owner, false).await;
    assert!(matches!(outcome, ReservationAction::ReservationCancelled { .. }), "{outcome:?}");

    let free = free_cabins(&h.catalog, &leg, h.fleet.suite).await.unwrap();
    assert_eq!(free.iter().map(|c| c.id).collect::<Vec<_>>(), vec![h.fleet.aurora_suite]);

    let stored = h.storage.bookings.reservation(reservation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReservationStatus::Cancelled);
    let history = h.storage.bookings.reservation_history(reservation.id).await.unwrap();
    assert_eq!(history.len(), 2);

    let again = cancel(&h.store, reservation.id, owner, false).await;
    assert!(matches!(again, ReservationAction::CancellationRejected { .. }));

    let rebooked = confirm(&h.store, booking(h.fleet.patagonia_leg, h.fleet.suite, UserId::new(), 1)).await;
    assert!(matches!(rebooked, ReservationAction::BookingConfirmed { .. }));
}

#[tokio::test]
async fn someone_elses_reservation_reads_as_not_found() {
    let h = harness().await;
    let ReservationAction::BookingConfirmed { reservation, .. } =
        confirm(&h.store, booking(h.fleet.patagonia_leg, h.fleet.inside, UserId::new(), 2)).await
    else {
        unreachable!("inside cabins should be free");
    };

    let outcome = cancel(&h.store, reservation.id, UserId::new(), false).await;
    assert!(matches!(
        outcome,
        ReservationAction::CancellationRejected {
            error: NavieraError::NotFound { .. },
            ..
        }
    ));

    let by_staff = cancel(&h.store, reservation.id, UserId::new(), true).await;
    assert!(matches!(by_staff, ReservationAction::ReservationCancelled { .. }));
}

#[tokio::test]
async fn departed_voyage_is_not_bookable() {
    let h = harness().await;
    let outcome = confirm(&h.store, booking(h.fleet.past_leg, h.fleet.inside, UserId::new(), 1)).await;
    assert!(matches!(
        outcome,
        ReservationAction::BookingRejected {
            reason: RejectionReason::Departed,
            ..
        }
    ));
    assert!(h.storage.bookings.list_reservations().await.unwrap().is_empty());
}

#[tokio::test]
async fn party_larger_than_the_cabin_is_refused() {
    let h = harness().await;
    let outcome = confirm(&h.store, booking(h.fleet.patagonia_leg, h.fleet.inside, UserId::new(), 3)).await;
    assert!(matches!(
        outcome,
        ReservationAction::BookingRejected {
            reason: RejectionReason::CapacityExceeded,
            ..
        }
    ));
}
