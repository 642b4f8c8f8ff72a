//! Read models for reservations and payments: the account pages and the
//! back-office lists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::catalog::{Cabin, Catalog, Record, Ship, Voyage, VoyageShip};
use crate::error::{NavieraError, Result};
use crate::storage::{outstanding, Storage};
use crate::types::{
    CabinId, Client, ClientId, Money, Passenger, Payment, PaymentHistory, PaymentMethod, PaymentStatus,
    Reservation, ReservationHistory, ReservationId, ReservationStatus, ShipId, UserId, VoyageId,
    VoyageShipId,
};

/// A reservation with what it is for.
#[derive(Clone, Debug, Serialize)]
pub struct ReservationSummary {
    /// The reservation
    #[serde(flatten)]
    pub reservation: Reservation,
    /// Voyage
    pub voyage_id: Option<VoyageId>,
    /// Voyage name
    pub voyage_name: String,
    /// Ship name
    pub ship_name: String,
    /// First day
    pub departure_date: Option<NaiveDate>,
    /// Last day
    pub end_date: Option<NaiveDate>,
    /// Cabin number
    pub cabin_number: Option<String>,
    /// Travelling client
    pub client_name: String,
}

/// A reservation with everything attached to it.
#[derive(Clone, Debug, Serialize)]
pub struct ReservationDetail {
    /// Summary
    #[serde(flatten)]
    pub summary: ReservationSummary,
    /// Passengers
    pub passengers: Vec<Passenger>,
    /// History, oldest first
    pub history: Vec<ReservationHistory>,
    /// Payments, oldest first
    pub payments: Vec<Payment>,
    /// Still owed (total minus approved and pending payments)
    pub outstanding: Money,
}

/// Catalog names needed to describe a batch of reservations. Only the rows
/// those reservations point at are read.
struct Lookup {
    legs: HashMap<VoyageShipId, VoyageShip>,
    voyages: HashMap<VoyageId, Voyage>,
    ships: HashMap<ShipId, Ship>,
    cabins: HashMap<CabinId, Cabin>,
    clients: HashMap<ClientId, Client>,
}

/// Fetch each distinct id once, skipping ids with no row.
async fn fetch_each<R: Record>(catalog: &Catalog, ids: HashSet<R::Id>) -> Result<HashMap<R::Id, R>>
where
    R::Id: Eq + std::hash::Hash,
{
    let mut found = HashMap::with_capacity(ids.len());
    for id in ids {
        if let Some(record) = catalog.get::<R>(id).await? {
            found.insert(id, record);
        }
    }
    Ok(found)
}

impl Lookup {
    async fn load(storage: &Storage, catalog: &Catalog, reservations: &[Reservation]) -> Result<Self> {
        let legs: HashMap<VoyageShipId, VoyageShip> =
            fetch_each(catalog, reservations.iter().map(|r| r.voyage_ship_id).collect()).await?;
        let voyages = fetch_each(catalog, legs.values().map(|l| l.voyage_id).collect()).await?;
        let ships = fetch_each(catalog, legs.values().map(|l| l.ship_id).collect()).await?;
        let cabins = fetch_each(catalog, reservations.iter().filter_map(|r| r.cabin_id).collect()).await?;

        let client_ids: HashSet<ClientId> = reservations.iter().map(|r| r.client_id).collect();
        let mut clients = HashMap::with_capacity(client_ids.len());
        for id in client_ids {
            if let Some(client) = storage.accounts.client(id).await? {
                clients.insert(id, client);
            }
        }
        Ok(Self {
            legs,
            voyages,
            ships,
            cabins,
            clients,
        })
    }

    fn summarize(&self, reservation: Reservation) -> ReservationSummary {
        let leg = self.legs.get(&reservation.voyage_ship_id);
        let voyage = leg.and_then(|l| self.voyages.get(&l.voyage_id));
        let ship = leg.and_then(|l| self.ships.get(&l.ship_id));
        let cabin = reservation.cabin_id.and_then(|id| self.cabins.get(&id));
        let client = self.clients.get(&reservation.client_id);
        ReservationSummary {
            voyage_id: voyage.map(|v| v.id),
            voyage_name: voyage.map(|v| v.name.clone()).unwrap_or_default(),
            ship_name: ship.map(|s| s.name.clone()).unwrap_or_default(),
            departure_date: voyage.map(|v| v.departure_date),
            end_date: voyage.map(|v| v.end_date),
            cabin_number: cabin.map(|c| c.number.clone()),
            client_name: client
                .map(|c| format!("{} {}", c.first_name, c.last_name))
                .unwrap_or_default(),
            reservation,
        }
    }
}

/// The user's reservations, newest first.
///
/// # Errors
///
/// Storage failures.
pub async fn my_reservations(storage: &Storage, catalog: &Catalog, user: UserId) -> Result<Vec<ReservationSummary>> {
    let reservations = storage.bookings.reservations_for_user(user).await?;
    let lookup = Lookup::load(storage, catalog, &reservations).await?;
    Ok(reservations.into_iter().map(|r| lookup.summarize(r)).collect())
}

/// Count of the user's reservations per status.
///
/// # Errors
///
/// Storage failures.
pub async fn reservation_counts(storage: &Storage, user: UserId) -> Result<HashMap<ReservationStatus, usize>> {
    let mut counts: HashMap<ReservationStatus, usize> =
        ReservationStatus::ALL.iter().map(|status| (*status, 0)).collect();
    for reservation in storage.bookings.reservations_for_user(user).await? {
        *counts.entry(reservation.status).or_default() += 1;
    }
    Ok(counts)
}

/// One reservation with passengers, history and payments.
///
/// `owner` restricts the lookup to that account's reservations; anything
/// else reads as not found.
///
/// # Errors
///
/// Not found, or storage failures.
pub async fn reservation_detail(
    storage: &Storage,
    catalog: &Catalog,
    id: ReservationId,
    owner: Option<UserId>,
) -> Result<ReservationDetail> {
    let reservation = storage
        .bookings
        .reservation(id)
        .await?
        .filter(|r| owner.is_none_or(|user| r.user_id == user))
        .ok_or_else(|| NavieraError::not_found("Reservation", id))?;
    let passengers = storage.bookings.passengers(id).await?;
    let history = storage.bookings.reservation_history(id).await?;
    let payments = storage.payments.payments_for_reservation(id).await?;
    let outstanding = outstanding(&reservation, &payments);
    let lookup = Lookup::load(storage, catalog, std::slice::from_ref(&reservation)).await?;
    Ok(ReservationDetail {
        summary: lookup.summarize(reservation),
        passengers,
        history,
        payments,
        outstanding,
    })
}

/// Back-office reservation filters.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReservationFilter {
    /// Exact status
    pub status: Option<ReservationStatus>,
    /// Exact leg
    pub voyage_ship: Option<VoyageShipId>,
    /// Client first/last name or voyage name, case-insensitive substring
    pub q: Option<String>,
}

impl ReservationFilter {
    fn matches(&self, summary: &ReservationSummary) -> bool {
        if self.status.is_some_and(|s| s != summary.reservation.status) {
            return false;
        }
        if self.voyage_ship.is_some_and(|leg| leg != summary.reservation.voyage_ship_id) {
            return false;
        }
        let query = self.q.as_deref().unwrap_or("").trim().to_lowercase();
        query.is_empty()
            || summary.client_name.to_lowercase().contains(&query)
            || summary.voyage_name.to_lowercase().contains(&query)
    }
}

/// Every reservation matching `filter`, newest first.
///
/// # Errors
///
/// Storage failures.
pub async fn list_reservations(
    storage: &Storage,
    catalog: &Catalog,
    filter: &ReservationFilter,
) -> Result<Vec<ReservationSummary>> {
    let reservations = storage.bookings.list_reservations().await?;
    let lookup = Lookup::load(storage, catalog, &reservations).await?;
    Ok(reservations
        .into_iter()
        .map(|r| lookup.summarize(r))
        .filter(|s| filter.matches(s))
        .collect())
}

/// Back-office payment filters.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaymentFilter {
    /// Exact status
    pub status: Option<PaymentStatus>,
    /// Exact method
    pub method: Option<PaymentMethod>,
    /// Reservation id prefix
    pub q: Option<String>,
}

impl PaymentFilter {
    /// Whether `payment` passes every filter.
    #[must_use]
    pub fn matches(&self, payment: &Payment) -> bool {
        let prefix = self.q.as_deref().unwrap_or("").trim().to_lowercase();
        self.status.is_none_or(|s| s == payment.status)
            && self.method.is_none_or(|m| m == payment.method)
            && (prefix.is_empty() || payment.reservation_id.to_string().starts_with(&prefix))
    }
}

/// A payment with its audit trail.
#[derive(Clone, Debug, Serialize)]
pub struct PaymentDetail {
    /// The payment
    #[serde(flatten)]
    pub payment: Payment,
    /// History, oldest first
    pub history: Vec<PaymentHistory>,
}

/// A payment and its history.
///
/// # Errors
///
/// Not found, or storage failures.
pub async fn payment_detail(storage: &Storage, id: crate::types::PaymentId) -> Result<PaymentDetail> {
    let payment = storage
        .payments
        .payment(id)
        .await?
        .ok_or_else(|| NavieraError::not_found("Payment", id))?;
    let history = storage.payments.payment_history(id).await?;
    Ok(PaymentDetail { payment, history })
}
