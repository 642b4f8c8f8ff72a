//! In-memory storage backend.
//!
//! Every table sits behind one `RwLock`, so multi-table writes such as
//! [`BookingRepository::commit_booking`] are atomic and unique checks cannot
//! race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::balance::{check_new_payment, plan_status_change};
use super::{
    AccountRepository, BookingRepository, NewBooking, PaymentRepository, PaymentStatusChange,
    RecordStore, ReservationStatusChange, StorageError, StorageResult, CLIENT_DNI_UNIQUE,
    CLIENT_USER_UNIQUE, EMAIL_UNIQUE, OCCUPANCY_UNIQUE, USERNAME_UNIQUE,
};
use crate::types::{
    CabinId, CabinOccupancy, Client, ClientId, OccupancyId, Passenger, PassengerStatus, Payment,
    PaymentHistory, PaymentId, Reservation, ReservationHistory, ReservationId, ReservationStatus,
    User, UserId, VoyageShipId,
};

#[derive(Default)]
struct Tables {
    records: HashMap<String, BTreeMap<Uuid, Value>>,
    users: HashMap<UserId, (User, String)>,
    clients: HashMap<ClientId, Client>,
    reservations: HashMap<ReservationId, Reservation>,
    passengers: Vec<Passenger>,
    reservation_history: Vec<ReservationHistory>,
    occupancies: HashMap<OccupancyId, CabinOccupancy>,
    payments: HashMap<PaymentId, Payment>,
    payment_history: Vec<PaymentHistory>,
}

impl Tables {
    fn cabin_taken(&self, occupancy: &CabinOccupancy) -> bool {
        self.occupancies.values().any(|o| {
            o.cabin_id == occupancy.cabin_id && o.voyage_ship_id == occupancy.voyage_ship_id
        })
    }

    fn reservation_payments(&self, reservation: ReservationId) -> Vec<Payment> {
        self.payments
            .values()
            .filter(|p| p.reservation_id == reservation)
            .cloned()
            .collect()
    }

    fn apply_reservation_change(&mut self, change: &ReservationStatusChange) -> StorageResult<()> {
        let reservation = self
            .reservations
            .get_mut(&change.reservation_id)
            .ok_or_else(|| StorageError::NotFound(format!("reservation {}", change.reservation_id)))?;
        reservation.status = change.status;
        reservation.updated_at = change.history.changed_at;
        self.reservation_history.push(change.history.clone());
        Ok(())
    }
}

fn conflict(constraint: &str) -> StorageError {
    StorageError::Conflict {
        constraint: constraint.to_string(),
    }
}

fn newest_first<T>(mut rows: Vec<T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.sort_by_key(|row| std::cmp::Reverse(key(row)));
    rows
}

/// In-memory implementation of every repository.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStorage {
    async fn get_record(&self, kind: &str, id: Uuid) -> StorageResult<Option<Value>> {
        let tables = self.tables.read().await;
        Ok(tables.records.get(kind).and_then(|rows| rows.get(&id)).cloned())
    }

    async fn list_records(&self, kind: &str) -> StorageResult<Vec<Value>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .get(kind)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put_record(&self, kind: &str, id: Uuid, data: Value) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables.records.entry(kind.to_string()).or_default().insert(id, data);
        Ok(())
    }

    async fn delete_record(&self, kind: &str, id: Uuid) -> StorageResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .records
            .get_mut(kind)
            .is_some_and(|rows| rows.remove(&id).is_some()))
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MemoryStorage {
    async fn create_user(&self, user: &User, password_hash: &str) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|(u, _)| u.username == user.username) {
            return Err(conflict(USERNAME_UNIQUE));
        }
        if tables
            .users
            .values()
            .any(|(u, _)| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(conflict(EMAIL_UNIQUE));
        }
        tables
            .users
            .insert(user.id, (user.clone(), password_hash.to_string()));
        Ok(())
    }

    async fn user(&self, id: UserId) -> StorageResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|(user, _)| user.clone()))
    }

    async fn credentials(&self, identifier: &str) -> StorageResult<Option<(User, String)>> {
        let tables = self.tables.read().await;
        let by_username = tables.users.values().find(|(u, _)| u.username == identifier);
        let found = by_username.or_else(|| {
            tables
                .users
                .values()
                .find(|(u, _)| u.email.eq_ignore_ascii_case(identifier))
        });
        Ok(found.cloned())
    }

    async fn password_hash(&self, id: UserId) -> StorageResult<Option<String>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|(_, hash)| hash.clone()))
    }

    async fn update_user(&self, user: &User) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|(u, _)| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(conflict(EMAIL_UNIQUE));
        }
        let (stored, _) = tables
            .users
            .get_mut(&user.id)
            .ok_or_else(|| StorageError::NotFound(format!("user {}", user.id)))?;
        *stored = user.clone();
        Ok(())
    }

    async fn set_password(&self, id: UserId, password_hash: &str) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let (_, hash) = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("user {id}")))?;
        *hash = password_hash.to_string();
        Ok(())
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if let Some((user, _)) = tables.users.get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn username_taken(&self, username: &str) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().any(|(u, _)| u.username == username))
    }

    async fn email_taken(&self, email: &str, except: Option<UserId>) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .any(|(u, _)| Some(u.id) != except && u.email.eq_ignore_ascii_case(email)))
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().map(|(u, _)| u.clone()).collect();
        users.sort_by_key(|u| u.date_joined);
        Ok(users)
    }

    async fn create_client(&self, client: &Client) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.clients.values().any(|c| c.dni == client.dni) {
            return Err(conflict(CLIENT_DNI_UNIQUE));
        }
        if client.user_id.is_some() && tables.clients.values().any(|c| c.user_id == client.user_id) {
            return Err(conflict(CLIENT_USER_UNIQUE));
        }
        tables.clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn client(&self, id: ClientId) -> StorageResult<Option<Client>> {
        let tables = self.tables.read().await;
        Ok(tables.clients.get(&id).cloned())
    }

    async fn client_for_user(&self, user: UserId) -> StorageResult<Option<Client>> {
        let tables = self.tables.read().await;
        Ok(tables
            .clients
            .values()
            .find(|c| c.user_id == Some(user))
            .cloned())
    }

    async fn dni_taken(&self, dni: &str) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.clients.values().any(|c| c.dni == dni))
    }

    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        let tables = self.tables.read().await;
        let mut clients: Vec<Client> = tables.clients.values().cloned().collect();
        clients.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(clients)
    }
}

#[async_trait]
impl BookingRepository for MemoryStorage {
    async fn occupied_cabins(&self, leg: VoyageShipId) -> StorageResult<HashSet<CabinId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .occupancies
            .values()
            .filter(|o| o.voyage_ship_id == leg)
            .map(|o| o.cabin_id)
            .collect())
    }

    async fn booked_passengers(&self, leg: VoyageShipId) -> StorageResult<u32> {
        let tables = self.tables.read().await;
        let live: HashSet<ReservationId> = tables
            .reservations
            .values()
            .filter(|r| r.voyage_ship_id == leg && r.status != ReservationStatus::Cancelled)
            .map(|r| r.id)
            .collect();
        let count = tables
            .passengers
            .iter()
            .filter(|p| live.contains(&p.reservation_id))
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn commit_booking(&self, booking: &NewBooking) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.cabin_taken(&booking.occupancy) {
            return Err(conflict(OCCUPANCY_UNIQUE));
        }
        tables
            .reservations
            .insert(booking.reservation.id, booking.reservation.clone());
        tables.passengers.extend(booking.passengers.iter().cloned());
        tables
            .occupancies
            .insert(booking.occupancy.id, booking.occupancy.clone());
        tables.reservation_history.push(booking.history.clone());
        Ok(())
    }

    async fn reservation(&self, id: ReservationId) -> StorageResult<Option<Reservation>> {
        let tables = self.tables.read().await;
        Ok(tables.reservations.get(&id).cloned())
    }

    async fn passengers(&self, reservation: ReservationId) -> StorageResult<Vec<Passenger>> {
        let tables = self.tables.read().await;
        Ok(tables
            .passengers
            .iter()
            .filter(|p| p.reservation_id == reservation)
            .cloned()
            .collect())
    }

    async fn reservation_history(
        &self,
        reservation: ReservationId,
    ) -> StorageResult<Vec<ReservationHistory>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reservation_history
            .iter()
            .filter(|h| h.reservation_id == reservation)
            .cloned()
            .collect())
    }

    async fn reservations_for_user(&self, user: UserId) -> StorageResult<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let rows = tables
            .reservations
            .values()
            .filter(|r| r.user_id == user)
            .cloned()
            .collect();
        Ok(newest_first(rows, |r| r.created_at))
    }

    async fn list_reservations(&self) -> StorageResult<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let rows = tables.reservations.values().cloned().collect();
        Ok(newest_first(rows, |r| r.created_at))
    }

    async fn cancel_reservation(&self, change: &ReservationStatusChange) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables.apply_reservation_change(change)?;
        for passenger in tables
            .passengers
            .iter_mut()
            .filter(|p| p.reservation_id == change.reservation_id)
        {
            passenger.status = PassengerStatus::Cancelled;
        }
        tables
            .occupancies
            .retain(|_, o| o.reservation_id != Some(change.reservation_id));
        Ok(())
    }

    async fn occupancies(&self, leg: Option<VoyageShipId>) -> StorageResult<Vec<CabinOccupancy>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<CabinOccupancy> = tables
            .occupancies
            .values()
            .filter(|o| leg.is_none_or(|leg| o.voyage_ship_id == leg))
            .cloned()
            .collect();
        rows.sort_by_key(|o| (o.start_date, o.cabin_id));
        Ok(rows)
    }

    async fn occupancy(&self, id: OccupancyId) -> StorageResult<Option<CabinOccupancy>> {
        let tables = self.tables.read().await;
        Ok(tables.occupancies.get(&id).cloned())
    }

    async fn claim_cabin(&self, occupancy: &CabinOccupancy) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.cabin_taken(occupancy) {
            return Err(conflict(OCCUPANCY_UNIQUE));
        }
        tables.occupancies.insert(occupancy.id, occupancy.clone());
        Ok(())
    }

    async fn release_occupancy(&self, id: OccupancyId) -> StorageResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.occupancies.remove(&id).is_some())
    }

    async fn cabin_in_use(&self, cabin: CabinId) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.occupancies.values().any(|o| o.cabin_id == cabin)
            || tables.reservations.values().any(|r| r.cabin_id == Some(cabin)))
    }

    async fn leg_in_use(&self, leg: VoyageShipId) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.occupancies.values().any(|o| o.voyage_ship_id == leg)
            || tables.reservations.values().any(|r| r.voyage_ship_id == leg))
    }
}

#[async_trait]
impl PaymentRepository for MemoryStorage {
    async fn create_payment(&self, payment: &Payment, history: &PaymentHistory) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let reservation = tables
            .reservations
            .get(&payment.reservation_id)
            .ok_or_else(|| StorageError::NotFound(format!("reservation {}", payment.reservation_id)))?;
        check_new_payment(reservation, &tables.reservation_payments(reservation.id), payment)?;
        tables.payments.insert(payment.id, payment.clone());
        tables.payment_history.push(history.clone());
        Ok(())
    }

    async fn payment(&self, id: PaymentId) -> StorageResult<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).cloned())
    }

    async fn update_payment_status(&self, change: &PaymentStatusChange) -> StorageResult<Option<ReservationStatus>> {
        let mut tables = self.tables.write().await;
        let payment = tables
            .payments
            .get(&change.payment_id)
            .ok_or_else(|| StorageError::NotFound(format!("payment {}", change.payment_id)))?;
        let reservation = tables
            .reservations
            .get(&payment.reservation_id)
            .ok_or_else(|| StorageError::NotFound(format!("reservation {}", payment.reservation_id)))?;
        let reservation_change = plan_status_change(
            change,
            payment,
            reservation,
            &tables.reservation_payments(reservation.id),
        )?;

        if let Some(reservation_change) = &reservation_change {
            tables.apply_reservation_change(reservation_change)?;
        }
        if let Some(payment) = tables.payments.get_mut(&change.payment_id) {
            payment.status = change.status;
            payment.updated_at = change.at;
        }
        tables.payment_history.push(change.history.clone());
        Ok(reservation_change.map(|c| c.status))
    }

    async fn payments_for_reservation(&self, reservation: ReservationId) -> StorageResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.reservation_id == reservation)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.created_at);
        Ok(rows)
    }

    async fn payments_for_user(&self, user: UserId) -> StorageResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        let rows = tables
            .payments
            .values()
            .filter(|p| {
                tables
                    .reservations
                    .get(&p.reservation_id)
                    .is_some_and(|r| r.user_id == user)
            })
            .cloned()
            .collect();
        Ok(newest_first(rows, |p| p.created_at))
    }

    async fn list_payments(&self) -> StorageResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        let rows = tables.payments.values().cloned().collect();
        Ok(newest_first(rows, |p| p.created_at))
    }

    async fn payment_history(&self, payment: PaymentId) -> StorageResult<Vec<PaymentHistory>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payment_history
            .iter()
            .filter(|h| h.payment_id == payment)
            .cloned()
            .collect())
    }
}
