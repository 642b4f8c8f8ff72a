//! Postgres storage backend.
//!
//! Tables keep the columns that are queried or constrained (ids, usernames,
//! status, the cabin/leg pair) next to a JSONB `data` column holding the full
//! entity. Unique violations surface as [`StorageError::Conflict`] carrying
//! the constraint name.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

use super::balance::{check_new_payment, plan_status_change, PAYMENT_STATUS_STALE};
use super::{
    AccountRepository, BookingRepository, NewBooking, PaymentRepository, PaymentStatusChange,
    RecordStore, ReservationStatusChange, StorageError, StorageResult,
};
use crate::types::{
    CabinId, CabinOccupancy, Client, ClientId, OccupancyId, Passenger, PassengerStatus, Payment,
    PaymentHistory, PaymentId, Reservation, ReservationHistory, ReservationId, ReservationStatus,
    User, UserId, VoyageShipId,
};

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StorageError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Unavailable(format!("{context}: {e}"))
        }
        _ => StorageError::Database(format!("{context}: {e}")),
    }
}

fn to_json<T: Serialize>(value: &T) -> StorageResult<Value> {
    serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(value: Value) -> StorageResult<T> {
    serde_json::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn from_rows<T: DeserializeOwned>(rows: Vec<(Value,)>) -> StorageResult<Vec<T>> {
    rows.into_iter().map(|(data,)| from_json(data)).collect()
}

/// Postgres implementation of every repository.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if a migration fails.
    pub async fn migrate(pool: &PgPool) -> StorageResult<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| StorageError::Database(format!("Migration failed: {e}")))
    }

    async fn begin(&self) -> StorageResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))
    }

    async fn fetch_data<T: DeserializeOwned>(&self, sql: &str, id: Uuid) -> StorageResult<Option<T>> {
        let row: Option<(Value,)> = sqlx::query_as(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch row"))?;
        row.map(|(data,)| from_json(data)).transpose()
    }

    async fn fetch_all_data<T: DeserializeOwned>(&self, sql: &str, id: Option<Uuid>) -> StorageResult<Vec<T>> {
        let query = sqlx::query_as::<_, (Value,)>(sql);
        let query = match id {
            Some(id) => query.bind(id),
            None => query,
        };
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to fetch rows"))?;
        from_rows(rows)
    }
}

async fn insert_reservation_history(
    tx: &mut Transaction<'static, Postgres>,
    history: &ReservationHistory,
) -> StorageResult<()> {
    sqlx::query(
        "INSERT INTO reservation_history (id, reservation_id, changed_at, data)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(history.id.as_uuid())
    .bind(history.reservation_id.as_uuid())
    .bind(history.changed_at)
    .bind(to_json(history)?)
    .execute(&mut **tx)
    .await
    .map_err(db_error("Failed to insert reservation history"))?;
    Ok(())
}

async fn apply_reservation_change(
    tx: &mut Transaction<'static, Postgres>,
    change: &ReservationStatusChange,
) -> StorageResult<()> {
    let patch = json!({
        "status": change.status,
        "updated_at": change.history.changed_at,
    });
    let updated = sqlx::query(
        "UPDATE reservations SET status = $2, data = data || $3 WHERE id = $1",
    )
    .bind(change.reservation_id.as_uuid())
    .bind(change.status.as_str())
    .bind(patch)
    .execute(&mut **tx)
    .await
    .map_err(db_error("Failed to update reservation"))?;
    if updated.rows_affected() == 0 {
        return Err(StorageError::NotFound(format!(
            "reservation {}",
            change.reservation_id
        )));
    }
    insert_reservation_history(tx, &change.history).await
}

/// Read a reservation and hold its row lock until the transaction ends.
/// Every payment write takes this lock first, so they run one at a time per
/// reservation.
async fn lock_reservation(tx: &mut Transaction<'static, Postgres>, id: ReservationId) -> StorageResult<Reservation> {
    let row: Option<(Value,)> = sqlx::query_as("SELECT data FROM reservations WHERE id = $1 FOR UPDATE")
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("Failed to lock reservation"))?;
    match row {
        Some((data,)) => from_json(data),
        None => Err(StorageError::NotFound(format!("reservation {id}"))),
    }
}

async fn reservation_payments(
    tx: &mut Transaction<'static, Postgres>,
    reservation: ReservationId,
) -> StorageResult<Vec<Payment>> {
    let rows: Vec<(Value,)> = sqlx::query_as("SELECT data FROM payments WHERE reservation_id = $1")
        .bind(reservation.as_uuid())
        .fetch_all(&mut **tx)
        .await
        .map_err(db_error("Failed to fetch payments"))?;
    from_rows(rows)
}

async fn commit(tx: Transaction<'static, Postgres>) -> StorageResult<()> {
    tx.commit()
        .await
        .map_err(db_error("Failed to commit transaction"))
}

#[async_trait]
impl RecordStore for PgStorage {
    async fn get_record(&self, kind: &str, id: Uuid) -> StorageResult<Option<Value>> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT data FROM catalog_records WHERE kind = $1 AND id = $2")
                .bind(kind)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to query record"))?;
        Ok(row.map(|(data,)| data))
    }

    async fn list_records(&self, kind: &str) -> StorageResult<Vec<Value>> {
        let rows: Vec<(Value,)> =
            sqlx::query_as("SELECT data FROM catalog_records WHERE kind = $1 ORDER BY id")
                .bind(kind)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("Failed to list records"))?;
        Ok(rows.into_iter().map(|(data,)| data).collect())
    }

    async fn put_record(&self, kind: &str, id: Uuid, data: Value) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO catalog_records (kind, id, data, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (kind, id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
        )
        .bind(kind)
        .bind(id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to store record"))?;
        Ok(())
    }

    async fn delete_record(&self, kind: &str, id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM catalog_records WHERE kind = $1 AND id = $2")
            .bind(kind)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete record"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for PgStorage {
    async fn create_user(&self, user: &User, password_hash: &str) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, date_joined, data)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(password_hash)
        .bind(user.date_joined)
        .bind(to_json(user)?)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert user"))?;
        Ok(())
    }

    async fn user(&self, id: UserId) -> StorageResult<Option<User>> {
        self.fetch_data("SELECT data FROM users WHERE id = $1", *id.as_uuid())
            .await
    }

    async fn credentials(&self, identifier: &str) -> StorageResult<Option<(User, String)>> {
        let row: Option<(Value, String)> = sqlx::query_as(
            "SELECT data, password_hash FROM users
             WHERE username = $1 OR LOWER(email) = LOWER($1)
             ORDER BY (username = $1) DESC
             LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to query credentials"))?;
        row.map(|(data, hash)| Ok((from_json(data)?, hash))).transpose()
    }

    async fn password_hash(&self, id: UserId) -> StorageResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT password_hash FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to query password"))?;
        Ok(row.map(|(hash,)| hash))
    }

    async fn update_user(&self, user: &User) -> StorageResult<()> {
        let result = sqlx::query("UPDATE users SET email = $2, data = $3 WHERE id = $1")
            .bind(user.id.as_uuid())
            .bind(&user.email)
            .bind(to_json(user)?)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to update user"))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn set_password(&self, id: UserId, password_hash: &str) -> StorageResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to update password"))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StorageResult<()> {
        sqlx::query("UPDATE users SET data = data || $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(json!({ "last_login": at }))
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to record login"))?;
        Ok(())
    }

    async fn username_taken(&self, username: &str) -> StorageResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to check username"))
    }

    async fn email_taken(&self, email: &str, except: Option<UserId>) -> StorageResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM users
                WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
             )",
        )
        .bind(email)
        .bind(except.map(Uuid::from))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to check email"))
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        self.fetch_all_data("SELECT data FROM users ORDER BY date_joined", None)
            .await
    }

    async fn create_client(&self, client: &Client) -> StorageResult<()> {
        sqlx::query("INSERT INTO clients (id, user_id, dni, data) VALUES ($1, $2, $3, $4)")
            .bind(client.id.as_uuid())
            .bind(client.user_id.map(Uuid::from))
            .bind(&client.dni)
            .bind(to_json(client)?)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to insert client"))?;
        Ok(())
    }

    async fn client(&self, id: ClientId) -> StorageResult<Option<Client>> {
        self.fetch_data("SELECT data FROM clients WHERE id = $1", *id.as_uuid())
            .await
    }

    async fn client_for_user(&self, user: UserId) -> StorageResult<Option<Client>> {
        self.fetch_data("SELECT data FROM clients WHERE user_id = $1", *user.as_uuid())
            .await
    }

    async fn dni_taken(&self, dni: &str) -> StorageResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM clients WHERE dni = $1)")
            .bind(dni)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to check dni"))
    }

    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        self.fetch_all_data(
            "SELECT data FROM clients ORDER BY data->>'last_name', data->>'first_name'",
            None,
        )
        .await
    }
}

#[async_trait]
impl BookingRepository for PgStorage {
    async fn occupied_cabins(&self, leg: VoyageShipId) -> StorageResult<HashSet<CabinId>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT cabin_id FROM cabin_occupancies WHERE voyage_ship_id = $1")
                .bind(leg.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("Failed to query occupied cabins"))?;
        Ok(rows.into_iter().map(|(id,)| CabinId::from_uuid(id)).collect())
    }

    async fn booked_passengers(&self, leg: VoyageShipId) -> StorageResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM passengers p
             JOIN reservations r ON r.id = p.reservation_id
             WHERE r.voyage_ship_id = $1 AND r.status <> 'cancelled'",
        )
        .bind(leg.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to count passengers"))?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn commit_booking(&self, booking: &NewBooking) -> StorageResult<()> {
        let mut tx = self.begin().await?;
        let reservation = &booking.reservation;

        sqlx::query(
            "INSERT INTO reservations (id, user_id, voyage_ship_id, cabin_id, status, created_at, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.user_id.as_uuid())
        .bind(reservation.voyage_ship_id.as_uuid())
        .bind(reservation.cabin_id.map(Uuid::from))
        .bind(reservation.status.as_str())
        .bind(reservation.created_at)
        .bind(to_json(reservation)?)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert reservation"))?;

        for passenger in &booking.passengers {
            sqlx::query("INSERT INTO passengers (id, reservation_id, data) VALUES ($1, $2, $3)")
                .bind(passenger.id.as_uuid())
                .bind(passenger.reservation_id.as_uuid())
                .bind(to_json(passenger)?)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to insert passenger"))?;
        }

        insert_occupancy(&mut tx, &booking.occupancy).await?;
        insert_reservation_history(&mut tx, &booking.history).await?;
        commit(tx).await
    }

    async fn reservation(&self, id: ReservationId) -> StorageResult<Option<Reservation>> {
        self.fetch_data("SELECT data FROM reservations WHERE id = $1", *id.as_uuid())
            .await
    }

    async fn passengers(&self, reservation: ReservationId) -> StorageResult<Vec<Passenger>> {
        self.fetch_all_data(
            "SELECT data FROM passengers WHERE reservation_id = $1 ORDER BY data->>'last_name'",
            Some(*reservation.as_uuid()),
        )
        .await
    }

    async fn reservation_history(
        &self,
        reservation: ReservationId,
    ) -> StorageResult<Vec<ReservationHistory>> {
        self.fetch_all_data(
            "SELECT data FROM reservation_history WHERE reservation_id = $1 ORDER BY changed_at",
            Some(*reservation.as_uuid()),
        )
        .await
    }

    async fn reservations_for_user(&self, user: UserId) -> StorageResult<Vec<Reservation>> {
        self.fetch_all_data(
            "SELECT data FROM reservations WHERE user_id = $1 ORDER BY created_at DESC",
            Some(*user.as_uuid()),
        )
        .await
    }

    async fn list_reservations(&self) -> StorageResult<Vec<Reservation>> {
        self.fetch_all_data("SELECT data FROM reservations ORDER BY created_at DESC", None)
            .await
    }

    async fn cancel_reservation(&self, change: &ReservationStatusChange) -> StorageResult<()> {
        let mut tx = self.begin().await?;
        apply_reservation_change(&mut tx, change).await?;
        sqlx::query("UPDATE passengers SET data = data || $2 WHERE reservation_id = $1")
            .bind(change.reservation_id.as_uuid())
            .bind(json!({ "status": PassengerStatus::Cancelled }))
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to cancel passengers"))?;
        sqlx::query("DELETE FROM cabin_occupancies WHERE reservation_id = $1")
            .bind(change.reservation_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to release cabin"))?;
        commit(tx).await
    }

    async fn occupancies(&self, leg: Option<VoyageShipId>) -> StorageResult<Vec<CabinOccupancy>> {
        match leg {
            Some(leg) => {
                self.fetch_all_data(
                    "SELECT data FROM cabin_occupancies WHERE voyage_ship_id = $1
                     ORDER BY start_date, cabin_id",
                    Some(*leg.as_uuid()),
                )
                .await
            }
            None => {
                self.fetch_all_data(
                    "SELECT data FROM cabin_occupancies ORDER BY start_date, cabin_id",
                    None,
                )
                .await
            }
        }
    }

    async fn occupancy(&self, id: OccupancyId) -> StorageResult<Option<CabinOccupancy>> {
        self.fetch_data("SELECT data FROM cabin_occupancies WHERE id = $1", *id.as_uuid())
            .await
    }

    async fn claim_cabin(&self, occupancy: &CabinOccupancy) -> StorageResult<()> {
        let mut tx = self.begin().await?;
        insert_occupancy(&mut tx, occupancy).await?;
        commit(tx).await
    }

    async fn release_occupancy(&self, id: OccupancyId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM cabin_occupancies WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to release occupancy"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn cabin_in_use(&self, cabin: CabinId) -> StorageResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM cabin_occupancies WHERE cabin_id = $1)
                 OR EXISTS (SELECT 1 FROM reservations WHERE cabin_id = $1)",
        )
        .bind(cabin.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to check cabin references"))
    }

    async fn leg_in_use(&self, leg: VoyageShipId) -> StorageResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM cabin_occupancies WHERE voyage_ship_id = $1)
                 OR EXISTS (SELECT 1 FROM reservations WHERE voyage_ship_id = $1)",
        )
        .bind(leg.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to check leg references"))
    }
}

async fn insert_occupancy(
    tx: &mut Transaction<'static, Postgres>,
    occupancy: &CabinOccupancy,
) -> StorageResult<()> {
    sqlx::query(
        "INSERT INTO cabin_occupancies (id, cabin_id, voyage_ship_id, reservation_id, start_date, data)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(occupancy.id.as_uuid())
    .bind(occupancy.cabin_id.as_uuid())
    .bind(occupancy.voyage_ship_id.as_uuid())
    .bind(occupancy.reservation_id.map(Uuid::from))
    .bind(occupancy.start_date)
    .bind(to_json(occupancy)?)
    .execute(&mut **tx)
    .await
    .map_err(db_error("Failed to insert occupancy"))?;
    Ok(())
}

#[async_trait]
impl PaymentRepository for PgStorage {
    async fn create_payment(&self, payment: &Payment, history: &PaymentHistory) -> StorageResult<()> {
        let mut tx = self.begin().await?;
        let reservation = lock_reservation(&mut tx, payment.reservation_id).await?;
        let existing = reservation_payments(&mut tx, reservation.id).await?;
        check_new_payment(&reservation, &existing, payment)?;
        sqlx::query(
            "INSERT INTO payments (id, reservation_id, created_at, data) VALUES ($1, $2, $3, $4)",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.reservation_id.as_uuid())
        .bind(payment.created_at)
        .bind(to_json(payment)?)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert payment"))?;
        insert_payment_history(&mut tx, history).await?;
        commit(tx).await
    }

    async fn payment(&self, id: PaymentId) -> StorageResult<Option<Payment>> {
        self.fetch_data("SELECT data FROM payments WHERE id = $1", *id.as_uuid())
            .await
    }

    async fn update_payment_status(&self, change: &PaymentStatusChange) -> StorageResult<Option<ReservationStatus>> {
        let mut tx = self.begin().await?;
        let owner: Option<(Uuid,)> = sqlx::query_as("SELECT reservation_id FROM payments WHERE id = $1")
            .bind(change.payment_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to fetch payment"))?;
        let Some((reservation_id,)) = owner else {
            return Err(StorageError::NotFound(format!("payment {}", change.payment_id)));
        };

        let reservation = lock_reservation(&mut tx, ReservationId::from(reservation_id)).await?;
        let payments = reservation_payments(&mut tx, reservation.id).await?;
        let payment = payments
            .iter()
            .find(|p| p.id == change.payment_id)
            .ok_or_else(|| StorageError::NotFound(format!("payment {}", change.payment_id)))?;
        let reservation_change = plan_status_change(change, payment, &reservation, &payments)?;

        let updated = sqlx::query(
            "UPDATE payments SET data = data || $2 WHERE id = $1 AND data->>'status' = $3",
        )
        .bind(change.payment_id.as_uuid())
        .bind(json!({ "status": change.status, "updated_at": change.at }))
        .bind(change.expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update payment"))?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::conflict(PAYMENT_STATUS_STALE));
        }
        insert_payment_history(&mut tx, &change.history).await?;
        if let Some(reservation_change) = &reservation_change {
            apply_reservation_change(&mut tx, reservation_change).await?;
        }
        commit(tx).await?;
        Ok(reservation_change.map(|c| c.status))
    }

    async fn payments_for_reservation(&self, reservation: ReservationId) -> StorageResult<Vec<Payment>> {
        self.fetch_all_data(
            "SELECT data FROM payments WHERE reservation_id = $1 ORDER BY created_at",
            Some(*reservation.as_uuid()),
        )
        .await
    }

    async fn payments_for_user(&self, user: UserId) -> StorageResult<Vec<Payment>> {
        self.fetch_all_data(
            "SELECT p.data FROM payments p
             JOIN reservations r ON r.id = p.reservation_id
             WHERE r.user_id = $1
             ORDER BY p.created_at DESC",
            Some(*user.as_uuid()),
        )
        .await
    }

    async fn list_payments(&self) -> StorageResult<Vec<Payment>> {
        self.fetch_all_data("SELECT data FROM payments ORDER BY created_at DESC", None)
            .await
    }

    async fn payment_history(&self, payment: PaymentId) -> StorageResult<Vec<PaymentHistory>> {
        self.fetch_all_data(
            "SELECT data FROM payment_history WHERE payment_id = $1 ORDER BY changed_at",
            Some(*payment.as_uuid()),
        )
        .await
    }
}

async fn insert_payment_history(
    tx: &mut Transaction<'static, Postgres>,
    history: &PaymentHistory,
) -> StorageResult<()> {
    sqlx::query(
        "INSERT INTO payment_history (id, payment_id, changed_at, data) VALUES ($1, $2, $3, $4)",
    )
    .bind(history.id.as_uuid())
    .bind(history.payment_id.as_uuid())
    .bind(history.changed_at)
    .bind(to_json(history)?)
    .execute(&mut **tx)
    .await
    .map_err(db_error("Failed to insert payment history"))?;
    Ok(())
}
