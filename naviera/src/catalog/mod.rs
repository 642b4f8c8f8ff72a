//! The catalog: fleet, itineraries, voyages, offers and crew.
//!
//! [`Catalog`] is a typed service over the JSON [`RecordStore`]. Writes go
//! through [`CatalogRecord::validate`]; deletes are refused while anything
//! still points at the record.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{NavieraError, Result};
use crate::storage::{AccountRepository, BookingRepository, RecordStore, Storage, StorageError};
use crate::types::{ShipId, VoyageId};

pub mod records;
mod rules;
pub mod views;

pub use records::{
    Activity, Cabin, CabinType, CrewAssignment, CrewMember, Deck, Itinerary, Offer, Port,
    PortActivity, PortLocation, Record, Role, Ship, ShipType, Voyage, VoyageShip,
};

/// Validation and reference rules of a catalog record.
#[async_trait]
pub trait CatalogRecord: Record {
    /// Check the record before it is written.
    ///
    /// `previous` is the stored version when updating.
    async fn validate(&self, catalog: &Catalog, previous: Option<&Self>) -> Result<()>;

    /// Describe what still references `id` (empty when it can be deleted).
    async fn referenced_by(id: Self::Id, catalog: &Catalog) -> Result<Vec<String>>;
}

/// Typed access to catalog records.
#[derive(Clone)]
pub struct Catalog {
    records: Arc<dyn RecordStore>,
    accounts: Arc<dyn AccountRepository>,
    bookings: Arc<dyn BookingRepository>,
}

impl Catalog {
    /// Catalog over a storage backend.
    #[must_use]
    pub fn new(storage: &Storage) -> Self {
        Self {
            records: storage.records.clone(),
            accounts: storage.accounts.clone(),
            bookings: storage.bookings.clone(),
        }
    }

    pub(crate) fn accounts(&self) -> &dyn AccountRepository {
        self.accounts.as_ref()
    }

    pub(crate) fn bookings(&self) -> &dyn BookingRepository {
        self.bookings.as_ref()
    }

    /// Fetch a record.
    ///
    /// # Errors
    ///
    /// Storage failures, or a stored document that no longer deserializes.
    pub async fn get<R: Record>(&self, id: R::Id) -> Result<Option<R>> {
        let Some(value) = self.records.get_record(R::KIND, id.into()).await? else {
            return Ok(None);
        };
        decode(value).map(Some)
    }

    /// Fetch a record that must exist.
    ///
    /// # Errors
    ///
    /// [`NavieraError::NotFound`] when it does not.
    pub async fn require<R: Record>(&self, id: R::Id) -> Result<R> {
        self.get::<R>(id)
            .await?
            .ok_or_else(|| NavieraError::not_found(R::LABEL, id))
    }

    /// Every record of a kind.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list<R: Record>(&self) -> Result<Vec<R>> {
        self.records
            .list_records(R::KIND)
            .await?
            .into_iter()
            .map(decode::<R>)
            .collect()
    }

    /// Records of a kind matching a predicate.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn find<R: Record>(&self, predicate: impl Fn(&R) -> bool + Send) -> Result<Vec<R>> {
        let mut all = self.list::<R>().await?;
        all.retain(|r| predicate(r));
        Ok(all)
    }

    /// Validate and insert a new record.
    ///
    /// # Errors
    ///
    /// Validation errors, or a conflict if the id is already used.
    pub async fn create<R: CatalogRecord>(&self, record: R) -> Result<R> {
        if self.get::<R>(record.id()).await?.is_some() {
            return Err(NavieraError::Conflict(format!(
                "{} {} already exists",
                R::LABEL,
                record.id()
            )));
        }
        record.validate(self, None).await?;
        self.put(&record).await?;
        info!(kind = R::KIND, id = %record.id(), "Catalog record created");
        Ok(record)
    }

    /// Validate and replace an existing record.
    ///
    /// # Errors
    ///
    /// Not found, or validation errors.
    pub async fn update<R: CatalogRecord>(&self, record: R) -> Result<R> {
        let previous = self.require::<R>(record.id()).await?;
        record.validate(self, Some(&previous)).await?;
        self.put(&record).await?;
        info!(kind = R::KIND, id = %record.id(), "Catalog record updated");
        Ok(record)
    }

    /// Delete a record nothing references.
    ///
    /// # Errors
    ///
    /// Not found, or [`NavieraError::Conflict`] listing the references.
    pub async fn delete<R: CatalogRecord>(&self, id: R::Id) -> Result<()> {
        self.require::<R>(id).await?;
        let references = R::referenced_by(id, self).await?;
        if !references.is_empty() {
            debug!(kind = R::KIND, %id, ?references, "Delete refused");
            return Err(NavieraError::Conflict(format!(
                "{} is still referenced by {}",
                R::LABEL,
                references.join(", ")
            )));
        }
        self.records.delete_record(R::KIND, id.into()).await?;
        info!(kind = R::KIND, %id, "Catalog record deleted");
        Ok(())
    }

    /// Write a record without validation (seeding, tests).
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn put<R: Record>(&self, record: &R) -> Result<()> {
        let value = serde_json::to_value(record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.records.put_record(R::KIND, record.id().into(), value).await?;
        Ok(())
    }

    /// Legs sailing a voyage.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn legs_of_voyage(&self, voyage: VoyageId) -> Result<Vec<VoyageShip>> {
        self.find::<VoyageShip>(|leg| leg.voyage_id == voyage).await
    }

    /// Decks of a ship, by number.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn decks_of(&self, ship: ShipId) -> Result<Vec<Deck>> {
        let mut decks = self.find::<Deck>(|deck| deck.ship_id == ship).await?;
        decks.sort_by_key(|deck| deck.number);
        Ok(decks)
    }

    /// Cabins on a ship with the deck number each sits on.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn cabins_of(&self, ship: ShipId) -> Result<Vec<(u32, Cabin)>> {
        let decks = self.decks_of(ship).await?;
        let cabins = self.list::<Cabin>().await?;
        Ok(cabins
            .into_iter()
            .filter_map(|cabin| {
                decks
                    .iter()
                    .find(|deck| deck.id == cabin.deck_id)
                    .map(|deck| (deck.number, cabin))
            })
            .collect())
    }
}

fn decode<R: Record>(value: serde_json::Value) -> Result<R> {
    serde_json::from_value(value).map_err(|e| {
        NavieraError::Storage(StorageError::Serialization(format!("{}: {e}", R::KIND)))
    })
}
