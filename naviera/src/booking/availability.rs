//! Which cabins can still be sold on a leg, and how many people still fit.

use chrono::NaiveDate;
use tracing::debug;

use crate::booking::pricing::best_discount;
use crate::catalog::views::sorted_cabins;
use crate::catalog::{Cabin, CabinType, Catalog, Offer, Ship, Voyage, VoyageShip};
use crate::error::{NavieraError, Result};
use crate::types::{CabinStatus, CabinTypeId, VoyageShipId};

/// Everything needed to sell a cabin type on a leg.
#[derive(Clone, Debug)]
pub struct LegContext {
    /// The leg
    pub leg: VoyageShip,
    /// Its voyage
    pub voyage: Voyage,
    /// Its ship
    pub ship: Ship,
    /// Requested cabin type
    pub cabin_type: CabinType,
    /// Best offer active today
    pub discount_percent: u32,
}

impl LegContext {
    /// Load the leg, its voyage and ship, the cabin type and the active
    /// discount.
    ///
    /// # Errors
    ///
    /// [`NavieraError::NotFound`] for a missing leg, voyage, ship or cabin type.
    pub async fn load(
        catalog: &Catalog,
        leg: VoyageShipId,
        cabin_type: CabinTypeId,
        today: NaiveDate,
    ) -> Result<Self> {
        let leg = catalog.require::<VoyageShip>(leg).await?;
        let voyage = catalog.require::<Voyage>(leg.voyage_id).await?;
        let ship = catalog.require::<Ship>(leg.ship_id).await?;
        let cabin_type = catalog.require::<CabinType>(cabin_type).await?;
        let offers = catalog.find::<Offer>(|o| o.voyage_id == voyage.id).await?;
        Ok(Self {
            discount_percent: best_discount(&offers, voyage.id, today),
            leg,
            voyage,
            ship,
            cabin_type,
        })
    }

    /// Whether the voyage still takes bookings on `today`.
    #[must_use]
    pub fn is_open(&self, today: NaiveDate) -> bool {
        self.voyage.departure_date > today
    }
}

/// Cabins of `cabin_type` on the leg's ship that are sellable and not
/// occupied on the leg, by deck number then cabin number.
///
/// # Errors
///
/// Storage failures.
pub async fn free_cabins(catalog: &Catalog, leg: &VoyageShip, cabin_type: CabinTypeId) -> Result<Vec<Cabin>> {
    let occupied = catalog.bookings().occupied_cabins(leg.id).await?;
    let candidates = catalog
        .cabins_of(leg.ship_id)
        .await?
        .into_iter()
        .filter(|(_, cabin)| {
            cabin.cabin_type_id == cabin_type
                && cabin.status == CabinStatus::Available
                && !occupied.contains(&cabin.id)
        })
        .collect();
    let free: Vec<Cabin> = sorted_cabins(candidates).into_iter().map(|(_, c)| c).collect();
    debug!(leg = %leg.id, %cabin_type, free = free.len(), "Free cabins computed");
    Ok(free)
}

/// Passengers the ship can still take on the leg.
///
/// # Errors
///
/// Storage failures.
pub async fn remaining_capacity(catalog: &Catalog, leg: &VoyageShip, ship: &Ship) -> Result<u32> {
    let booked = catalog.bookings().booked_passengers(leg.id).await?;
    Ok(ship.max_passengers.saturating_sub(booked))
}

/// Check the party against the cabin type and what is left on the leg.
///
/// # Errors
///
/// Validation errors naming `passenger_count` or the cabin type.
pub async fn check_room(catalog: &Catalog, context: &LegContext, passenger_count: u32) -> Result<()> {
    if passenger_count == 0 {
        return Err(NavieraError::field(
            "passenger_count",
            "At least one passenger is required.",
        ));
    }
    if passenger_count > context.cabin_type.berths {
        return Err(NavieraError::field(
            "passenger_count",
            format!(
                "A {} cabin sleeps at most {} passengers.",
                context.cabin_type.name, context.cabin_type.berths
            ),
        ));
    }
    let remaining = remaining_capacity(catalog, &context.leg, &context.ship).await?;
    if passenger_count > remaining {
        return Err(NavieraError::field(
            "passenger_count",
            format!("Only {remaining} places are left on this sailing."),
        ));
    }
    Ok(())
}
