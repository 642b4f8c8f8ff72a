//! Demo fleet.
//!
//! Loaded at startup when `SEED_DEMO_CATALOG=true`, and by the tests. Dates
//! are relative to `today` so the voyages stay bookable.
//!
//! | Ship               | Cabins                                                |
//! |--------------------|-------------------------------------------------------|
//! | Aurora Austral     | 101, 102 Inside; 103 Inside (maintenance); 201, 202 Balcony; 210 Suite |
//! | Estrella del Plata | 101, 102 Inside; 103 Balcony                          |

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::info;

use crate::catalog::{
    Activity, Cabin, CabinType, Catalog, CrewAssignment, CrewMember, Deck, Itinerary, Offer, Port,
    PortActivity, PortLocation, Role, Ship, ShipType, Voyage, VoyageShip,
};
use crate::error::Result;
use crate::types::{
    ActivityId, CabinId, CabinStatus, CabinTypeId, CrewAssignmentId, CrewMemberId, DeckId, Gender,
    ItineraryId, Money, OfferId, PortActivityId, PortId, PortLocationId, RoleId, ShipId,
    ShipTypeId, VoyageId, VoyageShipId,
};

/// Identifiers of the seeded records the tests refer to.
#[derive(Clone, Debug)]
pub struct DemoFleet {
    /// Ocean liner, 12 passengers
    pub aurora: ShipId,
    /// River cruiser, 8 passengers
    pub estrella: ShipId,
    /// 2 berths, no surcharge
    pub inside: CabinTypeId,
    /// 3 berths, 25% surcharge
    pub balcony: CabinTypeId,
    /// 4 berths, 80% surcharge
    pub suite: CabinTypeId,
    /// Aurora cabins 101, 102, 103 (103 under maintenance)
    pub aurora_inside: Vec<CabinId>,
    /// Aurora cabins 201, 202
    pub aurora_balcony: Vec<CabinId>,
    /// Aurora cabin 210
    pub aurora_suite: CabinId,
    /// Patagonia voyage, departs in 30 days
    pub patagonia: VoyageId,
    /// Aurora on the Patagonia voyage ($1000.00)
    pub patagonia_leg: VoyageShipId,
    /// Delta voyage, departs in 60 days
    pub delta: VoyageId,
    /// Estrella on the Delta voyage ($450.00)
    pub delta_leg: VoyageShipId,
    /// A voyage that already sailed
    pub past: VoyageId,
    /// Aurora on the past voyage
    pub past_leg: VoyageShipId,
    /// 15% early-bird offer on Patagonia
    pub early_bird: OfferId,
    /// Purser assigned to the Patagonia leg
    pub purser: CrewMemberId,
    /// Patagonia itinerary
    pub itinerary: ItineraryId,
}

fn at(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn days(today: NaiveDate, n: i64) -> NaiveDate {
    today + Duration::days(n)
}

/// Load the demo fleet unless ships already exist.
///
/// Returns `None` when the catalog was not empty.
///
/// # Errors
///
/// Storage failures or a rejected record.
pub async fn seed_if_empty(catalog: &Catalog, today: NaiveDate) -> Result<Option<DemoFleet>> {
    if !catalog.list::<Ship>().await?.is_empty() {
        info!("Catalog already has ships, skipping demo seed");
        return Ok(None);
    }
    demo_fleet(catalog, today).await.map(Some)
}

/// Load the demo fleet through the validated catalog API.
///
/// # Errors
///
/// Storage failures or a rejected record.
#[allow(clippy::too_many_lines)]
pub async fn demo_fleet(catalog: &Catalog, today: NaiveDate) -> Result<DemoFleet> {
    for (name, description) in [
        ("Captain", "Commands the ship"),
        ("Purser", "Guest services and accounts"),
        ("Booking agent", "Handles reservations and payments"),
    ] {
        catalog
            .create(Role {
                id: RoleId::new(),
                name: name.to_string(),
                description: description.to_string(),
            })
            .await?;
    }

    let liner = catalog
        .create(ShipType {
            id: ShipTypeId::new(),
            name: "Ocean liner".to_string(),
            description: "Blue-water ships for open sea routes".to_string(),
        })
        .await?;
    let river = catalog
        .create(ShipType {
            id: ShipTypeId::new(),
            name: "River cruiser".to_string(),
            description: "Shallow-draft ships for the delta".to_string(),
        })
        .await?;

    let aurora = catalog
        .create(Ship {
            id: ShipId::new(),
            name: "Aurora Austral".to_string(),
            ship_type_id: liner.id,
            max_passengers: 12,
            engine_count: 2,
            image_url: None,
        })
        .await?;
    let estrella = catalog
        .create(Ship {
            id: ShipId::new(),
            name: "Estrella del Plata".to_string(),
            ship_type_id: river.id,
            max_passengers: 8,
            engine_count: 1,
            image_url: None,
        })
        .await?;

    let cabin_type = |name: &str, berths: u32, surcharge_percent: u32| CabinType {
        id: CabinTypeId::new(),
        name: name.to_string(),
        description: String::new(),
        berths,
        surcharge_percent,
    };
    let inside = catalog.create(cabin_type("Inside", 2, 0)).await?;
    let balcony = catalog.create(cabin_type("Balcony", 3, 25)).await?;
    let suite = catalog.create(cabin_type("Owner's Suite", 4, 80)).await?;

    let deck = |ship: ShipId, number: u32, supervisor: &str| Deck {
        id: DeckId::new(),
        ship_id: ship,
        number,
        supervisor: supervisor.to_string(),
    };
    let aurora_1 = catalog.create(deck(aurora.id, 1, "M. Ibarra")).await?;
    let aurora_2 = catalog.create(deck(aurora.id, 2, "L. Quiroga")).await?;
    let estrella_1 = catalog.create(deck(estrella.id, 1, "P. Sosa")).await?;

    let cabin = |deck: DeckId, cabin_type: CabinTypeId, number: &str, status: CabinStatus| Cabin {
        id: CabinId::new(),
        deck_id: deck,
        cabin_type_id: cabin_type,
        number: number.to_string(),
        status,
        image_url: None,
    };
    let mut aurora_inside = Vec::new();
    for (number, status) in [
        ("101", CabinStatus::Available),
        ("102", CabinStatus::Available),
        ("103", CabinStatus::Maintenance),
    ] {
        aurora_inside.push(catalog.create(cabin(aurora_1.id, inside.id, number, status)).await?.id);
    }
    let mut aurora_balcony = Vec::new();
    for number in ["201", "202"] {
        aurora_balcony.push(
            catalog
                .create(cabin(aurora_2.id, balcony.id, number, CabinStatus::Available))
                .await?
                .id,
        );
    }
    let aurora_suite = catalog
        .create(cabin(aurora_2.id, suite.id, "210", CabinStatus::Available))
        .await?
        .id;
    for (number, cabin_type) in [("101", inside.id), ("102", inside.id), ("103", balcony.id)] {
        catalog
            .create(cabin(estrella_1.id, cabin_type, number, CabinStatus::Available))
            .await?;
    }

    let itinerary = catalog
        .create(Itinerary {
            id: ItineraryId::new(),
            name: "Patagonia Austral".to_string(),
            category: "Expedition".to_string(),
            description: "Fjords and glaciers of the far south".to_string(),
            image_url: None,
        })
        .await?;
    let hiking = catalog
        .create(Activity {
            id: ActivityId::new(),
            name: "Glacier hike".to_string(),
            description: "Guided walk on the ice".to_string(),
        })
        .await?;
    for (stop_order, (name, country, dock)) in [
        ("Ushuaia", "Argentina", "Muelle Comercial"),
        ("Puerto Williams", "Chile", "Muelle Guardiamarina Zañartu"),
        ("Punta Arenas", "Chile", "Muelle Prat"),
    ]
    .into_iter()
    .enumerate()
    {
        let port = catalog
            .create(Port {
                id: PortId::new(),
                itinerary_id: itinerary.id,
                name: name.to_string(),
                country: country.to_string(),
                stop_order: u32::try_from(stop_order).unwrap_or(u32::MAX) + 1,
            })
            .await?;
        catalog
            .create(PortLocation {
                id: PortLocationId::new(),
                port_id: port.id,
                name: dock.to_string(),
                dock_number: "1".to_string(),
            })
            .await?;
        if stop_order == 0 {
            catalog
                .create(PortActivity {
                    id: PortActivityId::new(),
                    port_id: port.id,
                    activity_id: hiking.id,
                })
                .await?;
        }
    }

    let voyage = |name: &str, destination: &str, itinerary_id: Option<ItineraryId>, from: i64, to: i64| Voyage {
        id: VoyageId::new(),
        name: name.to_string(),
        destination: destination.to_string(),
        itinerary_id,
        departure_date: days(today, from),
        end_date: days(today, to),
        departure_time: at(18),
        arrival_time: at(8),
        description: String::new(),
        image_url: None,
    };
    let patagonia = catalog
        .create(voyage("Patagonia Austral", "Tierra del Fuego", Some(itinerary.id), 30, 40))
        .await?;
    let delta = catalog
        .create(voyage("Delta del Paraná", "Tigre", None, 60, 64))
        .await?;
    let past = catalog
        .create(voyage("Cabo de Hornos", "Cape Horn", Some(itinerary.id), -20, -10))
        .await?;

    let leg = |voyage_id: VoyageId, ship_id: ShipId, cents: u64| VoyageShip {
        id: VoyageShipId::new(),
        voyage_id,
        ship_id,
        price: Money::from_cents(cents),
    };
    let patagonia_leg = catalog.create(leg(patagonia.id, aurora.id, 100_000)).await?;
    let delta_leg = catalog.create(leg(delta.id, estrella.id, 45_000)).await?;
    let past_leg = catalog.create(leg(past.id, aurora.id, 80_000)).await?;

    let early_bird = catalog
        .create(Offer {
            id: OfferId::new(),
            voyage_id: patagonia.id,
            title: "Early bird".to_string(),
            description: "Book a month ahead and save".to_string(),
            discount_percent: 15,
            valid_until: days(today, 20),
        })
        .await?;

    let purser = catalog
        .create(CrewMember {
            id: CrewMemberId::new(),
            first_name: "Ana".to_string(),
            last_name: "Lagos".to_string(),
            employee_number: "EMP-001".to_string(),
            dni: "30111222".to_string(),
            nationality: "Argentina".to_string(),
            gender: Gender::Female,
            position: "Purser".to_string(),
        })
        .await?;
    catalog
        .create(CrewAssignment {
            id: CrewAssignmentId::new(),
            crew_member_id: purser.id,
            voyage_ship_id: patagonia_leg.id,
            start_date: patagonia.departure_date,
            end_date: patagonia.end_date,
        })
        .await?;

    info!(ships = 2, voyages = 3, "Demo fleet loaded");
    Ok(DemoFleet {
        aurora: aurora.id,
        estrella: estrella.id,
        inside: inside.id,
        balcony: balcony.id,
        suite: suite.id,
        aurora_inside,
        aurora_balcony,
        aurora_suite,
        patagonia: patagonia.id,
        patagonia_leg: patagonia_leg.id,
        delta: delta.id,
        delta_leg: delta_leg.id,
        past: past.id,
        past_leg: past_leg.id,
        early_bird: early_bird.id,
        purser: purser.id,
        itinerary: itinerary.id,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[tokio::test]
    async fn seed_runs_once() {
        let catalog = Catalog::new(&Storage::memory());
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let fleet = seed_if_empty(&catalog, today).await.unwrap().unwrap();
        assert_eq!(catalog.legs_of_voyage(fleet.patagonia).await.unwrap().len(), 1);
        assert_eq!(catalog.cabins_of(fleet.aurora).await.unwrap().len(), 6);

        assert!(seed_if_empty(&catalog, today).await.unwrap().is_none());
        assert_eq!(catalog.list::<Ship>().await.unwrap().len(), 2);
    }
}
