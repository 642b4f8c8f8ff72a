//! Fleet, itinerary, voyage and crew records.
//!
//! Each record is stored as a JSON document under its [`Record::KIND`]. The
//! back-office lists them generically: search looks at
//! [`Record::search_text`], filters compare any top-level field.

use chrono::{NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::types::{
    ActivityId, CabinId, CabinStatus, CabinTypeId, CrewAssignmentId, CrewMemberId, DeckId, Gender,
    ItineraryId, Money, OfferId, PortActivityId, PortId, PortLocationId, RoleId, ShipId,
    ShipTypeId, VoyageId, VoyageShipId,
};

/// A catalog entity stored in the record store.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Storage kind and admin route segment
    const KIND: &'static str;

    /// Human name used in messages
    const LABEL: &'static str;

    /// Typed identifier
    type Id: Copy + Into<Uuid> + From<Uuid> + fmt::Display + Send + Sync;

    /// This record's identifier
    fn id(&self) -> Self::Id;

    /// Fields searched by the back-office `q` parameter.
    fn search_text(&self) -> Vec<&str>;

    /// Case-insensitive substring match over [`Record::search_text`].
    fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self
                .search_text()
                .iter()
                .any(|field| field.to_lowercase().contains(&query))
    }
}

/// Exact-match filter on a top-level field of a serialized record.
///
/// Strings compare as-is, other values by their JSON text (`true`, `42`).
/// A missing field or a `null` never matches.
#[must_use]
pub fn field_matches(record: &Value, field: &str, expected: &str) -> bool {
    match record.get(field) {
        Some(Value::String(s)) => s == expected,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == expected,
    }
}

macro_rules! record {
    ($ty:ident, $id:ident, $kind:literal, $label:literal, [$($field:ident),*]) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;
            const LABEL: &'static str = $label;
            type Id = $id;

            fn id(&self) -> $id {
                self.id
            }

            fn search_text(&self) -> Vec<&str> {
                vec![$(self.$field.as_str()),*]
            }
        }
    };
}

/// Staff role (purser, captain, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Identifier
    pub id: RoleId,
    /// Role name
    pub name: String,
    /// What the role does
    #[serde(default)]
    pub description: String,
}

record!(Role, RoleId, "roles", "Role", [name, description]);

/// Ship class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipType {
    /// Identifier
    pub id: ShipTypeId,
    /// Class name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
}

record!(ShipType, ShipTypeId, "ship_types", "Ship type", [name]);

/// A ship in the fleet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    /// Identifier
    pub id: ShipId,
    /// Ship name
    pub name: String,
    /// Class
    pub ship_type_id: ShipTypeId,
    /// Passenger capacity per leg
    pub max_passengers: u32,
    /// Number of engines
    #[serde(default)]
    pub engine_count: u32,
    /// Picture shown on the ships page
    #[serde(default)]
    pub image_url: Option<String>,
}

record!(Ship, ShipId, "ships", "Ship", [name]);

/// A deck of a ship.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    /// Identifier
    pub id: DeckId,
    /// Ship
    pub ship_id: ShipId,
    /// Deck number, unique per ship
    pub number: u32,
    /// Deck supervisor
    #[serde(default)]
    pub supervisor: String,
}

record!(Deck, DeckId, "decks", "Deck", [supervisor]);

/// Cabin category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabinType {
    /// Identifier
    pub id: CabinTypeId,
    /// Category name (inside, balcony, suite)
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Beds; the maximum party size for one cabin
    pub berths: u32,
    /// Markup over the leg price, in percent
    #[serde(default)]
    pub surcharge_percent: u32,
}

record!(CabinType, CabinTypeId, "cabin_types", "Cabin type", [name, description]);

/// A cabin on a deck.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cabin {
    /// Identifier
    pub id: CabinId,
    /// Deck
    pub deck_id: DeckId,
    /// Category
    pub cabin_type_id: CabinTypeId,
    /// Door number, unique per ship
    pub number: String,
    /// Whether the cabin can be sold
    #[serde(default = "default_cabin_status")]
    pub status: CabinStatus,
    /// Picture
    #[serde(default)]
    pub image_url: Option<String>,
}

const fn default_cabin_status() -> CabinStatus {
    CabinStatus::Available
}

record!(Cabin, CabinId, "cabins", "Cabin", [number]);

/// An ordered list of ports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    /// Identifier
    pub id: ItineraryId,
    /// Name
    pub name: String,
    /// Category (Caribbean, Mediterranean, ...)
    #[serde(default)]
    pub category: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Picture
    #[serde(default)]
    pub image_url: Option<String>,
}

record!(Itinerary, ItineraryId, "itineraries", "Itinerary", [name, category]);

/// A port of call on an itinerary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Identifier
    pub id: PortId,
    /// Itinerary
    pub itinerary_id: ItineraryId,
    /// Port name
    pub name: String,
    /// Country
    #[serde(default)]
    pub country: String,
    /// Position in the itinerary, unique per itinerary
    pub stop_order: u32,
}

record!(Port, PortId, "ports", "Port", [name, country]);

/// A dock or terminal inside a port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortLocation {
    /// Identifier
    pub id: PortLocationId,
    /// Port
    pub port_id: PortId,
    /// Location name
    pub name: String,
    /// Dock number
    #[serde(default)]
    pub dock_number: String,
}

record!(PortLocation, PortLocationId, "port_locations", "Port location", [name, dock_number]);

/// A shore activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Identifier
    pub id: ActivityId,
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
}

record!(Activity, ActivityId, "activities", "Activity", [name, description]);

/// An activity offered at a port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortActivity {
    /// Identifier
    pub id: PortActivityId,
    /// Port
    pub port_id: PortId,
    /// Activity
    pub activity_id: ActivityId,
}

record!(PortActivity, PortActivityId, "port_activities", "Port activity", []);

/// A voyage: dates and destination. Ships sail it through legs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voyage {
    /// Identifier
    pub id: VoyageId,
    /// Marketing name
    pub name: String,
    /// Destination shown on the destinations page
    pub destination: String,
    /// Ports visited
    #[serde(default)]
    pub itinerary_id: Option<ItineraryId>,
    /// First day
    pub departure_date: NaiveDate,
    /// Last day
    pub end_date: NaiveDate,
    /// Boarding time on the departure date
    pub departure_time: NaiveTime,
    /// Arrival time on the end date
    pub arrival_time: NaiveTime,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Picture
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Voyage {
    /// Whether two voyages share at least one day.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.departure_date <= other.end_date && other.departure_date <= self.end_date
    }
}

record!(Voyage, VoyageId, "voyages", "Voyage", [name, destination]);

/// A voyage-ship leg: one ship on one voyage, with its price per passenger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoyageShip {
    /// Identifier
    pub id: VoyageShipId,
    /// Voyage
    pub voyage_id: VoyageId,
    /// Ship
    pub ship_id: ShipId,
    /// Price per passenger before surcharge and discount
    pub price: Money,
}

record!(VoyageShip, VoyageShipId, "voyage_ships", "Voyage ship", []);

/// A discount on a voyage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Identifier
    pub id: OfferId,
    /// Voyage
    pub voyage_id: VoyageId,
    /// Headline
    pub title: String,
    /// Body
    #[serde(default)]
    pub description: String,
    /// Discount, 1 to 90 percent
    pub discount_percent: u32,
    /// Last day the offer applies
    pub valid_until: NaiveDate,
}

impl Offer {
    /// Whether the offer applies on `today`.
    #[must_use]
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.valid_until >= today
    }
}

record!(Offer, OfferId, "offers", "Offer", [title, description]);

/// A crew member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewMember {
    /// Identifier
    pub id: CrewMemberId,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Employee number, unique
    pub employee_number: String,
    /// Document number
    pub dni: String,
    /// Nationality
    #[serde(default)]
    pub nationality: String,
    /// Gender
    pub gender: Gender,
    /// Job on board
    #[serde(default)]
    pub position: String,
}

record!(CrewMember, CrewMemberId, "crew_members", "Crew member", [first_name, last_name, dni, employee_number]);

/// A crew member working a leg between two dates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewAssignment {
    /// Identifier
    pub id: CrewAssignmentId,
    /// Crew member
    pub crew_member_id: CrewMemberId,
    /// Leg
    pub voyage_ship_id: VoyageShipId,
    /// First day on board
    pub start_date: NaiveDate,
    /// Last day on board
    pub end_date: NaiveDate,
}

record!(CrewAssignment, CrewAssignmentId, "crew_assignments", "Crew assignment", []);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ship() -> Ship {
        Ship {
            id: ShipId::new(),
            name: "Aurora Borealis".to_string(),
            ship_type_id: ShipTypeId::new(),
            max_passengers: 400,
            engine_count: 2,
            image_url: None,
        }
    }

    #[test]
    fn test_query_is_case_insensitive_substring() {
        let ship = ship();
        assert!(ship.matches_query("aurora"));
        assert!(ship.matches_query("BOREAL"));
        assert!(ship.matches_query("  "));
        assert!(!ship.matches_query("titanic"));
    }

    #[test]
    fn test_field_filter_compares_json_text() {
        let ship = ship();
        let value = serde_json::to_value(&ship).unwrap();

        assert!(field_matches(&value, "max_passengers", "400"));
        assert!(field_matches(&value, "ship_type_id", &ship.ship_type_id.to_string()));
        assert!(!field_matches(&value, "image_url", "null"));
        assert!(!field_matches(&value, "missing", ""));
    }

    #[test]
    fn test_cabin_status_defaults_to_available() {
        let json = serde_json::json!({
            "id": CabinId::new(),
            "deck_id": DeckId::new(),
            "cabin_type_id": CabinTypeId::new(),
            "number": "101",
        });
        let cabin: Cabin = serde_json::from_value(json).unwrap();
        assert_eq!(cabin.status, CabinStatus::Available);
    }

    #[test]
    fn test_voyage_overlap_is_inclusive() {
        let date = |d| NaiveDate::from_ymd_opt(2025, 6, d).unwrap();
        let voyage = |from, to| Voyage {
            id: VoyageId::new(),
            name: "v".to_string(),
            destination: "d".to_string(),
            itinerary_id: None,
            departure_date: date(from),
            end_date: date(to),
            departure_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            arrival_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            description: String::new(),
            image_url: None,
        };

        assert!(voyage(1, 7).overlaps(&voyage(7, 14)));
        assert!(!voyage(1, 7).overlaps(&voyage(8, 14)));
    }
}
