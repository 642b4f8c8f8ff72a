//! Write validation and delete guards for every catalog record.

use async_trait::async_trait;
use naviera_web::FieldErrors;

use super::records::{
    Activity, Cabin, CabinType, CrewAssignment, CrewMember, Deck, Itinerary, Offer, Port,
    PortActivity, PortLocation, Record, Role, Ship, ShipType, Voyage, VoyageShip,
};
use super::{Catalog, CatalogRecord};
use crate::error::{NON_FIELD_ERRORS, Result};
use crate::types::{
    ActivityId, CabinId, CabinTypeId, CrewAssignmentId, CrewMemberId, DeckId, ItineraryId,
    Occupant, OfferId, PortActivityId, PortId, PortLocationId, RoleId, ShipId, ShipTypeId,
    VoyageId, VoyageShipId,
};

const NAME_MAX: usize = 100;
const SHORT_MAX: usize = 50;
const URL_MAX: usize = 200;
const MAX_SURCHARGE_PERCENT: u32 = 500;

/// Look up a referenced record, reporting a field error if it is missing.
async fn check_ref<R: Record>(
    catalog: &Catalog,
    errors: &mut FieldErrors,
    field: &str,
    id: R::Id,
) -> Result<Option<R>> {
    let found = catalog.get::<R>(id).await?;
    if found.is_none() {
        errors.add(field, format!("{} {id} does not exist.", R::LABEL));
    }
    Ok(found)
}

fn check_image(errors: &mut FieldErrors, image_url: Option<&String>) {
    if let Some(url) = image_url {
        errors.check_max_len("image_url", url, URL_MAX);
    }
}

/// "2 ships" / "1 deck" style reference descriptions.
fn describe(references: &mut Vec<String>, count: usize, singular: &str, plural: &str) {
    match count {
        0 => {},
        1 => references.push(format!("1 {singular}")),
        n => references.push(format!("{n} {plural}")),
    }
}

#[async_trait]
impl CatalogRecord for Role {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        if errors.check_text("name", &self.name, SHORT_MAX) {
            let taken = catalog
                .find::<Self>(|r| r.id != self.id && r.name.eq_ignore_ascii_case(&self.name))
                .await?;
            if !taken.is_empty() {
                errors.add("name", "A role with this name already exists.");
            }
        }
        errors.check_max_len("description", &self.description, 500);
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: RoleId, catalog: &Catalog) -> Result<Vec<String>> {
        let users = catalog.accounts().list_users().await?;
        let mut references = Vec::new();
        describe(
            &mut references,
            users.iter().filter(|u| u.role_id == Some(id)).count(),
            "user",
            "users",
        );
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for ShipType {
    async fn validate(&self, _catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("name", &self.name, SHORT_MAX);
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: ShipTypeId, catalog: &Catalog) -> Result<Vec<String>> {
        let ships = catalog.find::<Ship>(|s| s.ship_type_id == id).await?;
        Ok(ships.into_iter().map(|s| format!("ship {}", s.name)).collect())
    }
}

#[async_trait]
impl CatalogRecord for Ship {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("name", &self.name, NAME_MAX);
        check_ref::<ShipType>(catalog, &mut errors, "ship_type_id", self.ship_type_id).await?;
        if self.max_passengers == 0 {
            errors.add("max_passengers", "Ensure this value is greater than or equal to 1.");
        }
        check_image(&mut errors, self.image_url.as_ref());
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: ShipId, catalog: &Catalog) -> Result<Vec<String>> {
        let mut references = Vec::new();
        describe(&mut references, catalog.decks_of(id).await?.len(), "deck", "decks");
        let legs = catalog.find::<VoyageShip>(|l| l.ship_id == id).await?;
        describe(&mut references, legs.len(), "voyage leg", "voyage legs");
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for Deck {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        if self.number == 0 {
            errors.add("number", "Ensure this value is greater than or equal to 1.");
        }
        errors.check_max_len("supervisor", &self.supervisor, NAME_MAX);
        if check_ref::<Ship>(catalog, &mut errors, "ship_id", self.ship_id)
            .await?
            .is_some()
        {
            let clash = catalog
                .decks_of(self.ship_id)
                .await?
                .into_iter()
                .any(|d| d.id != self.id && d.number == self.number);
            if clash {
                errors.add("number", "This ship already has a deck with this number.");
            }
        }
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: DeckId, catalog: &Catalog) -> Result<Vec<String>> {
        let cabins = catalog.find::<Cabin>(|c| c.deck_id == id).await?;
        let mut references = Vec::new();
        describe(&mut references, cabins.len(), "cabin", "cabins");
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for CabinType {
    async fn validate(&self, _catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("name", &self.name, SHORT_MAX);
        errors.check_max_len("description", &self.description, 500);
        if self.berths == 0 {
            errors.add("berths", "Ensure this value is greater than or equal to 1.");
        }
        if self.surcharge_percent > MAX_SURCHARGE_PERCENT {
            errors.add(
                "surcharge_percent",
                format!("Ensure this value is less than or equal to {MAX_SURCHARGE_PERCENT}."),
            );
        }
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: CabinTypeId, catalog: &Catalog) -> Result<Vec<String>> {
        let cabins = catalog.find::<Cabin>(|c| c.cabin_type_id == id).await?;
        let mut references = Vec::new();
        describe(&mut references, cabins.len(), "cabin", "cabins");
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for Cabin {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        let number_ok = errors.check_text("number", &self.number, 10);
        check_ref::<CabinType>(catalog, &mut errors, "cabin_type_id", self.cabin_type_id).await?;
        check_image(&mut errors, self.image_url.as_ref());
        let deck = check_ref::<Deck>(catalog, &mut errors, "deck_id", self.deck_id).await?;
        if let (Some(deck), true) = (deck, number_ok) {
            let clash = catalog
                .cabins_of(deck.ship_id)
                .await?
                .into_iter()
                .any(|(_, c)| c.id != self.id && c.number.eq_ignore_ascii_case(&self.number));
            if clash {
                errors.add("number", "This ship already has a cabin with this number.");
            }
        }
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: CabinId, catalog: &Catalog) -> Result<Vec<String>> {
        if catalog.bookings().cabin_in_use(id).await? {
            return Ok(vec!["reservations or occupancies".to_string()]);
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl CatalogRecord for Itinerary {
    async fn validate(&self, _catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("name", &self.name, NAME_MAX);
        errors.check_max_len("category", &self.category, SHORT_MAX);
        check_image(&mut errors, self.image_url.as_ref());
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: ItineraryId, catalog: &Catalog) -> Result<Vec<String>> {
        let mut references = Vec::new();
        let ports = catalog.find::<Port>(|p| p.itinerary_id == id).await?;
        describe(&mut references, ports.len(), "port", "ports");
        let voyages = catalog.find::<Voyage>(|v| v.itinerary_id == Some(id)).await?;
        describe(&mut references, voyages.len(), "voyage", "voyages");
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for Port {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("name", &self.name, NAME_MAX);
        errors.check_max_len("country", &self.country, SHORT_MAX);
        if self.stop_order == 0 {
            errors.add("stop_order", "Ensure this value is greater than or equal to 1.");
        }
        if check_ref::<Itinerary>(catalog, &mut errors, "itinerary_id", self.itinerary_id)
            .await?
            .is_some()
        {
            let clash = catalog
                .find::<Self>(|p| {
                    p.id != self.id
                        && p.itinerary_id == self.itinerary_id
                        && p.stop_order == self.stop_order
                })
                .await?;
            if !clash.is_empty() {
                errors.add("stop_order", "This itinerary already has a stop at this position.");
            }
        }
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: PortId, catalog: &Catalog) -> Result<Vec<String>> {
        let mut references = Vec::new();
        let locations = catalog.find::<PortLocation>(|l| l.port_id == id).await?;
        describe(&mut references, locations.len(), "port location", "port locations");
        let activities = catalog.find::<PortActivity>(|a| a.port_id == id).await?;
        describe(&mut references, activities.len(), "port activity", "port activities");
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for PortLocation {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("name", &self.name, NAME_MAX);
        errors.check_max_len("dock_number", &self.dock_number, 20);
        check_ref::<Port>(catalog, &mut errors, "port_id", self.port_id).await?;
        Ok(errors.into_result()?)
    }

    async fn referenced_by(_id: PortLocationId, _catalog: &Catalog) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl CatalogRecord for Activity {
    async fn validate(&self, _catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("name", &self.name, NAME_MAX);
        errors.check_max_len("description", &self.description, 1000);
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: ActivityId, catalog: &Catalog) -> Result<Vec<String>> {
        let ports = catalog.find::<PortActivity>(|a| a.activity_id == id).await?;
        let mut references = Vec::new();
        describe(&mut references, ports.len(), "port activity", "port activities");
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for PortActivity {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        let port = check_ref::<Port>(catalog, &mut errors, "port_id", self.port_id).await?;
        let activity =
            check_ref::<Activity>(catalog, &mut errors, "activity_id", self.activity_id).await?;
        if port.is_some() && activity.is_some() {
            let clash = catalog
                .find::<Self>(|a| {
                    a.id != self.id && a.port_id == self.port_id && a.activity_id == self.activity_id
                })
                .await?;
            if !clash.is_empty() {
                errors.add(NON_FIELD_ERRORS, "This activity is already offered at this port.");
            }
        }
        Ok(errors.into_result()?)
    }

    async fn referenced_by(_id: PortActivityId, _catalog: &Catalog) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Reports a field error if `ship` already sails a leg whose voyage overlaps
/// `voyage`. `skip` is the leg being written.
async fn check_ship_free(
    catalog: &Catalog,
    errors: &mut FieldErrors,
    field: &str,
    ship: ShipId,
    voyage: &Voyage,
    skip: Option<VoyageShipId>,
) -> Result<()> {
    let legs = catalog
        .find::<VoyageShip>(|l| l.ship_id == ship && Some(l.id) != skip && l.voyage_id != voyage.id)
        .await?;
    for leg in legs {
        let Some(other) = catalog.get::<Voyage>(leg.voyage_id).await? else {
            continue;
        };
        if other.overlaps(voyage) {
            errors.add(
                field,
                format!("The ship already sails voyage {} on overlapping dates.", other.name),
            );
            break;
        }
    }
    Ok(())
}

#[async_trait]
impl CatalogRecord for Voyage {
    async fn validate(&self, catalog: &Catalog, previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("name", &self.name, NAME_MAX);
        errors.check_text("destination", &self.destination, NAME_MAX);
        errors.check_max_len("description", &self.description, 2000);
        check_image(&mut errors, self.image_url.as_ref());
        if self.end_date < self.departure_date {
            errors.add("end_date", "The end date cannot be before the departure date.");
        }
        if let Some(itinerary) = self.itinerary_id {
            check_ref::<Itinerary>(catalog, &mut errors, "itinerary_id", itinerary).await?;
        }

        let dates_changed = previous.is_some_and(|p| {
            p.departure_date != self.departure_date || p.end_date != self.end_date
        });
        if dates_changed && errors.is_empty() {
            for leg in catalog.legs_of_voyage(self.id).await? {
                check_ship_free(catalog, &mut errors, "departure_date", leg.ship_id, self, Some(leg.id))
                    .await?;
            }
        }
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: VoyageId, catalog: &Catalog) -> Result<Vec<String>> {
        let mut references = Vec::new();
        describe(&mut references, catalog.legs_of_voyage(id).await?.len(), "voyage leg", "voyage legs");
        let offers = catalog.find::<Offer>(|o| o.voyage_id == id).await?;
        describe(&mut references, offers.len(), "offer", "offers");
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for VoyageShip {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        if self.price.is_zero() {
            errors.add("price", "Ensure this value is greater than 0.");
        }
        let voyage = check_ref::<Voyage>(catalog, &mut errors, "voyage_id", self.voyage_id).await?;
        let ship = check_ref::<Ship>(catalog, &mut errors, "ship_id", self.ship_id).await?;
        if let (Some(voyage), Some(_)) = (voyage, ship) {
            let duplicate = catalog
                .legs_of_voyage(voyage.id)
                .await?
                .into_iter()
                .any(|l| l.id != self.id && l.ship_id == self.ship_id);
            if duplicate {
                errors.add("ship_id", "This ship is already assigned to the voyage.");
            } else {
                check_ship_free(catalog, &mut errors, "ship_id", self.ship_id, &voyage, Some(self.id))
                    .await?;
            }
        }
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: VoyageShipId, catalog: &Catalog) -> Result<Vec<String>> {
        let mut references = Vec::new();
        if catalog.bookings().leg_in_use(id).await? {
            references.push("reservations or occupancies".to_string());
        }
        let crew = catalog.find::<CrewAssignment>(|a| a.voyage_ship_id == id).await?;
        describe(&mut references, crew.len(), "crew assignment", "crew assignments");
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for Offer {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("title", &self.title, NAME_MAX);
        errors.check_max_len("description", &self.description, 2000);
        if !(1..=90).contains(&self.discount_percent) {
            errors.add("discount_percent", "The discount must be between 1 and 90 percent.");
        }
        check_ref::<Voyage>(catalog, &mut errors, "voyage_id", self.voyage_id).await?;
        Ok(errors.into_result()?)
    }

    async fn referenced_by(_id: OfferId, _catalog: &Catalog) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl CatalogRecord for CrewMember {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check_text("first_name", &self.first_name, SHORT_MAX);
        errors.check_text("last_name", &self.last_name, SHORT_MAX);
        errors.check_text("dni", &self.dni, 20);
        errors.check_max_len("nationality", &self.nationality, SHORT_MAX);
        errors.check_max_len("position", &self.position, SHORT_MAX);
        if errors.check_text("employee_number", &self.employee_number, 20) {
            let taken = catalog
                .find::<Self>(|c| c.id != self.id && c.employee_number == self.employee_number)
                .await?;
            if !taken.is_empty() {
                errors.add("employee_number", "This employee number is already in use.");
            }
        }
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: CrewMemberId, catalog: &Catalog) -> Result<Vec<String>> {
        let assignments = catalog.find::<CrewAssignment>(|a| a.crew_member_id == id).await?;
        let mut references = Vec::new();
        describe(&mut references, assignments.len(), "crew assignment", "crew assignments");
        Ok(references)
    }
}

#[async_trait]
impl CatalogRecord for CrewAssignment {
    async fn validate(&self, catalog: &Catalog, _previous: Option<&Self>) -> Result<()> {
        let mut errors = FieldErrors::new();
        if self.end_date < self.start_date {
            errors.add("end_date", "The end date cannot be before the start date.");
        }
        let member =
            check_ref::<CrewMember>(catalog, &mut errors, "crew_member_id", self.crew_member_id)
                .await?;
        let leg =
            check_ref::<VoyageShip>(catalog, &mut errors, "voyage_ship_id", self.voyage_ship_id)
                .await?;

        if let Some(leg) = leg {
            let voyage = catalog.require::<Voyage>(leg.voyage_id).await?;
            if self.start_date < voyage.departure_date || self.end_date > voyage.end_date {
                errors.add(
                    NON_FIELD_ERRORS,
                    format!(
                        "Assignment dates must fall within the voyage ({} to {}).",
                        voyage.departure_date, voyage.end_date
                    ),
                );
            }
        }
        if member.is_some() && errors.is_empty() {
            let busy = catalog
                .find::<Self>(|a| {
                    a.id != self.id
                        && a.crew_member_id == self.crew_member_id
                        && a.start_date <= self.end_date
                        && self.start_date <= a.end_date
                })
                .await?;
            if !busy.is_empty() {
                errors.add(
                    "crew_member_id",
                    "The crew member is already assigned on overlapping dates.",
                );
            }
        }
        Ok(errors.into_result()?)
    }

    async fn referenced_by(id: CrewAssignmentId, catalog: &Catalog) -> Result<Vec<String>> {
        let Some(assignment) = catalog.get::<Self>(id).await? else {
            return Ok(Vec::new());
        };
        let cabins = catalog
            .bookings()
            .occupancies(Some(assignment.voyage_ship_id))
            .await?
            .into_iter()
            .filter(|o| o.occupant == Occupant::Crew(assignment.crew_member_id))
            .count();
        let mut references = Vec::new();
        describe(&mut references, cabins, "crew cabin", "crew cabins");
        Ok(references)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::NavieraError;
    use crate::storage::Storage;
    use crate::types::{CabinStatus, Gender, Money};
    use chrono::{NaiveDate, NaiveTime};

    struct Fleet {
        catalog: Catalog,
        ship: Ship,
        deck: Deck,
        cabin_type: CabinType,
    }

    async fn fleet() -> Fleet {
        let catalog = Catalog::new(&Storage::memory());
        let ship_type = catalog
            .create(ShipType {
                id: ShipTypeId::new(),
                name: "Liner".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();
        let ship = catalog
            .create(Ship {
                id: ShipId::new(),
                name: "Aurora".to_string(),
                ship_type_id: ship_type.id,
                max_passengers: 10,
                engine_count: 2,
                image_url: None,
            })
            .await
            .unwrap();
        let deck = catalog
            .create(Deck {
                id: DeckId::new(),
                ship_id: ship.id,
                number: 1,
                supervisor: String::new(),
            })
            .await
            .unwrap();
        let cabin_type = catalog
            .create(CabinType {
                id: CabinTypeId::new(),
                name: "Balcony".to_string(),
                description: String::new(),
                berths: 2,
                surcharge_percent: 20,
            })
            .await
            .unwrap();
        Fleet {
            catalog,
            ship,
            deck,
            cabin_type,
        }
    }

    fn voyage(from: u32, to: u32) -> Voyage {
        Voyage {
            id: VoyageId::new(),
            name: format!("June {from}"),
            destination: "Caribbean".to_string(),
            itinerary_id: None,
            departure_date: NaiveDate::from_ymd_opt(2025, 6, from).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, to).unwrap(),
            departure_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            arrival_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            description: String::new(),
            image_url: None,
        }
    }

    fn field_errors(err: NavieraError) -> FieldErrors {
        match err {
            NavieraError::Validation(fields) => fields,
            other => unreachable!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cabin_numbers_unique_per_ship() {
        let fleet = fleet().await;
        let cabin = |number: &str| Cabin {
            id: CabinId::new(),
            deck_id: fleet.deck.id,
            cabin_type_id: fleet.cabin_type.id,
            number: number.to_string(),
            status: CabinStatus::Available,
            image_url: None,
        };
        fleet.catalog.create(cabin("101")).await.unwrap();

        let err = fleet.catalog.create(cabin("101")).await.unwrap_err();
        assert!(field_errors(err).contains("number"));
    }

    #[tokio::test]
    async fn test_deck_numbers_unique_per_ship() {
        let fleet = fleet().await;
        let err = fleet
            .catalog
            .create(Deck {
                id: DeckId::new(),
                ship_id: fleet.ship.id,
                number: 1,
                supervisor: String::new(),
            })
            .await
            .unwrap_err();
        assert!(field_errors(err).contains("number"));
    }

    #[tokio::test]
    async fn test_missing_references_are_field_errors() {
        let fleet = fleet().await;
        let err = fleet
            .catalog
            .create(Cabin {
                id: CabinId::new(),
                deck_id: DeckId::new(),
                cabin_type_id: CabinTypeId::new(),
                number: "7".to_string(),
                status: CabinStatus::Available,
                image_url: None,
            })
            .await
            .unwrap_err();
        let fields = field_errors(err);
        assert!(fields.contains("deck_id"));
        assert!(fields.contains("cabin_type_id"));
    }

    #[tokio::test]
    async fn test_ship_cannot_sail_overlapping_voyages() {
        let fleet = fleet().await;
        let june = fleet.catalog.create(voyage(1, 7)).await.unwrap();
        let overlapping = fleet.catalog.create(voyage(5, 12)).await.unwrap();
        let leg = |voyage_id| VoyageShip {
            id: VoyageShipId::new(),
            voyage_id,
            ship_id: fleet.ship.id,
            price: Money::from_cents(50_000),
        };
        fleet.catalog.create(leg(june.id)).await.unwrap();

        let err = fleet.catalog.create(leg(overlapping.id)).await.unwrap_err();
        assert!(field_errors(err).contains("ship_id"));

        let err = fleet.catalog.create(leg(june.id)).await.unwrap_err();
        assert!(field_errors(err).contains("ship_id"));
    }

    #[tokio::test]
    async fn test_voyage_dates_and_offer_discount_rules() {
        let fleet = fleet().await;
        let err = fleet.catalog.create(voyage(10, 3)).await.unwrap_err();
        assert!(field_errors(err).contains("end_date"));

        let june = fleet.catalog.create(voyage(1, 7)).await.unwrap();
        let err = fleet
            .catalog
            .create(Offer {
                id: OfferId::new(),
                voyage_id: june.id,
                title: "Too good".to_string(),
                description: String::new(),
                discount_percent: 95,
                valid_until: june.departure_date,
            })
            .await
            .unwrap_err();
        assert!(field_errors(err).contains("discount_percent"));
    }

    #[tokio::test]
    async fn test_crew_assignment_must_fit_voyage() {
        let fleet = fleet().await;
        let june = fleet.catalog.create(voyage(1, 7)).await.unwrap();
        let leg = fleet
            .catalog
            .create(VoyageShip {
                id: VoyageShipId::new(),
                voyage_id: june.id,
                ship_id: fleet.ship.id,
                price: Money::from_cents(50_000),
            })
            .await
            .unwrap();
        let member = fleet
            .catalog
            .create(CrewMember {
                id: CrewMemberId::new(),
                first_name: "Lucía".to_string(),
                last_name: "Pérez".to_string(),
                employee_number: "E-1".to_string(),
                dni: "30111222".to_string(),
                nationality: "AR".to_string(),
                gender: Gender::Female,
                position: "Purser".to_string(),
            })
            .await
            .unwrap();

        let err = fleet
            .catalog
            .create(CrewAssignment {
                id: CrewAssignmentId::new(),
                crew_member_id: member.id,
                voyage_ship_id: leg.id,
                start_date: june.departure_date,
                end_date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            })
            .await
            .unwrap_err();
        assert!(field_errors(err).contains(NON_FIELD_ERRORS));
    }
}
