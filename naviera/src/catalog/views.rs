//! Read models for the public pages: home, destinations, offers, ships.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::{
    Activity, Cabin, CabinType, Catalog, Itinerary, Offer, Port, PortActivity, PortLocation, Ship,
    ShipType, Voyage, VoyageShip,
};
use crate::booking::pricing::{best_discount, discounted};
use crate::error::Result;
use crate::types::{CabinTypeId, ItineraryId, Money, OfferId, ShipId, VoyageId, VoyageShipId};

/// Voyages shown on the home page.
pub const HOME_VOYAGES: usize = 6;

/// A voyage card.
#[derive(Clone, Debug, Serialize)]
pub struct VoyageSummary {
    /// Voyage
    pub id: VoyageId,
    /// Name
    pub name: String,
    /// Destination
    pub destination: String,
    /// First day
    pub departure_date: NaiveDate,
    /// Last day
    pub end_date: NaiveDate,
    /// Picture
    pub image_url: Option<String>,
    /// Cheapest leg price, before surcharge and discount
    pub from_price: Option<Money>,
    /// Best active discount (0 when none)
    pub discount_percent: u32,
}

/// An offer card.
#[derive(Clone, Debug, Serialize)]
pub struct OfferSummary {
    /// The offer
    #[serde(flatten)]
    pub offer: Offer,
    /// Voyage name
    pub voyage_name: String,
    /// Voyage destination
    pub destination: String,
    /// Voyage departure
    pub departure_date: NaiveDate,
}

/// Home page.
#[derive(Clone, Debug, Serialize)]
pub struct HomePage {
    /// Soonest upcoming voyages
    pub upcoming: Vec<VoyageSummary>,
    /// Offers valid today
    pub offers: Vec<OfferSummary>,
}

/// A ship sailing a voyage, priced.
#[derive(Clone, Debug, Serialize)]
pub struct LegView {
    /// Leg
    pub id: VoyageShipId,
    /// Ship
    pub ship_id: ShipId,
    /// Ship name
    pub ship_name: String,
    /// Price per passenger
    pub price: Money,
    /// Price after the discount shown with it
    pub discounted_price: Money,
}

/// A port of call with what there is to do.
#[derive(Clone, Debug, Serialize)]
pub struct StopView {
    /// The port
    #[serde(flatten)]
    pub port: Port,
    /// Docks and terminals
    pub locations: Vec<PortLocation>,
    /// Shore activities
    pub activities: Vec<Activity>,
}

/// Destination detail page.
#[derive(Clone, Debug, Serialize)]
pub struct DestinationDetail {
    /// The voyage
    pub voyage: Voyage,
    /// Itinerary, if any
    pub itinerary: Option<Itinerary>,
    /// Ports in stop order
    pub stops: Vec<StopView>,
    /// Ships sailing it
    pub legs: Vec<LegView>,
    /// Best active discount applied to `legs`
    pub discount_percent: u32,
}

/// Offer detail page.
#[derive(Clone, Debug, Serialize)]
pub struct OfferDetail {
    /// The offer
    pub offer: Offer,
    /// Whether it still applies today
    pub active: bool,
    /// Its voyage
    pub voyage: Voyage,
    /// Legs priced with this offer's discount
    pub legs: Vec<LegView>,
}

/// Ship card.
#[derive(Clone, Debug, Serialize)]
pub struct ShipSummary {
    /// The ship
    #[serde(flatten)]
    pub ship: Ship,
    /// Type name
    pub ship_type: String,
}

/// Cabins of one type on a ship.
#[derive(Clone, Debug, Serialize)]
pub struct CabinTypeCount {
    /// Cabin type
    pub cabin_type_id: CabinTypeId,
    /// Name
    pub name: String,
    /// Beds
    pub berths: u32,
    /// Cabins of this type
    pub count: usize,
}

/// A leg the ship will sail.
#[derive(Clone, Debug, Serialize)]
pub struct UpcomingLeg {
    /// Leg
    pub id: VoyageShipId,
    /// Voyage
    pub voyage_id: VoyageId,
    /// Voyage name
    pub voyage_name: String,
    /// Departure
    pub departure_date: NaiveDate,
    /// Price per passenger
    pub price: Money,
}

/// Ship detail page.
#[derive(Clone, Debug, Serialize)]
pub struct ShipDetail {
    /// The ship
    #[serde(flatten)]
    pub ship: ShipSummary,
    /// Decks by number
    pub decks: Vec<super::Deck>,
    /// Cabin counts per type
    pub cabins: Vec<CabinTypeCount>,
    /// Legs departing after today, soonest first
    pub upcoming_legs: Vec<UpcomingLeg>,
}

impl Catalog {
    fn summarize(voyage: &Voyage, legs: &[VoyageShip], offers: &[Offer], today: NaiveDate) -> VoyageSummary {
        VoyageSummary {
            id: voyage.id,
            name: voyage.name.clone(),
            destination: voyage.destination.clone(),
            departure_date: voyage.departure_date,
            end_date: voyage.end_date,
            image_url: voyage.image_url.clone(),
            from_price: legs
                .iter()
                .filter(|leg| leg.voyage_id == voyage.id)
                .map(|leg| leg.price)
                .min(),
            discount_percent: best_discount(offers, voyage.id, today),
        }
    }

    async fn upcoming(&self, today: NaiveDate) -> Result<Vec<Voyage>> {
        let mut voyages = self.find::<Voyage>(|v| v.departure_date > today).await?;
        voyages.sort_by_key(|v| (v.departure_date, v.departure_time));
        Ok(voyages)
    }

    async fn price_legs(&self, voyage: VoyageId, discount_percent: u32) -> Result<Vec<LegView>> {
        let mut views = Vec::new();
        for leg in self.legs_of_voyage(voyage).await? {
            let ship = self.require::<Ship>(leg.ship_id).await?;
            views.push(LegView {
                id: leg.id,
                ship_id: ship.id,
                ship_name: ship.name,
                price: leg.price,
                discounted_price: discounted(leg.price, discount_percent)?,
            });
        }
        views.sort_by_key(|leg| leg.price);
        Ok(views)
    }

    /// Home page: upcoming voyages and current offers.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn home(&self, today: NaiveDate) -> Result<HomePage> {
        let mut upcoming = self.destinations(today).await?;
        upcoming.truncate(HOME_VOYAGES);
        Ok(HomePage {
            upcoming,
            offers: self.offers(today).await?,
        })
    }

    /// Upcoming voyages, soonest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn destinations(&self, today: NaiveDate) -> Result<Vec<VoyageSummary>> {
        let legs = self.list::<VoyageShip>().await?;
        let offers = self.list::<Offer>().await?;
        Ok(self
            .upcoming(today)
            .await?
            .iter()
            .map(|voyage| Self::summarize(voyage, &legs, &offers, today))
            .collect())
    }

    /// One voyage with its ships and ports of call.
    ///
    /// # Errors
    ///
    /// Not found, or storage failures.
    pub async fn destination(&self, id: VoyageId, today: NaiveDate) -> Result<DestinationDetail> {
        let voyage = self.require::<Voyage>(id).await?;
        let offers = self.find::<Offer>(|o| o.voyage_id == id).await?;
        let discount_percent = best_discount(&offers, id, today);

        let (itinerary, stops) = match voyage.itinerary_id {
            Some(itinerary_id) => {
                let itinerary = self.get::<Itinerary>(itinerary_id).await?;
                (itinerary, self.stops(itinerary_id).await?)
            }
            None => (None, Vec::new()),
        };

        Ok(DestinationDetail {
            legs: self.price_legs(id, discount_percent).await?,
            voyage,
            itinerary,
            stops,
            discount_percent,
        })
    }

    async fn stops(&self, itinerary: ItineraryId) -> Result<Vec<StopView>> {
        let mut ports = self.find::<Port>(|p| p.itinerary_id == itinerary).await?;
        ports.sort_by_key(|p| p.stop_order);
        let locations = self.list::<PortLocation>().await?;
        let port_activities = self.list::<PortActivity>().await?;
        let activities = self.list::<Activity>().await?;

        Ok(ports
            .into_iter()
            .map(|port| StopView {
                locations: locations
                    .iter()
                    .filter(|l| l.port_id == port.id)
                    .cloned()
                    .collect(),
                activities: port_activities
                    .iter()
                    .filter(|pa| pa.port_id == port.id)
                    .filter_map(|pa| activities.iter().find(|a| a.id == pa.activity_id))
                    .cloned()
                    .collect(),
                port,
            })
            .collect())
    }

    /// Offers valid today on voyages that have not departed.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn offers(&self, today: NaiveDate) -> Result<Vec<OfferSummary>> {
        let voyages: BTreeMap<VoyageId, Voyage> = self
            .upcoming(today)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();
        let mut offers: Vec<OfferSummary> = self
            .find::<Offer>(|o| o.is_active(today))
            .await?
            .into_iter()
            .filter_map(|offer| {
                let voyage = voyages.get(&offer.voyage_id)?;
                Some(OfferSummary {
                    voyage_name: voyage.name.clone(),
                    destination: voyage.destination.clone(),
                    departure_date: voyage.departure_date,
                    offer,
                })
            })
            .collect();
        offers.sort_by(|a, b| {
            b.offer
                .discount_percent
                .cmp(&a.offer.discount_percent)
                .then(a.departure_date.cmp(&b.departure_date))
        });
        Ok(offers)
    }

    /// One offer with its voyage priced at the offer's discount.
    ///
    /// # Errors
    ///
    /// Not found, or storage failures.
    pub async fn offer(&self, id: OfferId, today: NaiveDate) -> Result<OfferDetail> {
        let offer = self.require::<Offer>(id).await?;
        let voyage = self.require::<Voyage>(offer.voyage_id).await?;
        Ok(OfferDetail {
            active: offer.is_active(today) && voyage.departure_date > today,
            legs: self.price_legs(voyage.id, offer.discount_percent).await?,
            offer,
            voyage,
        })
    }

    fn ship_summary(ship: Ship, types: &[ShipType]) -> ShipSummary {
        let ship_type = types
            .iter()
            .find(|t| t.id == ship.ship_type_id)
            .map(|t| t.name.clone())
            .unwrap_or_default();
        ShipSummary { ship, ship_type }
    }

    /// The fleet, by name.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn ships(&self) -> Result<Vec<ShipSummary>> {
        let types = self.list::<ShipType>().await?;
        let mut ships = self.list::<Ship>().await?;
        ships.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ships
            .into_iter()
            .map(|ship| Self::ship_summary(ship, &types))
            .collect())
    }

    /// One ship with decks, cabin mix and upcoming legs.
    ///
    /// # Errors
    ///
    /// Not found, or storage failures.
    pub async fn ship(&self, id: ShipId, today: NaiveDate) -> Result<ShipDetail> {
        let ship = self.require::<Ship>(id).await?;
        let types = self.list::<ShipType>().await?;
        let cabin_types = self.list::<CabinType>().await?;

        let mut counts: BTreeMap<CabinTypeId, usize> = BTreeMap::new();
        for (_, cabin) in self.cabins_of(id).await? {
            *counts.entry(cabin.cabin_type_id).or_default() += 1;
        }
        let cabins = cabin_types
            .iter()
            .filter_map(|t| {
                counts.get(&t.id).map(|&count| CabinTypeCount {
                    cabin_type_id: t.id,
                    name: t.name.clone(),
                    berths: t.berths,
                    count,
                })
            })
            .collect();

        let mut upcoming_legs = Vec::new();
        for leg in self.find::<VoyageShip>(|l| l.ship_id == id).await? {
            let voyage = self.require::<Voyage>(leg.voyage_id).await?;
            if voyage.departure_date > today {
                upcoming_legs.push(UpcomingLeg {
                    id: leg.id,
                    voyage_id: voyage.id,
                    voyage_name: voyage.name,
                    departure_date: voyage.departure_date,
                    price: leg.price,
                });
            }
        }
        upcoming_legs.sort_by_key(|l| l.departure_date);

        Ok(ShipDetail {
            decks: self.decks_of(id).await?,
            ship: Self::ship_summary(ship, &types),
            cabins,
            upcoming_legs,
        })
    }
}

/// Cabins of a ship grouped for display: `(deck number, cabin)` sorted.
#[must_use]
pub fn sorted_cabins(mut cabins: Vec<(u32, Cabin)>) -> Vec<(u32, Cabin)> {
    cabins.sort_by(|(deck_a, a), (deck_b, b)| {
        deck_a
            .cmp(deck_b)
            .then_with(|| natural_cmp(&a.number, &b.number))
    });
    cabins
}

/// Compare cabin numbers so "9" sorts before "10".
fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::Deck;
    use crate::storage::Storage;
    use crate::types::{CabinId, CabinStatus, DeckId, ShipTypeId};
    use chrono::NaiveTime;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    async fn seeded() -> (Catalog, Voyage, Voyage) {
        let catalog = Catalog::new(&Storage::memory());
        let kind = ShipType {
            id: ShipTypeId::new(),
            name: "Liner".to_string(),
            description: String::new(),
        };
        catalog.put(&kind).await.unwrap();
        let ship = Ship {
            id: ShipId::new(),
            name: "Aurora".to_string(),
            ship_type_id: kind.id,
            max_passengers: 100,
            engine_count: 2,
            image_url: None,
        };
        catalog.put(&ship).await.unwrap();

        let voyage = |name: &str, departure| Voyage {
            id: VoyageId::new(),
            name: name.to_string(),
            destination: "Caribbean".to_string(),
            itinerary_id: None,
            departure_date: departure,
            end_date: departure,
            departure_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            arrival_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            description: String::new(),
            image_url: None,
        };
        let past = voyage("Winter", date(1, 5));
        let future = voyage("Spring", date(4, 1));
        for v in [&past, &future] {
            catalog.put(v).await.unwrap();
            catalog
                .put(&VoyageShip {
                    id: VoyageShipId::new(),
                    voyage_id: v.id,
                    ship_id: ship.id,
                    price: Money::from_cents(100_000),
                })
                .await
                .unwrap();
        }
        catalog
            .put(&Offer {
                id: OfferId::new(),
                voyage_id: future.id,
                title: "Spring sale".to_string(),
                description: String::new(),
                discount_percent: 20,
                valid_until: date(3, 1),
            })
            .await
            .unwrap();
        (catalog, past, future)
    }

    #[tokio::test]
    async fn test_destinations_only_list_upcoming_voyages() {
        let (catalog, _, future) = seeded().await;
        let list = catalog.destinations(date(2, 1)).await.unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, future.id);
        assert_eq!(list[0].from_price, Some(Money::from_cents(100_000)));
        assert_eq!(list[0].discount_percent, 20);
    }

    #[tokio::test]
    async fn test_expired_offer_disappears() {
        let (catalog, _, _) = seeded().await;
        assert_eq!(catalog.offers(date(2, 1)).await.unwrap().len(), 1);
        assert!(catalog.offers(date(3, 2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_destination_prices_legs_with_best_discount() {
        let (catalog, _, future) = seeded().await;
        let detail = catalog.destination(future.id, date(2, 1)).await.unwrap();

        assert_eq!(detail.legs.len(), 1);
        assert_eq!(detail.legs[0].discounted_price, Money::from_cents(80_000));
        assert!(detail.stops.is_empty());
    }

    #[tokio::test]
    async fn test_ship_detail_counts_cabins_per_type() {
        let (catalog, _, _) = seeded().await;
        let ship = catalog.list::<Ship>().await.unwrap().remove(0);
        let deck = Deck {
            id: DeckId::new(),
            ship_id: ship.id,
            number: 3,
            supervisor: String::new(),
        };
        catalog.put(&deck).await.unwrap();
        let inside = CabinType {
            id: CabinTypeId::new(),
            name: "Inside".to_string(),
            description: String::new(),
            berths: 2,
            surcharge_percent: 0,
        };
        catalog.put(&inside).await.unwrap();
        for number in ["301", "302"] {
            catalog
                .put(&Cabin {
                    id: CabinId::new(),
                    deck_id: deck.id,
                    cabin_type_id: inside.id,
                    number: number.to_string(),
                    status: CabinStatus::Available,
                    image_url: None,
                })
                .await
                .unwrap();
        }

        let detail = catalog.ship(ship.id, date(2, 1)).await.unwrap();
        assert_eq!(detail.ship.ship_type, "Liner");
        assert_eq!(detail.cabins.len(), 1);
        assert_eq!(detail.cabins[0].count, 2);
        assert_eq!(detail.upcoming_legs.len(), 1);
    }

    #[test]
    fn test_cabins_sort_by_deck_then_number() {
        let cabin = |number: &str| Cabin {
            id: CabinId::new(),
            deck_id: DeckId::new(),
            cabin_type_id: CabinTypeId::new(),
            number: number.to_string(),
            status: CabinStatus::Available,
            image_url: None,
        };
        let sorted = sorted_cabins(vec![(2, cabin("1")), (1, cabin("10")), (1, cabin("9"))]);
        let order: Vec<_> = sorted.iter().map(|(d, c)| (*d, c.number.as_str())).collect();
        assert_eq!(order, vec![(1, "9"), (1, "10"), (2, "1")]);
    }
}
