//! Domain types for the cruise reservation service.
//!
//! Identifiers, money, the status vocabularies and the account/booking/payment
//! entities. Fleet and voyage records live in [`crate::catalog::records`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! entity_id {
    ($($(#[$meta:meta])* $name:ident;)+) => {$(
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    )+};
}

entity_id! {
    /// Registered account
    UserId;
    /// Staff role
    RoleId;
    /// Customer profile attached to an account
    ClientId;
    /// Ship class (ocean liner, river cruiser, ...)
    ShipTypeId;
    /// Ship in the fleet
    ShipId;
    /// Deck of a ship
    DeckId;
    /// Cabin category (berths, surcharge)
    CabinTypeId;
    /// Cabin on a deck
    CabinId;
    /// Itinerary (ordered ports of call)
    ItineraryId;
    /// Port of call
    PortId;
    /// Dock or terminal inside a port
    PortLocationId;
    /// Shore activity
    ActivityId;
    /// Activity offered at a port
    PortActivityId;
    /// Voyage (dates, destination)
    VoyageId;
    /// Voyage-ship leg: one ship sailing one voyage
    VoyageShipId;
    /// Promotional offer
    OfferId;
    /// Crew member
    CrewMemberId;
    /// Crew member assigned to a leg
    CrewAssignmentId;
    /// Passenger on a reservation
    PassengerId;
    /// Cabin occupancy row
    OccupancyId;
    /// Reservation
    ReservationId;
    /// Payment
    PaymentId;
    /// Reservation or payment history row
    HistoryId;
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Money in cents. Serialized as an integer number of cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole units with overflow checking
    #[must_use]
    pub const fn checked_from_units(units: u64) -> Option<Self> {
        match units.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Whole units (rounded down)
    #[must_use]
    pub const fn units(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts two money amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(self.0 - other.0))
        } else {
            None
        }
    }

    /// Subtracts, clamping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Applies a percentage discount (rounded in the customer's favour)
    #[must_use]
    pub const fn checked_apply_discount(self, percent: u32) -> Option<Self> {
        if percent > 100 {
            return None;
        }
        let discount = match self.0.checked_mul(percent as u64) {
            Some(product) => product.div_ceil(100),
            None => return None,
        };
        Some(Self(self.0.saturating_sub(discount)))
    }

    /// Applies a percentage markup with overflow checking
    #[must_use]
    pub const fn checked_apply_markup(self, percent: u32) -> Option<Self> {
        let markup = match self.0.checked_mul(percent as u64) {
            Some(product) => product / 100,
            None => return None,
        };
        match self.0.checked_add(markup) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Sum an iterator of amounts, `None` on overflow
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.units(), self.0 % 100)
    }
}

// ============================================================================
// Status vocabularies
// ============================================================================

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Stable text form (also the database value)
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// A text value that is not a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    /// Enum name
    pub kind: &'static str,
    /// Offending text
    pub value: String,
}

text_enum! {
    /// Gender as recorded for clients, passengers and crew
    Gender {
        Female => "female",
        Male => "male",
        Other => "other",
    }
}

text_enum! {
    /// Accepted payment methods
    PaymentMethod {
        Card => "card",
        Paypal => "paypal",
        BankTransfer => "bank_transfer",
        MercadoPago => "mercado_pago",
    }
}

text_enum! {
    /// Whether a cabin can be sold
    CabinStatus {
        /// Bookable
        Available => "available",
        /// Temporarily closed
        Maintenance => "maintenance",
        /// Permanently withdrawn
        OutOfService => "out_of_service",
    }
}

text_enum! {
    /// Passenger lifecycle
    PassengerStatus {
        Registered => "registered",
        CheckedIn => "checked_in",
        Boarded => "boarded",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Reservation lifecycle
    ReservationStatus {
        /// Cabin held, payment outstanding
        Confirmed => "confirmed",
        /// Approved payments cover the total
        Paid => "paid",
        /// Cabin released
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Payment lifecycle
    PaymentStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Refunded => "refunded",
    }
}

impl PaymentStatus {
    /// Allowed status moves: pending to approved/rejected, approved to refunded.
    #[must_use]
    pub const fn can_move_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected) | (Self::Approved, Self::Refunded)
        )
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// A registered account. The password hash is kept by storage only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier
    pub id: UserId,
    /// Login name (case-sensitive, unique)
    pub username: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Email (unique, case-insensitive)
    pub email: String,
    /// Phone number
    pub phone: String,
    /// Country of residence
    pub country: String,
    /// Method offered first at checkout
    pub preferred_payment_method: Option<PaymentMethod>,
    /// Staff role, if any
    pub role_id: Option<RoleId>,
    /// May use the back-office
    pub is_staff: bool,
    /// May log in
    pub is_active: bool,
    /// Registration time
    pub date_joined: DateTime<Utc>,
    /// Last successful login
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// "First Last"
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Customer profile used on reservations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Identifier
    pub id: ClientId,
    /// Owning account (at most one client per account)
    pub user_id: Option<UserId>,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// National identity document (unique)
    pub dni: String,
    /// Nationality
    pub nationality: String,
    /// Gender
    pub gender: Gender,
}

// ============================================================================
// Bookings
// ============================================================================

/// A traveller on a reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    /// Identifier
    pub id: PassengerId,
    /// Reservation the passenger travels on
    pub reservation_id: ReservationId,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Identity document
    pub dni: String,
    /// Date of birth
    pub birth_date: NaiveDate,
    /// Nationality
    pub nationality: String,
    /// Gender
    pub gender: Gender,
    /// Lifecycle status
    pub status: PassengerStatus,
}

/// Who sleeps in an occupied cabin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Occupant {
    /// Lead passenger of a reservation
    Passenger(PassengerId),
    /// Crew member
    Crew(CrewMemberId),
}

/// A cabin taken on a leg. At most one per `(cabin_id, voyage_ship_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabinOccupancy {
    /// Identifier
    pub id: OccupancyId,
    /// Occupied cabin
    pub cabin_id: CabinId,
    /// Leg the cabin is occupied on
    pub voyage_ship_id: VoyageShipId,
    /// Occupant
    pub occupant: Occupant,
    /// Reservation that claimed the cabin (passenger occupancies)
    pub reservation_id: Option<ReservationId>,
    /// First night
    pub start_date: NaiveDate,
    /// Last night
    pub end_date: NaiveDate,
}

/// A booking of a client on a leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Identifier
    pub id: ReservationId,
    /// Client travelling
    pub client_id: ClientId,
    /// Account that made the booking
    pub user_id: UserId,
    /// Leg booked
    pub voyage_ship_id: VoyageShipId,
    /// Cabin assigned, if any
    pub cabin_id: Option<CabinId>,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Amount due
    pub total: Money,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

/// Audit row for a reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationHistory {
    /// Identifier
    pub id: HistoryId,
    /// Reservation
    pub reservation_id: ReservationId,
    /// When the change happened
    pub changed_at: DateTime<Utc>,
    /// What changed
    pub description: String,
}

impl ReservationHistory {
    /// New history row
    #[must_use]
    pub fn new(reservation_id: ReservationId, changed_at: DateTime<Utc>, description: impl Into<String>) -> Self {
        Self {
            id: HistoryId::new(),
            reservation_id,
            changed_at,
            description: description.into(),
        }
    }
}

// ============================================================================
// Payments
// ============================================================================

/// Money received (or expected) against a reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Identifier
    pub id: PaymentId,
    /// Reservation paid for
    pub reservation_id: ReservationId,
    /// Amount
    pub amount: Money,
    /// Method
    pub method: PaymentMethod,
    /// Lifecycle status
    pub status: PaymentStatus,
    /// When the payment was made
    pub paid_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

/// Audit row for a payment, naming the responsible user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHistory {
    /// Identifier
    pub id: HistoryId,
    /// Payment
    pub payment_id: PaymentId,
    /// When the change happened
    pub changed_at: DateTime<Utc>,
    /// Status after the change
    pub status: PaymentStatus,
    /// Who made the change
    pub changed_by: Option<UserId>,
    /// Free-text note
    pub description: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(123_456).to_string(), "$1234.56");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
    }

    #[test]
    fn markup_then_discount() {
        let base = Money::from_cents(100_000);
        let suite = base.checked_apply_markup(35).unwrap();
        assert_eq!(suite, Money::from_cents(135_000));
        assert_eq!(suite.checked_apply_discount(10).unwrap(), Money::from_cents(121_500));
    }

    #[test]
    fn discount_over_hundred_percent_is_rejected() {
        assert_eq!(Money::from_cents(100).checked_apply_discount(101), None);
    }

    #[test]
    fn checked_sum_detects_overflow() {
        assert_eq!(
            Money::checked_sum([Money::from_cents(1), Money::from_cents(2)]),
            Some(Money::from_cents(3))
        );
        assert_eq!(Money::checked_sum([Money::from_cents(u64::MAX), Money::from_cents(1)]), None);
    }

    #[test]
    fn enum_text_round_trip_and_unknown() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), *method);
        }
        let err = "cash".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(err.to_string(), "unknown PaymentMethod value: cash");
    }

    #[test]
    fn payment_status_moves() {
        assert!(PaymentStatus::Pending.can_move_to(PaymentStatus::Approved));
        assert!(PaymentStatus::Pending.can_move_to(PaymentStatus::Rejected));
        assert!(PaymentStatus::Approved.can_move_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Rejected.can_move_to(PaymentStatus::Approved));
        assert!(!PaymentStatus::Refunded.can_move_to(PaymentStatus::Approved));
        assert!(!PaymentStatus::Pending.can_move_to(PaymentStatus::Refunded));
    }

    #[test]
    fn ids_serialize_as_bare_uuid() {
        let id = ShipId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        assert_eq!(json.trim_matches('"').parse::<ShipId>().unwrap(), id);
    }

    #[test]
    fn occupant_is_tagged() {
        let crew = CrewMemberId::new();
        let json = serde_json::to_value(Occupant::Crew(crew)).unwrap();
        assert_eq!(json["kind"], "crew");
        assert_eq!(json["id"], crew.to_string());
    }

    proptest! {
        #[test]
        fn discount_never_exceeds_price(cents in 0u64..10_000_000_000, percent in 0u32..=100) {
            let price = Money::from_cents(cents);
            let discounted = price.checked_apply_discount(percent).unwrap();
            prop_assert!(discounted <= price);
        }

        #[test]
        fn markup_never_lowers_price(cents in 0u64..10_000_000_000, percent in 0u32..=500) {
            let price = Money::from_cents(cents);
            prop_assert!(price.checked_apply_markup(percent).unwrap() >= price);
        }

        #[test]
        fn sub_undoes_add(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
            let sum = Money::from_cents(a).checked_add(Money::from_cents(b)).unwrap();
            prop_assert_eq!(sum.checked_sub(Money::from_cents(b)), Some(Money::from_cents(a)));
        }
    }
}
