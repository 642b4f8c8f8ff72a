//! Price quotes.
//!
//! Per-passenger price is the leg price marked up by the cabin type's
//! surcharge, then reduced by the best offer active on the voyage. The total
//! is that price times the party size. Rounding happens once per step, in the
//! customer's favour for discounts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::{CabinType, Offer};
use crate::error::{NavieraError, Result};
use crate::types::{Money, VoyageId};

/// A priced selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Leg price per passenger
    pub base_price: Money,
    /// Cabin type markup
    pub surcharge_percent: u32,
    /// Offer discount applied (0 when none)
    pub discount_percent: u32,
    /// Price per passenger after markup and discount
    pub unit_price: Money,
    /// Party size
    pub passenger_count: u32,
    /// What the reservation costs
    pub total: Money,
}

/// Largest discount among offers on `voyage` still valid on `today`.
#[must_use]
pub fn best_discount(offers: &[Offer], voyage: VoyageId, today: NaiveDate) -> u32 {
    offers
        .iter()
        .filter(|offer| offer.voyage_id == voyage && offer.is_active(today))
        .map(|offer| offer.discount_percent)
        .max()
        .unwrap_or(0)
}

fn overflow() -> NavieraError {
    NavieraError::Internal("price overflow".to_string())
}

/// Apply a discount to a leg price.
///
/// # Errors
///
/// Fails only for a discount above 100 percent.
pub fn discounted(price: Money, discount_percent: u32) -> Result<Money> {
    price
        .checked_apply_discount(discount_percent)
        .ok_or_else(overflow)
}

/// Price `passenger_count` passengers in a cabin of `cabin_type`.
///
/// # Errors
///
/// [`NavieraError::Internal`] if the arithmetic overflows.
pub fn quote(
    base_price: Money,
    cabin_type: &CabinType,
    discount_percent: u32,
    passenger_count: u32,
) -> Result<Quote> {
    let unit_price = base_price
        .checked_apply_markup(cabin_type.surcharge_percent)
        .and_then(|marked_up| marked_up.checked_apply_discount(discount_percent))
        .ok_or_else(overflow)?;
    let total = unit_price
        .checked_multiply(passenger_count)
        .ok_or_else(overflow)?;
    Ok(Quote {
        base_price,
        surcharge_percent: cabin_type.surcharge_percent,
        discount_percent,
        unit_price,
        passenger_count,
        total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{CabinTypeId, OfferId};

    fn suite(surcharge_percent: u32) -> CabinType {
        CabinType {
            id: CabinTypeId::new(),
            name: "Suite".to_string(),
            description: String::new(),
            berths: 4,
            surcharge_percent,
        }
    }

    fn offer(voyage_id: VoyageId, discount_percent: u32, valid_until: NaiveDate) -> Offer {
        Offer {
            id: OfferId::new(),
            voyage_id,
            title: "Sale".to_string(),
            description: String::new(),
            discount_percent,
            valid_until,
        }
    }

    #[test]
    fn test_quote_applies_markup_then_discount() {
        let quote = quote(Money::from_cents(100_000), &suite(50), 10, 3).unwrap();

        assert_eq!(quote.unit_price, Money::from_cents(135_000));
        assert_eq!(quote.total, Money::from_cents(405_000));
    }

    #[test]
    fn test_quote_without_surcharge_or_discount_is_base_price() {
        let quote = quote(Money::from_cents(80_000), &suite(0), 0, 2).unwrap();
        assert_eq!(quote.unit_price, Money::from_cents(80_000));
        assert_eq!(quote.total, Money::from_cents(160_000));
    }

    #[test]
    fn test_best_discount_ignores_expired_and_other_voyages() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let voyage = VoyageId::new();
        let offers = [
            offer(voyage, 15, today),
            offer(voyage, 40, NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()),
            offer(VoyageId::new(), 60, today),
            offer(voyage, 5, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()),
        ];

        assert_eq!(best_discount(&offers, voyage, today), 15);
        assert_eq!(best_discount(&[], voyage, today), 0);
    }
}
