//! The booking wizard and everything it needs to price and place a party.
//!
//! Step 1 and step 2 only touch the session. Confirmation goes through the
//! reservation reducer, which re-checks availability before committing.

pub mod availability;
pub mod pricing;
pub mod views;
pub mod wizard;

use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::{NavieraError, Result};
use availability::{LegContext, check_room, free_cabins};
use pricing::{Quote, quote};
use wizard::{CabinSelection, WizardSession, WizardStep};

/// Wizard as shown to the user.
#[derive(Clone, Debug, Serialize)]
pub struct WizardView {
    /// Current step
    pub step: WizardStep,
    /// Answers so far (absent when no wizard is running)
    pub wizard: Option<WizardSession>,
    /// Price of the current selection
    pub quote: Option<Quote>,
}

/// Validate a step 1 selection against the catalog and current bookings.
///
/// # Errors
///
/// Not found for an unknown leg or cabin type, or validation errors when
/// the voyage has departed, the party does not fit, or no cabin is free.
pub async fn check_selection(
    catalog: &Catalog,
    selection: &CabinSelection,
    today: NaiveDate,
) -> Result<(LegContext, Quote)> {
    let context = LegContext::load(
        catalog,
        selection.voyage_ship_id,
        selection.cabin_type_id,
        today,
    )
    .await?;
    if !context.is_open(today) {
        return Err(NavieraError::field(
            "voyage_ship_id",
            "This voyage has already departed.",
        ));
    }
    check_room(catalog, &context, selection.passenger_count).await?;
    if free_cabins(catalog, &context.leg, context.cabin_type.id)
        .await?
        .is_empty()
    {
        return Err(NavieraError::field(
            "cabin_type_id",
            format!("No {} cabins are left on this sailing.", context.cabin_type.name),
        ));
    }
    let price = quote(
        context.leg.price,
        &context.cabin_type,
        context.discount_percent,
        selection.passenger_count,
    )?;
    Ok((context, price))
}

/// Describe a wizard, pricing its selection when the leg still exists.
///
/// # Errors
///
/// Storage failures.
pub async fn describe(
    catalog: &Catalog,
    wizard: Option<WizardSession>,
    today: NaiveDate,
) -> Result<WizardView> {
    let Some(wizard) = wizard else {
        return Ok(WizardView {
            step: WizardStep::SelectCabin,
            wizard: None,
            quote: None,
        });
    };
    let quote = match &wizard.selection {
        Some(selection) => {
            match LegContext::load(catalog, selection.voyage_ship_id, selection.cabin_type_id, today).await {
                Ok(context) => Some(quote(
                    context.leg.price,
                    &context.cabin_type,
                    context.discount_percent,
                    selection.passenger_count,
                )?),
                Err(NavieraError::NotFound { .. }) => None,
                Err(other) => return Err(other),
            }
        }
        None => None,
    };
    Ok(WizardView {
        step: wizard.step(),
        wizard: Some(wizard),
        quote,
    })
}
