//! Booking wizard state kept in the session.
//!
//! The step is never stored; it follows from what has been filled in.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use naviera_web::FieldErrors;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{CabinTypeId, Gender, VoyageShipId};

/// Step 1 answer: which leg, which cabin type, how many people.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabinSelection {
    /// Leg
    pub voyage_ship_id: VoyageShipId,
    /// Cabin type
    pub cabin_type_id: CabinTypeId,
    /// Party size
    pub passenger_count: u32,
}

/// Step 2 answer for one traveller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerDraft {
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Document number
    pub dni: String,
    /// Date of birth
    pub birth_date: NaiveDate,
    /// Nationality
    pub nationality: String,
    /// Gender
    pub gender: Gender,
}

/// Where the user is in the wizard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    /// Nothing chosen yet
    SelectCabin,
    /// Cabin chosen, passengers missing
    RegisterPassengers,
    /// Ready to confirm
    Confirm,
}

/// Wizard answers so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardSession {
    /// Step 1
    pub selection: Option<CabinSelection>,
    /// Step 2
    pub passengers: Vec<PassengerDraft>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl WizardSession {
    /// Empty wizard.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            selection: None,
            passengers: Vec::new(),
            updated_at: now,
        }
    }

    /// Current step.
    #[must_use]
    pub fn step(&self) -> WizardStep {
        match &self.selection {
            None => WizardStep::SelectCabin,
            Some(selection) if self.passengers.len() != selection.passenger_count as usize => {
                WizardStep::RegisterPassengers
            }
            Some(_) => WizardStep::Confirm,
        }
    }

    /// Whether the wizard was left alone longer than `ttl`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at > ttl
    }

    /// Record step 1. A different selection drops the passengers entered for
    /// the previous one.
    pub fn select(&mut self, selection: CabinSelection, now: DateTime<Utc>) {
        if self.selection != Some(selection) {
            self.passengers.clear();
        }
        self.selection = Some(selection);
        self.updated_at = now;
    }

    /// Record step 2 (already validated).
    pub fn register_passengers(&mut self, passengers: Vec<PassengerDraft>, now: DateTime<Utc>) {
        self.passengers = passengers;
        self.updated_at = now;
    }
}

/// Check the step 2 form.
///
/// Errors are keyed `passengers` for the list as a whole and
/// `passengers[i].field` for single entries.
///
/// # Errors
///
/// Every problem found, as field errors.
pub fn validate_passengers(
    drafts: &[PassengerDraft],
    expected: u32,
    today: NaiveDate,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if drafts.len() != expected as usize {
        errors.add(
            "passengers",
            format!("Exactly {expected} passengers are required, got {}.", drafts.len()),
        );
    }

    let mut seen = HashSet::new();
    for (i, draft) in drafts.iter().enumerate() {
        let field = |name: &str| format!("passengers[{i}].{name}");
        errors.check_text(&field("first_name"), &draft.first_name, 50);
        errors.check_text(&field("last_name"), &draft.last_name, 50);
        errors.check_text(&field("nationality"), &draft.nationality, 50);
        if errors.check_text(&field("dni"), &draft.dni, 20)
            && !seen.insert(draft.dni.trim().to_uppercase())
        {
            errors.add(field("dni"), "This document number is repeated in the booking.");
        }
        if draft.birth_date > today {
            errors.add(field("birth_date"), "The birth date cannot be in the future.");
        }
    }
    errors.into_result()
}
