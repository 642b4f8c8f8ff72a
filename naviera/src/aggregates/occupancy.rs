//! Crew cabin occupancies.
//!
//! Crew share the one-occupancy-per-cabin-and-leg rule with passengers, so a
//! crew claim can lose a race against a booking just like another booking can.

use naviera_core::{async_effect, effect::Effect, reducer::Reducer, smallvec, SmallVec};
use tracing::info;

use crate::catalog::{Cabin, Catalog, CrewAssignment, CrewMember, Deck, VoyageShip};
use crate::error::{NavieraError, Result};
use crate::storage::OCCUPANCY_UNIQUE;
use crate::types::{CabinId, CabinOccupancy, CabinStatus, CrewMemberId, OccupancyId, Occupant, VoyageShipId};

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the occupancy reducer
#[derive(Clone, Debug)]
pub enum OccupancyAction {
    // Commands
    /// Give a crew member a cabin for their assignment on a leg
    AssignCrewCabin {
        /// Id the occupancy will have
        occupancy_id: OccupancyId,
        /// Crew member
        crew_member_id: CrewMemberId,
        /// Leg
        voyage_ship_id: VoyageShipId,
        /// Cabin
        cabin_id: CabinId,
    },

    /// Free a crew cabin
    ReleaseOccupancy {
        /// Occupancy
        occupancy_id: OccupancyId,
    },

    // Events
    /// The cabin was claimed
    CrewCabinAssigned {
        /// The new occupancy
        occupancy: CabinOccupancy,
    },

    /// The cabin was freed
    OccupancyReleased {
        /// Occupancy
        occupancy_id: OccupancyId,
    },

    /// A command was refused
    OccupancyRejected {
        /// Occupancy the command was about
        occupancy_id: OccupancyId,
        /// Why
        error: NavieraError,
    },
}

impl OccupancyAction {
    /// Whether this is a final outcome for `occupancy_id`.
    #[must_use]
    pub fn is_outcome_for(&self, occupancy_id: OccupancyId) -> bool {
        match self {
            Self::CrewCabinAssigned { occupancy } => occupancy.id == occupancy_id,
            Self::OccupancyReleased { occupancy_id: id } | Self::OccupancyRejected { occupancy_id: id, .. } => {
                *id == occupancy_id
            },
            Self::AssignCrewCabin { .. } | Self::ReleaseOccupancy { .. } => false,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the occupancy reducer
#[derive(Clone)]
pub struct OccupancyEnvironment {
    /// Catalog and booking storage
    pub catalog: Catalog,
}

impl OccupancyEnvironment {
    /// Creates a new `OccupancyEnvironment`
    #[must_use]
    pub const fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for crew cabin occupancies. Stateless.
#[derive(Clone, Debug, Default)]
pub struct OccupancyReducer;

impl OccupancyReducer {
    /// Creates a new `OccupancyReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

async fn assign(
    catalog: Catalog,
    occupancy_id: OccupancyId,
    crew_member_id: CrewMemberId,
    voyage_ship_id: VoyageShipId,
    cabin_id: CabinId,
) -> Result<CabinOccupancy> {
    catalog.require::<CrewMember>(crew_member_id).await?;
    let leg = catalog.require::<VoyageShip>(voyage_ship_id).await?;
    let cabin = catalog.require::<Cabin>(cabin_id).await?;
    let deck = catalog.require::<Deck>(cabin.deck_id).await?;
    if deck.ship_id != leg.ship_id {
        return Err(NavieraError::field("cabin_id", "The cabin is not on the leg's ship."));
    }
    if cabin.status != CabinStatus::Available {
        return Err(NavieraError::field("cabin_id", format!("Cabin {} is {}.", cabin.number, cabin.status)));
    }
    let assignment = catalog
        .find::<CrewAssignment>(|a| a.crew_member_id == crew_member_id && a.voyage_ship_id == voyage_ship_id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| NavieraError::field("crew_member_id", "The crew member is not assigned to this leg."))?;

    let occupancy = CabinOccupancy {
        id: occupancy_id,
        cabin_id,
        voyage_ship_id,
        occupant: Occupant::Crew(crew_member_id),
        reservation_id: None,
        start_date: assignment.start_date,
        end_date: assignment.end_date,
    };
    match catalog.bookings().claim_cabin(&occupancy).await {
        Ok(()) => Ok(occupancy),
        Err(e) if e.is_conflict_on(OCCUPANCY_UNIQUE) => Err(NavieraError::Conflict(format!(
            "Cabin {} is already occupied on this leg.",
            cabin.number
        ))),
        Err(e) => Err(e.into()),
    }
}

async fn release(catalog: Catalog, occupancy_id: OccupancyId) -> Result<()> {
    let occupancy = catalog
        .bookings()
        .occupancy(occupancy_id)
        .await?
        .ok_or_else(|| NavieraError::not_found("Occupancy", occupancy_id))?;
    if matches!(occupancy.occupant, Occupant::Passenger(_)) {
        return Err(NavieraError::rule(
            "Passenger cabins are released by cancelling the reservation.",
        ));
    }
    catalog.bookings().release_occupancy(occupancy_id).await?;
    Ok(())
}

impl Reducer for OccupancyReducer {
    type State = ();
    type Action = OccupancyAction;
    type Environment = OccupancyEnvironment;

    fn reduce(
        &self,
        _state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            OccupancyAction::AssignCrewCabin {
                occupancy_id,
                crew_member_id,
                voyage_ship_id,
                cabin_id,
            } => {
                let catalog = env.catalog.clone();
                smallvec![async_effect! {
                    Some(match assign(catalog, occupancy_id, crew_member_id, voyage_ship_id, cabin_id).await {
                        Ok(occupancy) => OccupancyAction::CrewCabinAssigned { occupancy },
                        Err(error) => OccupancyAction::OccupancyRejected { occupancy_id, error },
                    })
                }]
            },

            OccupancyAction::ReleaseOccupancy { occupancy_id } => {
                let catalog = env.catalog.clone();
                smallvec![async_effect! {
                    Some(match release(catalog, occupancy_id).await {
                        Ok(()) => OccupancyAction::OccupancyReleased { occupancy_id },
                        Err(error) => OccupancyAction::OccupancyRejected { occupancy_id, error },
                    })
                }]
            },

            OccupancyAction::CrewCabinAssigned { occupancy } => {
                info!(occupancy = %occupancy.id, cabin = %occupancy.cabin_id, leg = %occupancy.voyage_ship_id, "Crew cabin assigned");
                SmallVec::new()
            },

            OccupancyAction::OccupancyReleased { occupancy_id } => {
                info!(occupancy = %occupancy_id, "Occupancy released");
                SmallVec::new()
            },

            OccupancyAction::OccupancyRejected { occupancy_id, error } => {
                info!(occupancy = %occupancy_id, %error, "Occupancy command rejected");
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::seed::demo_fleet;
    use crate::storage::Storage;
    use naviera_core::environment::Clock;
    use naviera_testing::{settle, test_clock};

    fn assign_cmd(crew_member_id: CrewMemberId, voyage_ship_id: VoyageShipId, cabin_id: CabinId) -> OccupancyAction {
        OccupancyAction::AssignCrewCabin {
            occupancy_id: OccupancyId::new(),
            crew_member_id,
            voyage_ship_id,
            cabin_id,
        }
    }

    #[tokio::test]
    async fn crew_cabin_is_claimed_and_released() {
        let catalog = Catalog::new(&Storage::memory());
        let fleet = demo_fleet(&catalog, test_clock().today()).await.unwrap();
        let env = OccupancyEnvironment::new(catalog.clone());
        let reducer = OccupancyReducer::new();

        let actions = settle(
            &reducer,
            &mut (),
            assign_cmd(fleet.purser, fleet.patagonia_leg, fleet.aurora_inside[0]),
            &env,
        )
        .await;
        let Some(OccupancyAction::CrewCabinAssigned { occupancy }) = actions.last() else {
            unreachable!("expected an assignment, got {actions:?}");
        };
        assert_eq!(occupancy.occupant, Occupant::Crew(fleet.purser));

        let taken = settle(
            &reducer,
            &mut (),
            assign_cmd(fleet.purser, fleet.patagonia_leg, fleet.aurora_inside[0]),
            &env,
        )
        .await;
        assert!(matches!(
            taken.last(),
            Some(OccupancyAction::OccupancyRejected { error: NavieraError::Conflict(_), .. })
        ));

        let released = settle(
            &reducer,
            &mut (),
            OccupancyAction::ReleaseOccupancy { occupancy_id: occupancy.id },
            &env,
        )
        .await;
        assert!(matches!(released.last(), Some(OccupancyAction::OccupancyReleased { .. })));
        assert!(catalog.bookings().occupied_cabins(fleet.patagonia_leg).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn crew_needs_an_assignment_and_a_cabin_on_the_ship() {
        let catalog = Catalog::new(&Storage::memory());
        let fleet = demo_fleet(&catalog, test_clock().today()).await.unwrap();
        let env = OccupancyEnvironment::new(catalog);
        let reducer = OccupancyReducer::new();

        let unassigned = settle(
            &reducer,
            &mut (),
            assign_cmd(fleet.purser, fleet.delta_leg, fleet.aurora_inside[0]),
            &env,
        )
        .await;
        assert!(matches!(
            unassigned.last(),
            Some(OccupancyAction::OccupancyRejected { error: NavieraError::Validation(_), .. })
        ));

        let maintenance = settle(
            &reducer,
            &mut (),
            assign_cmd(fleet.purser, fleet.patagonia_leg, fleet.aurora_inside[2]),
            &env,
        )
        .await;
        assert!(matches!(maintenance.last(), Some(OccupancyAction::OccupancyRejected { .. })));
    }
}
