//! Agent-based model: individual agents move between typed locations,
//! acquire and transmit infection through local contacts, and are subject to
//! testing and quarantine policies.

pub mod location;
pub mod migration_rules;
pub mod parameters;
pub mod person;
pub mod testing;
pub mod time;
pub mod trip_list;
pub mod world;

mod simulation;

pub use location::{Location, LocationId, LocationType};
pub use person::{Person, PersonId};
pub use simulation::AbmSimulation;
pub use world::World;

use serde::{Deserialize, Serialize};

/// Vaccination status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaccinationState {
    Unvaccinated,
    Vaccinated,
}

impl VaccinationState {
    pub const COUNT: usize = 2;

    pub const ALL: [VaccinationState; VaccinationState::COUNT] =
        [VaccinationState::Unvaccinated, VaccinationState::Vaccinated];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}
