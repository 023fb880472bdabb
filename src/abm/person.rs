//! Individual agents of the agent-based model.

use crate::abm::location::{LocationId, LocationType, INVALID_LOCATION_INDEX};
use crate::abm::time::TimeSpan;
use crate::abm::VaccinationState;
use crate::age::AgeGroup;
use crate::secir::InfectionState;
use serde::{Deserialize, Serialize};

/// Stable identifier of an agent: its index in the world's person vector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PersonId(pub usize);

/// One agent. Locations are referenced by id, never by pointer; the world
/// resolves them through its per-type location vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    id: PersonId,
    location: LocationId,
    /// Assigned location index per location type (home, work, school, ...).
    assigned_locations: [u32; LocationType::COUNT],
    infection_state: InfectionState,
    age: AgeGroup,
    vaccination_state: VaccinationState,
    quarantined: bool,
    /// Time spent at the current location.
    time_at_location: TimeSpan,
}

impl Person {
    #[must_use]
    pub fn new(
        id: PersonId,
        location: LocationId,
        infection_state: InfectionState,
        age: AgeGroup,
        vaccination_state: VaccinationState,
    ) -> Person {
        Person {
            id,
            location,
            assigned_locations: [INVALID_LOCATION_INDEX; LocationType::COUNT],
            infection_state,
            age,
            vaccination_state,
            quarantined: false,
            time_at_location: TimeSpan::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PersonId {
        self.id
    }

    #[must_use]
    pub fn location_id(&self) -> LocationId {
        self.location
    }

    #[must_use]
    pub fn infection_state(&self) -> InfectionState {
        self.infection_state
    }

    pub(crate) fn set_infection_state(&mut self, state: InfectionState) {
        self.infection_state = state;
    }

    #[must_use]
    pub fn age(&self) -> AgeGroup {
        self.age
    }

    #[must_use]
    pub fn vaccination_state(&self) -> VaccinationState {
        self.vaccination_state
    }

    pub fn set_vaccination_state(&mut self, state: VaccinationState) {
        self.vaccination_state = state;
    }

    #[must_use]
    pub fn is_in_quarantine(&self) -> bool {
        self.quarantined
    }

    pub fn set_quarantine(&mut self, quarantined: bool) {
        self.quarantined = quarantined;
    }

    #[must_use]
    pub fn time_at_location(&self) -> TimeSpan {
        self.time_at_location
    }

    pub(crate) fn add_time_at_location(&mut self, dt: TimeSpan) {
        self.time_at_location += dt;
    }

    /// Moves the agent to a new location and resets the dwell time.
    pub(crate) fn migrate_to(&mut self, target: LocationId) {
        if self.location != target {
            self.location = target;
            self.time_at_location = TimeSpan::default();
        }
    }

    /// Assigns a location the agent uses for the given type.
    pub fn set_assigned_location(&mut self, id: LocationId) {
        self.assigned_locations[id.location_type.index()] = id.index;
    }

    /// The agent's assigned location of the given type, if any.
    #[must_use]
    pub fn assigned_location(&self, location_type: LocationType) -> Option<LocationId> {
        let index = self.assigned_locations[location_type.index()];
        (index != INVALID_LOCATION_INDEX).then_some(LocationId {
            location_type,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> LocationId {
        LocationId {
            location_type: LocationType::Home,
            index: 0,
        }
    }

    #[test]
    fn assigned_locations_default_to_none() {
        let person = Person::new(
            PersonId(0),
            home(),
            InfectionState::Susceptible,
            AgeGroup(2),
            VaccinationState::Unvaccinated,
        );
        for location_type in LocationType::ALL {
            assert!(person.assigned_location(location_type).is_none());
        }
    }

    #[test]
    fn migration_resets_dwell_time() {
        let mut person = Person::new(
            PersonId(0),
            home(),
            InfectionState::Susceptible,
            AgeGroup(2),
            VaccinationState::Unvaccinated,
        );
        person.add_time_at_location(crate::abm::time::hours(5));
        let work = LocationId {
            location_type: LocationType::Work,
            index: 3,
        };
        person.migrate_to(work);
        assert_eq!(person.location_id(), work);
        assert_eq!(person.time_at_location(), TimeSpan::default());
        // Moving to the same place keeps the clock running.
        person.add_time_at_location(crate::abm::time::hours(2));
        person.migrate_to(work);
        assert_eq!(person.time_at_location(), crate::abm::time::hours(2));
    }
}
