//! The agent-based world: all locations, all agents, and the step logic.

use crate::abm::location::{Location, LocationId, LocationType};
use crate::abm::migration_rules::{
    go_to_event, go_to_hospital, go_to_icu, go_to_quarantine, go_to_school, go_to_shop,
    go_to_work, return_home_when_recovered, MigrationRule,
};
use crate::abm::parameters::{GlobalInfectionParameters, MigrationParameters};
use crate::abm::person::{Person, PersonId};
use crate::abm::testing::TestingStrategy;
use crate::abm::time::{TimePoint, TimeSpan};
use crate::abm::trip_list::TripList;
use crate::abm::VaccinationState;
use crate::age::AgeGroup;
use crate::error::EpiError;
use crate::secir::InfectionState;
use rand::rngs::StdRng;
use rand::Rng;

/// Holds all agents and locations and evolves them over discrete time
/// steps: interaction first, then testing updates, then migration (rules
/// before trips).
pub struct World {
    /// Locations per type, densely indexed within each type.
    locations: Vec<Vec<Location>>,
    persons: Vec<Person>,
    pub infection_parameters: GlobalInfectionParameters,
    pub migration_parameters: MigrationParameters,
    pub testing_strategy: TestingStrategy,
    trip_list: TripList,
    use_migration_rules: bool,
    migration_rules: Vec<(MigrationRule, Vec<LocationType>)>,
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}

impl World {
    #[must_use]
    pub fn new() -> World {
        let mut world = World {
            locations: (0..LocationType::COUNT).map(|_| Vec::new()).collect(),
            persons: Vec::new(),
            infection_parameters: GlobalInfectionParameters::default(),
            migration_parameters: MigrationParameters::default(),
            testing_strategy: TestingStrategy::default(),
            trip_list: TripList::new(),
            use_migration_rules: true,
            migration_rules: Vec::new(),
        };
        world.use_migration_rules(true);
        world
    }

    /// Enables the full rule set or restricts it to the medically necessary
    /// rules (hospitalization, intensive care, quarantine, discharge).
    pub fn use_migration_rules(&mut self, enabled: bool) {
        use LocationType::*;
        self.use_migration_rules = enabled;
        // If there is an ICU there is also a hospital, so the discharge rule
        // only requires those two besides home.
        self.migration_rules = if enabled {
            vec![
                (
                    return_home_when_recovered as MigrationRule,
                    vec![Home, Hospital],
                ),
                (go_to_hospital as MigrationRule, vec![Home, Hospital]),
                (go_to_icu as MigrationRule, vec![Hospital, Icu]),
                (go_to_school as MigrationRule, vec![School, Home]),
                (go_to_work as MigrationRule, vec![Home, Work]),
                (go_to_shop as MigrationRule, vec![Home, BasicsShop]),
                (go_to_event as MigrationRule, vec![Home, SocialEvent]),
                (go_to_quarantine as MigrationRule, vec![Home]),
            ]
        } else {
            vec![
                (
                    return_home_when_recovered as MigrationRule,
                    vec![Home, Hospital],
                ),
                (go_to_hospital as MigrationRule, vec![Home, Hospital]),
                (go_to_icu as MigrationRule, vec![Hospital, Icu]),
                (go_to_quarantine as MigrationRule, vec![Home]),
            ]
        };
    }

    #[must_use]
    pub fn uses_migration_rules(&self) -> bool {
        self.use_migration_rules
    }

    /// Creates a location and returns its id.
    pub fn add_location(&mut self, location_type: LocationType, num_cells: usize) -> LocationId {
        let index = self.locations[location_type.index()].len() as u32;
        self.locations[location_type.index()].push(Location::new(
            location_type,
            index,
            num_cells,
        ));
        LocationId {
            location_type,
            index,
        }
    }

    /// Creates an agent at the given location. The location becomes the
    /// agent's assigned location of its type.
    pub fn add_person(
        &mut self,
        location: LocationId,
        infection_state: InfectionState,
        age: AgeGroup,
    ) -> Result<PersonId, EpiError> {
        let Some(loc) = self
            .locations
            .get(location.location_type.index())
            .and_then(|l| l.get(location.index as usize))
        else {
            return Err(EpiError::InvalidValue(format!(
                "location {location:?} does not exist"
            )));
        };
        debug_assert_eq!(loc.id(), location);

        let id = PersonId(self.persons.len());
        let mut person = Person::new(
            id,
            location,
            infection_state,
            age,
            VaccinationState::Unvaccinated,
        );
        person.set_assigned_location(location);
        self.locations[location.location_type.index()][location.index as usize]
            .add_person(infection_state);
        self.persons.push(person);
        Ok(id)
    }

    #[must_use]
    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn person_mut(&mut self, id: PersonId) -> &mut Person {
        &mut self.persons[id.0]
    }

    #[must_use]
    pub fn location(&self, id: LocationId) -> &Location {
        &self.locations[id.location_type.index()][id.index as usize]
    }

    pub fn location_mut(&mut self, id: LocationId) -> &mut Location {
        &mut self.locations[id.location_type.index()][id.index as usize]
    }

    #[must_use]
    pub fn num_locations(&self, location_type: LocationType) -> usize {
        self.locations[location_type.index()].len()
    }

    pub fn trip_list_mut(&mut self) -> &mut TripList {
        &mut self.trip_list
    }

    /// Sum of a subpopulation over all locations of one type.
    #[must_use]
    pub fn subpopulation_combined(&self, state: InfectionState, location_type: LocationType) -> usize {
        self.locations[location_type.index()]
            .iter()
            .map(|location| location.subpopulation(state))
            .sum()
    }

    /// Number of agents per infection state over the whole world.
    #[must_use]
    pub fn count_by_state(&self) -> [usize; InfectionState::COUNT] {
        let mut counts = [0; InfectionState::COUNT];
        for person in &self.persons {
            counts[person.infection_state().index()] += 1;
        }
        counts
    }

    /// Changes an agent's infection state and keeps the location counts in
    /// sync.
    pub fn set_infection_state(&mut self, id: PersonId, state: InfectionState) {
        let old = self.persons[id.0].infection_state();
        if old == state {
            return;
        }
        let location = self.persons[id.0].location_id();
        self.persons[id.0].set_infection_state(state);
        self.locations[location.location_type.index()][location.index as usize]
            .changed_state(old, state);
    }

    /// One step of the world: refresh location aggregates, sample
    /// interactions, update testing activity, migrate.
    pub fn evolve(&mut self, t: TimePoint, dt: TimeSpan, rng: &mut StdRng) {
        self.begin_step(dt);
        self.interaction(t, dt, rng);
        self.testing_strategy.update_activity_status(t);
        self.migration(t, dt, rng);
    }

    fn begin_step(&mut self, dt: TimeSpan) {
        for locations in &mut self.locations {
            for location in locations {
                location.begin_step(dt, &self.infection_parameters);
            }
        }
    }

    /// Samples the infection state transitions of every agent in id order
    /// against the aggregates cached by `begin_step`.
    fn interaction(&mut self, _t: TimePoint, dt: TimeSpan, rng: &mut StdRng) {
        for i in 0..self.persons.len() {
            let person = &self.persons[i];
            let old = person.infection_state();
            if old == InfectionState::Dead {
                continue;
            }
            let location_id = person.location_id();
            let location =
                &self.locations[location_id.location_type.index()][location_id.index as usize];
            let next = location.interact(
                old,
                person.age(),
                person.vaccination_state(),
                dt,
                &self.infection_parameters,
                rng,
            );
            self.persons[i].add_time_at_location(dt);
            if next == old {
                continue;
            }
            self.persons[i].set_infection_state(next);
            self.locations[location_id.location_type.index()][location_id.index as usize]
                .changed_state(old, next);

            // Symptom onset may be detected and lead to quarantine; recovery
            // ends it.
            if old == InfectionState::InfectedNoSymptoms && next == InfectionState::InfectedSymptoms
            {
                let detect = GlobalInfectionParameters::rate(
                    &self.infection_parameters.detect_infection,
                    self.persons[i].age(),
                    self.persons[i].vaccination_state(),
                );
                if rng.gen_bool(detect.clamp(0.0, 1.0)) {
                    self.persons[i].set_quarantine(true);
                }
            }
            if next == InfectionState::Recovered {
                self.persons[i].set_quarantine(false);
            }
        }
    }

    fn migration(&mut self, t: TimePoint, dt: TimeSpan, rng: &mut StdRng) {
        // Rule based: the first applicable rule that moves the agent wins.
        for i in 0..self.persons.len() {
            if self.persons[i].infection_state() == InfectionState::Dead {
                continue;
            }
            for rule_idx in 0..self.migration_rules.len() {
                let required_nonempty = self.migration_rules[rule_idx]
                    .1
                    .iter()
                    .all(|location_type| !self.locations[location_type.index()].is_empty());
                if !required_nonempty {
                    continue;
                }
                let rule = self.migration_rules[rule_idx].0;
                let target_type =
                    rule(&self.persons[i], t, dt, &self.migration_parameters, rng);
                let Some(target) = self.persons[i].assigned_location(target_type) else {
                    // No assigned location of that type, the rule does not
                    // fire.
                    continue;
                };
                if target == self.persons[i].location_id() {
                    continue;
                }
                let admitted = {
                    let location =
                        &self.locations[target.location_type.index()][target.index as usize];
                    self.testing_strategy
                        .run_strategy(&mut self.persons[i], location, rng)
                };
                if admitted {
                    self.move_person(i, target);
                    break;
                }
            }
        }

        // Trip list: the cursor advances over every due trip exactly once.
        while let Some(trip) = self.trip_list.next_trip().copied() {
            if trip.time >= t + dt {
                break;
            }
            let person_idx = trip.person_id.0;
            if person_idx < self.persons.len()
                && !self.persons[person_idx].is_in_quarantine()
                && self.persons[person_idx].location_id() == trip.origin
            {
                let admitted = {
                    let location = &self.locations[trip.destination.location_type.index()]
                        [trip.destination.index as usize];
                    self.testing_strategy
                        .run_strategy(&mut self.persons[person_idx], location, rng)
                };
                if admitted {
                    self.move_person(person_idx, trip.destination);
                }
            }
            self.trip_list.increase_index();
        }
    }

    fn move_person(&mut self, person_idx: usize, target: LocationId) {
        let old = self.persons[person_idx].location_id();
        if old == target {
            return;
        }
        let state = self.persons[person_idx].infection_state();
        self.locations[old.location_type.index()][old.index as usize].remove_person(state);
        self.locations[target.location_type.index()][target.index as usize].add_person(state);
        self.persons[person_idx].migrate_to(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abm::time::{hours, TimePoint};
    use crate::abm::trip_list::Trip;
    use crate::random::rng_for_stream;

    fn world_with_home_and_work() -> (World, LocationId, LocationId) {
        let mut world = World::new();
        let home = world.add_location(LocationType::Home, 1);
        let work = world.add_location(LocationType::Work, 1);
        world.add_location(LocationType::Hospital, 1);
        world.add_location(LocationType::Icu, 1);
        (world, home, work)
    }

    #[test]
    fn add_person_registers_at_location() {
        let (mut world, home, _) = world_with_home_and_work();
        let id = world
            .add_person(home, InfectionState::Susceptible, AgeGroup(2))
            .unwrap();
        assert_eq!(world.persons().len(), 1);
        assert_eq!(world.location(home).num_people(), 1);
        assert_eq!(world.persons()[id.0].location_id(), home);
    }

    #[test]
    fn add_person_to_missing_location_fails() {
        let mut world = World::new();
        let missing = LocationId {
            location_type: LocationType::School,
            index: 0,
        };
        assert!(world
            .add_person(missing, InfectionState::Susceptible, AgeGroup(1))
            .is_err());
    }

    #[test]
    fn quarantined_agent_is_home_after_one_step() {
        let (mut world, home, work) = world_with_home_and_work();
        let id = world
            .add_person(home, InfectionState::InfectedSymptoms, AgeGroup(3))
            .unwrap();
        world.person_mut(id).set_assigned_location(work);
        // Place the agent at work, then quarantine them.
        world.move_person(id.0, work);
        world.person_mut(id).set_quarantine(true);
        // Freeze disease progression so only migration acts.
        world.infection_parameters.infected_to_recovered =
            crate::populations::IndexArray::new(vec![6, 2], 0.0);
        world.infection_parameters.infected_to_severe =
            crate::populations::IndexArray::new(vec![6, 2], 0.0);

        let mut rng = rng_for_stream(0, "abm");
        world.evolve(TimePoint::new(0) + hours(12), hours(1), &mut rng);

        assert_eq!(world.persons()[id.0].location_id(), home);
        assert!(world.persons()[id.0].is_in_quarantine());
        assert_eq!(world.location(home).num_people(), 1);
        assert_eq!(world.location(work).num_people(), 0);
    }

    #[test]
    fn severe_cases_are_hospitalized_before_other_rules() {
        let (mut world, home, work) = world_with_home_and_work();
        let id = world
            .add_person(home, InfectionState::InfectedSevere, AgeGroup(3))
            .unwrap();
        let hospital = LocationId {
            location_type: LocationType::Hospital,
            index: 0,
        };
        world.person_mut(id).set_assigned_location(hospital);
        world.person_mut(id).set_assigned_location(work);
        // Freeze progression.
        world.infection_parameters.severe_to_recovered =
            crate::populations::IndexArray::new(vec![6, 2], 0.0);
        world.infection_parameters.severe_to_critical =
            crate::populations::IndexArray::new(vec![6, 2], 0.0);

        let mut rng = rng_for_stream(1, "abm");
        world.evolve(TimePoint::new(0) + hours(8), hours(1), &mut rng);
        assert_eq!(
            world.persons()[id.0].location_id().location_type,
            LocationType::Hospital
        );
    }

    #[test]
    fn trips_move_agents_when_due() {
        let (mut world, home, work) = world_with_home_and_work();
        let id = world
            .add_person(home, InfectionState::Susceptible, AgeGroup(2))
            .unwrap();
        world.person_mut(id).set_assigned_location(work);
        world.use_migration_rules(false);
        world.trip_list_mut().add_trip(Trip {
            person_id: id,
            origin: home,
            destination: work,
            time: TimePoint::new(0) + hours(2),
        });

        let mut rng = rng_for_stream(2, "abm");
        // Not due yet at the first step.
        world.evolve(TimePoint::new(0) + hours(1), hours(1), &mut rng);
        assert_eq!(world.persons()[id.0].location_id(), home);
        // Due within the second step.
        world.evolve(TimePoint::new(0) + hours(2), hours(1), &mut rng);
        assert_eq!(world.persons()[id.0].location_id(), work);
        // The cursor moved past the trip.
        world.evolve(TimePoint::new(0) + hours(3), hours(1), &mut rng);
        assert_eq!(world.trip_list_mut().current_index(), 1);
    }

    #[test]
    fn quarantined_agents_skip_their_trips() {
        let (mut world, home, work) = world_with_home_and_work();
        let id = world
            .add_person(home, InfectionState::Susceptible, AgeGroup(2))
            .unwrap();
        world.person_mut(id).set_assigned_location(work);
        world.person_mut(id).set_quarantine(true);
        world.use_migration_rules(false);
        world.trip_list_mut().add_trip(Trip {
            person_id: id,
            origin: home,
            destination: work,
            time: TimePoint::new(0),
        });
        let mut rng = rng_for_stream(3, "abm");
        world.evolve(TimePoint::new(0) + hours(1), hours(1), &mut rng);
        assert_eq!(world.persons()[id.0].location_id(), home);
        // The trip was consumed regardless.
        assert_eq!(world.trip_list_mut().current_index(), 1);
    }

    #[test]
    fn rule_without_assigned_location_recovers_silently() {
        let mut world = World::new();
        let home = world.add_location(LocationType::Home, 1);
        world.add_location(LocationType::Work, 1);
        world.add_location(LocationType::Hospital, 1);
        world.add_location(LocationType::Icu, 1);
        // Working-age agent without an assigned workplace stays home.
        let id = world
            .add_person(home, InfectionState::Susceptible, AgeGroup(2))
            .unwrap();
        let mut rng = rng_for_stream(4, "abm");
        world.evolve(TimePoint::new(0) + hours(8), hours(1), &mut rng);
        assert_eq!(world.persons()[id.0].location_id(), home);
    }
}
