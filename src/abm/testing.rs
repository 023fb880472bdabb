//! Testing schemes that gate entry to locations.

use crate::abm::location::{Location, LocationType};
use crate::abm::parameters::TestParameters;
use crate::abm::person::Person;
use crate::abm::time::TimePoint;
use crate::secir::InfectionState;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One testing regime: while active, agents entering a location of one of
/// the covered types are tested with the given probability. A positive
/// result sends the agent into quarantine and denies entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestingScheme {
    location_types: Vec<LocationType>,
    start: TimePoint,
    end: TimePoint,
    /// Probability that an entering agent is actually tested.
    probability: f64,
    test: TestParameters,
    active: bool,
}

impl TestingScheme {
    #[must_use]
    pub fn new(
        location_types: Vec<LocationType>,
        start: TimePoint,
        end: TimePoint,
        probability: f64,
        test: TestParameters,
    ) -> TestingScheme {
        TestingScheme {
            location_types,
            start,
            end,
            probability: probability.clamp(0.0, 1.0),
            test,
            active: false,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Recomputes whether the scheme is inside its activation window.
    pub fn update_activity_status(&mut self, t: TimePoint) {
        self.active = self.start <= t && t < self.end;
    }

    fn covers(&self, location: &Location) -> bool {
        self.location_types.contains(&location.location_type())
    }

    /// Tests the agent if the scheme applies. Returns false when the agent
    /// tested positive and must not enter.
    fn run_scheme(&self, person: &mut Person, location: &Location, rng: &mut StdRng) -> bool {
        if !self.active || !self.covers(location) {
            return true;
        }
        if !rng.gen_bool(self.probability) {
            return true;
        }
        let infected = matches!(
            person.infection_state(),
            InfectionState::Exposed
                | InfectionState::InfectedNoSymptoms
                | InfectionState::InfectedSymptoms
                | InfectionState::InfectedSevere
                | InfectionState::InfectedCritical
        );
        let positive = if infected {
            rng.gen_bool(self.test.sensitivity.clamp(0.0, 1.0))
        } else {
            rng.gen_bool((1.0 - self.test.specificity).clamp(0.0, 1.0))
        };
        if positive {
            person.set_quarantine(true);
            return false;
        }
        true
    }
}

/// The ordered list of testing schemes applied when agents move.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestingStrategy {
    schemes: Vec<TestingScheme>,
}

impl TestingStrategy {
    #[must_use]
    pub fn new(schemes: Vec<TestingScheme>) -> TestingStrategy {
        TestingStrategy { schemes }
    }

    pub fn add_scheme(&mut self, scheme: TestingScheme) {
        self.schemes.push(scheme);
    }

    pub fn update_activity_status(&mut self, t: TimePoint) {
        for scheme in &mut self.schemes {
            scheme.update_activity_status(t);
        }
    }

    /// Runs every applicable scheme in order; entry is denied as soon as one
    /// scheme returns a positive test.
    pub fn run_strategy(
        &self,
        person: &mut Person,
        location: &Location,
        rng: &mut StdRng,
    ) -> bool {
        self.schemes
            .iter()
            .all(|scheme| scheme.run_scheme(person, location, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abm::location::LocationId;
    use crate::abm::time::{days, TimePoint};
    use crate::abm::VaccinationState;
    use crate::age::AgeGroup;
    use crate::random::rng_for_stream;

    fn person(state: InfectionState) -> Person {
        Person::new(
            crate::abm::person::PersonId(0),
            LocationId {
                location_type: LocationType::Home,
                index: 0,
            },
            state,
            AgeGroup(2),
            VaccinationState::Unvaccinated,
        )
    }

    fn perfect_test() -> TestParameters {
        TestParameters {
            sensitivity: 1.0,
            specificity: 1.0,
        }
    }

    #[test]
    fn inactive_scheme_admits_everyone() {
        let mut scheme = TestingScheme::new(
            vec![LocationType::Work],
            TimePoint::new(0),
            TimePoint::new(0) + days(10),
            1.0,
            perfect_test(),
        );
        scheme.update_activity_status(TimePoint::new(0) + days(20));
        assert!(!scheme.is_active());
        let strategy = TestingStrategy::new(vec![scheme]);
        let location = Location::new(LocationType::Work, 0, 1);
        let mut p = person(InfectionState::InfectedSymptoms);
        let mut rng = rng_for_stream(0, "testing");
        assert!(strategy.run_strategy(&mut p, &location, &mut rng));
        assert!(!p.is_in_quarantine());
    }

    #[test]
    fn positive_test_quarantines_and_denies_entry() {
        let mut strategy = TestingStrategy::new(vec![TestingScheme::new(
            vec![LocationType::Work],
            TimePoint::new(0),
            TimePoint::new(0) + days(10),
            1.0,
            perfect_test(),
        )]);
        strategy.update_activity_status(TimePoint::new(0) + days(1));
        let location = Location::new(LocationType::Work, 0, 1);
        let mut p = person(InfectionState::InfectedSymptoms);
        let mut rng = rng_for_stream(1, "testing");
        assert!(!strategy.run_strategy(&mut p, &location, &mut rng));
        assert!(p.is_in_quarantine());
    }

    #[test]
    fn healthy_agents_pass_a_specific_test() {
        let mut strategy = TestingStrategy::new(vec![TestingScheme::new(
            vec![LocationType::Work],
            TimePoint::new(0),
            TimePoint::new(0) + days(10),
            1.0,
            perfect_test(),
        )]);
        strategy.update_activity_status(TimePoint::new(0) + days(1));
        let location = Location::new(LocationType::Work, 0, 1);
        let mut p = person(InfectionState::Susceptible);
        let mut rng = rng_for_stream(2, "testing");
        assert!(strategy.run_strategy(&mut p, &location, &mut rng));
        assert!(!p.is_in_quarantine());
    }

    #[test]
    fn schemes_only_cover_their_location_types() {
        let mut strategy = TestingStrategy::new(vec![TestingScheme::new(
            vec![LocationType::Work],
            TimePoint::new(0),
            TimePoint::new(0) + days(10),
            1.0,
            perfect_test(),
        )]);
        strategy.update_activity_status(TimePoint::new(0));
        let school = Location::new(LocationType::School, 0, 1);
        let mut p = person(InfectionState::InfectedSymptoms);
        let mut rng = rng_for_stream(3, "testing");
        assert!(strategy.run_strategy(&mut p, &school, &mut rng));
    }
}
