//! Rules for migration between locations.
//!
//! Every rule maps an agent to the location type it should be at; returning
//! the agent's current type means the rule does not apply. The world
//! evaluates the rules in a fixed order of precedence and stops at the first
//! rule that moves the agent.

use crate::abm::location::LocationType;
use crate::abm::parameters::MigrationParameters;
use crate::abm::person::Person;
use crate::abm::time::{hours, TimePoint, TimeSpan};
use crate::secir::InfectionState;
use rand::rngs::StdRng;
use rand::Rng;

/// Signature shared by all migration rules.
pub type MigrationRule =
    fn(&Person, TimePoint, TimeSpan, &MigrationParameters, &mut StdRng) -> LocationType;

/// Recovered patients leave the hospital or ICU.
pub fn return_home_when_recovered(
    person: &Person,
    _t: TimePoint,
    _dt: TimeSpan,
    _params: &MigrationParameters,
    _rng: &mut StdRng,
) -> LocationType {
    let current = person.location_id().location_type;
    if person.infection_state() == InfectionState::Recovered
        && matches!(current, LocationType::Hospital | LocationType::Icu)
    {
        return LocationType::Home;
    }
    current
}

/// Severe cases are hospitalized.
pub fn go_to_hospital(
    person: &Person,
    _t: TimePoint,
    _dt: TimeSpan,
    _params: &MigrationParameters,
    _rng: &mut StdRng,
) -> LocationType {
    if person.infection_state() == InfectionState::InfectedSevere {
        return LocationType::Hospital;
    }
    person.location_id().location_type
}

/// Critical cases are moved to intensive care.
pub fn go_to_icu(
    person: &Person,
    _t: TimePoint,
    _dt: TimeSpan,
    _params: &MigrationParameters,
    _rng: &mut StdRng,
) -> LocationType {
    if person.infection_state() == InfectionState::InfectedCritical {
        return LocationType::Icu;
    }
    person.location_id().location_type
}

/// School-age children go to school on weekday mornings and return in the
/// afternoon.
pub fn go_to_school(
    person: &Person,
    t: TimePoint,
    _dt: TimeSpan,
    params: &MigrationParameters,
    rng: &mut StdRng,
) -> LocationType {
    let current = person.location_id().location_type;
    if !person.age().is_school_age() || person.is_in_quarantine() {
        return current;
    }
    let age = person.age().index();
    if current == LocationType::Home && !t.is_weekend() {
        let tod = t.time_since_midnight();
        if tod >= params.goto_school_time_minimum[age]
            && tod <= params.goto_school_time_maximum[age]
            && rng.gen_bool(params.school_ratio.value(t).clamp(0.0, 1.0))
        {
            return LocationType::School;
        }
    }
    if current == LocationType::School && t.hour_of_day() >= 15 {
        return LocationType::Home;
    }
    current
}

/// Working-age adults go to work on weekday mornings and return in the
/// evening.
pub fn go_to_work(
    person: &Person,
    t: TimePoint,
    _dt: TimeSpan,
    params: &MigrationParameters,
    rng: &mut StdRng,
) -> LocationType {
    let current = person.location_id().location_type;
    if !person.age().is_working_age() || person.is_in_quarantine() {
        return current;
    }
    let age = person.age().index();
    if current == LocationType::Home && !t.is_weekend() {
        let tod = t.time_since_midnight();
        if tod >= params.goto_work_time_minimum[age]
            && tod <= params.goto_work_time_maximum[age]
            && rng.gen_bool(params.work_ratio.value(t).clamp(0.0, 1.0))
        {
            return LocationType::Work;
        }
    }
    if current == LocationType::Work && t.hour_of_day() >= 17 {
        return LocationType::Home;
    }
    current
}

/// Agents may go shopping during opening hours and return after about an
/// hour.
pub fn go_to_shop(
    person: &Person,
    t: TimePoint,
    dt: TimeSpan,
    params: &MigrationParameters,
    rng: &mut StdRng,
) -> LocationType {
    let current = person.location_id().location_type;
    if person.is_in_quarantine()
        || matches!(
            person.infection_state(),
            InfectionState::InfectedSevere | InfectionState::InfectedCritical | InfectionState::Dead
        )
    {
        return current;
    }
    if current == LocationType::BasicsShop {
        if person.time_at_location() >= hours(1) {
            return LocationType::Home;
        }
        return current;
    }
    if current == LocationType::Home && (7..20).contains(&t.hour_of_day()) {
        let rate = params.basic_shopping_rate[person.age().index()];
        let p = 1.0 - (-rate * dt.as_days()).exp();
        if rng.gen_bool(p.clamp(0.0, 1.0)) {
            return LocationType::BasicsShop;
        }
    }
    current
}

/// Agents may attend social events in the evening and on weekends.
pub fn go_to_event(
    person: &Person,
    t: TimePoint,
    dt: TimeSpan,
    params: &MigrationParameters,
    rng: &mut StdRng,
) -> LocationType {
    let current = person.location_id().location_type;
    if person.is_in_quarantine()
        || matches!(
            person.infection_state(),
            InfectionState::InfectedSevere | InfectionState::InfectedCritical | InfectionState::Dead
        )
    {
        return current;
    }
    if current == LocationType::SocialEvent {
        if person.time_at_location() >= hours(2) {
            return LocationType::Home;
        }
        return current;
    }
    let evening = t.hour_of_day() >= 19;
    let weekend_afternoon = t.is_weekend() && t.hour_of_day() >= 10;
    if current == LocationType::Home && (evening || weekend_afternoon) {
        let rate = params.social_event_rate[person.age().index()];
        let p = 1.0 - (-rate * dt.as_days()).exp();
        if rng.gen_bool(p.clamp(0.0, 1.0)) {
            return LocationType::SocialEvent;
        }
    }
    current
}

/// Quarantined agents stay home unless they need care.
pub fn go_to_quarantine(
    person: &Person,
    _t: TimePoint,
    _dt: TimeSpan,
    _params: &MigrationParameters,
    _rng: &mut StdRng,
) -> LocationType {
    if person.is_in_quarantine()
        && !matches!(
            person.infection_state(),
            InfectionState::InfectedSevere | InfectionState::InfectedCritical
        )
    {
        return LocationType::Home;
    }
    person.location_id().location_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abm::location::LocationId;
    use crate::abm::person::PersonId;
    use crate::abm::time::days;
    use crate::abm::VaccinationState;
    use crate::age::AgeGroup;
    use crate::random::rng_for_stream;

    fn person_at(
        location_type: LocationType,
        state: InfectionState,
        age: AgeGroup,
    ) -> Person {
        Person::new(
            PersonId(0),
            LocationId {
                location_type,
                index: 0,
            },
            state,
            age,
            VaccinationState::Unvaccinated,
        )
    }

    #[test]
    fn severe_cases_are_hospitalized() {
        let person = person_at(LocationType::Home, InfectionState::InfectedSevere, AgeGroup(4));
        let mut rng = rng_for_stream(0, "migration");
        let target = go_to_hospital(
            &person,
            TimePoint::new(0),
            hours(1),
            &MigrationParameters::default(),
            &mut rng,
        );
        assert_eq!(target, LocationType::Hospital);
    }

    #[test]
    fn recovered_patients_leave_the_hospital() {
        let person = person_at(LocationType::Hospital, InfectionState::Recovered, AgeGroup(4));
        let mut rng = rng_for_stream(0, "migration");
        let target = return_home_when_recovered(
            &person,
            TimePoint::new(0),
            hours(1),
            &MigrationParameters::default(),
            &mut rng,
        );
        assert_eq!(target, LocationType::Home);
    }

    #[test]
    fn children_go_to_school_in_the_morning() {
        let person = person_at(LocationType::Home, InfectionState::Susceptible, AgeGroup(1));
        let mut rng = rng_for_stream(1, "migration");
        let morning = TimePoint::new(0) + hours(7);
        let target = go_to_school(
            &person,
            morning,
            hours(1),
            &MigrationParameters::default(),
            &mut rng,
        );
        assert_eq!(target, LocationType::School);
        // Adults do not.
        let adult = person_at(LocationType::Home, InfectionState::Susceptible, AgeGroup(3));
        assert_eq!(
            go_to_school(&adult, morning, hours(1), &MigrationParameters::default(), &mut rng),
            LocationType::Home
        );
        // Weekends are free.
        let weekend = TimePoint::new(0) + days(5) + hours(7);
        assert_eq!(
            go_to_school(&person, weekend, hours(1), &MigrationParameters::default(), &mut rng),
            LocationType::Home
        );
    }

    #[test]
    fn school_children_return_in_the_afternoon() {
        let person = person_at(LocationType::School, InfectionState::Susceptible, AgeGroup(1));
        let mut rng = rng_for_stream(1, "migration");
        let afternoon = TimePoint::new(0) + hours(15);
        assert_eq!(
            go_to_school(&person, afternoon, hours(1), &MigrationParameters::default(), &mut rng),
            LocationType::Home
        );
    }

    #[test]
    fn school_closure_keeps_children_home() {
        let person = person_at(LocationType::Home, InfectionState::Susceptible, AgeGroup(1));
        let mut params = MigrationParameters::default();
        params.school_ratio.set_from(TimePoint::new(0), 0.0);
        let mut rng = rng_for_stream(1, "migration");
        let morning = TimePoint::new(0) + hours(7);
        assert_eq!(
            go_to_school(&person, morning, hours(1), &params, &mut rng),
            LocationType::Home
        );
    }

    #[test]
    fn workers_commute_within_their_window() {
        let person = person_at(LocationType::Home, InfectionState::Susceptible, AgeGroup(2));
        let mut rng = rng_for_stream(2, "migration");
        let morning = TimePoint::new(0) + hours(8);
        assert_eq!(
            go_to_work(&person, morning, hours(1), &MigrationParameters::default(), &mut rng),
            LocationType::Work
        );
        let night = TimePoint::new(0) + hours(3);
        assert_eq!(
            go_to_work(&person, night, hours(1), &MigrationParameters::default(), &mut rng),
            LocationType::Home
        );
    }

    #[test]
    fn quarantined_agents_go_home() {
        let mut person = person_at(LocationType::Work, InfectionState::InfectedSymptoms, AgeGroup(3));
        person.set_quarantine(true);
        let mut rng = rng_for_stream(3, "migration");
        assert_eq!(
            go_to_quarantine(
                &person,
                TimePoint::new(0) + hours(12),
                hours(1),
                &MigrationParameters::default(),
                &mut rng
            ),
            LocationType::Home
        );
        // Quarantine does not override hospitalization.
        person.set_infection_state(InfectionState::InfectedSevere);
        assert_eq!(
            go_to_quarantine(
                &person,
                TimePoint::new(0) + hours(12),
                hours(1),
                &MigrationParameters::default(),
                &mut rng
            ),
            LocationType::Work
        );
    }

    #[test]
    fn quarantine_blocks_work_and_school() {
        let mut worker = person_at(LocationType::Home, InfectionState::InfectedSymptoms, AgeGroup(2));
        worker.set_quarantine(true);
        let mut rng = rng_for_stream(4, "migration");
        let morning = TimePoint::new(0) + hours(8);
        assert_eq!(
            go_to_work(&worker, morning, hours(1), &MigrationParameters::default(), &mut rng),
            LocationType::Home
        );
    }
}
