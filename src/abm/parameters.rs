//! Parameters of the agent-based model.
//!
//! Infection transition rates are global and indexed by age group and
//! vaccination state; locations only carry their contact cap. Migration
//! parameters gate the rule-based movement of agents.

use crate::abm::time::{hours, TimePoint, TimeSpan};
use crate::abm::VaccinationState;
use crate::age::{AgeGroup, NUM_AGE_GROUPS};
use crate::populations::IndexArray;
use serde::{Deserialize, Serialize};

/// A rate per day, indexed by `(AgeGroup, VaccinationState)`.
pub type AgeVaccinationRates = IndexArray<f64>;

fn rates(value: f64) -> AgeVaccinationRates {
    IndexArray::new(vec![NUM_AGE_GROUPS, VaccinationState::COUNT], value)
}

fn rate_of(array: &AgeVaccinationRates, age: AgeGroup, vaccination: VaccinationState) -> f64 {
    *array
        .get(&[age.index(), vaccination.index()])
        .expect("rate array has fixed shape")
}

/// Infection parameters that are the same everywhere in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalInfectionParameters {
    pub incubation_period: AgeVaccinationRates,
    pub susceptible_to_exposed_by_carrier: AgeVaccinationRates,
    pub susceptible_to_exposed_by_infected: AgeVaccinationRates,
    pub carrier_to_infected: AgeVaccinationRates,
    pub carrier_to_recovered: AgeVaccinationRates,
    pub infected_to_recovered: AgeVaccinationRates,
    pub infected_to_severe: AgeVaccinationRates,
    pub severe_to_critical: AgeVaccinationRates,
    pub severe_to_recovered: AgeVaccinationRates,
    pub critical_to_recovered: AgeVaccinationRates,
    pub critical_to_dead: AgeVaccinationRates,
    pub recovered_to_susceptible: AgeVaccinationRates,
    /// Probability that a symptomatic infection is detected and the agent is
    /// quarantined.
    pub detect_infection: AgeVaccinationRates,
}

impl Default for GlobalInfectionParameters {
    fn default() -> Self {
        GlobalInfectionParameters {
            incubation_period: rates(1.0),
            susceptible_to_exposed_by_carrier: rates(1.0),
            susceptible_to_exposed_by_infected: rates(1.0),
            carrier_to_infected: rates(1.0),
            carrier_to_recovered: rates(1.0),
            infected_to_recovered: rates(1.0),
            infected_to_severe: rates(1.0),
            severe_to_critical: rates(1.0),
            severe_to_recovered: rates(1.0),
            critical_to_recovered: rates(1.0),
            critical_to_dead: rates(1.0),
            recovered_to_susceptible: rates(0.0),
            detect_infection: rates(0.5),
        }
    }
}

impl GlobalInfectionParameters {
    #[must_use]
    pub fn rate(
        array: &AgeVaccinationRates,
        age: AgeGroup,
        vaccination: VaccinationState,
    ) -> f64 {
        rate_of(array, age, vaccination)
    }

    pub fn set_rate(
        array: &mut AgeVaccinationRates,
        age: AgeGroup,
        vaccination: VaccinationState,
        value: f64,
    ) {
        array
            .set(&[age.index(), vaccination.index()], value)
            .expect("rate array has fixed shape");
    }
}

/// Infection parameters of one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalInfectionParameters {
    /// Cap on the number of contacts an agent meets per step at this
    /// location.
    pub maximum_contacts: f64,
}

impl Default for LocalInfectionParameters {
    fn default() -> Self {
        LocalInfectionParameters {
            maximum_contacts: f64::MAX,
        }
    }
}

/// A step function over time used for the lockdown ratios (fraction of
/// agents still going to work/school/events).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RatioSchedule {
    /// `(from, ratio)` entries sorted by time; before the first entry the
    /// ratio is 1.
    entries: Vec<(TimePoint, f64)>,
}

impl RatioSchedule {
    pub fn set_from(&mut self, from: TimePoint, ratio: f64) {
        self.entries.push((from, ratio.clamp(0.0, 1.0)));
        self.entries.sort_by_key(|(t, _)| *t);
    }

    #[must_use]
    pub fn value(&self, t: TimePoint) -> f64 {
        self.entries
            .iter()
            .rev()
            .find(|(from, _)| *from <= t)
            .map_or(1.0, |(_, ratio)| *ratio)
    }
}

/// Parameters that govern rule-based migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationParameters {
    pub lockdown_date: TimePoint,
    /// Rate of spontaneous social events per day, per age group.
    pub social_event_rate: Vec<f64>,
    /// Rate of shopping trips per day, per age group.
    pub basic_shopping_rate: Vec<f64>,
    pub work_ratio: RatioSchedule,
    pub school_ratio: RatioSchedule,
    pub goto_work_time_minimum: Vec<TimeSpan>,
    pub goto_work_time_maximum: Vec<TimeSpan>,
    pub goto_school_time_minimum: Vec<TimeSpan>,
    pub goto_school_time_maximum: Vec<TimeSpan>,
}

impl Default for MigrationParameters {
    fn default() -> Self {
        MigrationParameters {
            lockdown_date: TimePoint::max_value(),
            social_event_rate: vec![1.0; NUM_AGE_GROUPS],
            basic_shopping_rate: vec![1.0; NUM_AGE_GROUPS],
            work_ratio: RatioSchedule::default(),
            school_ratio: RatioSchedule::default(),
            goto_work_time_minimum: vec![hours(6); NUM_AGE_GROUPS],
            goto_work_time_maximum: vec![hours(9); NUM_AGE_GROUPS],
            goto_school_time_minimum: vec![hours(6); NUM_AGE_GROUPS],
            goto_school_time_maximum: vec![hours(9); NUM_AGE_GROUPS],
        }
    }
}

impl MigrationParameters {
    /// Puts the world into lockdown from `t` on: only the given fractions
    /// keep going to work and school, and social events stop.
    pub fn set_lockdown(&mut self, t: TimePoint, work_ratio: f64, school_ratio: f64) {
        self.lockdown_date = t;
        self.work_ratio.set_from(t, work_ratio);
        self.school_ratio.set_from(t, school_ratio);
        for rate in &mut self.social_event_rate {
            *rate = 0.0;
        }
    }

    /// Whether the lockdown has started at `t`.
    #[must_use]
    pub fn is_lockdown(&self, t: TimePoint) -> bool {
        self.lockdown_date <= t
    }
}

/// Sensitivity and specificity of one test product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestParameters {
    pub sensitivity: f64,
    pub specificity: f64,
}

impl TestParameters {
    /// Rapid antigen test.
    #[must_use]
    pub fn antigen() -> TestParameters {
        TestParameters {
            sensitivity: 0.8,
            specificity: 0.88,
        }
    }

    /// Laboratory PCR test.
    #[must_use]
    pub fn pcr() -> TestParameters {
        TestParameters {
            sensitivity: 0.9,
            specificity: 0.99,
        }
    }
}
