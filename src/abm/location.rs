//! Typed locations where agents meet and infect each other.

use crate::abm::parameters::{GlobalInfectionParameters, LocalInfectionParameters};
use crate::abm::time::TimeSpan;
use crate::abm::VaccinationState;
use crate::age::{AgeGroup, NUM_AGE_GROUPS};
use crate::secir::InfectionState;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The kinds of places agents can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationType {
    Home,
    School,
    Work,
    SocialEvent,
    BasicsShop,
    Hospital,
    Icu,
}

impl LocationType {
    pub const COUNT: usize = 7;

    pub const ALL: [LocationType; LocationType::COUNT] = [
        LocationType::Home,
        LocationType::School,
        LocationType::Work,
        LocationType::SocialEvent,
        LocationType::BasicsShop,
        LocationType::Hospital,
        LocationType::Icu,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Identifies one location: its type and its dense index within the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId {
    pub location_type: LocationType,
    pub index: u32,
}

pub const INVALID_LOCATION_INDEX: u32 = u32::MAX;

/// One cell of a location. Large locations are subdivided into cells that
/// mix independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    pub num_people: usize,
    pub num_carriers: usize,
    pub num_infected: usize,
    /// Exposure rate by `(age, vaccination)` of a susceptible agent in this
    /// cell, refreshed by `begin_step`.
    #[serde(skip)]
    cached_exposure_rate: Vec<f64>,
}

impl Cell {
    fn rate_index(age: AgeGroup, vaccination: VaccinationState) -> usize {
        age.index() * VaccinationState::COUNT + vaccination.index()
    }
}

/// A place agents visit: holds the occupants and the cached infection
/// pressure used by the interaction phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    location_type: LocationType,
    index: u32,
    cells: Vec<Cell>,
    pub parameters: LocalInfectionParameters,
    /// Number of occupants per infection state.
    subpopulations: [usize; InfectionState::COUNT],
}

impl Location {
    #[must_use]
    pub fn new(location_type: LocationType, index: u32, num_cells: usize) -> Location {
        Location {
            location_type,
            index,
            cells: vec![Cell::default(); num_cells.max(1)],
            parameters: LocalInfectionParameters::default(),
            subpopulations: [0; InfectionState::COUNT],
        }
    }

    #[must_use]
    pub fn location_type(&self) -> LocationType {
        self.location_type
    }

    #[must_use]
    pub fn id(&self) -> LocationId {
        LocationId {
            location_type: self.location_type,
            index: self.index,
        }
    }

    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Occupants in the given infection state.
    #[must_use]
    pub fn subpopulation(&self, state: InfectionState) -> usize {
        self.subpopulations[state.index()]
    }

    /// All occupants.
    #[must_use]
    pub fn num_people(&self) -> usize {
        self.subpopulations.iter().sum()
    }

    /// Registers an arriving agent.
    pub fn add_person(&mut self, state: InfectionState) {
        self.subpopulations[state.index()] += 1;
        self.cells[0].num_people += 1;
        match state {
            InfectionState::InfectedNoSymptoms => self.cells[0].num_carriers += 1,
            InfectionState::InfectedSymptoms => self.cells[0].num_infected += 1,
            _ => {}
        }
    }

    /// Unregisters a leaving agent.
    pub fn remove_person(&mut self, state: InfectionState) {
        self.subpopulations[state.index()] -= 1;
        self.cells[0].num_people -= 1;
        match state {
            InfectionState::InfectedNoSymptoms => self.cells[0].num_carriers -= 1,
            InfectionState::InfectedSymptoms => self.cells[0].num_infected -= 1,
            _ => {}
        }
    }

    /// Records an occupant's infection state change.
    pub fn changed_state(&mut self, old: InfectionState, new: InfectionState) {
        self.subpopulations[old.index()] -= 1;
        self.subpopulations[new.index()] += 1;
        match old {
            InfectionState::InfectedNoSymptoms => self.cells[0].num_carriers -= 1,
            InfectionState::InfectedSymptoms => self.cells[0].num_infected -= 1,
            _ => {}
        }
        match new {
            InfectionState::InfectedNoSymptoms => self.cells[0].num_carriers += 1,
            InfectionState::InfectedSymptoms => self.cells[0].num_infected += 1,
            _ => {}
        }
    }

    /// Refreshes the cached per-cell exposure rates from the current
    /// occupants. Called once per step before any interaction.
    pub fn begin_step(&mut self, _dt: TimeSpan, params: &GlobalInfectionParameters) {
        for cell in &mut self.cells {
            cell.cached_exposure_rate = vec![0.0; NUM_AGE_GROUPS * VaccinationState::COUNT];
            if cell.num_people == 0 {
                continue;
            }
            // Frequency-dependent mixing, capped by the location's maximum
            // number of contacts.
            let n = cell.num_people as f64;
            let crowding = self.parameters.maximum_contacts.min(n) / n;
            for age in AgeGroup::all() {
                for vaccination in VaccinationState::ALL {
                    let by_carrier = GlobalInfectionParameters::rate(
                        &params.susceptible_to_exposed_by_carrier,
                        age,
                        vaccination,
                    );
                    let by_infected = GlobalInfectionParameters::rate(
                        &params.susceptible_to_exposed_by_infected,
                        age,
                        vaccination,
                    );
                    cell.cached_exposure_rate[Cell::rate_index(age, vaccination)] = crowding
                        * (by_carrier * cell.num_carriers as f64
                            + by_infected * cell.num_infected as f64);
                }
            }
        }
    }

    /// Samples the infection state transition of one occupant over `dt`.
    /// Returns the (possibly unchanged) state. Deterministic given the RNG
    /// stream and the agent iteration order.
    pub fn interact(
        &self,
        state: InfectionState,
        age: AgeGroup,
        vaccination: VaccinationState,
        dt: TimeSpan,
        params: &GlobalInfectionParameters,
        rng: &mut StdRng,
    ) -> InfectionState {
        use InfectionState::*;
        let rate = |array: &crate::abm::parameters::AgeVaccinationRates| {
            GlobalInfectionParameters::rate(array, age, vaccination)
        };
        match state {
            Susceptible => {
                // Zero before the first begin_step of a step.
                let exposure = self.cells[0]
                    .cached_exposure_rate
                    .get(Cell::rate_index(age, vaccination))
                    .copied()
                    .unwrap_or(0.0);
                sample_transition(rng, dt, &[(Exposed, exposure)]).unwrap_or(state)
            }
            Exposed => {
                let incubation = rate(&params.incubation_period).max(f64::MIN_POSITIVE);
                sample_transition(rng, dt, &[(InfectedNoSymptoms, 1.0 / incubation)])
                    .unwrap_or(state)
            }
            InfectedNoSymptoms => sample_transition(
                rng,
                dt,
                &[
                    (InfectedSymptoms, rate(&params.carrier_to_infected)),
                    (Recovered, rate(&params.carrier_to_recovered)),
                ],
            )
            .unwrap_or(state),
            InfectedSymptoms => sample_transition(
                rng,
                dt,
                &[
                    (Recovered, rate(&params.infected_to_recovered)),
                    (InfectedSevere, rate(&params.infected_to_severe)),
                ],
            )
            .unwrap_or(state),
            InfectedSevere => sample_transition(
                rng,
                dt,
                &[
                    (Recovered, rate(&params.severe_to_recovered)),
                    (InfectedCritical, rate(&params.severe_to_critical)),
                ],
            )
            .unwrap_or(state),
            InfectedCritical => sample_transition(
                rng,
                dt,
                &[
                    (Recovered, rate(&params.critical_to_recovered)),
                    (Dead, rate(&params.critical_to_dead)),
                ],
            )
            .unwrap_or(state),
            Recovered => sample_transition(
                rng,
                dt,
                &[(Susceptible, rate(&params.recovered_to_susceptible))],
            )
            .unwrap_or(state),
            Dead => Dead,
        }
    }
}

/// Samples one of several competing exponential transitions over `dt`.
/// Returns `None` when no transition fires.
fn sample_transition(
    rng: &mut StdRng,
    dt: TimeSpan,
    transitions: &[(InfectionState, f64)],
) -> Option<InfectionState> {
    let total: f64 = transitions.iter().map(|(_, rate)| rate.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let p_any = 1.0 - (-total * dt.as_days()).exp();
    if !rng.gen_bool(p_any.clamp(0.0, 1.0)) {
        return None;
    }
    let mut pick = rng.gen_range(0.0..total);
    for (state, rate) in transitions {
        let rate = rate.max(0.0);
        if pick < rate {
            return Some(*state);
        }
        pick -= rate;
    }
    Some(transitions.last().expect("nonempty transitions").0)
}
