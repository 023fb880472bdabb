//! The SECIR right-hand side and its coupling to populations.

use crate::age::AgeGroup;
use crate::contact::UncertainContactMatrix;
use crate::dynamic_npi::DynamicNPIs;
use crate::error::EpiError;
use crate::numeric::smoother_cosine;
use crate::populations::Populations;
use crate::secir::parameters::{ParameterKey, Parameters};
use crate::secir::InfectionState;
use crate::simulation::EpiModel;
use crate::time::SimulationTime;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// SECIR model of one spatial node: parameters plus an age-stratified
/// population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub parameters: Parameters,
    pub populations: Populations,
}

impl Model {
    #[must_use]
    pub fn new(num_groups: usize) -> Model {
        Model {
            parameters: Parameters::new(num_groups),
            populations: Populations::new(vec![num_groups, InfectionState::COUNT]),
        }
    }

    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.parameters.num_groups()
    }

    fn flat(&self, group: usize, state: InfectionState) -> usize {
        group * InfectionState::COUNT + state.index()
    }

    /// Seasonal modulation of transmission over the year.
    fn seasonality_factor(&self, t: f64) -> f64 {
        let k = self.parameters.get_scalar(ParameterKey::Seasonality);
        let day = (self.parameters.start_day() + t).rem_euclid(365.0);
        1.0 + k * (2.0 * PI * day / 365.0 - PI / 2.0).sin()
    }

    /// Effective risk of infection from symptomatic cases, blending toward
    /// the maximal risk as test-and-trace capacity saturates.
    fn effective_symptomatic_risk(&self, group: AgeGroup, y: &DVector<f64>) -> f64 {
        let capacity = self.parameters.get_scalar(ParameterKey::TestAndTraceCapacity);
        let required = self.symptomatic_inflow(y);
        let risk = self
            .parameters
            .get(ParameterKey::RiskOfInfectionFromSymptomatic, group);
        let max_risk = self
            .parameters
            .get(ParameterKey::MaxRiskOfInfectionFromSymptomatic, group);
        smoother_cosine(required, capacity, 5.0 * capacity, risk, max_risk)
    }
}

impl EpiModel for Model {
    fn num_compartments(&self) -> usize {
        self.parameters.num_groups() * InfectionState::COUNT
    }

    fn num_groups(&self) -> usize {
        self.parameters.num_groups()
    }

    fn initial_values(&self) -> DVector<f64> {
        self.populations.compartments()
    }

    fn set_values(&mut self, y: &DVector<f64>) -> Result<(), EpiError> {
        self.populations.set_compartments(y)
    }

    fn rhs(&self, t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>) {
        use InfectionState::*;

        dydt.fill(0.0);
        let params = &self.parameters;
        let num_groups = self.num_groups();
        let season = self.seasonality_factor(t);
        let contacts = params
            .contact_patterns()
            .contact_matrices
            .effective_total(SimulationTime(t));

        let icu_capacity = params.get_scalar(ParameterKey::IcuCapacity);
        let icu_occupancy: f64 = (0..num_groups)
            .map(|b| y[self.flat(b, InfectedCritical)])
            .sum();
        let icu_full = icu_occupancy >= icu_capacity;

        for a in 0..num_groups {
            let age = AgeGroup(a);
            let s = y[self.flat(a, Susceptible)];
            let e = y[self.flat(a, Exposed)];
            let c = y[self.flat(a, InfectedNoSymptoms)];
            let i = y[self.flat(a, InfectedSymptoms)];
            let h = y[self.flat(a, InfectedSevere)];
            let u = y[self.flat(a, InfectedCritical)];

            let tinc = params.get(ParameterKey::IncubationTime, age);
            let si = params.get(ParameterKey::SerialInterval, age);
            // Exposed -> carrier and carrier -> symptomatic rates derived
            // from incubation time and serial interval.
            let rate_e = 1.0 / (2.0 * si - tinc);
            let rate_c = 0.5 / (tinc - si);
            let t_i = params.get(ParameterKey::TimeInfectedSymptoms, age);
            let t_h = params.get(ParameterKey::TimeInfectedSevere, age);
            let t_u = params.get(ParameterKey::TimeInfectedCritical, age);
            let mu_cr = params.get(ParameterKey::RecoveredPerInfectedNoSymptoms, age);
            let mu_ih = params.get(ParameterKey::SeverePerInfectedSymptoms, age);
            let mu_hu = params.get(ParameterKey::CriticalPerSevere, age);
            let mu_ud = params.get(ParameterKey::DeathsPerCritical, age);
            let beta = params.get(ParameterKey::TransmissionProbabilityOnContact, age);

            // Force of infection over all contact groups.
            let mut lambda = 0.0;
            for b in 0..num_groups {
                let group_b = AgeGroup(b);
                let alive_b: f64 = InfectionState::ALL
                    .iter()
                    .filter(|state| **state != Dead)
                    .map(|state| y[self.flat(b, *state)])
                    .sum();
                if alive_b <= 0.0 {
                    continue;
                }
                let xi = params.get(ParameterKey::RelativeTransmissionNoSymptoms, group_b);
                let rho = self.effective_symptomatic_risk(group_b, y);
                let c_b = y[self.flat(b, InfectedNoSymptoms)];
                let i_b = y[self.flat(b, InfectedSymptoms)];
                lambda += contacts[(a, b)] * (xi * c_b + rho * i_b) / alive_b;
            }
            lambda *= season * beta;

            let infections = lambda * s;
            let onset = rate_c * c;
            let severe_out = h / t_h;

            dydt[self.flat(a, Susceptible)] = -infections;
            dydt[self.flat(a, Exposed)] = infections - rate_e * e;
            dydt[self.flat(a, InfectedNoSymptoms)] = rate_e * e - onset;
            dydt[self.flat(a, InfectedSymptoms)] = (1.0 - mu_cr) * onset - i / t_i;
            dydt[self.flat(a, InfectedSevere)] = mu_ih * i / t_i - severe_out;
            if icu_full {
                // No beds left: critical cases cannot be admitted, the
                // critical share of severe cases dies.
                dydt[self.flat(a, InfectedCritical)] = -u / t_u;
                dydt[self.flat(a, Dead)] = mu_ud * u / t_u + mu_hu * severe_out;
                dydt[self.flat(a, Recovered)] = mu_cr * onset
                    + (1.0 - mu_ih) * i / t_i
                    + (1.0 - mu_hu) * severe_out
                    + (1.0 - mu_ud) * u / t_u;
            } else {
                dydt[self.flat(a, InfectedCritical)] = mu_hu * severe_out - u / t_u;
                dydt[self.flat(a, Dead)] = mu_ud * u / t_u;
                dydt[self.flat(a, Recovered)] = mu_cr * onset
                    + (1.0 - mu_ih) * i / t_i
                    + (1.0 - mu_hu) * severe_out
                    + (1.0 - mu_ud) * u / t_u;
            }
        }
    }

    fn apply_constraints(&mut self) {
        self.parameters.apply_constraints();
        self.populations.apply_constraints();
    }

    fn check_constraints(&self) -> Result<(), EpiError> {
        self.parameters.check_constraints()
    }

    fn draw_sample(&mut self, rng: &mut rand::rngs::StdRng) -> Result<(), EpiError> {
        self.parameters.draw_sample(rng)?;
        self.populations.draw_samples(rng)?;
        Ok(())
    }

    fn contact_patterns(&self) -> &UncertainContactMatrix {
        self.parameters.contact_patterns()
    }

    fn contact_patterns_mut(&mut self) -> &mut UncertainContactMatrix {
        self.parameters.contact_patterns_mut()
    }

    fn dynamic_npis(&self) -> &DynamicNPIs {
        self.parameters.dynamic_npis()
    }

    fn symptomatic_inflow(&self, y: &DVector<f64>) -> f64 {
        let mut inflow = 0.0;
        for a in 0..self.num_groups() {
            let age = AgeGroup(a);
            let tinc = self.parameters.get(ParameterKey::IncubationTime, age);
            let si = self.parameters.get(ParameterKey::SerialInterval, age);
            let rate_c = 0.5 / (tinc - si);
            let mu_cr = self
                .parameters
                .get(ParameterKey::RecoveredPerInfectedNoSymptoms, age);
            inflow += (1.0 - mu_cr) * rate_c * y[self.flat(a, InfectionState::InfectedNoSymptoms)];
        }
        inflow
    }

    fn migrating_mask(&self) -> DVector<f64> {
        let mut mask = DVector::zeros(self.num_compartments());
        for a in 0..self.num_groups() {
            for state in InfectionState::ALL {
                if state.migrates() {
                    mask[self.flat(a, state)] = 1.0;
                }
            }
        }
        mask
    }

    fn total_population(&self) -> f64 {
        self.populations.total()
    }
}
