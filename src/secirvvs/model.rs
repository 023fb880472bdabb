//! Right-hand side of the layered SECIR model.

use crate::age::AgeGroup;
use crate::contact::UncertainContactMatrix;
use crate::dynamic_npi::DynamicNPIs;
use crate::error::EpiError;
use crate::numeric::smoother_cosine;
use crate::populations::Populations;
use crate::secir::{InfectionState, ParameterKey};
use crate::secirvvs::parameters::{Parameters, VvsParameterKey};
use crate::secirvvs::ImmunityLayer;
use crate::simulation::EpiModel;
use crate::time::SimulationTime;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Layered SECIR model of one spatial node. The population is shaped
/// `(age, layer, state)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub parameters: Parameters,
    pub populations: Populations,
}

/// Per-layer epidemiological rates of one age group.
struct LayerRates {
    susceptibility: f64,
    rate_e: f64,
    rate_c: f64,
    t_i: f64,
    mu_cr: f64,
    mu_ih: f64,
}

impl Model {
    #[must_use]
    pub fn new(num_groups: usize) -> Model {
        Model {
            parameters: Parameters::new(num_groups),
            populations: Populations::new(vec![
                num_groups,
                ImmunityLayer::COUNT,
                InfectionState::COUNT,
            ]),
        }
    }

    #[must_use]
    pub fn flat(&self, group: usize, layer: ImmunityLayer, state: InfectionState) -> usize {
        (group * ImmunityLayer::COUNT + layer.index()) * InfectionState::COUNT + state.index()
    }

    fn seasonality_factor(&self, t: f64) -> f64 {
        let k = self.parameters.base.get_scalar(ParameterKey::Seasonality);
        let day = (self.parameters.base.start_day() + t).rem_euclid(365.0);
        1.0 + k * (2.0 * PI * day / 365.0 - PI / 2.0).sin()
    }

    fn layer_rates(&self, age: AgeGroup, layer: ImmunityLayer) -> LayerRates {
        use VvsParameterKey::*;
        let base = &self.parameters.base;
        let tinc = base.get(ParameterKey::IncubationTime, age);
        let si = base.get(ParameterKey::SerialInterval, age);
        let rate_e = 1.0 / (2.0 * si - tinc);
        let base_rate_c = 0.5 / (tinc - si);
        let base_t_i = base.get(ParameterKey::TimeInfectedSymptoms, age);
        let base_mu_cr = base.get(ParameterKey::RecoveredPerInfectedNoSymptoms, age);
        let base_mu_ih = base.get(ParameterKey::SeverePerInfectedSymptoms, age);

        let (reduc_exp, reduc_sympt, reduc_scd) = match layer {
            ImmunityLayer::Naive => (1.0, 1.0, 1.0),
            ImmunityLayer::PartialImmunity => (
                self.parameters.get(ReducExposedPartialImmunity, age),
                self.parameters.get(ReducInfectedSymptomsPartialImmunity, age),
                self.parameters
                    .get(ReducInfectedSevereCriticalDeadPartialImmunity, age),
            ),
            ImmunityLayer::ImprovedImmunity => (
                self.parameters.get(ReducExposedImprovedImmunity, age),
                self.parameters.get(ReducInfectedSymptomsImprovedImmunity, age),
                self.parameters
                    .get(ReducInfectedSevereCriticalDeadImprovedImmunity, age),
            ),
        };
        let time_factor = if layer == ImmunityLayer::Naive {
            1.0
        } else {
            self.parameters.get(ReducTimeInfectedMild, age)
        };

        // Immunity reduces the probability of symptoms relative to the
        // reduced risk of infection, and of a severe course relative to the
        // reduced risk of symptoms.
        let mu_symptomatic = if reduc_exp > 0.0 {
            ((reduc_sympt / reduc_exp) * (1.0 - base_mu_cr)).min(1.0)
        } else {
            0.0
        };
        let mu_ih = if reduc_sympt > 0.0 {
            ((reduc_scd / reduc_sympt) * base_mu_ih).min(1.0)
        } else {
            0.0
        };

        LayerRates {
            susceptibility: reduc_exp,
            rate_e,
            rate_c: base_rate_c / time_factor,
            t_i: base_t_i * time_factor,
            mu_cr: 1.0 - mu_symptomatic,
            mu_ih,
        }
    }
}

impl EpiModel for Model {
    fn num_compartments(&self) -> usize {
        self.parameters.num_groups() * ImmunityLayer::COUNT * InfectionState::COUNT
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
        let base = &self.parameters.base;
        let num_groups = self.parameters.num_groups();
        let season = self.seasonality_factor(t);
        let contacts = base
            .contact_patterns()
            .contact_matrices
            .effective_total(SimulationTime(t));

        let icu_capacity = base.get_scalar(ParameterKey::IcuCapacity);
        let mut icu_occupancy = 0.0;
        for b in 0..num_groups {
            for layer in ImmunityLayer::ALL {
                icu_occupancy += y[self.flat(b, layer, InfectedCritical)];
            }
        }
        let icu_full = icu_occupancy >= icu_capacity;

        // Infectiousness per contact group, aggregated over layers.
        let capacity = base.get_scalar(ParameterKey::TestAndTraceCapacity);
        let required = self.symptomatic_inflow(y);
        let mut infectious = vec![0.0; num_groups];
        for b in 0..num_groups {
            let group_b = AgeGroup(b);
            let mut alive = 0.0;
            let mut carriers = 0.0;
            let mut symptomatic = 0.0;
            for layer in ImmunityLayer::ALL {
                for state in InfectionState::ALL {
                    if state != Dead {
                        alive += y[self.flat(b, layer, state)];
                    }
                }
                carriers += y[self.flat(b, layer, InfectedNoSymptoms)];
                symptomatic += y[self.flat(b, layer, InfectedSymptoms)];
            }
            if alive <= 0.0 {
                continue;
            }
            let xi = base.get(ParameterKey::RelativeTransmissionNoSymptoms, group_b);
            let rho = smoother_cosine(
                required,
                capacity,
                5.0 * capacity,
                base.get(ParameterKey::RiskOfInfectionFromSymptomatic, group_b),
                base.get(ParameterKey::MaxRiskOfInfectionFromSymptomatic, group_b),
            );
            infectious[b] = (xi * carriers + rho * symptomatic) / alive;
        }

        for a in 0..num_groups {
            let age = AgeGroup(a);
            let beta = base.get(ParameterKey::TransmissionProbabilityOnContact, age);
            let mut lambda = 0.0;
            for b in 0..num_groups {
                lambda += contacts[(a, b)] * infectious[b];
            }
            lambda *= season * beta;

            let t_h = base.get(ParameterKey::TimeInfectedSevere, age);
            let t_u = base.get(ParameterKey::TimeInfectedCritical, age);
            let mu_hu = base.get(ParameterKey::CriticalPerSevere, age);
            let mu_ud = base.get(ParameterKey::DeathsPerCritical, age);

            for layer in ImmunityLayer::ALL {
                let rates = self.layer_rates(age, layer);
                let s = y[self.flat(a, layer, Susceptible)];
                let e = y[self.flat(a, layer, Exposed)];
                let c = y[self.flat(a, layer, InfectedNoSymptoms)];
                let i = y[self.flat(a, layer, InfectedSymptoms)];
                let h = y[self.flat(a, layer, InfectedSevere)];
                let u = y[self.flat(a, layer, InfectedCritical)];

                let infections = rates.susceptibility * lambda * s;
                let onset = rates.rate_c * c;
                let severe_out = h / t_h;

                dydt[self.flat(a, layer, Susceptible)] = -infections;
                dydt[self.flat(a, layer, Exposed)] = infections - rates.rate_e * e;
                dydt[self.flat(a, layer, InfectedNoSymptoms)] = rates.rate_e * e - onset;
                dydt[self.flat(a, layer, InfectedSymptoms)] =
                    (1.0 - rates.mu_cr) * onset - i / rates.t_i;
                dydt[self.flat(a, layer, InfectedSevere)] =
                    rates.mu_ih * i / rates.t_i - severe_out;
                let recovered_flow = rates.mu_cr * onset
                    + (1.0 - rates.mu_ih) * i / rates.t_i
                    + (1.0 - mu_hu) * severe_out
                    + (1.0 - mu_ud) * u / t_u;
                if icu_full {
                    dydt[self.flat(a, layer, InfectedCritical)] = -u / t_u;
                    dydt[self.flat(a, layer, Dead)] = mu_ud * u / t_u + mu_hu * severe_out;
                } else {
                    dydt[self.flat(a, layer, InfectedCritical)] = mu_hu * severe_out - u / t_u;
                    dydt[self.flat(a, layer, Dead)] = mu_ud * u / t_u;
                }
                dydt[self.flat(a, layer, Recovered)] = recovered_flow;
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
        self.parameters.base.contact_patterns()
    }

    fn contact_patterns_mut(&mut self) -> &mut UncertainContactMatrix {
        self.parameters.base.contact_patterns_mut()
    }

    fn dynamic_npis(&self) -> &DynamicNPIs {
        self.parameters.base.dynamic_npis()
    }

    fn symptomatic_inflow(&self, y: &DVector<f64>) -> f64 {
        let mut inflow = 0.0;
        for a in 0..self.parameters.num_groups() {
            let age = AgeGroup(a);
            for layer in ImmunityLayer::ALL {
                let rates = self.layer_rates(age, layer);
                inflow += (1.0 - rates.mu_cr)
                    * rates.rate_c
                    * y[self.flat(a, layer, InfectionState::InfectedNoSymptoms)];
            }
        }
        inflow
    }

    fn migrating_mask(&self) -> DVector<f64> {
        let mut mask = DVector::zeros(self.num_compartments());
        for a in 0..self.parameters.num_groups() {
            for layer in ImmunityLayer::ALL {
                for state in InfectionState::ALL {
                    if state.migrates() {
                        mask[self.flat(a, layer, state)] = 1.0;
                    }
                }
            }
        }
        mask
    }

    fn total_population(&self) -> f64 {
        self.populations.total()
    }

    /// Daily vaccinations move susceptibles up the immunity layers.
    fn on_day_begin(&self, _day: f64, y: &mut DVector<f64>) {
        use InfectionState::Susceptible;
        for a in 0..self.parameters.num_groups() {
            let age = AgeGroup(a);
            let first = self
                .parameters
                .get(VvsParameterKey::DailyFirstVaccination, age);
            let full = self.parameters.get(VvsParameterKey::DailyFullVaccination, age);

            let naive = self.flat(a, ImmunityLayer::Naive, Susceptible);
            let partial = self.flat(a, ImmunityLayer::PartialImmunity, Susceptible);
            let improved = self.flat(a, ImmunityLayer::ImprovedImmunity, Susceptible);

            let moved_first = first.min(y[naive]).max(0.0);
            y[naive] -= moved_first;
            y[partial] += moved_first;

            let moved_full = full.min(y[partial]).max(0.0);
            y[partial] -= moved_full;
            y[improved] += moved_full;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{ContactMatrix, ContactMatrixGroup};
    use crate::simulation::Simulation;
    use nalgebra::DMatrix;

    fn layered_model(contacts: f64) -> Model {
        let mut model = Model::new(1);
        let matrix = ContactMatrix::new(DMatrix::from_element(1, 1, contacts));
        model.parameters.base.contact_patterns_mut().contact_matrices =
            ContactMatrixGroup::from_matrices(vec![matrix]);
        model
    }

    #[test]
    fn rhs_conserves_total_population() {
        let mut model = layered_model(5.0);
        for layer in ImmunityLayer::ALL {
            let idx = model.flat(0, layer, InfectionState::Susceptible);
            model
                .populations
                .set(&[0, layer.index(), InfectionState::Susceptible.index()], 300.0)
                .unwrap();
            assert_eq!(model.populations.compartments()[idx], 300.0);
        }
        model
            .populations
            .set(&[0, 0, InfectionState::Exposed.index()], 10.0)
            .unwrap();
        let y = model.initial_values();
        let mut dydt = DVector::zeros(y.len());
        model.rhs(0.0, &y, &mut dydt);
        assert!(dydt.sum().abs() < 1e-12);
    }

    #[test]
    fn immunity_reduces_infections() {
        let mut model = layered_model(5.0);
        model
            .parameters
            .get_mut(VvsParameterKey::ReducExposedPartialImmunity, AgeGroup(0))
            .set_value(0.2);
        for layer in [ImmunityLayer::Naive, ImmunityLayer::PartialImmunity] {
            model
                .populations
                .set(&[0, layer.index(), InfectionState::Susceptible.index()], 500.0)
                .unwrap();
        }
        model
            .populations
            .set(&[0, 0, InfectionState::InfectedSymptoms.index()], 50.0)
            .unwrap();
        let y = model.initial_values();
        let mut dydt = DVector::zeros(y.len());
        model.rhs(0.0, &y, &mut dydt);
        let d_naive = -dydt[model.flat(0, ImmunityLayer::Naive, InfectionState::Susceptible)];
        let d_partial =
            -dydt[model.flat(0, ImmunityLayer::PartialImmunity, InfectionState::Susceptible)];
        assert!(d_naive > 0.0);
        assert!((d_partial - 0.2 * d_naive).abs() < 1e-12);
    }

    #[test]
    fn daily_vaccinations_move_susceptibles_up() {
        let mut model = layered_model(0.0);
        model
            .populations
            .set(&[0, 0, InfectionState::Susceptible.index()], 1000.0)
            .unwrap();
        model
            .parameters
            .get_mut(VvsParameterKey::DailyFirstVaccination, AgeGroup(0))
            .set_value(100.0);
        model
            .parameters
            .get_mut(VvsParameterKey::DailyFullVaccination, AgeGroup(0))
            .set_value(40.0);
        let mut sim = Simulation::new(model, 0.0, 0.25).unwrap();
        sim.advance(2.0).unwrap();
        let y = sim.state();
        let model = sim.model();
        let naive = y[model.flat(0, ImmunityLayer::Naive, InfectionState::Susceptible)];
        let partial = y[model.flat(0, ImmunityLayer::PartialImmunity, InfectionState::Susceptible)];
        let improved =
            y[model.flat(0, ImmunityLayer::ImprovedImmunity, InfectionState::Susceptible)];
        // Two day boundaries processed (t = 0 and t = 1).
        assert!((naive - 800.0).abs() < 1e-9);
        assert!((partial - 120.0).abs() < 1e-9);
        assert!((improved - 80.0).abs() < 1e-9);
        assert!((naive + partial + improved - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn shorter_mild_stages_for_immunized() {
        let mut model = layered_model(0.0);
        model
            .parameters
            .get_mut(VvsParameterKey::ReducTimeInfectedMild, AgeGroup(0))
            .set_value(0.5);
        let naive = model.layer_rates(AgeGroup(0), ImmunityLayer::Naive);
        let partial = model.layer_rates(AgeGroup(0), ImmunityLayer::PartialImmunity);
        assert!((partial.t_i - 0.5 * naive.t_i).abs() < 1e-12);
        assert!((partial.rate_c - 2.0 * naive.rate_c).abs() < 1e-12);
    }
}
