//! The simulation capability shared by the compartmental models.
//!
//! Each concrete model (SECIR, layered SECIR) implements [`EpiModel`]; the
//! node simulation, the graph simulator and the parameter study are generic
//! over it. No trait objects are needed, the graph dispatches statically.

use crate::contact::UncertainContactMatrix;
use crate::dynamic_npi::DynamicNPIs;
use crate::error::EpiError;
use crate::integrator::{integrate, RkAdaptive};
use crate::time_series::TimeSeries;
use nalgebra::DVector;
use rand::rngs::StdRng;

/// A compartmental model: parameters plus an initial population, able to
/// evaluate its right-hand side and to resample itself for a parameter study.
pub trait EpiModel: Clone {
    /// Number of compartments in the flat state vector.
    fn num_compartments(&self) -> usize;

    /// Number of age groups; the flat state vector is grouped by age with
    /// `num_compartments() / num_groups()` states per group.
    fn num_groups(&self) -> usize;

    /// The initial state vector, taken from the populations.
    fn initial_values(&self) -> DVector<f64>;

    /// Writes the state vector back into the populations.
    fn set_values(&mut self, y: &DVector<f64>) -> Result<(), EpiError>;

    /// Evaluates `dy/dt` at `(t, y)`.
    fn rhs(&self, t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>);

    /// Clamps parameters into their admissible intervals, logging every
    /// rewrite.
    fn apply_constraints(&mut self);

    /// Reports the first violated constraint without modifying anything.
    fn check_constraints(&self) -> Result<(), EpiError>;

    /// Resamples every uncertain value, then applies constraints.
    fn draw_sample(&mut self, rng: &mut StdRng) -> Result<(), EpiError>;

    fn contact_patterns(&self) -> &UncertainContactMatrix;
    fn contact_patterns_mut(&mut self) -> &mut UncertainContactMatrix;

    fn dynamic_npis(&self) -> &DynamicNPIs;

    /// Current rate of new symptomatic cases per day, for the dynamic NPI
    /// indicator.
    fn symptomatic_inflow(&self, y: &DVector<f64>) -> f64;

    /// Mask over the flat state vector: 1.0 for compartments that travel
    /// along mobility edges, 0.0 for those that never migrate.
    fn migrating_mask(&self) -> DVector<f64>;

    /// Total (living and dead) population of the node.
    fn total_population(&self) -> f64;

    /// Hook invoked at every integer-day boundary during `advance`, before
    /// integration continues. The layered model applies daily vaccinations
    /// here.
    fn on_day_begin(&self, _day: f64, _y: &mut DVector<f64>) {}
}

/// Runs one model over time with the adaptive integrator, collecting a dense
/// time series.
#[derive(Debug, Clone)]
pub struct Simulation<M: EpiModel> {
    model: M,
    results: TimeSeries,
    t: f64,
    dt: f64,
}

impl<M: EpiModel> Simulation<M> {
    /// Creates a simulation starting at `t0` with initial integrator step
    /// `dt`.
    pub fn new(model: M, t0: f64, dt: f64) -> Result<Simulation<M>, EpiError> {
        let mut results = TimeSeries::new(model.num_compartments());
        results.add_time_point(t0, model.initial_values())?;
        Ok(Simulation {
            model,
            results,
            t: t0,
            dt,
        })
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    #[must_use]
    pub fn results(&self) -> &TimeSeries {
        &self.results
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.t
    }

    /// The most recent state vector.
    #[must_use]
    pub fn state(&self) -> &DVector<f64> {
        self.results.get_last_value()
    }

    /// Overwrites the most recent state vector, e.g. after an edge exchange.
    pub fn set_state(&mut self, y: DVector<f64>) {
        *self.results.get_last_value_mut() = y;
    }

    /// Advances to `tmax`, stopping at every integer-day boundary for the
    /// model's day hook. Appends all sub-steps to the result series.
    pub fn advance(&mut self, tmax: f64) -> Result<(), EpiError> {
        let core = RkAdaptive::default();
        while self.t < tmax {
            let next_day = (self.t + 1.0).floor();
            let stop = next_day.min(tmax);
            let mut y = self.results.get_last_value().clone();
            if self.t == self.t.floor() {
                self.model.on_day_begin(self.t, &mut y);
                *self.results.get_last_value_mut() = y.clone();
            }
            let model = &self.model;
            let f = move |t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>| {
                model.rhs(t, y, dydt);
            };
            let segment = integrate(&f, y, self.t, stop, self.dt, &core)?;
            for (i, (t, value)) in segment.iter().enumerate() {
                if i == 0 {
                    continue;
                }
                self.results.add_time_point(t, value.clone())?;
            }
            self.t = stop;
        }
        Ok(())
    }

    /// New symptomatic cases over the window `[t - window, t]`, estimated by
    /// integrating the symptomatic inflow over the stored sub-steps with the
    /// trapezoidal rule.
    #[must_use]
    pub fn symptomatic_cases_in_window(&self, window: f64) -> f64 {
        let t_end = self.results.get_last_time();
        let t_start = (t_end - window).max(self.results.get_time(0));
        let mut total = 0.0;
        let n = self.results.num_time_points();
        for i in 1..n {
            let (t0, t1) = (self.results.get_time(i - 1), self.results.get_time(i));
            if t1 <= t_start {
                continue;
            }
            let f0 = self.model.symptomatic_inflow(self.results.get_value(i - 1));
            let f1 = self.model.symptomatic_inflow(self.results.get_value(i));
            // Clip the leading segment at the window start.
            let (a, b) = (t0.max(t_start), t1);
            if b > a {
                total += 0.5 * (f0 + f1) * (b - a);
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secir::{InfectionState, Model};

    fn small_model() -> Model {
        let mut model = Model::new(1);
        model
            .populations
            .set(&[0, InfectionState::Exposed.index()], 10.0)
            .unwrap();
        model
            .populations
            .set_difference_from_group_total(
                &[0, InfectionState::Susceptible.index()],
                0,
                1000.0,
            )
            .unwrap();
        model
    }

    #[test]
    fn advance_is_cumulative_and_monotone_in_time() {
        let mut sim = Simulation::new(small_model(), 0.0, 0.1).unwrap();
        sim.advance(2.0).unwrap();
        let points_after_two_days = sim.results().num_time_points();
        sim.advance(4.0).unwrap();
        assert!(sim.results().num_time_points() > points_after_two_days);
        assert_eq!(sim.results().get_last_time(), 4.0);
        assert_eq!(sim.current_time(), 4.0);
    }

    #[test]
    fn state_snapshot_matches_results() {
        let mut sim = Simulation::new(small_model(), 0.0, 0.1).unwrap();
        sim.advance(1.0).unwrap();
        let last = sim.results().get_last_value().clone();
        assert_eq!(sim.state(), &last);
    }
}
