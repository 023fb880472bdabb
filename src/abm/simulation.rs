//! Runs a world over time and records the population per infection state.

use crate::abm::time::{TimePoint, TimeSpan};
use crate::abm::World;
use crate::error::EpiError;
use crate::secir::InfectionState;
use crate::time_series::TimeSeries;
use nalgebra::DVector;
use rand::rngs::StdRng;

/// Discrete-time driver of an agent-based [`World`].
pub struct AbmSimulation {
    world: World,
    t: TimePoint,
    dt: TimeSpan,
    results: TimeSeries,
}

impl AbmSimulation {
    /// Creates a simulation starting at `t0` with the given step, usually
    /// one hour.
    pub fn new(world: World, t0: TimePoint, dt: TimeSpan) -> Result<AbmSimulation, EpiError> {
        if dt.seconds <= 0 {
            return Err(EpiError::InvalidValue(format!(
                "step size of {} seconds must be positive",
                dt.seconds
            )));
        }
        let mut results = TimeSeries::new(InfectionState::COUNT);
        results.add_time_point(t0.as_days(), count_vector(&world))?;
        Ok(AbmSimulation {
            world,
            t: t0,
            dt,
            results,
        })
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    #[must_use]
    pub fn current_time(&self) -> TimePoint {
        self.t
    }

    /// Counts of agents per infection state over time.
    #[must_use]
    pub fn results(&self) -> &TimeSeries {
        &self.results
    }

    /// Evolves the world up to `tmax` in steps of `dt`, recording the state
    /// counts after every step.
    pub fn advance(&mut self, tmax: TimePoint, rng: &mut StdRng) -> Result<(), EpiError> {
        while self.t < tmax {
            self.world.evolve(self.t, self.dt, rng);
            self.t += self.dt;
            self.results
                .add_time_point(self.t.as_days(), count_vector(&self.world))?;
        }
        Ok(())
    }
}

fn count_vector(world: &World) -> DVector<f64> {
    let counts = world.count_by_state();
    DVector::from_iterator(counts.len(), counts.iter().map(|c| *c as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abm::location::LocationType;
    use crate::abm::time::{days, hours};
    use crate::age::AgeGroup;
    use crate::random::rng_for_stream;

    fn small_world() -> World {
        let mut world = World::new();
        let home = world.add_location(LocationType::Home, 1);
        world.add_location(LocationType::Work, 1);
        world.add_location(LocationType::Hospital, 1);
        world.add_location(LocationType::Icu, 1);
        for i in 0..20 {
            let state = if i < 2 {
                InfectionState::InfectedSymptoms
            } else {
                InfectionState::Susceptible
            };
            world.add_person(home, state, AgeGroup(2)).unwrap();
        }
        world
    }

    #[test]
    fn advance_records_every_step() {
        let mut sim = AbmSimulation::new(small_world(), TimePoint::new(0), hours(1)).unwrap();
        let mut rng = rng_for_stream(42, "abm");
        sim.advance(TimePoint::new(0) + days(1), &mut rng).unwrap();
        assert_eq!(sim.results().num_time_points(), 25);
        assert_eq!(sim.current_time(), TimePoint::new(0) + days(1));
    }

    #[test]
    fn agent_count_is_conserved() {
        let mut sim = AbmSimulation::new(small_world(), TimePoint::new(0), hours(1)).unwrap();
        let mut rng = rng_for_stream(7, "abm");
        sim.advance(TimePoint::new(0) + days(3), &mut rng).unwrap();
        for i in 0..sim.results().num_time_points() {
            let total: f64 = sim.results().get_value(i).sum();
            assert_eq!(total, 20.0);
        }
    }

    #[test]
    fn epidemic_spreads_in_a_closed_world() {
        let mut sim = AbmSimulation::new(small_world(), TimePoint::new(0), hours(1)).unwrap();
        let mut rng = rng_for_stream(11, "abm");
        sim.advance(TimePoint::new(0) + days(5), &mut rng).unwrap();
        let last = sim.results().get_last_value();
        let susceptible = last[InfectionState::Susceptible.index()];
        assert!(susceptible < 18.0, "no infections happened");
    }

    #[test]
    fn identical_streams_reproduce_the_run() {
        let run = |seed: u64| {
            let mut sim = AbmSimulation::new(small_world(), TimePoint::new(0), hours(1)).unwrap();
            let mut rng = rng_for_stream(seed, "abm");
            sim.advance(TimePoint::new(0) + days(2), &mut rng).unwrap();
            sim.results().get_last_value().clone()
        };
        assert_eq!(run(3), run(3));
    }
}
