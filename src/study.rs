//! Monte Carlo parameter studies over a graph of compartmental models.
//!
//! The study holds a template graph whose uncertain values carry
//! distributions. Each run draws an independent sample of the graph,
//! simulates it to the end time and hands the daily-interpolated results to
//! a sink callback. Every run has its own deterministically derived RNG
//! stream, so ensembles are reproducible run by run regardless of
//! scheduling; results are delivered in run order.

use crate::error::EpiError;
use crate::graph::{Graph, GraphSimulation, MobilityParameters};
use crate::random::rng_for_run;
use crate::simulation::EpiModel;
use crate::time_series::TimeSeries;
use rand::rngs::StdRng;

/// Default initial step of the node-local adaptive integrator.
const DEFAULT_DT_INTEGRATION: f64 = 0.1;

/// The outcome of one study run for one node.
#[derive(Debug, Clone)]
pub struct NodeResult<M> {
    pub id: i32,
    /// Node results interpolated to integer days.
    pub result: TimeSeries,
    /// The sampled model, carrying the drawn parameter values.
    pub model: M,
}

pub struct ParameterStudy<M: EpiModel> {
    graph: Graph<M, MobilityParameters>,
    t0: f64,
    tmax: f64,
    dt_graph: f64,
    num_runs: usize,
    base_seed: u64,
    end_dynamic_npis: Option<f64>,
}

impl<M: EpiModel> ParameterStudy<M> {
    /// Creates a study over the template graph. Constraint violations in the
    /// template are fatal.
    pub fn new(
        graph: Graph<M, MobilityParameters>,
        t0: f64,
        tmax: f64,
        dt_graph: f64,
        num_runs: usize,
    ) -> Result<ParameterStudy<M>, EpiError> {
        if tmax <= t0 {
            return Err(EpiError::InvalidValue(format!(
                "study end {tmax} must be after start {t0}"
            )));
        }
        if dt_graph <= 0.0 {
            return Err(EpiError::InvalidValue(format!(
                "graph step {dt_graph} must be positive"
            )));
        }
        if num_runs == 0 {
            return Err(EpiError::InvalidValue("study needs at least one run".to_string()));
        }
        for node in graph.nodes() {
            node.property.check_constraints()?;
        }
        Ok(ParameterStudy {
            graph,
            t0,
            tmax,
            dt_graph,
            num_runs,
            base_seed: 0,
            end_dynamic_npis: None,
        })
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.base_seed = seed;
    }

    /// Stops the introduction of dynamic NPIs at the given time in every
    /// run.
    pub fn set_end_dynamic_npis(&mut self, t: f64) {
        self.end_dynamic_npis = Some(t);
    }

    #[must_use]
    pub fn num_runs(&self) -> usize {
        self.num_runs
    }

    #[must_use]
    pub fn graph(&self) -> &Graph<M, MobilityParameters> {
        &self.graph
    }

    /// Runs the ensemble. `sample` draws one parameter sample of the
    /// template graph with the run's RNG stream; `handle` receives the
    /// per-node daily results of every successful run together with the run
    /// index. A failed run is logged and skipped, the ensemble proceeds.
    /// Returns the number of successful runs.
    pub fn run<S, H>(&self, mut sample: S, mut handle: H) -> Result<usize, EpiError>
    where
        S: FnMut(
            &Graph<M, MobilityParameters>,
            &mut StdRng,
        ) -> Result<Graph<M, MobilityParameters>, EpiError>,
        H: FnMut(Vec<NodeResult<M>>, usize),
    {
        let mut successful = 0;
        for run_idx in 0..self.num_runs {
            let mut rng = rng_for_run(self.base_seed, run_idx);
            match self.single_run(&mut sample, &mut rng) {
                Ok(results) => {
                    handle(results, run_idx);
                    successful += 1;
                }
                Err(error) => {
                    log::error!("run {run_idx} failed and is skipped: {error}");
                }
            }
        }
        Ok(successful)
    }

    fn single_run<S>(&self, sample: &mut S, rng: &mut StdRng) -> Result<Vec<NodeResult<M>>, EpiError>
    where
        S: FnMut(
            &Graph<M, MobilityParameters>,
            &mut StdRng,
        ) -> Result<Graph<M, MobilityParameters>, EpiError>,
    {
        let sampled = sample(&self.graph, rng)?;
        let mut simulation =
            GraphSimulation::new(sampled, self.t0, self.dt_graph, DEFAULT_DT_INTEGRATION)?;
        if let Some(end) = self.end_dynamic_npis {
            simulation.set_end_dynamic_npis(end);
        }
        simulation.advance(self.tmax)?;

        let mut results = Vec::with_capacity(simulation.nodes().len());
        for node in simulation.nodes() {
            results.push(NodeResult {
                id: node.id,
                result: node.simulation.results().interpolate_to_days()?,
                model: node.simulation.model().clone(),
            });
        }
        Ok(results)
    }
}
