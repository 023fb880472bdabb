//! Cooperative simulation of a graph of compartmental models.
//!
//! The simulator advances in fixed intervals (default half a day). At each
//! boundary all nodes are advanced first, then returning travellers are
//! reinserted, then new exchanges leave along every edge in insertion order,
//! and finally dynamic NPIs are re-evaluated on the post-exchange state.

use crate::error::EpiError;
use crate::graph::mobility::{MobilityParameters, VectorDamping};
use crate::graph::{Edge, Graph};
use crate::simulation::{EpiModel, Simulation};
use crate::time::SimulationTime;
use nalgebra::DVector;

/// Window over which the dynamic NPI indicator counts new symptomatic cases.
const INCIDENCE_WINDOW: f64 = 7.0;

/// A sub-population that is visiting the edge's destination and returns
/// after the transit time.
#[derive(Debug, Clone)]
struct TravellingBlock {
    amounts: DVector<f64>,
    departed: f64,
}

/// Runtime state of one mobility edge.
#[derive(Debug, Clone)]
pub struct MobilityEdge {
    parameters: MobilityParameters,
    travelling: Option<TravellingBlock>,
}

impl MobilityEdge {
    #[must_use]
    pub fn parameters(&self) -> &MobilityParameters {
        &self.parameters
    }
}

/// One node of the running simulation.
#[derive(Debug, Clone)]
pub struct SimulationNode<M: EpiModel> {
    pub id: i32,
    pub simulation: Simulation<M>,
    /// Time of the next dynamic NPI evaluation.
    next_npi_check: f64,
    /// Dynamic NPIs stay suppressed until their last activation has expired.
    npi_active_until: f64,
}

/// The coupled graph simulation.
pub struct GraphSimulation<M: EpiModel> {
    nodes: Vec<SimulationNode<M>>,
    edges: Vec<Edge<MobilityEdge>>,
    t: f64,
    dt: f64,
    end_dynamic_npis: f64,
}

impl<M: EpiModel> GraphSimulation<M> {
    /// Builds the simulation from a parameter graph. Constraint violations
    /// are fatal here; within a run they are clamped instead.
    pub fn new(
        graph: Graph<M, MobilityParameters>,
        t0: f64,
        dt: f64,
        dt_integration: f64,
    ) -> Result<GraphSimulation<M>, EpiError> {
        if dt <= 0.0 {
            return Err(EpiError::InvalidValue(format!(
                "graph step size {dt} must be positive"
            )));
        }
        let (nodes, edges) = graph.into_parts();

        let mut sim_nodes = Vec::with_capacity(nodes.len());
        for node in nodes {
            node.property.check_constraints()?;
            let interval = node.property.dynamic_npis().interval().days();
            sim_nodes.push(SimulationNode {
                id: node.id,
                simulation: Simulation::new(node.property, t0, dt_integration)?,
                next_npi_check: t0 + interval,
                npi_active_until: f64::NEG_INFINITY,
            });
        }
        let mut sim_edges = Vec::with_capacity(edges.len());
        for edge in edges {
            edge.property.coefficients.check_constraints()?;
            sim_edges.push(Edge {
                start_node_idx: edge.start_node_idx,
                end_node_idx: edge.end_node_idx,
                property: MobilityEdge {
                    parameters: edge.property,
                    travelling: None,
                },
            });
        }
        Ok(GraphSimulation {
            nodes: sim_nodes,
            edges: sim_edges,
            t: t0,
            dt,
            end_dynamic_npis: f64::INFINITY,
        })
    }

    /// No dynamic NPIs are introduced at or after this time.
    pub fn set_end_dynamic_npis(&mut self, t: f64) {
        self.end_dynamic_npis = t;
    }

    #[must_use]
    pub fn nodes(&self) -> &[SimulationNode<M>] {
        &self.nodes
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.t
    }

    /// Advances the coupled system to `tmax`.
    pub fn advance(&mut self, tmax: f64) -> Result<(), EpiError> {
        while self.t + 1e-12 < tmax {
            let stop = (self.t + self.dt).min(tmax);

            for node in &mut self.nodes {
                node.simulation.advance(stop)?;
            }

            self.apply_returns(stop);
            self.apply_exchanges(stop);

            if stop < self.end_dynamic_npis {
                self.evaluate_dynamic_npis(stop);
            }

            self.t = stop;
        }
        Ok(())
    }

    /// Reinserts every travelling block that has completed its visit: the
    /// block is evolved with the destination's current per-capita flows over
    /// the visit duration, rescaled so its per-age-group totals are
    /// unchanged, and moved back to the source node.
    fn apply_returns(&mut self, stop: f64) {
        for edge_idx in 0..self.edges.len() {
            let Some(block) = self.edges[edge_idx].property.travelling.take() else {
                continue;
            };
            let (u, v) = (
                self.edges[edge_idx].start_node_idx,
                self.edges[edge_idx].end_node_idx,
            );
            let visit = stop - block.departed;

            let y_v = self.nodes[v].simulation.state().clone();
            let model = self.nodes[v].simulation.model();
            let mut dydt = DVector::zeros(y_v.len());
            model.rhs(stop, &y_v, &mut dydt);

            let mut evolved = block.amounts.clone();
            for i in 0..evolved.len() {
                if y_v[i] > 1e-12 {
                    evolved[i] += visit * dydt[i] * block.amounts[i] / y_v[i];
                }
                if evolved[i] < 0.0 {
                    evolved[i] = 0.0;
                }
            }

            // Visiting changes infection states, never head counts: rescale
            // each age group back to the totals that departed.
            let states_per_group = model.num_compartments() / model.num_groups();
            for a in 0..model.num_groups() {
                let range = a * states_per_group..(a + 1) * states_per_group;
                let total_old: f64 = block.amounts.as_slice()[range.clone()].iter().sum();
                let total_new: f64 = evolved.as_slice()[range.clone()].iter().sum();
                if total_new > 1e-300 {
                    let scale = total_old / total_new;
                    for i in range {
                        evolved[i] *= scale;
                    }
                } else if total_old > 0.0 {
                    for i in range {
                        evolved[i] = block.amounts[i];
                    }
                }
            }

            let new_v = self.nodes[v].simulation.state() - &evolved;
            self.nodes[v].simulation.set_state(new_v);
            let new_u = self.nodes[u].simulation.state() + &evolved;
            self.nodes[u].simulation.set_state(new_u);
        }
    }

    /// Sends a fraction of each migrating compartment along every edge, in
    /// edge insertion order.
    fn apply_exchanges(&mut self, stop: f64) {
        for edge_idx in 0..self.edges.len() {
            let (u, v) = (
                self.edges[edge_idx].start_node_idx,
                self.edges[edge_idx].end_node_idx,
            );
            let y_u = self.nodes[u].simulation.state().clone();
            let rates = self.edges[edge_idx]
                .property
                .parameters
                .coefficients
                .effective_total(SimulationTime(stop));
            let mask = self.nodes[u].simulation.model().migrating_mask();

            let mut amounts = DVector::zeros(y_u.len());
            let mut moved = 0.0;
            for i in 0..y_u.len() {
                let fraction = (rates[i] * self.dt).min(1.0);
                amounts[i] = fraction * y_u[i].max(0.0) * mask[i];
                moved += amounts[i];
            }
            if moved <= 0.0 {
                continue;
            }

            let new_u = &y_u - &amounts;
            self.nodes[u].simulation.set_state(new_u);
            let new_v = self.nodes[v].simulation.state() + &amounts;
            self.nodes[v].simulation.set_state(new_v);
            self.edges[edge_idx].property.travelling = Some(TravellingBlock {
                amounts,
                departed: stop,
            });
        }
    }

    /// Evaluates each node's dynamic NPIs on the post-exchange state. The
    /// indicator is the number of new symptomatic cases in the trailing week
    /// scaled to the NPIs' base value of node population.
    fn evaluate_dynamic_npis(&mut self, stop: f64) {
        for node_idx in 0..self.nodes.len() {
            let npis = self.nodes[node_idx].simulation.model().dynamic_npis().clone();
            if npis.is_empty() {
                continue;
            }
            if stop + 1e-12 < self.nodes[node_idx].next_npi_check {
                continue;
            }
            while self.nodes[node_idx].next_npi_check <= stop + 1e-12 {
                self.nodes[node_idx].next_npi_check += npis.interval().days();
            }

            let node = &self.nodes[node_idx];
            let population = node.simulation.model().total_population();
            if population <= 0.0 {
                continue;
            }
            let cases = node.simulation.symptomatic_cases_in_window(INCIDENCE_WINDOW);
            let indicator = cases / population * npis.base_value();

            let Some((_, dampings)) = npis.get_max_exceeded_threshold(indicator) else {
                continue;
            };
            // An activation suppresses re-triggering until it has expired.
            if self.nodes[node_idx].npi_active_until >= stop {
                continue;
            }
            let expiry = stop + npis.duration().days();

            for sampling in dampings {
                let value = sampling.value.value();
                let on = sampling.make_damping(SimulationTime(stop), value);
                let off = sampling.make_damping(SimulationTime(expiry), 0.0);
                let contacts = self.nodes[node_idx]
                    .simulation
                    .model_mut()
                    .contact_patterns_mut();
                contacts
                    .contact_matrices
                    .add_damping(&sampling.matrix_indices, &on);
                contacts
                    .contact_matrices
                    .add_damping(&sampling.matrix_indices, &off);

                // Contact dampings affect mobility symmetrically.
                for edge in &mut self.edges {
                    if edge.start_node_idx != node_idx {
                        continue;
                    }
                    for &location in &sampling.matrix_indices {
                        let coeffs = edge.property.parameters.coefficients.get_mut(location);
                        coeffs.add_damping(VectorDamping {
                            factor: value,
                            level: sampling.level,
                            damping_type: sampling.damping_type,
                            time: SimulationTime(stop),
                        });
                        coeffs.add_damping(VectorDamping {
                            factor: 0.0,
                            level: sampling.level,
                            damping_type: sampling.damping_type,
                            time: SimulationTime(expiry),
                        });
                    }
                }
            }
            self.nodes[node_idx].npi_active_until = expiry;
        }
    }
}
