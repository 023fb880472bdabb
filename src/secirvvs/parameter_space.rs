//! Sampling of layered-model graphs for the parameter study.

use crate::error::EpiError;
use crate::graph::{Graph, MobilityParameters};
use crate::secirvvs::Model;
use crate::simulation::EpiModel;
use rand::rngs::StdRng;

/// Produces an independent parameter sample of the whole graph; see
/// [`crate::secir::draw_sample_graph`].
pub fn draw_sample_graph(
    graph: &Graph<Model, MobilityParameters>,
    rng: &mut StdRng,
) -> Result<Graph<Model, MobilityParameters>, EpiError> {
    let mut sampled = graph.clone();
    for node in sampled.nodes_mut() {
        node.property.draw_sample(rng)?;
    }
    Ok(sampled)
}
