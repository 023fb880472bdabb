//! Sampling of graphs for the parameter study.

use crate::error::EpiError;
use crate::graph::{Graph, MobilityParameters};
use crate::secir::Model;
use crate::simulation::EpiModel;
use rand::rngs::StdRng;

/// Produces an independent parameter sample of the whole graph: every
/// uncertain value of every node is redrawn and constraints are re-applied.
/// Edge mobility is structural and stays fixed.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age::AgeGroup;
    use crate::random::rng_for_run;
    use crate::secir::ParameterKey;
    use crate::uncertain::assign_uniform_distribution;

    fn graph_with_uncertain_transmission() -> Graph<Model, MobilityParameters> {
        let mut model = Model::new(1);
        assign_uniform_distribution(
            model
                .parameters
                .get_mut(ParameterKey::TransmissionProbabilityOnContact, AgeGroup(0)),
            0.05,
            0.1,
        );
        let mut graph = Graph::new();
        graph.add_node(1, model);
        graph
    }

    #[test]
    fn sampling_redraws_within_bounds_and_keeps_template() {
        let graph = graph_with_uncertain_transmission();
        let before = graph.nodes()[0]
            .property
            .parameters
            .get(ParameterKey::TransmissionProbabilityOnContact, AgeGroup(0));
        let mut rng = rng_for_run(11, 0);
        let sampled = draw_sample_graph(&graph, &mut rng).unwrap();
        let after = sampled.nodes()[0]
            .property
            .parameters
            .get(ParameterKey::TransmissionProbabilityOnContact, AgeGroup(0));
        assert!((0.05..=0.1).contains(&after));
        // The template graph is untouched.
        let template = graph.nodes()[0]
            .property
            .parameters
            .get(ParameterKey::TransmissionProbabilityOnContact, AgeGroup(0));
        assert_eq!(template, before);
    }

    #[test]
    fn sampling_is_deterministic_per_stream() {
        let graph = graph_with_uncertain_transmission();
        let a = draw_sample_graph(&graph, &mut rng_for_run(11, 4)).unwrap();
        let b = draw_sample_graph(&graph, &mut rng_for_run(11, 4)).unwrap();
        let get = |g: &Graph<Model, MobilityParameters>| {
            g.nodes()[0]
                .property
                .parameters
                .get(ParameterKey::TransmissionProbabilityOnContact, AgeGroup(0))
        };
        assert_eq!(get(&a), get(&b));
    }
}
