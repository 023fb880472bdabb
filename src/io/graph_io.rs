//! Persistence of parameter graphs: one JSON file per node plus a topology
//! file listing the edges with their mobility coefficients. `read_graph` is
//! the bit-faithful inverse of `write_graph`.

use crate::error::EpiError;
use crate::graph::{Graph, MobilityParameters};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Serialize, Deserialize)]
struct NodeFile<M> {
    id: i32,
    model: M,
}

#[derive(Serialize, Deserialize)]
struct EdgeFile {
    start_node_idx: usize,
    end_node_idx: usize,
    coefficients: MobilityParameters,
}

/// Writes the graph to `dir`: `nodes/node_<idx>.json` per node and
/// `edges.json` for the topology.
pub fn write_graph<M: Serialize>(
    graph: &Graph<M, MobilityParameters>,
    dir: &Path,
) -> Result<(), EpiError> {
    let nodes_dir = dir.join("nodes");
    fs::create_dir_all(&nodes_dir)?;

    for (idx, node) in graph.nodes().iter().enumerate() {
        let file = fs::File::create(nodes_dir.join(format!("node_{idx}.json")))?;
        serde_json::to_writer_pretty(
            file,
            &NodeFile {
                id: node.id,
                model: &node.property,
            },
        )?;
    }

    let edges: Vec<EdgeFile> = graph
        .edges()
        .iter()
        .map(|edge| EdgeFile {
            start_node_idx: edge.start_node_idx,
            end_node_idx: edge.end_node_idx,
            coefficients: edge.property.clone(),
        })
        .collect();
    let file = fs::File::create(dir.join("edges.json"))?;
    serde_json::to_writer_pretty(file, &edges)?;
    Ok(())
}

/// Reads a graph previously written by [`write_graph`].
pub fn read_graph<M: DeserializeOwned>(
    dir: &Path,
) -> Result<Graph<M, MobilityParameters>, EpiError> {
    let mut graph = Graph::new();

    let nodes_dir = dir.join("nodes");
    let mut idx = 0;
    loop {
        let path = nodes_dir.join(format!("node_{idx}.json"));
        if !path.exists() {
            break;
        }
        let content = fs::read_to_string(&path)?;
        let node: NodeFile<M> = serde_json::from_str(&content)?;
        graph.add_node(node.id, node.model);
        idx += 1;
    }
    if idx == 0 {
        return Err(EpiError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no node files in {}", nodes_dir.display()),
        )));
    }

    let content = fs::read_to_string(dir.join("edges.json"))?;
    let edges: Vec<EdgeFile> = serde_json::from_str(&content)?;
    for edge in edges {
        graph.add_edge(edge.start_node_idx, edge.end_node_idx, edge.coefficients)?;
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age::AgeGroup;
    use crate::secir::{InfectionState, Model, ParameterKey};
    use crate::uncertain::assign_uniform_distribution;
    use tempfile::tempdir;

    fn sample_graph() -> Graph<Model, MobilityParameters> {
        let mut model_a = Model::new(2);
        assign_uniform_distribution(
            model_a
                .parameters
                .get_mut(ParameterKey::TransmissionProbabilityOnContact, AgeGroup(0)),
            0.05,
            0.1,
        );
        model_a
            .populations
            .set(&[0, InfectionState::Exposed.index()], 25.0)
            .unwrap();
        model_a
            .populations
            .set_difference_from_group_total(&[0, InfectionState::Susceptible.index()], 0, 9000.0)
            .unwrap();
        let model_b = Model::new(2);

        let mut graph = Graph::new();
        let a = graph.add_node(1001, model_a);
        let b = graph.add_node(1002, model_b);
        let mut mobility = MobilityParameters::new(4, 16);
        mobility.coefficients.get_mut(2).baseline_mut()[3] = 0.004;
        graph.add_edge(a, b, mobility).unwrap();
        graph
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let graph = sample_graph();
        write_graph(&graph, dir.path()).unwrap();
        let loaded: Graph<Model, MobilityParameters> = read_graph(dir.path()).unwrap();

        assert_eq!(loaded.nodes().len(), graph.nodes().len());
        assert_eq!(loaded.edges().len(), graph.edges().len());
        assert_eq!(loaded.nodes()[0].id, 1001);
        // Parameter values, distributions, populations and coefficients all
        // survive the round trip.
        assert_eq!(loaded.nodes()[0].property, graph.nodes()[0].property);
        assert_eq!(loaded.nodes()[1].property, graph.nodes()[1].property);
        assert_eq!(loaded.edges()[0].property, graph.edges()[0].property);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nothing_here");
        assert!(matches!(
            read_graph::<Model>(&missing),
            Err(EpiError::IoError(_))
        ));
    }
}
