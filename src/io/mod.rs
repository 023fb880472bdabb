//! External interfaces: data ingestion, graph persistence and result
//! output. The core only depends on the [`DataProvider`] and [`ResultSink`]
//! traits; the file-backed implementations make the scenario binary run end
//! to end.

mod data_provider;
mod graph_io;
mod result_io;

pub use data_provider::{
    read_matrix_plain, ContactLocation, DataProvider, FileDataProvider, MatrixVariant,
    MobilityKind, RegionPopulation,
};
pub use graph_io::{read_graph, write_graph};
pub use result_io::{DirectoryResultSink, ResultSink};
