//! Writing ensemble results: per-run time series as CSV and the sampled
//! parameters as JSON.

use crate::error::EpiError;
use crate::study::NodeResult;
use crate::time_series::TimeSeries;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Consumes the results of a parameter study.
pub trait ResultSink<M> {
    /// Stores the per-node results and sampled parameters of one run.
    fn save_result_with_params(
        &self,
        results: &[NodeResult<M>],
        run_idx: usize,
    ) -> Result<(), EpiError>;

    /// Stores the whole ensemble: per-node mean time series, and the single
    /// runs if requested.
    fn save_results(
        &self,
        ensemble: &[Vec<NodeResult<M>>],
        save_single_runs: bool,
    ) -> Result<(), EpiError>;
}

/// Writes results into a directory tree:
///
/// ```text
/// <result_dir>/run_<k>/Results_<node_id>.csv
/// <result_dir>/run_<k>/Parameters_<node_id>.json
/// <result_dir>/Results_mean_<node_id>.csv
/// ```
pub struct DirectoryResultSink {
    result_dir: PathBuf,
}

impl DirectoryResultSink {
    #[must_use]
    pub fn new(result_dir: PathBuf) -> DirectoryResultSink {
        DirectoryResultSink { result_dir }
    }

    fn write_time_series(path: &Path, series: &TimeSeries) -> Result<(), EpiError> {
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec!["time".to_string()];
        header.extend((0..series.num_elements()).map(|i| format!("c{i}")));
        writer.write_record(&header)?;
        for (t, value) in series.iter() {
            let mut record = vec![t.to_string()];
            record.extend(value.iter().map(f64::to_string));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Mean of the node's daily series over all runs. All runs cover the
    /// same days because they are interpolated before sinking.
    fn mean_series<M>(ensemble: &[Vec<NodeResult<M>>], node_idx: usize) -> Option<TimeSeries> {
        let first = &ensemble.first()?[node_idx].result;
        let mut mean = TimeSeries::new(first.num_elements());
        for i in 0..first.num_time_points() {
            let mut value = first.get_value(i).clone();
            for run in &ensemble[1..] {
                value += run[node_idx].result.get_value(i);
            }
            value /= ensemble.len() as f64;
            mean.add_time_point(first.get_time(i), value).ok()?;
        }
        Some(mean)
    }
}

impl<M: Serialize> ResultSink<M> for DirectoryResultSink {
    fn save_result_with_params(
        &self,
        results: &[NodeResult<M>],
        run_idx: usize,
    ) -> Result<(), EpiError> {
        let run_dir = self.result_dir.join(format!("run_{run_idx}"));
        fs::create_dir_all(&run_dir)?;
        for node in results {
            Self::write_time_series(
                &run_dir.join(format!("Results_{}.csv", node.id)),
                &node.result,
            )?;
            let file = fs::File::create(run_dir.join(format!("Parameters_{}.json", node.id)))?;
            serde_json::to_writer_pretty(file, &node.model)?;
        }
        Ok(())
    }

    fn save_results(
        &self,
        ensemble: &[Vec<NodeResult<M>>],
        save_single_runs: bool,
    ) -> Result<(), EpiError> {
        fs::create_dir_all(&self.result_dir)?;
        if save_single_runs {
            for (run_idx, results) in ensemble.iter().enumerate() {
                self.save_result_with_params(results, run_idx)?;
            }
        }
        let num_nodes = ensemble.first().map_or(0, Vec::len);
        for node_idx in 0..num_nodes {
            if let Some(mean) = Self::mean_series(ensemble, node_idx) {
                Self::write_time_series(
                    &self
                        .result_dir
                        .join(format!("Results_mean_{}.csv", ensemble[0][node_idx].id)),
                    &mean,
                )?;
            }
        }
        Ok(())
    }
}
