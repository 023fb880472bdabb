//! Threshold-triggered non-pharmaceutical interventions.
//!
//! A [`DynamicNPIs`] holds a schedule of thresholds over a monitored
//! indicator (weekly new symptomatic cases scaled to `base_value`). Every
//! `interval` simulation days the graph simulator evaluates the indicator per
//! node; the greatest exceeded threshold selects a vector of damping
//! templates that are instantiated on the node's contact matrices and expire
//! after `duration`.

use crate::contact::DampingSampling;
use crate::error::EpiError;
use crate::time::SimulationTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DynamicNPIs {
    /// Thresholds with their damping vectors, sorted descending by value.
    thresholds: Vec<(f64, Vec<DampingSampling>)>,
    interval: SimulationTime,
    duration: SimulationTime,
    base_value: f64,
}

impl DynamicNPIs {
    #[must_use]
    pub fn new() -> DynamicNPIs {
        DynamicNPIs {
            thresholds: Vec::new(),
            interval: SimulationTime(3.0),
            duration: SimulationTime(14.0),
            base_value: 100_000.0,
        }
    }

    pub fn set_interval(&mut self, interval: SimulationTime) -> Result<(), EpiError> {
        if interval.days() <= 0.0 {
            return Err(EpiError::InvalidValue(format!(
                "dynamic NPI interval {interval} must be positive"
            )));
        }
        self.interval = interval;
        Ok(())
    }

    pub fn set_duration(&mut self, duration: SimulationTime) -> Result<(), EpiError> {
        if duration.days() <= 0.0 {
            return Err(EpiError::InvalidValue(format!(
                "dynamic NPI duration {duration} must be positive"
            )));
        }
        self.duration = duration;
        Ok(())
    }

    pub fn set_base_value(&mut self, base_value: f64) -> Result<(), EpiError> {
        if base_value <= 0.0 {
            return Err(EpiError::InvalidValue(format!(
                "dynamic NPI base value {base_value} must be positive"
            )));
        }
        self.base_value = base_value;
        Ok(())
    }

    /// Adds a threshold with the dampings enacted when it is exceeded.
    pub fn set_threshold(
        &mut self,
        threshold: f64,
        dampings: Vec<DampingSampling>,
    ) -> Result<(), EpiError> {
        if threshold <= 0.0 {
            return Err(EpiError::InvalidValue(format!(
                "dynamic NPI threshold {threshold} must be positive"
            )));
        }
        self.thresholds.push((threshold, dampings));
        self.thresholds
            .sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
        Ok(())
    }

    #[must_use]
    pub fn interval(&self) -> SimulationTime {
        self.interval
    }

    #[must_use]
    pub fn duration(&self) -> SimulationTime {
        self.duration
    }

    #[must_use]
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    #[must_use]
    pub fn thresholds(&self) -> &[(f64, Vec<DampingSampling>)] {
        &self.thresholds
    }

    /// The greatest threshold strictly exceeded by `indicator`, if any.
    #[must_use]
    pub fn get_max_exceeded_threshold(
        &self,
        indicator: f64,
    ) -> Option<&(f64, Vec<DampingSampling>)> {
        self.thresholds.iter().find(|(value, _)| indicator > *value)
    }

    /// Resamples the damping values of every threshold.
    pub fn draw_sample(&mut self, rng: &mut rand::rngs::StdRng) -> Result<(), EpiError> {
        for (_, dampings) in &mut self.thresholds {
            for sampling in dampings {
                sampling.value.draw_sample(rng)?;
            }
        }
        Ok(())
    }
}
