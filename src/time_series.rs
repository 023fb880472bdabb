//! Dense simulation output: a sequence of time points with one value vector
//! per point.

use crate::error::EpiError;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    num_elements: usize,
    times: Vec<f64>,
    values: Vec<DVector<f64>>,
}

impl TimeSeries {
    #[must_use]
    pub fn new(num_elements: usize) -> TimeSeries {
        TimeSeries {
            num_elements,
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    #[must_use]
    pub fn num_time_points(&self) -> usize {
        self.times.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Appends a time point. Times must be non-decreasing.
    pub fn add_time_point(&mut self, t: f64, value: DVector<f64>) -> Result<(), EpiError> {
        if value.len() != self.num_elements {
            return Err(EpiError::DimensionMismatch(format!(
                "value has {} elements, time series has {}",
                value.len(),
                self.num_elements
            )));
        }
        if let Some(&last) = self.times.last() {
            if t < last {
                return Err(EpiError::InvalidValue(format!(
                    "time {t} is before the last time point {last}"
                )));
            }
        }
        self.times.push(t);
        self.values.push(value);
        Ok(())
    }

    #[must_use]
    pub fn get_time(&self, i: usize) -> f64 {
        self.times[i]
    }

    #[must_use]
    pub fn get_value(&self, i: usize) -> &DVector<f64> {
        &self.values[i]
    }

    #[must_use]
    pub fn get_last_time(&self) -> f64 {
        *self.times.last().expect("empty time series")
    }

    #[must_use]
    pub fn get_last_value(&self) -> &DVector<f64> {
        self.values.last().expect("empty time series")
    }

    pub fn get_last_value_mut(&mut self) -> &mut DVector<f64> {
        self.values.last_mut().expect("empty time series")
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &DVector<f64>)> {
        self.times.iter().copied().zip(self.values.iter())
    }

    /// Linear interpolation at time `t`, which must lie within the covered
    /// range.
    pub fn interpolate(&self, t: f64) -> Result<DVector<f64>, EpiError> {
        if self.is_empty() {
            return Err(EpiError::InvalidValue(
                "cannot interpolate an empty time series".to_string(),
            ));
        }
        let first = self.times[0];
        let last = self.get_last_time();
        if t < first || t > last {
            return Err(EpiError::InvalidValue(format!(
                "time {t} outside of range [{first}, {last}]"
            )));
        }
        let hi = self.times.partition_point(|&x| x < t);
        if hi == 0 {
            return Ok(self.values[0].clone());
        }
        let lo = hi - 1;
        let (t0, t1) = (self.times[lo], self.times[hi.min(self.times.len() - 1)]);
        if t1 == t0 {
            return Ok(self.values[lo].clone());
        }
        let w = (t - t0) / (t1 - t0);
        Ok(&self.values[lo] * (1.0 - w) + &self.values[hi] * w)
    }

    /// Resamples the series at integer days covering its range, linearly
    /// interpolated. Ensemble outputs are stored at this resolution.
    pub fn interpolate_to_days(&self) -> Result<TimeSeries, EpiError> {
        if self.is_empty() {
            return Err(EpiError::InvalidValue(
                "cannot interpolate an empty time series".to_string(),
            ));
        }
        let mut result = TimeSeries::new(self.num_elements);
        let first_day = self.times[0].ceil() as i64;
        let last_day = self.get_last_time().floor() as i64;
        for day in first_day..=last_day {
            let t = day as f64;
            result.add_time_point(t, self.interpolate(t)?)?;
        }
        Ok(result)
    }
}
