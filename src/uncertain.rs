//! Scalar values with attached sampling distributions for Monte Carlo
//! parameter studies.

use crate::error::EpiError;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A sampling distribution for one uncertain parameter.
///
/// `Normal` draws are truncated to `[lower, upper]` by redrawing; after a
/// bounded number of rejected draws the value is clamped. A queue of
/// predefined samples can be attached for regression testing and replays;
/// predefined samples are consumed before any fresh draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ParameterDistribution {
    Uniform {
        lower: f64,
        upper: f64,
        #[serde(skip)]
        predefined: VecDeque<f64>,
    },
    Normal {
        lower: f64,
        upper: f64,
        mean: f64,
        std_dev: f64,
        #[serde(skip)]
        predefined: VecDeque<f64>,
    },
}

impl ParameterDistribution {
    #[must_use]
    pub fn uniform(lower: f64, upper: f64) -> ParameterDistribution {
        ParameterDistribution::Uniform {
            lower,
            upper,
            predefined: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn normal(lower: f64, upper: f64, mean: f64, std_dev: f64) -> ParameterDistribution {
        ParameterDistribution::Normal {
            lower,
            upper,
            mean,
            std_dev,
            predefined: VecDeque::new(),
        }
    }

    /// Queues a sample that will be returned by the next call to
    /// [`ParameterDistribution::get_sample`] instead of a fresh draw.
    pub fn add_predefined_sample(&mut self, sample: f64) {
        match self {
            ParameterDistribution::Uniform { predefined, .. }
            | ParameterDistribution::Normal { predefined, .. } => predefined.push_back(sample),
        }
    }

    /// Returns the next predefined sample if any, otherwise draws from the
    /// distribution.
    pub fn get_sample(&mut self, rng: &mut StdRng) -> Result<f64, EpiError> {
        match self {
            ParameterDistribution::Uniform {
                lower,
                upper,
                predefined,
            } => {
                if let Some(sample) = predefined.pop_front() {
                    return Ok(sample);
                }
                if !(lower.is_finite() && upper.is_finite()) || lower > upper {
                    return Err(EpiError::SamplingError(format!(
                        "invalid uniform bounds [{lower}, {upper}]"
                    )));
                }
                if lower == upper {
                    return Ok(*lower);
                }
                Ok(rng.gen_range(*lower..=*upper))
            }
            ParameterDistribution::Normal {
                lower,
                upper,
                mean,
                std_dev,
                predefined,
            } => {
                if let Some(sample) = predefined.pop_front() {
                    return Ok(sample);
                }
                let normal = Normal::new(*mean, *std_dev).map_err(|e| {
                    EpiError::SamplingError(format!("invalid normal parameters: {e}"))
                })?;
                // Truncate by redrawing; clamp if the interval is in the far
                // tail and nothing lands inside it.
                for _ in 0..64 {
                    let draw = normal.sample(rng);
                    if draw.is_nan() {
                        return Err(EpiError::SamplingError(
                            "normal distribution produced NaN".to_string(),
                        ));
                    }
                    if draw >= *lower && draw <= *upper {
                        return Ok(draw);
                    }
                }
                let clamped = mean.clamp(*lower, *upper);
                if clamped.is_nan() {
                    return Err(EpiError::SamplingError(
                        "normal distribution produced NaN".to_string(),
                    ));
                }
                Ok(clamped)
            }
        }
    }
}

/// A scalar plus an optional distribution. The scalar is what the model
/// reads; `draw_sample` replaces it with a fresh draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UncertainValue {
    value: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    distribution: Option<ParameterDistribution>,
}

impl UncertainValue {
    #[must_use]
    pub fn new(value: f64) -> UncertainValue {
        UncertainValue {
            value,
            distribution: None,
        }
    }

    #[must_use]
    pub fn with_distribution(value: f64, distribution: ParameterDistribution) -> UncertainValue {
        UncertainValue {
            value,
            distribution: Some(distribution),
        }
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn set_distribution(&mut self, distribution: ParameterDistribution) {
        self.distribution = Some(distribution);
    }

    #[must_use]
    pub fn distribution(&self) -> Option<&ParameterDistribution> {
        self.distribution.as_ref()
    }

    /// Replaces the value with a draw from the distribution, if one is set.
    /// Returns the (possibly unchanged) value.
    pub fn draw_sample(&mut self, rng: &mut StdRng) -> Result<f64, EpiError> {
        if let Some(distribution) = self.distribution.as_mut() {
            self.value = distribution.get_sample(rng)?;
        }
        Ok(self.value)
    }
}

impl From<f64> for UncertainValue {
    fn from(value: f64) -> Self {
        UncertainValue::new(value)
    }
}

/// Sets value and distribution in the convention of the scenario drivers:
/// the midpoint of `[min, max]` as the value and `Uniform(min, max)` as the
/// distribution.
pub fn assign_uniform_distribution(p: &mut UncertainValue, min: f64, max: f64) {
    p.set_value(0.5 * (min + max));
    p.set_distribution(ParameterDistribution::uniform(min, max));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_for_run;

    #[test]
    fn uniform_sample_within_bounds() {
        let mut dist = ParameterDistribution::uniform(2.0, 3.0);
        let mut rng = rng_for_run(0, 0);
        for _ in 0..100 {
            let s = dist.get_sample(&mut rng).unwrap();
            assert!((2.0..=3.0).contains(&s));
        }
    }

    #[test]
    fn predefined_samples_take_precedence() {
        let mut dist = ParameterDistribution::uniform(0.0, 1.0);
        dist.add_predefined_sample(17.0);
        dist.add_predefined_sample(18.0);
        let mut rng = rng_for_run(0, 0);
        assert_eq!(dist.get_sample(&mut rng).unwrap(), 17.0);
        assert_eq!(dist.get_sample(&mut rng).unwrap(), 18.0);
        let fresh = dist.get_sample(&mut rng).unwrap();
        assert!((0.0..=1.0).contains(&fresh));
    }

    #[test]
    fn normal_sample_truncated() {
        let mut dist = ParameterDistribution::normal(0.0, 1.0, 0.5, 10.0);
        let mut rng = rng_for_run(1, 0);
        for _ in 0..100 {
            let s = dist.get_sample(&mut rng).unwrap();
            assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn invalid_normal_is_sampling_error() {
        let mut dist = ParameterDistribution::normal(0.0, 1.0, 0.5, -1.0);
        let mut rng = rng_for_run(1, 0);
        assert!(matches!(
            dist.get_sample(&mut rng),
            Err(EpiError::SamplingError(_))
        ));
    }

    #[test]
    fn draw_sample_replaces_value() {
        let mut v =
            UncertainValue::with_distribution(0.5, ParameterDistribution::uniform(10.0, 11.0));
        let mut rng = rng_for_run(2, 0);
        let drawn = v.draw_sample(&mut rng).unwrap();
        assert_eq!(drawn, v.value());
        assert!((10.0..=11.0).contains(&drawn));
    }

    #[test]
    fn value_without_distribution_is_stable() {
        let mut v = UncertainValue::new(4.2);
        let mut rng = rng_for_run(2, 0);
        assert_eq!(v.draw_sample(&mut rng).unwrap(), 4.2);
    }

    #[test]
    fn distribution_serializes_with_tag_and_bounds() {
        let dist = ParameterDistribution::uniform(1.0, 2.0);
        let json = serde_json::to_string(&dist).unwrap();
        assert!(json.contains("Uniform"));
        let back: ParameterDistribution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dist);
    }
}
