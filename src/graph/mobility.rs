//! Mobility coefficients of one graph edge.
//!
//! The coefficients have one vector per contact location with the same flat
//! compartment enumeration as the node populations, so the NPIs that damp a
//! contact location damp the corresponding mobility symmetrically (more home
//! office means fewer commuters).

use crate::contact::{DampingLevel, DampingType};
use crate::error::EpiError;
use crate::time::SimulationTime;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// A damping on a coefficient vector, applied uniformly to all compartments.
/// Same replacement semantics as contact dampings: within one
/// `(level, type)` the latest activation wins, distinct pairs add up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDamping {
    pub factor: f64,
    pub level: DampingLevel,
    pub damping_type: DampingType,
    pub time: SimulationTime,
}

/// Per-day travel rates of one contact location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityCoefficients {
    baseline: DVector<f64>,
    dampings: Vec<VectorDamping>,
}

impl MobilityCoefficients {
    #[must_use]
    pub fn new(num_compartments: usize) -> MobilityCoefficients {
        MobilityCoefficients {
            baseline: DVector::zeros(num_compartments),
            dampings: Vec::new(),
        }
    }

    #[must_use]
    pub fn baseline(&self) -> &DVector<f64> {
        &self.baseline
    }

    pub fn baseline_mut(&mut self) -> &mut DVector<f64> {
        &mut self.baseline
    }

    /// Checks that all coefficients are rates in `[0, 1]`.
    pub fn check_constraints(&self) -> Result<(), EpiError> {
        for v in self.baseline.iter() {
            if !(0.0..=1.0).contains(v) {
                return Err(EpiError::ConstraintViolation(format!(
                    "mobility coefficient {v} outside of [0, 1]"
                )));
            }
        }
        Ok(())
    }

    pub fn add_damping(&mut self, damping: VectorDamping) {
        self.dampings.push(damping);
    }

    pub fn clear_dampings(&mut self) {
        self.dampings.clear();
    }

    /// The effective coefficients at `t`: the baseline reduced by all active
    /// dampings, never negative.
    #[must_use]
    pub fn effective(&self, t: SimulationTime) -> DVector<f64> {
        let mut chosen: Vec<(DampingLevel, DampingType, &VectorDamping)> = Vec::new();
        for damping in &self.dampings {
            if damping.time > t {
                continue;
            }
            match chosen
                .iter_mut()
                .find(|(level, ty, _)| *level == damping.level && *ty == damping.damping_type)
            {
                Some(entry) => {
                    if damping.time >= entry.2.time {
                        entry.2 = damping;
                    }
                }
                None => chosen.push((damping.level, damping.damping_type, damping)),
            }
        }
        let reduction: f64 = chosen.iter().map(|(_, _, d)| d.factor).sum();
        let factor = (1.0 - reduction).clamp(0.0, 1.0);
        &self.baseline * factor
    }
}

/// The coefficient vectors of all contact locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityCoefficientGroup {
    coefficients: Vec<MobilityCoefficients>,
}

impl MobilityCoefficientGroup {
    #[must_use]
    pub fn new(num_locations: usize, num_compartments: usize) -> MobilityCoefficientGroup {
        MobilityCoefficientGroup {
            coefficients: (0..num_locations)
                .map(|_| MobilityCoefficients::new(num_compartments))
                .collect(),
        }
    }

    #[must_use]
    pub fn num_locations(&self) -> usize {
        self.coefficients.len()
    }

    #[must_use]
    pub fn get(&self, location: usize) -> &MobilityCoefficients {
        &self.coefficients[location]
    }

    pub fn get_mut(&mut self, location: usize) -> &mut MobilityCoefficients {
        &mut self.coefficients[location]
    }

    pub fn check_constraints(&self) -> Result<(), EpiError> {
        for coeffs in &self.coefficients {
            coeffs.check_constraints()?;
        }
        Ok(())
    }

    /// Sum of the effective coefficients over all locations at `t`.
    #[must_use]
    pub fn effective_total(&self, t: SimulationTime) -> DVector<f64> {
        let mut total = self.coefficients[0].effective(t);
        for coeffs in &self.coefficients[1..] {
            total += coeffs.effective(t);
        }
        total
    }

    /// Largest baseline coefficient, for edge thresholding.
    #[must_use]
    pub fn max_baseline(&self) -> f64 {
        self.coefficients
            .iter()
            .flat_map(|c| c.baseline.iter().copied())
            .fold(0.0, f64::max)
    }
}

/// The static mobility description of one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityParameters {
    pub coefficients: MobilityCoefficientGroup,
}

impl MobilityParameters {
    #[must_use]
    pub fn new(num_locations: usize, num_compartments: usize) -> MobilityParameters {
        MobilityParameters {
            coefficients: MobilityCoefficientGroup::new(num_locations, num_compartments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_applies_damping_step() {
        let mut coeffs = MobilityCoefficients::new(2);
        coeffs.baseline_mut()[0] = 0.4;
        coeffs.baseline_mut()[1] = 0.2;
        coeffs.add_damping(VectorDamping {
            factor: 0.5,
            level: DampingLevel(0),
            damping_type: DampingType(0),
            time: SimulationTime(3.0),
        });
        assert_eq!(coeffs.effective(SimulationTime(2.0))[0], 0.4);
        assert_eq!(coeffs.effective(SimulationTime(3.0))[0], 0.2);
        assert_eq!(coeffs.effective(SimulationTime(3.0))[1], 0.1);
    }

    #[test]
    fn reduction_saturates_at_zero() {
        let mut coeffs = MobilityCoefficients::new(1);
        coeffs.baseline_mut()[0] = 0.4;
        for ty in 0..3 {
            coeffs.add_damping(VectorDamping {
                factor: 0.5,
                level: DampingLevel(0),
                damping_type: DampingType(ty),
                time: SimulationTime(0.0),
            });
        }
        assert_eq!(coeffs.effective(SimulationTime(1.0))[0], 0.0);
    }

    #[test]
    fn constraints_reject_rates_above_one() {
        let mut coeffs = MobilityCoefficients::new(1);
        coeffs.baseline_mut()[0] = 1.5;
        assert!(coeffs.check_constraints().is_err());
        coeffs.baseline_mut()[0] = 1.0;
        assert!(coeffs.check_constraints().is_ok());
    }
}
