//! Parameters of the layered SECIR model: the base SECIR parameters plus the
//! immunity reduction factors and the daily vaccination counts.

use crate::age::AgeGroup;
use crate::error::EpiError;
use crate::secir;
use crate::uncertain::UncertainValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys of the layer-specific parameters; all are per age group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum VvsParameterKey {
    /// Remaining relative risk of infection with partial immunity, in [0, 1].
    ReducExposedPartialImmunity,
    ReducExposedImprovedImmunity,
    /// Remaining relative risk of symptoms given infection.
    ReducInfectedSymptomsPartialImmunity,
    ReducInfectedSymptomsImprovedImmunity,
    /// Remaining relative risk of a severe, critical or fatal course given
    /// symptoms.
    ReducInfectedSevereCriticalDeadPartialImmunity,
    ReducInfectedSevereCriticalDeadImprovedImmunity,
    /// Factor on the mild infection stage durations of immunized layers, in
    /// (0, 1].
    ReducTimeInfectedMild,
    /// First vaccinations administered per day.
    DailyFirstVaccination,
    /// Second (full) vaccinations administered per day.
    DailyFullVaccination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub base: secir::Parameters,
    values: BTreeMap<VvsParameterKey, Vec<UncertainValue>>,
}

impl Parameters {
    #[must_use]
    pub fn new(num_groups: usize) -> Parameters {
        use VvsParameterKey::*;
        let per_age = |v: f64| vec![UncertainValue::new(v); num_groups];
        let mut values = BTreeMap::new();
        values.insert(ReducExposedPartialImmunity, per_age(1.0));
        values.insert(ReducExposedImprovedImmunity, per_age(1.0));
        values.insert(ReducInfectedSymptomsPartialImmunity, per_age(1.0));
        values.insert(ReducInfectedSymptomsImprovedImmunity, per_age(1.0));
        values.insert(ReducInfectedSevereCriticalDeadPartialImmunity, per_age(1.0));
        values.insert(ReducInfectedSevereCriticalDeadImprovedImmunity, per_age(1.0));
        values.insert(ReducTimeInfectedMild, per_age(1.0));
        values.insert(DailyFirstVaccination, per_age(0.0));
        values.insert(DailyFullVaccination, per_age(0.0));
        Parameters {
            base: secir::Parameters::new(num_groups),
            values,
        }
    }

    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.base.num_groups()
    }

    #[must_use]
    pub fn get(&self, key: VvsParameterKey, group: AgeGroup) -> f64 {
        self.values[&key][group.index()].value()
    }

    pub fn get_mut(&mut self, key: VvsParameterKey, group: AgeGroup) -> &mut UncertainValue {
        &mut self.values.get_mut(&key).unwrap()[group.index()]
    }

    /// Resamples all layer parameters and the base parameters.
    pub fn draw_sample(&mut self, rng: &mut rand::rngs::StdRng) -> Result<(), EpiError> {
        self.base.draw_sample(rng)?;
        for values in self.values.values_mut() {
            for v in values {
                v.draw_sample(rng)?;
            }
        }
        self.apply_constraints();
        Ok(())
    }

    pub fn apply_constraints(&mut self) {
        use VvsParameterKey::*;
        self.base.apply_constraints();
        for i in 0..self.num_groups() {
            for key in [
                ReducExposedPartialImmunity,
                ReducExposedImprovedImmunity,
                ReducInfectedSymptomsPartialImmunity,
                ReducInfectedSymptomsImprovedImmunity,
                ReducInfectedSevereCriticalDeadPartialImmunity,
                ReducInfectedSevereCriticalDeadImprovedImmunity,
            ] {
                let v = &mut self.values.get_mut(&key).unwrap()[i];
                let x = v.value();
                if !(0.0..=1.0).contains(&x) {
                    let new = x.clamp(0.0, 1.0);
                    log::warn!(
                        "Constraint check: parameter {key:?}[{i}] changed from {x:.4} to {new:.4}"
                    );
                    v.set_value(new);
                }
            }
            let v = &mut self.values.get_mut(&ReducTimeInfectedMild).unwrap()[i];
            let x = v.value();
            if x <= 0.0 || x > 1.0 {
                log::warn!(
                    "Constraint check: parameter ReducTimeInfectedMild[{i}] changed from {x:.4} to 1.0"
                );
                v.set_value(1.0);
            }
            for key in [DailyFirstVaccination, DailyFullVaccination] {
                let v = &mut self.values.get_mut(&key).unwrap()[i];
                if v.value() < 0.0 {
                    log::warn!(
                        "Constraint check: parameter {key:?}[{i}] changed from {:.4} to 0",
                        v.value()
                    );
                    v.set_value(0.0);
                }
            }
        }
    }

    pub fn check_constraints(&self) -> Result<(), EpiError> {
        use VvsParameterKey::*;
        self.base.check_constraints()?;
        for i in 0..self.num_groups() {
            let age = AgeGroup(i);
            for key in [
                ReducExposedPartialImmunity,
                ReducExposedImprovedImmunity,
                ReducInfectedSymptomsPartialImmunity,
                ReducInfectedSymptomsImprovedImmunity,
                ReducInfectedSevereCriticalDeadPartialImmunity,
                ReducInfectedSevereCriticalDeadImprovedImmunity,
            ] {
                let x = self.get(key, age);
                if !(0.0..=1.0).contains(&x) {
                    return Err(EpiError::ConstraintViolation(format!(
                        "parameter {key:?}[{i}] = {x} outside of [0, 1]"
                    )));
                }
            }
            let x = self.get(ReducTimeInfectedMild, age);
            if x <= 0.0 || x > 1.0 {
                return Err(EpiError::ConstraintViolation(format!(
                    "parameter ReducTimeInfectedMild[{i}] = {x} outside of (0, 1]"
                )));
            }
            for key in [DailyFirstVaccination, DailyFullVaccination] {
                let x = self.get(key, age);
                if x < 0.0 {
                    return Err(EpiError::ConstraintViolation(format!(
                        "parameter {key:?}[{i}] = {x} must be >= 0"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = Parameters::new(6);
        assert!(params.check_constraints().is_ok());
    }

    #[test]
    fn reduction_factors_are_clamped() {
        let mut params = Parameters::new(1);
        params
            .get_mut(VvsParameterKey::ReducExposedPartialImmunity, AgeGroup(0))
            .set_value(1.4);
        params
            .get_mut(VvsParameterKey::ReducTimeInfectedMild, AgeGroup(0))
            .set_value(0.0);
        assert!(params.check_constraints().is_err());
        params.apply_constraints();
        assert_eq!(
            params.get(VvsParameterKey::ReducExposedPartialImmunity, AgeGroup(0)),
            1.0
        );
        assert_eq!(params.get(VvsParameterKey::ReducTimeInfectedMild, AgeGroup(0)), 1.0);
        assert!(params.check_constraints().is_ok());
    }
}
