//! Parameters of the SECIR model.
//!
//! Parameters live in a keyed map from [`ParameterKey`] to [`ParameterValue`]
//! with strongly typed accessors on [`Parameters`]. The map makes sampling
//! and serialization uniform over all parameters; the accessors keep call
//! sites type safe. Every key is present from construction on with its
//! documented default.

use crate::age::AgeGroup;
use crate::contact::{ContactMatrixGroup, UncertainContactMatrix};
use crate::dynamic_npi::DynamicNPIs;
use crate::error::EpiError;
use crate::uncertain::UncertainValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys of all SECIR parameters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ParameterKey {
    /// Day in year the simulation starts at; anchors seasonality.
    StartDay,
    /// Amplitude of the seasonal variation of transmission, in [0, 0.5].
    Seasonality,
    /// Beds available for critical cases; excess severe cases die.
    IcuCapacity,
    /// Contacts of infected that can be traced per day.
    TestAndTraceCapacity,
    ContactPatterns,
    DynamicNpisInfectedSymptoms,
    /// Days from infection to symptom onset, >= 2.
    IncubationTime,
    /// Days between successive infections in a transmission chain.
    SerialInterval,
    TimeInfectedSymptoms,
    TimeInfectedSevere,
    TimeInfectedCritical,
    TransmissionProbabilityOnContact,
    RelativeTransmissionNoSymptoms,
    RecoveredPerInfectedNoSymptoms,
    RiskOfInfectionFromSymptomatic,
    MaxRiskOfInfectionFromSymptomatic,
    SeverePerInfectedSymptoms,
    CriticalPerSevere,
    DeathsPerCritical,
}

/// The value stored under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Scalar(UncertainValue),
    PerAgeGroup(Vec<UncertainValue>),
    Contacts(UncertainContactMatrix),
    DynamicNpis(DynamicNPIs),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    num_groups: usize,
    values: BTreeMap<ParameterKey, ParameterValue>,
}

/// Default number of contact locations (home, school, work, other).
pub const NUM_CONTACT_LOCATIONS: usize = 4;

impl Parameters {
    /// Creates the parameter set for `num_groups` age groups with defaults.
    #[must_use]
    pub fn new(num_groups: usize) -> Parameters {
        use ParameterKey::*;
        let scalar = |v: f64| ParameterValue::Scalar(UncertainValue::new(v));
        let per_age = |v: f64| {
            ParameterValue::PerAgeGroup(vec![UncertainValue::new(v); num_groups])
        };
        let mut values = BTreeMap::new();
        values.insert(StartDay, scalar(0.0));
        values.insert(Seasonality, scalar(0.0));
        values.insert(IcuCapacity, scalar(f64::MAX));
        values.insert(TestAndTraceCapacity, scalar(f64::MAX));
        values.insert(
            ContactPatterns,
            ParameterValue::Contacts(UncertainContactMatrix::new(ContactMatrixGroup::new(
                NUM_CONTACT_LOCATIONS,
                num_groups,
                0.0,
            ))),
        );
        values.insert(
            DynamicNpisInfectedSymptoms,
            ParameterValue::DynamicNpis(DynamicNPIs::new()),
        );
        values.insert(IncubationTime, per_age(5.2));
        values.insert(SerialInterval, per_age(4.2));
        values.insert(TimeInfectedSymptoms, per_age(6.0));
        values.insert(TimeInfectedSevere, per_age(6.0));
        values.insert(TimeInfectedCritical, per_age(8.0));
        values.insert(TransmissionProbabilityOnContact, per_age(0.05));
        values.insert(RelativeTransmissionNoSymptoms, per_age(1.0));
        values.insert(RecoveredPerInfectedNoSymptoms, per_age(0.2));
        values.insert(RiskOfInfectionFromSymptomatic, per_age(0.25));
        values.insert(MaxRiskOfInfectionFromSymptomatic, per_age(0.45));
        values.insert(SeverePerInfectedSymptoms, per_age(0.1));
        values.insert(CriticalPerSevere, per_age(0.1));
        values.insert(DeathsPerCritical, per_age(0.1));
        Parameters { num_groups, values }
    }

    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn scalar(&self, key: ParameterKey) -> &UncertainValue {
        match &self.values[&key] {
            ParameterValue::Scalar(v) => v,
            _ => unreachable!("{key:?} is a scalar parameter"),
        }
    }

    fn scalar_mut(&mut self, key: ParameterKey) -> &mut UncertainValue {
        match self.values.get_mut(&key).unwrap() {
            ParameterValue::Scalar(v) => v,
            _ => unreachable!("{key:?} is a scalar parameter"),
        }
    }

    fn per_age(&self, key: ParameterKey) -> &[UncertainValue] {
        match &self.values[&key] {
            ParameterValue::PerAgeGroup(v) => v,
            _ => unreachable!("{key:?} is a per-age parameter"),
        }
    }

    fn per_age_mut(&mut self, key: ParameterKey) -> &mut Vec<UncertainValue> {
        match self.values.get_mut(&key).unwrap() {
            ParameterValue::PerAgeGroup(v) => v,
            _ => unreachable!("{key:?} is a per-age parameter"),
        }
    }

    #[must_use]
    pub fn get(&self, key: ParameterKey, group: AgeGroup) -> f64 {
        self.per_age(key)[group.index()].value()
    }

    pub fn get_mut(&mut self, key: ParameterKey, group: AgeGroup) -> &mut UncertainValue {
        &mut self.per_age_mut(key)[group.index()]
    }

    #[must_use]
    pub fn get_scalar(&self, key: ParameterKey) -> f64 {
        self.scalar(key).value()
    }

    pub fn get_scalar_mut(&mut self, key: ParameterKey) -> &mut UncertainValue {
        self.scalar_mut(key)
    }

    #[must_use]
    pub fn start_day(&self) -> f64 {
        self.get_scalar(ParameterKey::StartDay)
    }

    pub fn set_start_day(&mut self, day: f64) {
        self.scalar_mut(ParameterKey::StartDay).set_value(day);
    }

    #[must_use]
    pub fn contact_patterns(&self) -> &UncertainContactMatrix {
        match &self.values[&ParameterKey::ContactPatterns] {
            ParameterValue::Contacts(c) => c,
            _ => unreachable!(),
        }
    }

    pub fn contact_patterns_mut(&mut self) -> &mut UncertainContactMatrix {
        match self
            .values
            .get_mut(&ParameterKey::ContactPatterns)
            .unwrap()
        {
            ParameterValue::Contacts(c) => c,
            _ => unreachable!(),
        }
    }

    #[must_use]
    pub fn dynamic_npis(&self) -> &DynamicNPIs {
        match &self.values[&ParameterKey::DynamicNpisInfectedSymptoms] {
            ParameterValue::DynamicNpis(n) => n,
            _ => unreachable!(),
        }
    }

    pub fn dynamic_npis_mut(&mut self) -> &mut DynamicNPIs {
        match self
            .values
            .get_mut(&ParameterKey::DynamicNpisInfectedSymptoms)
            .unwrap()
        {
            ParameterValue::DynamicNpis(n) => n,
            _ => unreachable!(),
        }
    }

    /// Resamples every parameter that carries a distribution and re-applies
    /// the constraints.
    pub fn draw_sample(&mut self, rng: &mut rand::rngs::StdRng) -> Result<(), EpiError> {
        for value in self.values.values_mut() {
            match value {
                ParameterValue::Scalar(v) => {
                    v.draw_sample(rng)?;
                }
                ParameterValue::PerAgeGroup(vs) => {
                    for v in vs {
                        v.draw_sample(rng)?;
                    }
                }
                ParameterValue::Contacts(c) => c.draw_sample(rng)?,
                ParameterValue::DynamicNpis(n) => n.draw_sample(rng)?,
            }
        }
        self.apply_constraints();
        Ok(())
    }

    /// Clamps every parameter into its admissible interval, logging each
    /// rewrite as a warning.
    pub fn apply_constraints(&mut self) {
        use ParameterKey::*;

        let clamp_scalar = |v: &mut UncertainValue, lo: f64, hi: f64, name: &str| {
            let x = v.value();
            if x < lo || x > hi {
                let new = x.clamp(lo, hi);
                log::warn!("Constraint check: parameter {name} changed from {x:.4} to {new:.4}");
                v.set_value(new);
            }
        };

        clamp_scalar(self.scalar_mut(Seasonality), 0.0, 0.5, "Seasonality");
        clamp_scalar(self.scalar_mut(IcuCapacity), 0.0, f64::MAX, "ICUCapacity");
        clamp_scalar(
            self.scalar_mut(TestAndTraceCapacity),
            0.0,
            f64::MAX,
            "TestAndTraceCapacity",
        );

        for i in 0..self.num_groups {
            let clamp_age = |params: &mut Parameters, key: ParameterKey, lo: f64, hi: f64| {
                let v = &mut params.per_age_mut(key)[i];
                let x = v.value();
                if x < lo || x > hi {
                    let new = x.clamp(lo, hi);
                    log::warn!(
                        "Constraint check: parameter {key:?}[{i}] changed from {x:.4} to {new:.4}"
                    );
                    v.set_value(new);
                }
            };

            clamp_age(self, IncubationTime, 2.0, f64::MAX);
            // The serial interval is tied to the incubation time:
            // TINC/2 + 0.5 <= SI <= TINC - 0.5.
            let tinc = self.per_age(IncubationTime)[i].value();
            clamp_age(self, SerialInterval, 0.5 * tinc + 0.5, tinc - 0.5);
            clamp_age(self, TimeInfectedSymptoms, 1.0, f64::MAX);
            clamp_age(self, TimeInfectedSevere, 1.0, f64::MAX);
            clamp_age(self, TimeInfectedCritical, 1.0, f64::MAX);
            clamp_age(self, TransmissionProbabilityOnContact, 0.0, f64::MAX);
            clamp_age(self, RelativeTransmissionNoSymptoms, 0.0, f64::MAX);
            clamp_age(self, RecoveredPerInfectedNoSymptoms, 0.0, 1.0);
            clamp_age(self, RiskOfInfectionFromSymptomatic, 0.0, 1.0);
            clamp_age(self, MaxRiskOfInfectionFromSymptomatic, 0.0, 1.0);
            clamp_age(self, SeverePerInfectedSymptoms, 0.0, 1.0);
            clamp_age(self, CriticalPerSevere, 0.0, 1.0);
            clamp_age(self, DeathsPerCritical, 0.0, 1.0);
        }
    }

    /// Reports the first violated constraint without modifying anything.
    pub fn check_constraints(&self) -> Result<(), EpiError> {
        use ParameterKey::*;

        let check = |x: f64, lo: f64, hi: f64, name: String| {
            if x < lo || x > hi {
                Err(EpiError::ConstraintViolation(format!(
                    "parameter {name} = {x} outside of [{lo}, {hi}]"
                )))
            } else {
                Ok(())
            }
        };

        check(
            self.get_scalar(Seasonality),
            0.0,
            0.5,
            "Seasonality".to_string(),
        )?;
        check(
            self.get_scalar(IcuCapacity),
            0.0,
            f64::MAX,
            "ICUCapacity".to_string(),
        )?;

        for i in 0..self.num_groups {
            let age = AgeGroup(i);
            let tinc = self.get(IncubationTime, age);
            check(tinc, 2.0, f64::MAX, format!("IncubationTime[{i}]"))?;
            check(
                self.get(SerialInterval, age),
                0.5 * tinc + 0.5,
                tinc - 0.5,
                format!("SerialInterval[{i}]"),
            )?;
            for key in [TimeInfectedSymptoms, TimeInfectedSevere, TimeInfectedCritical] {
                check(self.get(key, age), 1.0, f64::MAX, format!("{key:?}[{i}]"))?;
            }
            for key in [TransmissionProbabilityOnContact, RelativeTransmissionNoSymptoms] {
                check(self.get(key, age), 0.0, f64::MAX, format!("{key:?}[{i}]"))?;
            }
            for key in [
                RecoveredPerInfectedNoSymptoms,
                RiskOfInfectionFromSymptomatic,
                MaxRiskOfInfectionFromSymptomatic,
                SeverePerInfectedSymptoms,
                CriticalPerSevere,
                DeathsPerCritical,
            ] {
                check(self.get(key, age), 0.0, 1.0, format!("{key:?}[{i}]"))?;
            }
        }
        Ok(())
    }
}
