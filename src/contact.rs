//! Time-dependent contact matrices with additive dampings.
//!
//! A [`ContactMatrix`] holds the baseline age-by-age contact rates at one
//! contact location (home, school, work, other), a minimum matrix that
//! dampings cannot undercut, and a list of [`Damping`]s. A damping reduces
//! the baseline from its activation time on; within one `(level, type)` a
//! later activation replaces the earlier one, contributions of distinct
//! `(level, type)` pairs add up.
//!
//! [`UncertainContactMatrix`] carries the sampling templates
//! ([`DampingSampling`]) from which the concrete dampings are instantiated
//! when a parameter study draws a sample, plus the school-holiday template
//! that is expanded over per-node holiday intervals.

use crate::error::EpiError;
use crate::time::SimulationTime;
use crate::uncertain::UncertainValue;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

/// Ordinal intervention level, e.g. Main, PhysicalDistanceAndMasks,
/// SeniorAwareness, Holidays. Dampings on different levels stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DampingLevel(pub i32);

/// Ordinal intervention type, e.g. Home, SchoolClosure, HomeOffice. A later
/// damping of the same level and type replaces the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DampingType(pub i32);

/// A concrete damping on one contact matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Damping {
    pub factor: f64,
    pub level: DampingLevel,
    pub damping_type: DampingType,
    pub time: SimulationTime,
    /// Age-by-age weights, usually the symmetric broadcast of per-group
    /// weights; 1.0 everywhere for interventions affecting all groups alike.
    pub weights: DMatrix<f64>,
}

/// Symmetric age-by-age weight matrix from per-group weights: the geometric
/// mean `sqrt(w_i * w_j)`, so uniform weights broadcast unchanged.
#[must_use]
pub fn broadcast_group_weights(weights: &DVector<f64>) -> DMatrix<f64> {
    let n = weights.len();
    DMatrix::from_fn(n, n, |i, j| (weights[i] * weights[j]).sqrt())
}

/// Contact rates at one contact location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactMatrix {
    baseline: DMatrix<f64>,
    minimum: DMatrix<f64>,
    dampings: Vec<Damping>,
}

impl ContactMatrix {
    /// Creates a contact matrix with a zero minimum.
    #[must_use]
    pub fn new(baseline: DMatrix<f64>) -> ContactMatrix {
        let minimum = DMatrix::zeros(baseline.nrows(), baseline.ncols());
        ContactMatrix {
            baseline,
            minimum,
            dampings: Vec::new(),
        }
    }

    pub fn set_minimum(&mut self, minimum: DMatrix<f64>) -> Result<(), EpiError> {
        if minimum.shape() != self.baseline.shape() {
            return Err(EpiError::DimensionMismatch(
                "minimum matrix must match the baseline shape".to_string(),
            ));
        }
        self.minimum = minimum;
        Ok(())
    }

    #[must_use]
    pub fn baseline(&self) -> &DMatrix<f64> {
        &self.baseline
    }

    #[must_use]
    pub fn minimum(&self) -> &DMatrix<f64> {
        &self.minimum
    }

    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.baseline.nrows()
    }

    #[must_use]
    pub fn dampings(&self) -> &[Damping] {
        &self.dampings
    }

    pub fn add_damping(&mut self, damping: Damping) {
        self.dampings.push(damping);
    }

    pub fn clear_dampings(&mut self) {
        self.dampings.clear();
    }

    /// The effective contact matrix at time `t`: the baseline reduced by all
    /// active dampings, clamped between the minimum and the baseline.
    ///
    /// For each `(level, type)` only the damping with the latest activation
    /// time `<= t` contributes; equal activation times are broken by
    /// insertion order, last added wins.
    #[must_use]
    pub fn effective(&self, t: SimulationTime) -> DMatrix<f64> {
        let mut chosen: Vec<(DampingLevel, DampingType, &Damping)> = Vec::new();
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

        let mut reduction = DMatrix::zeros(self.baseline.nrows(), self.baseline.ncols());
        for (_, _, damping) in chosen {
            reduction += damping.factor * damping.weights.component_mul(&self.baseline);
        }
        let eff = &self.baseline - reduction;
        eff.zip_zip_map(&self.minimum, &self.baseline, |e, lo, hi| {
            e.clamp(lo.min(hi), hi)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct EffectiveCache {
    t: f64,
    version: u64,
    matrices: Vec<DMatrix<f64>>,
}

/// Ordered contact matrices, one per contact location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMatrixGroup {
    matrices: Vec<ContactMatrix>,
    #[serde(skip)]
    version: Cell<u64>,
    #[serde(skip)]
    cache: RefCell<Option<EffectiveCache>>,
}

impl PartialEq for ContactMatrixGroup {
    fn eq(&self, other: &Self) -> bool {
        self.matrices == other.matrices
    }
}

impl ContactMatrixGroup {
    /// Creates `num_locations` matrices of constant `baseline` contacts for
    /// `num_groups` age groups.
    #[must_use]
    pub fn new(num_locations: usize, num_groups: usize, baseline: f64) -> ContactMatrixGroup {
        let matrices = (0..num_locations)
            .map(|_| ContactMatrix::new(DMatrix::from_element(num_groups, num_groups, baseline)))
            .collect();
        ContactMatrixGroup {
            matrices,
            version: Cell::new(0),
            cache: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn from_matrices(matrices: Vec<ContactMatrix>) -> ContactMatrixGroup {
        ContactMatrixGroup {
            matrices,
            version: Cell::new(0),
            cache: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn num_locations(&self) -> usize {
        self.matrices.len()
    }

    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.matrices.first().map_or(0, ContactMatrix::num_groups)
    }

    #[must_use]
    pub fn matrices(&self) -> &[ContactMatrix] {
        &self.matrices
    }

    pub fn matrix_mut(&mut self, location: usize) -> &mut ContactMatrix {
        self.bump_version();
        &mut self.matrices[location]
    }

    /// Adds a damping to the matrices at `locations`.
    pub fn add_damping(&mut self, locations: &[usize], damping: &Damping) {
        self.bump_version();
        for &location in locations {
            self.matrices[location].add_damping(damping.clone());
        }
    }

    pub fn clear_dampings(&mut self) {
        self.bump_version();
        for matrix in &mut self.matrices {
            matrix.clear_dampings();
        }
    }

    fn bump_version(&self) {
        self.version.set(self.version.get() + 1);
    }

    /// Sum of the effective matrices of all locations at `t`. The last
    /// result is cached and keyed by `(t, version)`; any mutation of the
    /// group invalidates it.
    #[must_use]
    pub fn effective_total(&self, t: SimulationTime) -> DMatrix<f64> {
        let per_location = self.effective(t);
        let mut total = per_location[0].clone();
        for matrix in &per_location[1..] {
            total += matrix;
        }
        total
    }

    /// The effective matrix of every location at `t`.
    #[must_use]
    pub fn effective(&self, t: SimulationTime) -> Vec<DMatrix<f64>> {
        {
            let cache = self.cache.borrow();
            if let Some(entry) = cache.as_ref() {
                if entry.t == t.days() && entry.version == self.version.get() {
                    return entry.matrices.clone();
                }
            }
        }
        let matrices: Vec<DMatrix<f64>> =
            self.matrices.iter().map(|m| m.effective(t)).collect();
        *self.cache.borrow_mut() = Some(EffectiveCache {
            t: t.days(),
            version: self.version.get(),
            matrices: matrices.clone(),
        });
        matrices
    }
}

/// An uncertain damping template: the value carries a distribution, the rest
/// describes where and when the damping applies once instantiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DampingSampling {
    pub value: UncertainValue,
    pub level: DampingLevel,
    pub damping_type: DampingType,
    pub time: SimulationTime,
    /// Indices of the contact locations the damping applies to.
    pub matrix_indices: Vec<usize>,
    pub group_weights: DVector<f64>,
}

impl DampingSampling {
    /// The concrete damping for the current value, activating at `time`.
    #[must_use]
    pub fn make_damping(&self, time: SimulationTime, factor: f64) -> Damping {
        Damping {
            factor,
            level: self.level,
            damping_type: self.damping_type,
            time,
            weights: broadcast_group_weights(&self.group_weights),
        }
    }
}

/// Contact patterns of one node: the matrices plus the damping templates the
/// parameter study samples from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertainContactMatrix {
    pub contact_matrices: ContactMatrixGroup,
    pub dampings: Vec<DampingSampling>,
    pub school_holiday_damping: Option<DampingSampling>,
    /// Per-node school holiday intervals, in simulation time.
    pub school_holidays: Vec<(SimulationTime, SimulationTime)>,
}

impl UncertainContactMatrix {
    #[must_use]
    pub fn new(contact_matrices: ContactMatrixGroup) -> UncertainContactMatrix {
        UncertainContactMatrix {
            contact_matrices,
            dampings: Vec::new(),
            school_holiday_damping: None,
            school_holidays: Vec::new(),
        }
    }

    /// Resamples every damping value and rebuilds the concrete dampings of
    /// the matrices, including the school-holiday expansion.
    pub fn draw_sample(&mut self, rng: &mut StdRng) -> Result<(), EpiError> {
        self.contact_matrices.clear_dampings();
        for sampling in &mut self.dampings {
            sampling.value.draw_sample(rng)?;
        }
        if let Some(holiday) = self.school_holiday_damping.as_mut() {
            holiday.value.draw_sample(rng)?;
        }
        self.apply_dampings();
        Ok(())
    }

    /// Instantiates the current damping values on the matrices without
    /// resampling. Used after construction and after deserialization.
    pub fn apply_dampings(&mut self) {
        self.contact_matrices.clear_dampings();
        let mut instantiated = Vec::new();
        for sampling in &self.dampings {
            instantiated.push((
                sampling.matrix_indices.clone(),
                sampling.make_damping(sampling.time, sampling.value.value()),
            ));
        }
        if let Some(holiday) = &self.school_holiday_damping {
            // Holidays expand into an activation at the interval start and a
            // deactivation (zero factor) at its end.
            for &(start, end) in &self.school_holidays {
                instantiated.push((
                    holiday.matrix_indices.clone(),
                    holiday.make_damping(start, holiday.value.value()),
                ));
                instantiated.push((holiday.matrix_indices.clone(), holiday.make_damping(end, 0.0)));
            }
        }
        for (locations, damping) in instantiated {
            self.contact_matrices.add_damping(&locations, &damping);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_weights(n: usize) -> DVector<f64> {
        DVector::from_element(n, 1.0)
    }

    fn damping(factor: f64, level: i32, ty: i32, t: f64) -> Damping {
        Damping {
            factor,
            level: DampingLevel(level),
            damping_type: DampingType(ty),
            time: SimulationTime(t),
            weights: broadcast_group_weights(&uniform_weights(2)),
        }
    }

    #[test]
    fn damping_is_a_step_function() {
        let mut matrix = ContactMatrix::new(DMatrix::from_element(2, 2, 10.0));
        matrix.add_damping(damping(0.5, 0, 0, 10.0));
        assert_eq!(matrix.effective(SimulationTime(9.99))[(0, 0)], 10.0);
        assert_eq!(matrix.effective(SimulationTime(10.0))[(0, 0)], 5.0);
        assert_eq!(matrix.effective(SimulationTime(25.0))[(0, 0)], 5.0);
    }

    #[test]
    fn later_damping_replaces_same_level_and_type() {
        let mut matrix = ContactMatrix::new(DMatrix::from_element(2, 2, 10.0));
        matrix.add_damping(damping(0.5, 0, 0, 5.0));
        matrix.add_damping(damping(0.2, 0, 0, 10.0));
        assert_eq!(matrix.effective(SimulationTime(7.0))[(0, 0)], 5.0);
        assert_eq!(matrix.effective(SimulationTime(12.0))[(0, 0)], 8.0);
    }

    #[test]
    fn distinct_levels_accumulate_and_commute() {
        let mut ab = ContactMatrix::new(DMatrix::from_element(2, 2, 10.0));
        ab.add_damping(damping(0.3, 0, 0, 0.0));
        ab.add_damping(damping(0.2, 1, 0, 0.0));
        let mut ba = ContactMatrix::new(DMatrix::from_element(2, 2, 10.0));
        ba.add_damping(damping(0.2, 1, 0, 0.0));
        ba.add_damping(damping(0.3, 0, 0, 0.0));
        assert_eq!(ab.effective(SimulationTime(1.0)), ba.effective(SimulationTime(1.0)));
        assert_eq!(ab.effective(SimulationTime(1.0))[(0, 0)], 5.0);
    }

    #[test]
    fn equal_time_last_added_wins() {
        let mut matrix = ContactMatrix::new(DMatrix::from_element(2, 2, 10.0));
        matrix.add_damping(damping(0.5, 0, 0, 3.0));
        matrix.add_damping(damping(0.1, 0, 0, 3.0));
        assert_eq!(matrix.effective(SimulationTime(3.0))[(0, 0)], 9.0);
    }

    #[test]
    fn effective_never_undercuts_minimum() {
        let mut matrix = ContactMatrix::new(DMatrix::from_element(2, 2, 10.0));
        matrix
            .set_minimum(DMatrix::from_element(2, 2, 4.0))
            .unwrap();
        matrix.add_damping(damping(1.0, 0, 0, 0.0));
        assert_eq!(matrix.effective(SimulationTime(1.0))[(0, 0)], 4.0);
    }

    #[test]
    fn effective_never_exceeds_baseline() {
        let matrix = ContactMatrix::new(DMatrix::from_element(2, 2, 10.0));
        assert_eq!(matrix.effective(SimulationTime(0.0))[(1, 1)], 10.0);
    }

    #[test]
    fn group_cache_invalidates_on_mutation() {
        let mut group = ContactMatrixGroup::new(2, 2, 10.0);
        let before = group.effective_total(SimulationTime(1.0));
        assert_eq!(before[(0, 0)], 20.0);
        group.add_damping(&[0], &damping(0.5, 0, 0, 0.0));
        let after = group.effective_total(SimulationTime(1.0));
        assert_eq!(after[(0, 0)], 15.0);
    }

    #[test]
    fn school_holidays_expand_to_paired_dampings() {
        let mut contacts = UncertainContactMatrix::new(ContactMatrixGroup::new(1, 2, 8.0));
        contacts.school_holiday_damping = Some(DampingSampling {
            value: UncertainValue::new(1.0),
            level: DampingLevel(3),
            damping_type: DampingType(1),
            time: SimulationTime(0.0),
            matrix_indices: vec![0],
            group_weights: uniform_weights(2),
        });
        contacts.school_holidays = vec![(SimulationTime(5.0), SimulationTime(8.0))];
        contacts.apply_dampings();
        let at = |t: f64| contacts.contact_matrices.effective(SimulationTime(t))[0][(0, 0)];
        assert_eq!(at(4.0), 8.0);
        assert_eq!(at(5.0), 0.0);
        assert_eq!(at(7.9), 0.0);
        assert_eq!(at(8.0), 8.0);
    }

    #[test]
    fn draw_sample_reinstantiates_dampings() {
        let mut contacts = UncertainContactMatrix::new(ContactMatrixGroup::new(1, 2, 10.0));
        contacts.dampings.push(DampingSampling {
            value: UncertainValue::with_distribution(
                0.5,
                crate::uncertain::ParameterDistribution::uniform(0.2, 0.4),
            ),
            level: DampingLevel(0),
            damping_type: DampingType(0),
            time: SimulationTime(0.0),
            matrix_indices: vec![0],
            group_weights: uniform_weights(2),
        });
        let mut rng = crate::random::rng_for_run(3, 0);
        contacts.draw_sample(&mut rng).unwrap();
        let eff = contacts.contact_matrices.effective(SimulationTime(1.0))[0][(0, 0)];
        assert!(eff >= 6.0 && eff <= 8.0, "effective contacts {eff}");
    }
}
