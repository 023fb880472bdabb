//! Multi-dimensional population arrays indexed by age group, infection state
//! and, for the layered models, immunity layer.
//!
//! Values are stored in one contiguous buffer in row-major order (innermost
//! dimension fastest), so the flat enumeration order is stable and can be
//! shared with mobility coefficient vectors and ODE state vectors.

use crate::error::EpiError;
use crate::uncertain::UncertainValue;
use nalgebra::DVector;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// A dense array over a tuple of ordinal indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexArray<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Clone> IndexArray<T> {
    /// Creates an array of the given shape with every entry set to `value`.
    #[must_use]
    pub fn new(shape: Vec<usize>, value: T) -> IndexArray<T> {
        let len = shape.iter().product();
        IndexArray {
            shape,
            data: vec![value; len],
        }
    }
}

impl<T> IndexArray<T> {
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat offset of a multi-index; lexicographic with the innermost
    /// dimension fastest.
    pub fn flat_index(&self, index: &[usize]) -> Result<usize, EpiError> {
        if index.len() != self.shape.len() {
            return Err(EpiError::DimensionMismatch(format!(
                "index has {} dimensions, array has {}",
                index.len(),
                self.shape.len()
            )));
        }
        let mut flat = 0;
        for (i, (&idx, &dim)) in index.iter().zip(self.shape.iter()).enumerate() {
            if idx >= dim {
                return Err(EpiError::DimensionMismatch(format!(
                    "index {idx} out of bounds for dimension {i} of size {dim}"
                )));
            }
            flat = flat * dim + idx;
        }
        Ok(flat)
    }

    pub fn get(&self, index: &[usize]) -> Result<&T, EpiError> {
        let flat = self.flat_index(index)?;
        Ok(&self.data[flat])
    }

    pub fn get_mut(&mut self, index: &[usize]) -> Result<&mut T, EpiError> {
        let flat = self.flat_index(index)?;
        Ok(&mut self.data[flat])
    }

    pub fn set(&mut self, index: &[usize], value: T) -> Result<(), EpiError> {
        let flat = self.flat_index(index)?;
        self.data[flat] = value;
        Ok(())
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<T> {
        self.data.iter_mut()
    }

    /// Iterates the flat offsets of the slice that fixes dimension `dim` to
    /// `key` and varies all others.
    pub fn slice_indices(&self, dim: usize, key: usize) -> impl Iterator<Item = usize> + '_ {
        let shape = self.shape.clone();
        (0..self.data.len()).filter(move |flat| {
            let mut rest = *flat;
            let mut coords = vec![0; shape.len()];
            for d in (0..shape.len()).rev() {
                coords[d] = rest % shape[d];
                rest /= shape[d];
            }
            coords[dim] == key
        })
    }
}

/// Age- and state-stratified population of one spatial node.
///
/// Each cell is an [`UncertainValue`] so that initial compartment values can
/// carry sampling distributions into the parameter study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Populations {
    values: IndexArray<UncertainValue>,
}

impl Populations {
    /// Creates a population array of the given shape, zero-initialized. The
    /// first dimension is the age group by convention.
    #[must_use]
    pub fn new(shape: Vec<usize>) -> Populations {
        Populations {
            values: IndexArray::new(shape, UncertainValue::new(0.0)),
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Number of compartments in the flat enumeration.
    #[must_use]
    pub fn num_compartments(&self) -> usize {
        self.values.len()
    }

    pub fn flat_index(&self, index: &[usize]) -> Result<usize, EpiError> {
        self.values.flat_index(index)
    }

    pub fn get(&self, index: &[usize]) -> Result<f64, EpiError> {
        Ok(self.values.get(index)?.value())
    }

    pub fn get_cell_mut(&mut self, index: &[usize]) -> Result<&mut UncertainValue, EpiError> {
        self.values.get_mut(index)
    }

    pub fn set(&mut self, index: &[usize], value: f64) -> Result<(), EpiError> {
        if value < 0.0 {
            return Err(EpiError::ConstraintViolation(format!(
                "population value {value} must be >= 0"
            )));
        }
        self.values.get_mut(index)?.set_value(value);
        Ok(())
    }

    /// Sum over the slice fixing dimension `dim` to `key`.
    pub fn group_total(&self, dim: usize, key: usize) -> Result<f64, EpiError> {
        if dim >= self.values.shape().len() || key >= self.values.shape()[dim] {
            return Err(EpiError::DimensionMismatch(format!(
                "no slice {key} in dimension {dim}"
            )));
        }
        Ok(self
            .values
            .slice_indices(dim, key)
            .map(|flat| self.values.data[flat].value())
            .sum())
    }

    /// Total population over all compartments.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.values.iter().map(UncertainValue::value).sum()
    }

    /// Writes into `index` the residual of `total` minus the sum of the other
    /// cells in the slice of dimension `dim` that contains `index`.
    ///
    /// This is the compact way to make group totals match when all but one
    /// compartment are known from data. Fails if the residual is negative.
    pub fn set_difference_from_group_total(
        &mut self,
        index: &[usize],
        dim: usize,
        total: f64,
    ) -> Result<(), EpiError> {
        let target_flat = self.values.flat_index(index)?;
        let key = index[dim];
        let others: f64 = self
            .values
            .slice_indices(dim, key)
            .filter(|&flat| flat != target_flat)
            .map(|flat| self.values.data[flat].value())
            .sum();
        let residual = total - others;
        if residual < 0.0 {
            return Err(EpiError::ConstraintViolation(format!(
                "group total {total} is smaller than the sum {others} of the remaining compartments"
            )));
        }
        self.values.data[target_flat].set_value(residual);
        Ok(())
    }

    /// Clamps every compartment to `[0, inf)`.
    pub fn apply_constraints(&mut self) {
        for cell in self.values.iter_mut() {
            if cell.value() < 0.0 {
                log::warn!(
                    "Constraint check: compartment value changed from {:.4} to 0",
                    cell.value()
                );
                cell.set_value(0.0);
            }
        }
    }

    /// The compartment values as a dense vector in flat enumeration order,
    /// e.g. as the initial state of the ODE.
    #[must_use]
    pub fn compartments(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.values.len(),
            self.values.iter().map(UncertainValue::value),
        )
    }

    /// Overwrites the compartment values from a dense vector.
    pub fn set_compartments(&mut self, y: &DVector<f64>) -> Result<(), EpiError> {
        if y.len() != self.values.len() {
            return Err(EpiError::DimensionMismatch(format!(
                "state vector has {} entries, populations has {}",
                y.len(),
                self.values.len()
            )));
        }
        for (cell, value) in self.values.iter_mut().zip(y.iter()) {
            cell.set_value(*value);
        }
        Ok(())
    }

    /// Resamples every compartment value that carries a distribution.
    pub fn draw_samples(&mut self, rng: &mut StdRng) -> Result<(), EpiError> {
        for cell in self.values.iter_mut() {
            cell.draw_sample(rng)?;
        }
        self.apply_constraints();
        Ok(())
    }

    /// Iterates the cells for inspection or attaching distributions.
    pub fn cells_mut(&mut self) -> std::slice::IterMut<UncertainValue> {
        self.values.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uncertain::assign_uniform_distribution;

    #[test]
    fn flat_index_is_row_major() {
        let arr = IndexArray::new(vec![2, 3], 0.0);
        assert_eq!(arr.flat_index(&[0, 0]).unwrap(), 0);
        assert_eq!(arr.flat_index(&[0, 2]).unwrap(), 2);
        assert_eq!(arr.flat_index(&[1, 0]).unwrap(), 3);
        assert_eq!(arr.flat_index(&[1, 2]).unwrap(), 5);
    }

    #[test]
    fn flat_index_bounds_checked() {
        let arr = IndexArray::new(vec![2, 3], 0.0);
        assert!(arr.flat_index(&[2, 0]).is_err());
        assert!(arr.flat_index(&[0, 3]).is_err());
        assert!(arr.flat_index(&[0]).is_err());
    }

    #[test]
    fn group_total_sums_one_slice() {
        let mut pop = Populations::new(vec![2, 3]);
        pop.set(&[0, 0], 1.0).unwrap();
        pop.set(&[0, 1], 2.0).unwrap();
        pop.set(&[0, 2], 3.0).unwrap();
        pop.set(&[1, 0], 10.0).unwrap();
        assert_eq!(pop.group_total(0, 0).unwrap(), 6.0);
        assert_eq!(pop.group_total(0, 1).unwrap(), 10.0);
        assert_eq!(pop.group_total(1, 0).unwrap(), 11.0);
        assert_eq!(pop.total(), 16.0);
    }

    #[test]
    fn set_difference_fills_residual() {
        let mut pop = Populations::new(vec![1, 4]);
        pop.set(&[0, 1], 10.0).unwrap();
        pop.set(&[0, 2], 20.0).unwrap();
        pop.set_difference_from_group_total(&[0, 0], 0, 100.0)
            .unwrap();
        assert_eq!(pop.get(&[0, 0]).unwrap(), 70.0);
        assert_eq!(pop.group_total(0, 0).unwrap(), 100.0);
        // Overwriting recomputes against the other cells only.
        pop.set_difference_from_group_total(&[0, 0], 0, 50.0).unwrap();
        assert_eq!(pop.get(&[0, 0]).unwrap(), 20.0);
    }

    #[test]
    fn set_difference_rejects_negative_residual() {
        let mut pop = Populations::new(vec![1, 2]);
        pop.set(&[0, 1], 10.0).unwrap();
        let err = pop.set_difference_from_group_total(&[0, 0], 0, 5.0);
        assert!(matches!(err, Err(EpiError::ConstraintViolation(_))));
    }

    #[test]
    fn compartments_round_trip() {
        let mut pop = Populations::new(vec![2, 2]);
        pop.set(&[0, 0], 1.0).unwrap();
        pop.set(&[1, 1], 4.0).unwrap();
        let y = pop.compartments();
        assert_eq!(y.len(), 4);
        assert_eq!(y[0], 1.0);
        assert_eq!(y[3], 4.0);
        let mut copy = Populations::new(vec![2, 2]);
        copy.set_compartments(&y).unwrap();
        assert_eq!(copy.get(&[0, 0]).unwrap(), 1.0);
        assert_eq!(copy.get(&[1, 1]).unwrap(), 4.0);
    }

    #[test]
    fn draw_samples_resamples_cells_with_distributions() {
        let mut pop = Populations::new(vec![1, 2]);
        pop.set(&[0, 0], 100.0).unwrap();
        assign_uniform_distribution(pop.get_cell_mut(&[0, 0]).unwrap(), 90.0, 110.0);
        let mut rng = crate::random::rng_for_run(5, 0);
        pop.draw_samples(&mut rng).unwrap();
        let v = pop.get(&[0, 0]).unwrap();
        assert!((90.0..=110.0).contains(&v));
        assert_eq!(pop.get(&[0, 1]).unwrap(), 0.0);
    }
}
