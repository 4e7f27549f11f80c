//! Time-batch representation for field evaluation.
//!
//! Callers pass the time conditioning either as a flat per-sample vector
//! `[batch]` or as a single-column batch `[batch, 1]`. Both are accepted at
//! the interface boundary and normalized once to the canonical column shape
//! before reaching the network; nothing downstream branches on the input
//! shape.

use ndarray::{Array1, Array2};

use crate::{Error, Result};

/// A batch of scalar times, in either of the two accepted layouts.
#[derive(Debug, Clone)]
pub enum TimeBatch {
    /// Flat per-sample times of shape `[batch]`.
    Flat(Array1<f32>),
    /// Column times of shape `[batch, 1]`.
    Column(Array2<f32>),
}

impl TimeBatch {
    /// Constant time broadcast across a batch of `len` samples.
    pub fn broadcast(t: f32, len: usize) -> Self {
        TimeBatch::Flat(Array1::from_elem(len, t))
    }

    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        match self {
            TimeBatch::Flat(t) => t.len(),
            TimeBatch::Column(t) => t.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical `[batch, 1]` column form.
    ///
    /// A `Column` wider than one entry per sample is rejected here, so shape
    /// errors surface at the boundary instead of inside the network.
    pub fn to_column(&self) -> Result<Array2<f32>> {
        match self {
            TimeBatch::Flat(t) => {
                let n = t.len();
                Ok(t.clone().into_shape_with_order((n, 1)).map_err(|_| {
                    Error::Shape("time batch could not be reshaped to a column")
                })?)
            }
            TimeBatch::Column(t) => {
                if t.ncols() != 1 {
                    return Err(Error::Shape("column time batch must have width 1"));
                }
                Ok(t.clone())
            }
        }
    }
}

impl From<Array1<f32>> for TimeBatch {
    fn from(t: Array1<f32>) -> Self {
        TimeBatch::Flat(t)
    }
}

impl From<Array2<f32>> for TimeBatch {
    fn from(t: Array2<f32>) -> Self {
        TimeBatch::Column(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn flat_and_column_normalize_to_the_same_column() {
        let flat = TimeBatch::from(array![0.1f32, 0.5, 0.9]);
        let col = TimeBatch::from(array![[0.1f32], [0.5], [0.9]]);

        let a = flat.to_column().unwrap();
        let b = col.to_column().unwrap();

        assert_eq!(a.dim(), (3, 1));
        assert_eq!(a, b);
    }

    #[test]
    fn broadcast_fills_every_row() {
        let t = TimeBatch::broadcast(0.25, 4);
        assert_eq!(t.len(), 4);
        let col = t.to_column().unwrap();
        assert_eq!(col.dim(), (4, 1));
        assert!(col.iter().all(|&x| x == 0.25));
    }

    #[test]
    fn wide_column_is_a_shape_error() {
        let t = TimeBatch::from(array![[0.1f32, 0.2], [0.3, 0.4]]);
        assert!(matches!(t.to_column(), Err(Error::Shape(_))));
    }
}
