//! Precomputed powers of evaluation indices

use crate::types::{position_scalar, PositionTable};
use crate::{Position, Result};
use k256::Scalar;
use std::borrow::Cow;

/// `(1, x, x^2, ..., x^(count-1))`
pub fn powers_of(x: Position, count: usize) -> Vec<Scalar> {
    let x = position_scalar(x);
    let mut powers = Vec::with_capacity(count);
    let mut current = Scalar::ONE;
    for _ in 0..count {
        powers.push(current);
        current *= x;
    }
    powers
}

/// Cache of power rows for the indices a participant verifies shares at
#[derive(Debug, Clone)]
pub struct PowerMap {
    threshold: usize,
    rows: PositionTable<Vec<Scalar>>,
}

impl PowerMap {
    pub fn new(n: usize, threshold: usize) -> Self {
        Self {
            threshold,
            rows: PositionTable::new(n),
        }
    }

    /// Compute and cache the row for `index` if it is not cached yet
    pub fn derive(&mut self, index: Position) -> Result<()> {
        if !self.rows.contains(index) {
            self.rows.set(index, powers_of(index, self.threshold))?;
        }
        Ok(())
    }

    pub fn get(&self, index: Position) -> Option<&[Scalar]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Cached row, or a freshly computed one for uncached indices
    pub fn powers(&self, index: Position) -> Cow<'_, [Scalar]> {
        match self.get(index) {
            Some(row) => Cow::Borrowed(row),
            None => Cow::Owned(powers_of(index, self.threshold)),
        }
    }

    /// Number of cached rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
