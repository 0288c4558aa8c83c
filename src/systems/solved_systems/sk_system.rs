use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::spatial_database::rtree_point_set::point_set::Dimension;

use super::SolvedSystemBuilder;

/// Simple kriging around a known stationary mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SKSystemBuilder {
    pub mean: f64,
}

impl SKSystemBuilder {
    pub fn new(mean: f64) -> Self {
        Self { mean }
    }
}

impl SolvedSystemBuilder for SKSystemBuilder {
    fn n_constraints(&self, _dimension: Dimension) -> usize {
        0
    }

    fn constraint_values(&self, _offset: &Vector3<f64>, _dimension: Dimension, _out: &mut [f64]) {}

    fn mean(&self) -> Option<f64> {
        Some(self.mean)
    }
}
