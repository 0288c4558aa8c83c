use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::spatial_database::rtree_point_set::point_set::Dimension;

use super::SolvedSystemBuilder;

/// Ordinary kriging, weights constrained to sum to one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OKSystemBuilder;

impl SolvedSystemBuilder for OKSystemBuilder {
    fn n_constraints(&self, _dimension: Dimension) -> usize {
        1
    }

    #[inline(always)]
    fn constraint_values(&self, _offset: &Vector3<f64>, _dimension: Dimension, out: &mut [f64]) {
        out[0] = 1.0;
    }
}
