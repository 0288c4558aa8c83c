use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::spatial_database::rtree_point_set::point_set::Dimension;

use super::lu::LUSystem;

pub mod ok_system;
pub mod sk_system;
pub mod uk_system;

/// Kriging flavour: the unbiasedness constraints appended to the covariance block.
pub trait SolvedSystemBuilder: Clone + Send + Sync {
    /// Number of constraint rows.
    fn n_constraints(&self, dimension: Dimension) -> usize;

    /// Constraint basis functions at `offset` from the target centre.
    fn constraint_values(&self, offset: &Vector3<f64>, dimension: Dimension, out: &mut [f64]);

    /// Known mean for simple kriging, `None` when the mean is filtered by constraints.
    fn mean(&self) -> Option<f64> {
        None
    }

    /// Fewest conditioning samples giving a solvable system.
    fn min_samples(&self, dimension: Dimension) -> usize {
        self.n_constraints(dimension).max(1)
    }

    /// Simple kriging needs a true covariance, not the pseudo covariance of unbounded models.
    fn requires_bounded_model(&self) -> bool {
        self.mean().is_some()
    }

    /// Covariance-only systems are symmetric positive definite.
    fn prefer_cholesky(&self) -> bool {
        self.n_constraints(Dimension::Three) == 0
    }

    fn solve(&self, system: &LUSystem) -> crate::error::Result<SolvedSystem> {
        let x = system.solve(self.prefer_cholesky())?;
        Ok(SolvedSystem::from_solution(system, &x, self.mean()))
    }
}

/// Weights, multipliers and kriging variance of one solved system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolvedSystem {
    pub weights: Vec<f64>,
    pub multipliers: Vec<f64>,
    pub variance: f64,
    pub mean: Option<f64>,
}

impl SolvedSystem {
    pub fn from_solution(system: &LUSystem, x: &DVector<f64>, mean: Option<f64>) -> Self {
        let n = system.n_cond;
        let variance = (system.target_cov - x.dot(&system.rhs)).max(0.0);
        Self {
            weights: x.as_slice()[..n].to_vec(),
            multipliers: x.as_slice()[n..].to_vec(),
            variance,
            mean,
        }
    }

    /// Weighted combination of `values`, shifted around the mean for simple kriging.
    pub fn estimate(&self, values: &[f64]) -> f64 {
        match self.mean {
            Some(m) => {
                m + self
                    .weights
                    .iter()
                    .zip(values.iter())
                    .map(|(w, v)| w * (v - m))
                    .sum::<f64>()
            }
            None => self
                .weights
                .iter()
                .zip(values.iter())
                .map(|(w, v)| w * v)
                .sum(),
        }
    }
}
