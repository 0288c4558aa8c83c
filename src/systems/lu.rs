use nalgebra::{DMatrix, DVector, Point3, Vector3};
use tracing::debug;

use crate::error::{GeostatError, Result};
use crate::geometry::support::Support;
use crate::spatial_database::rtree_point_set::point_set::Dimension;
use crate::variography::model_variograms::VariogramModel;

use super::solved_systems::SolvedSystemBuilder;
use super::system_builder::{CovarianceBuilder, SystemBuffers};

/// Relative diagonal shift applied on the regularized retry.
pub const REGULARIZATION: f64 = 1e-10;

/// Smallest accepted ratio between the smallest and largest LU pivots.
pub const MIN_PIVOT_RATIO: f64 = 1e-12;

/// Dense kriging system for one target.
///
/// The left hand side holds the covariance block followed by the constraint rows and
/// columns, the right hand side the data to target covariances followed by the
/// constraint values at the target.
#[derive(Debug, Clone)]
pub struct LUSystem {
    pub lhs: DMatrix<f64>,
    pub rhs: DVector<f64>,
    pub n_cond: usize,
    pub n_constraints: usize,
    /// Mean covariance within the target.
    pub target_cov: f64,
    constraint_buffer: Vec<f64>,
}

impl Default for LUSystem {
    fn default() -> Self {
        Self {
            lhs: DMatrix::zeros(0, 0),
            rhs: DVector::zeros(0),
            n_cond: 0,
            n_constraints: 0,
            target_cov: 0.0,
            constraint_buffer: Vec::new(),
        }
    }
}

impl LUSystem {
    pub fn size(&self) -> usize {
        self.n_cond + self.n_constraints
    }

    /// Set the dimensions of the system, new entries are zero.
    fn set_dims(&mut self, n_cond: usize, n_constraints: usize) {
        self.n_cond = n_cond;
        self.n_constraints = n_constraints;
        let n = self.size();
        if self.lhs.nrows() != n {
            self.lhs = DMatrix::zeros(n, n);
            self.rhs = DVector::zeros(n);
        } else {
            self.lhs.fill(0.0);
            self.rhs.fill(0.0);
        }
        self.constraint_buffer.resize(n_constraints, 0.0);
    }

    /// Build the system for conditioning supports `cond` and `target`.
    pub fn build<V, B>(
        &mut self,
        cond: &[Support],
        target: &Support,
        vgram: &V,
        builder: &B,
        dimension: Dimension,
        buffers: &mut SystemBuffers,
    ) where
        V: VariogramModel,
        B: SolvedSystemBuilder,
    {
        let n_cond = cond.len();
        let n_constraints = builder.n_constraints(dimension);
        self.set_dims(n_cond, n_constraints);

        CovarianceBuilder::build_cov_mat(&mut self.lhs, cond, vgram, buffers);
        CovarianceBuilder::build_cov_vec(&mut self.rhs, cond, target, vgram, buffers);
        self.target_cov = CovarianceBuilder::target_cov(target, vgram, buffers);

        if n_constraints == 0 {
            return;
        }

        // drift terms are expressed relative to the target centre
        let center = target.center();
        for (i, support) in cond.iter().enumerate() {
            self.averaged_constraints(support, &center, builder, dimension, buffers);
            for (k, v) in self.constraint_buffer.iter().enumerate() {
                self.lhs[(i, n_cond + k)] = *v;
                self.lhs[(n_cond + k, i)] = *v;
            }
        }
        self.averaged_constraints(target, &center, builder, dimension, buffers);
        for (k, v) in self.constraint_buffer.iter().enumerate() {
            self.rhs[n_cond + k] = *v;
        }
    }

    fn averaged_constraints<B: SolvedSystemBuilder>(
        &mut self,
        support: &Support,
        center: &Point3<f64>,
        builder: &B,
        dimension: Dimension,
        buffers: &mut SystemBuffers,
    ) {
        buffers.pt_buffer.clear();
        support.discretize_in(&mut buffers.pt_buffer);
        let n_nodes = buffers.pt_buffer.len() as f64;

        self.constraint_buffer.iter_mut().for_each(|v| *v = 0.0);
        buffers.var_buffer.clear();
        buffers.var_buffer.resize(self.n_constraints, 0.0);
        for node in buffers.pt_buffer.iter() {
            let offset: Vector3<f64> = node - center;
            builder.constraint_values(&offset, dimension, &mut buffers.var_buffer);
            for (acc, v) in self.constraint_buffer.iter_mut().zip(buffers.var_buffer.iter()) {
                *acc += v / n_nodes;
            }
        }
    }

    /// Solve the system, retrying once with a regularized covariance diagonal.
    pub fn solve(&self, prefer_cholesky: bool) -> Result<DVector<f64>> {
        if let Some(x) = Self::try_solve(&self.lhs, &self.rhs, prefer_cholesky) {
            return Ok(x);
        }

        let max_diag = (0..self.n_cond)
            .map(|i| self.lhs[(i, i)].abs())
            .fold(0.0, f64::max);
        let shift = REGULARIZATION * max_diag.max(1.0);
        debug!(size = self.size(), shift, "regularizing kriging system");

        let mut lhs = self.lhs.clone();
        for i in 0..self.n_cond {
            lhs[(i, i)] += shift;
        }
        Self::try_solve(&lhs, &self.rhs, prefer_cholesky)
            .ok_or(GeostatError::SingularSystem { size: self.size() })
    }

    fn try_solve(
        lhs: &DMatrix<f64>,
        rhs: &DVector<f64>,
        prefer_cholesky: bool,
    ) -> Option<DVector<f64>> {
        if lhs.nrows() == 0 {
            return None;
        }
        if prefer_cholesky {
            if let Some(chol) = lhs.clone().cholesky() {
                let x = chol.solve(rhs);
                if x.iter().all(|v| v.is_finite()) {
                    return Some(x);
                }
            }
        }

        let lu = lhs.clone().lu();
        let pivots = lu.u().diagonal().abs();
        let max_pivot = pivots.max();
        let min_pivot = pivots.min();
        if !(max_pivot > 0.0) || min_pivot / max_pivot < MIN_PIVOT_RATIO {
            return None;
        }
        lu.solve(rhs).filter(|x| x.iter().all(|v| v.is_finite()))
    }
}
