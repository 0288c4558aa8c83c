use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{GeostatError, Result};
use crate::geometry::aabb::Aabb;
use crate::geometry::support::Support;
use crate::spatial_database::rtree_point_set::point_set::Dimension;

/// Regular grid of nodes, x varies fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    /// Centre of the first node.
    pub origin: Point3<f64>,
    pub spacing: Vector3<f64>,
    pub counts: [usize; 3],
    pub dimension: Dimension,
}

impl GridDefinition {
    pub fn new(origin: Point3<f64>, spacing: Vector3<f64>, counts: [usize; 3]) -> Self {
        Self {
            origin,
            spacing,
            counts,
            dimension: Dimension::Three,
        }
    }

    /// Single layer grid in the xy plane.
    pub fn planar(origin: [f64; 2], spacing: [f64; 2], counts: [usize; 2]) -> Self {
        Self {
            origin: Point3::new(origin[0], origin[1], 0.0),
            spacing: Vector3::new(spacing[0], spacing[1], 1.0),
            counts: [counts[0], counts[1], 1],
            dimension: Dimension::Two,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.counts.iter().any(|c| *c == 0) {
            return Err(GeostatError::InvalidInput(format!(
                "grid counts must be positive, got {:?}",
                self.counts
            )));
        }
        if self.spacing.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(GeostatError::InvalidInput(format!(
                "grid spacing must be positive, got {:?}",
                self.spacing
            )));
        }
        Ok(())
    }

    pub fn n_nodes(&self) -> usize {
        self.counts.iter().product()
    }

    #[inline(always)]
    pub fn node_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.counts[0] * (j + self.counts[1] * k)
    }

    #[inline(always)]
    pub fn node(&self, idx: usize) -> Point3<f64> {
        let i = idx % self.counts[0];
        let j = (idx / self.counts[0]) % self.counts[1];
        let k = idx / (self.counts[0] * self.counts[1]);
        self.origin
            + Vector3::new(
                i as f64 * self.spacing.x,
                j as f64 * self.spacing.y,
                k as f64 * self.spacing.z,
            )
    }

    pub fn nodes(&self) -> Vec<Point3<f64>> {
        (0..self.n_nodes()).map(|idx| self.node(idx)).collect()
    }

    /// Volume of one cell, the cell area for planar grids.
    pub fn block_volume(&self) -> f64 {
        match self.dimension {
            Dimension::Two => self.spacing.x * self.spacing.y,
            Dimension::Three => self.spacing.product(),
        }
    }

    /// Node blocks of one cell each, discretized at `disc`. Planar blocks are flat.
    pub fn blocks(&self, disc: Vector3<f64>) -> Vec<Support> {
        let mut half = self.spacing / 2.0;
        if self.dimension == Dimension::Two {
            half.z = 0.0;
        }
        (0..self.n_nodes())
            .map(|idx| Support::Aabb {
                aabb: Aabb::new(self.node(idx), half),
                disc,
            })
            .collect()
    }
}
