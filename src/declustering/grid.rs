use std::collections::HashMap;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GeostatError, Result};
use crate::spatial_database::rtree_point_set::point_set::{Dimension, PointSet};

use super::declustered_mean;

/// Which declustered mean selects the cell size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclusterDirection {
    /// High values are over-sampled.
    #[default]
    Minimize,
    /// Low values are over-sampled.
    Maximize,
}

/// Cell declustering over one or more cell sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDecluster {
    pub cell_sizes: Vec<Vector3<f64>>,
    /// Origin shifts along the cell diagonal averaged for each size.
    pub n_offsets: usize,
    pub direction: DeclusterDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclusterResult {
    /// Sums to the number of samples.
    pub weights: Vec<f64>,
    pub cell_size: Vector3<f64>,
    pub declustered_mean: f64,
    /// Declustered mean of every tested size, in input order.
    pub means: Vec<(Vector3<f64>, f64)>,
}

impl GridDecluster {
    pub fn new(cell_sizes: Vec<Vector3<f64>>) -> Self {
        Self {
            cell_sizes,
            n_offsets: 5,
            direction: DeclusterDirection::default(),
        }
    }

    pub fn with_offsets(mut self, n_offsets: usize) -> Self {
        self.n_offsets = n_offsets;
        self
    }

    pub fn with_direction(mut self, direction: DeclusterDirection) -> Self {
        self.direction = direction;
        self
    }

    /// `steps` sizes starting at `size`, each growing by `step`.
    pub fn sizes_from_steps(&mut self, size: Vector3<f64>, step: Vector3<f64>, steps: u32) {
        self.cell_sizes
            .extend((0..steps).map(|i| size + step * i as f64));
    }

    pub fn validate(&self) -> Result<()> {
        if self.cell_sizes.is_empty() {
            return Err(GeostatError::InvalidInput(
                "at least one cell size is required".to_string(),
            ));
        }
        if self
            .cell_sizes
            .iter()
            .any(|s| s.iter().any(|v| !(v.is_finite() && *v > 0.0)))
        {
            return Err(GeostatError::InvalidInput(
                "cell sizes must be positive".to_string(),
            ));
        }
        if self.n_offsets == 0 {
            return Err(GeostatError::InvalidInput(
                "n_offsets must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Weights for a single cell size, averaged over the origin offsets.
    pub fn cell_weights(&self, data: &PointSet, cell_size: &Vector3<f64>) -> Vec<f64> {
        let n = data.len();
        let min = data
            .points
            .iter()
            .fold(Point3::from([f64::MAX; 3]), |acc, p| acc.inf(p));

        let mut weights = vec![0.0; n];
        for k in 0..self.n_offsets {
            let offset = cell_size * (k as f64 / self.n_offsets as f64);

            //compute the grid indices for each point
            let grid_inds = data
                .points
                .iter()
                .map(|point| {
                    let shifted = (point - min + offset).component_div(cell_size);
                    let z = match data.dimension {
                        Dimension::Two => 0,
                        Dimension::Three => shifted.z.floor() as i64,
                    };
                    [shifted.x.floor() as i64, shifted.y.floor() as i64, z]
                })
                .collect::<Vec<_>>();

            //count points per occupied cell
            let counts = grid_inds.iter().fold(HashMap::new(), |mut map, ind| {
                *map.entry(*ind).or_insert(0usize) += 1;
                map
            });

            let constant = n as f64 / counts.len() as f64;
            for (weight, ind) in weights.iter_mut().zip(grid_inds.iter()) {
                *weight += constant / counts[ind] as f64;
            }
        }

        weights
            .iter_mut()
            .for_each(|w| *w /= self.n_offsets as f64);
        weights
    }

    /// Weights of the cell size whose declustered mean is extreme in `direction`.
    pub fn decluster(&self, data: &PointSet) -> Result<DeclusterResult> {
        self.validate()?;
        if data.is_empty() {
            return Err(GeostatError::InsufficientData {
                found: 0,
                required: 1,
            });
        }

        let candidates = self
            .cell_sizes
            .par_iter()
            .map(|cell_size| {
                let weights = self.cell_weights(data, cell_size);
                let mean = declustered_mean(&data.data, &weights)?;
                debug!(?cell_size, mean, "cell declustering");
                Ok((*cell_size, mean, weights))
            })
            .collect::<Result<Vec<_>>>()?;

        let means = candidates
            .iter()
            .map(|(size, mean, _)| (*size, *mean))
            .collect::<Vec<_>>();

        // first size wins ties
        let best = candidates
            .into_iter()
            .reduce(|best, candidate| {
                let better = match self.direction {
                    DeclusterDirection::Minimize => candidate.1 < best.1,
                    DeclusterDirection::Maximize => candidate.1 > best.1,
                };
                if better {
                    candidate
                } else {
                    best
                }
            })
            .ok_or_else(|| GeostatError::InvalidInput("no cell sizes".to_string()))?;

        info!(
            cell_size = ?best.0,
            declustered_mean = best.1,
            naive_mean = data.mean(),
            "cell declustering complete"
        );

        Ok(DeclusterResult {
            weights: best.2,
            cell_size: best.0,
            declustered_mean: best.1,
            means,
        })
    }
}
