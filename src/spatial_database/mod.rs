use nalgebra::Point3;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{GeostatError, Result};
use crate::geometry::ellipsoid::Ellipsoid;

pub mod coordinate_system;
pub mod gridded_databases;
pub mod rtree_point_set;

/// Neighborhood search limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditioningParams {
    //number of conditioning points
    pub max_n_cond: usize,
    pub min_n_cond: usize,

    //limit on the number of conditioning points per octant
    pub max_octant: Option<usize>,
    pub min_conditioned_octants: usize,
}

impl ConditioningParams {
    pub fn new(
        max_n_cond: usize,
        min_n_cond: usize,
        max_octant: Option<usize>,
        min_conditioned_octants: usize,
    ) -> Self {
        Self {
            max_n_cond,
            min_n_cond,
            max_octant,
            min_conditioned_octants,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_n_cond == 0 || self.min_n_cond == 0 {
            return Err(GeostatError::InvalidInput(
                "conditioning counts must be positive".to_string(),
            ));
        }
        if self.min_n_cond > self.max_n_cond {
            return Err(GeostatError::InvalidInput(format!(
                "min_n_cond ({}) exceeds max_n_cond ({})",
                self.min_n_cond, self.max_n_cond
            )));
        }
        if self.max_octant == Some(0) {
            return Err(GeostatError::InvalidInput(
                "max_octant must be positive".to_string(),
            ));
        }
        if self.min_conditioned_octants > 8 {
            return Err(GeostatError::InvalidInput(format!(
                "min_conditioned_octants ({}) exceeds 8",
                self.min_conditioned_octants
            )));
        }
        Ok(())
    }
}

impl Default for ConditioningParams {
    fn default() -> Self {
        Self {
            max_n_cond: 32,
            min_n_cond: 4,
            max_octant: None,
            min_conditioned_octants: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Sample index, or grid node index when `simulated` is set.
    pub index: usize,
    pub point: Point3<f64>,
    pub value: f64,
    pub norm_dist: f64,
    pub octant: u8,
    pub simulated: bool,
}

/// Conditioning data for one target, ordered by anisotropic distance.
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    pub neighbors: Vec<Neighbor>,
}

impl Neighborhood {
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn points(&self) -> Vec<Point3<f64>> {
        self.neighbors.iter().map(|n| n.point).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.neighbors.iter().map(|n| n.value).collect()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.neighbors.iter().map(|n| n.index).collect()
    }
}

/// Gathers candidates inside a search ellipsoid and applies count and octant quotas.
pub struct ConditioningDataCollector<'b> {
    pub cond_params: &'b ConditioningParams,
    pub ellipsoid: &'b Ellipsoid,
    pub candidates: Vec<Neighbor>,
}

impl<'b> ConditioningDataCollector<'b> {
    pub fn new(ellipsoid: &'b Ellipsoid, cond_params: &'b ConditioningParams) -> Self {
        Self {
            cond_params,
            ellipsoid,
            candidates: Vec::with_capacity(cond_params.max_n_cond * 2),
        }
    }

    /// Returns false when the point lies outside the ellipsoid.
    #[inline(always)]
    pub fn try_insert(
        &mut self,
        point: Point3<f64>,
        value: f64,
        index: usize,
        simulated: bool,
    ) -> bool {
        let Some((norm_dist, octant)) = self.ellipsoid.locate(&point) else {
            return false;
        };
        self.candidates.push(Neighbor {
            index,
            point,
            value,
            norm_dist,
            octant,
            simulated,
        });
        true
    }

    /// Select the closest candidates under the octant quota, `simulated_limit` caps simulated nodes.
    pub fn finish(self, simulated_limit: Option<usize>) -> Result<Neighborhood> {
        let params = self.cond_params;
        let mut candidates = self.candidates;
        candidates.sort_by_key(|n| (OrderedFloat(n.norm_dist), n.simulated, n.index));

        let mut octant_counts = [0usize; 8];
        let mut n_simulated = 0usize;
        let mut neighbors = Vec::with_capacity(params.max_n_cond);

        for candidate in candidates {
            if neighbors.len() == params.max_n_cond {
                break;
            }
            let octant = candidate.octant as usize;
            if let Some(max_octant) = params.max_octant {
                if octant_counts[octant] >= max_octant {
                    continue;
                }
            }
            if candidate.simulated {
                if simulated_limit.is_some_and(|limit| n_simulated >= limit) {
                    continue;
                }
                n_simulated += 1;
            }
            octant_counts[octant] += 1;
            neighbors.push(candidate);
        }

        let conditioned_octants = octant_counts.iter().filter(|c| **c > 0).count();
        if neighbors.len() < params.min_n_cond {
            return Err(GeostatError::InsufficientData {
                found: neighbors.len(),
                required: params.min_n_cond,
            });
        }
        if conditioned_octants < params.min_conditioned_octants {
            return Err(GeostatError::InsufficientData {
                found: conditioned_octants,
                required: params.min_conditioned_octants,
            });
        }

        Ok(Neighborhood { neighbors })
    }
}
