use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GeostatError, Result};
use crate::geometry::aabb::Aabb;
use crate::spatial_database::rtree_point_set::point_set::{Dimension, PointSet};

use super::declustered_mean;

/// Relative squared distance under which samples share a sub-cell.
const TIE_TOLERANCE: f64 = 1e-12;

/// Discretized Voronoi declustering.
///
/// The expanded data box is cut into sub-cells and each sub-cell is credited to its
/// nearest sample, so a weight is proportional to the area (or volume) of the
/// sample's polygon of influence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonalDecluster {
    /// Number of sub-cells along the longest side of the box.
    pub resolution: usize,
}

impl Default for PolygonalDecluster {
    fn default() -> Self {
        Self { resolution: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonalResult {
    /// Sums to the number of samples.
    pub weights: Vec<f64>,
    pub declustered_mean: f64,
}

impl PolygonalDecluster {
    pub fn new(resolution: usize) -> Self {
        Self { resolution }
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(GeostatError::InvalidInput(
                "resolution must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Mean distance from each sample to its closest other sample.
    pub fn mean_nearest_spacing(data: &PointSet) -> f64 {
        if data.len() < 2 {
            return 0.0;
        }
        let total = data
            .points
            .par_iter()
            .map(|p| {
                data.tree
                    .nearest_neighbor_iter_with_distance_2(&[p.x, p.y, p.z])
                    .nth(1)
                    .map(|(_, d2)| d2.sqrt())
                    .unwrap_or(0.0)
            })
            .sum::<f64>();
        total / data.len() as f64
    }

    /// Indices of every sample tied for nearest to `center`.
    fn nearest_samples(data: &PointSet, center: &Point3<f64>, out: &mut Vec<usize>) {
        out.clear();
        let mut iter = data
            .tree
            .nearest_neighbor_iter_with_distance_2(&[center.x, center.y, center.z]);
        let Some((first, d_min)) = iter.next() else {
            return;
        };
        out.push(first.data);
        let tie = d_min * (1.0 + TIE_TOLERANCE) + f64::MIN_POSITIVE;
        out.extend(
            iter.take_while(|(_, d2)| *d2 <= tie)
                .map(|(geom, _)| geom.data),
        );
    }

    pub fn decluster(&self, data: &PointSet) -> Result<PolygonalResult> {
        self.validate()?;
        let n = data.len();
        if n == 0 {
            return Err(GeostatError::InsufficientData {
                found: 0,
                required: 1,
            });
        }

        let margin = Self::mean_nearest_spacing(data) / 2.0;
        let margin = match data.dimension {
            Dimension::Two => Vector3::new(margin, margin, 0.0),
            Dimension::Three => Vector3::new(margin, margin, margin),
        };
        let Some(bounds) = Aabb::from_points(&data.points) else {
            return Err(GeostatError::InsufficientData {
                found: 0,
                required: 1,
            });
        };
        let bounds = bounds.expanded(&margin);
        let min = bounds.mins();
        let extent = bounds.half_extents * 2.0;

        let longest = extent.max();
        if !(longest > 0.0) {
            // every sample sits at the same location
            let weights = vec![1.0; n];
            let declustered_mean = declustered_mean(&data.data, &weights)?;
            return Ok(PolygonalResult {
                weights,
                declustered_mean,
            });
        }

        let cell = longest / self.resolution as f64;
        let counts = extent.map(|e| ((e / cell).round() as usize).max(1));
        let spacing = extent.component_div(&counts.map(|c| c as f64));
        let n_cells = counts.x * counts.y * counts.z;

        let cell_shares = (0..n_cells)
            .into_par_iter()
            .fold(
                || (vec![0.0; n], Vec::new()),
                |(mut acc, mut nearest), idx| {
                    let i = idx % counts.x;
                    let j = (idx / counts.x) % counts.y;
                    let k = idx / (counts.x * counts.y);
                    let center = min
                        + Vector3::new(
                            (i as f64 + 0.5) * spacing.x,
                            (j as f64 + 0.5) * spacing.y,
                            (k as f64 + 0.5) * spacing.z,
                        );
                    Self::nearest_samples(data, &center, &mut nearest);
                    let share = 1.0 / nearest.len().max(1) as f64;
                    for sample in nearest.iter() {
                        acc[*sample] += share;
                    }
                    (acc, nearest)
                },
            )
            .map(|(acc, _)| acc)
            .reduce(
                || vec![0.0; n],
                |mut a, b| {
                    a.iter_mut().zip(b.iter()).for_each(|(a, b)| *a += b);
                    a
                },
            );

        let total = cell_shares.iter().sum::<f64>();
        let weights = cell_shares
            .iter()
            .map(|c| n as f64 * c / total)
            .collect::<Vec<_>>();

        let declustered_mean = declustered_mean(&data.data, &weights)?;
        info!(
            n_samples = n,
            n_cells,
            declustered_mean,
            "polygonal declustering complete"
        );

        Ok(PolygonalResult {
            weights,
            declustered_mean,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::normal_score::NormalScoreTransform;
    use crate::transforms::ValueTransform;
    use approx::assert_relative_eq;

    #[test]
    fn regular_grid_has_unit_weights() {
        let coords = (0..20)
            .map(|i| [(i % 5) as f64 * 10.0, (i / 5) as f64 * 10.0])
            .collect::<Vec<_>>();
        let data = PointSet::from_xy(&coords, (0..20).map(|v| v as f64).collect()).unwrap();
        let result = PolygonalDecluster::default().decluster(&data).unwrap();

        assert_relative_eq!(PolygonalDecluster::mean_nearest_spacing(&data), 10.0);
        for w in result.weights.iter() {
            assert_relative_eq!(*w, 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(result.declustered_mean, 9.5, epsilon = 1e-12);
    }

    #[test]
    fn clustered_samples_share_their_area() {
        let mut coords = vec![[0.0, 0.0], [100.0, 0.0], [0.0, 100.0], [100.0, 100.0]];
        coords.extend([[49.0, 50.0], [50.0, 50.0], [51.0, 50.0], [50.0, 51.0]]);
        let values = vec![1.0, 1.0, 1.0, 1.0, 10.0, 10.0, 10.0, 10.0];
        let data = PointSet::from_xy(&coords, values).unwrap();
        let result = PolygonalDecluster::new(400).decluster(&data).unwrap();

        assert_relative_eq!(result.weights.iter().sum::<f64>(), 8.0, epsilon = 1e-9);
        assert!(result.weights[0] > result.weights[5]);
        assert!(result.declustered_mean < 5.5);
    }

    #[test]
    fn colocated_samples_split_their_cell() {
        let coords = [[0.0, 0.0], [0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [10.0, 10.0]];
        let data = PointSet::from_xy(&coords, vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let result = PolygonalDecluster::new(100).decluster(&data).unwrap();

        assert_relative_eq!(result.weights[0], result.weights[1], epsilon = 1e-12);
        assert!(result.weights.iter().all(|w| *w > 0.0));
        assert_relative_eq!(result.weights.iter().sum::<f64>(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn weights_give_a_finite_normal_score_table() {
        let coords = [[0.0, 0.0], [0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [10.0, 10.0]];
        let values = vec![0.5, 1.0, 2.0, 3.0, 4.0];
        let data = PointSet::from_xy(&coords, values.clone()).unwrap();
        let weights = PolygonalDecluster::new(100).decluster(&data).unwrap().weights;

        let nst = NormalScoreTransform::fit(&values, Some(&weights)).unwrap();
        assert_eq!(nst.len(), 5);
        assert!(nst.y.iter().all(|y| y.is_finite()));
        for y in [-4.0, -1.0, 0.0, 1.0, 4.0] {
            let z = nst.backward(y);
            assert!((0.5..=4.0).contains(&z), "{y} -> {z}");
        }
    }

    #[test]
    fn single_sample() {
        let data = PointSet::from_xy(&[[3.0, 4.0]], vec![2.0]).unwrap();
        let result = PolygonalDecluster::default().decluster(&data).unwrap();
        assert_eq!(result.weights, vec![1.0]);
        assert_relative_eq!(result.declustered_mean, 2.0);
    }

    #[test]
    fn volume_declustering() {
        let mut coords = Vec::new();
        for k in 0..3 {
            for j in 0..3 {
                for i in 0..3 {
                    coords.push([i as f64 * 5.0, j as f64 * 5.0, k as f64 * 5.0]);
                }
            }
        }
        let data = PointSet::from_xyz(&coords, vec![1.0; 27]).unwrap();
        let result = PolygonalDecluster::new(30).decluster(&data).unwrap();
        for w in result.weights {
            assert_relative_eq!(w, 1.0, epsilon = 1e-12);
        }
    }
}
