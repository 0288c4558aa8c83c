use crate::error::{GeostatError, Result};
use crate::geometry::variogram_tolerance::VariogramTolerance;
use crate::spatial_database::rtree_point_set::point_set::PointSet;

use super::{ExperimentalVariogram, LagBin, LagBounds, VariogramConfig};

use itertools::izip;
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
struct BinAccumulator {
    count: u64,
    distance: f64,
    value: f64,
}

/// Pairs samples into lag bins and averages a per-pair statistic.
#[derive(Clone)]
pub struct VariogramCalculator<'a> {
    //data tree
    data: &'a PointSet,

    //lag bounds
    lags: Vec<LagBounds>,

    config: VariogramConfig,
    tolerance: Option<VariogramTolerance>,
}

impl<'a> VariogramCalculator<'a> {
    pub fn new(data: &'a PointSet, config: VariogramConfig) -> Result<Self> {
        config.validate()?;
        let tolerance = config
            .direction
            .map(|d| VariogramTolerance::new(d.azimuth, d.dip, d.angle_tolerance, d.bandwidth));
        Ok(Self {
            data,
            lags: config.lag_bounds(),
            config,
            tolerance,
        })
    }

    /// Semivariance (1/2N) Σ (z_i - z_j)² per lag.
    pub fn calculate(&self) -> ExperimentalVariogram {
        let values = &self.data.data;
        self.accumulate(|i, j| {
            let d = values[i] - values[j];
            d * d
        })
    }

    /// Cross semivariance (1/2N) Σ (z_i - z_j)(w_i - w_j) against a co-located variable.
    pub fn calculate_cross(&self, other: &[f64]) -> Result<ExperimentalVariogram> {
        if other.len() != self.data.len() {
            return Err(GeostatError::InvalidInput(format!(
                "cross variable has {} values for {} samples",
                other.len(),
                self.data.len()
            )));
        }
        if let Some(i) = other.iter().position(|v| !v.is_finite()) {
            return Err(GeostatError::InvalidInput(format!(
                "non-finite cross value at sample {i}"
            )));
        }
        let values = &self.data.data;
        Ok(self.accumulate(|i, j| (values[i] - values[j]) * (other[i] - other[j])))
    }

    fn accumulate<F>(&self, pair_value: F) -> ExperimentalVariogram
    where
        F: Fn(usize, usize) -> f64 + Sync,
    {
        let n_lags = self.lags.len();
        let max_dist = self.lags.iter().map(|l| l.ub).fold(0.0, f64::max);
        let max_dist_sq = max_dist * max_dist;
        let points = &self.data.points;

        let bins = (0..points.len())
            .into_par_iter()
            .fold(
                || vec![BinAccumulator::default(); n_lags],
                |mut bins, i| {
                    let p = points[i];
                    for pair in self
                        .data
                        .tree
                        .locate_within_distance([p.x, p.y, p.z], max_dist_sq)
                    {
                        let j = pair.data;
                        // unordered pairs, each counted once
                        if j <= i {
                            continue;
                        }
                        let h = points[j] - p;
                        let dist = h.norm();
                        if dist == 0.0 {
                            continue;
                        }
                        if let Some(tolerance) = &self.tolerance {
                            if !tolerance.contains(&h) {
                                continue;
                            }
                        }
                        let value = pair_value(i, j);
                        for (bin, bounds) in bins.iter_mut().zip(self.lags.iter()) {
                            if bounds.contains(dist) {
                                bin.count += 1;
                                bin.distance += dist;
                                bin.value += value;
                            }
                        }
                    }
                    bins
                },
            )
            .reduce(
                || vec![BinAccumulator::default(); n_lags],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b.iter()) {
                        x.count += y.count;
                        x.distance += y.distance;
                        x.value += y.value;
                    }
                    a
                },
            );

        let lags = izip!(self.lags.iter(), bins.iter())
            .map(|(bounds, acc)| {
                let (mean_distance, semivariance) = if acc.count == 0 {
                    (None, None)
                } else {
                    let n = acc.count as f64;
                    (Some(acc.distance / n), Some(acc.value / (2.0 * n)))
                };
                LagBin {
                    bounds: *bounds,
                    pair_count: acc.count,
                    mean_distance,
                    semivariance,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            n_lags,
            empty_lags = lags.iter().filter(|l| l.pair_count == 0).count(),
            "experimental variogram computed"
        );

        ExperimentalVariogram {
            direction: self.config.direction,
            lags,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::variography::experimental::Direction;
    use approx::assert_relative_eq;

    fn regular_grid(nx: usize, ny: usize, value: impl Fn(usize, usize) -> f64) -> PointSet {
        let mut coords = Vec::new();
        let mut values = Vec::new();
        for j in 0..ny {
            for i in 0..nx {
                coords.push([i as f64, j as f64]);
                values.push(value(i, j));
            }
        }
        PointSet::from_xy(&coords, values).unwrap()
    }

    #[test]
    fn constant_field_has_zero_semivariance() {
        let data = regular_grid(5, 4, |_, _| 10.0);
        let calc = VariogramCalculator::new(&data, VariogramConfig::new(5, 1.0)).unwrap();
        let vgram = calc.calculate();

        for bin in vgram.lags.iter() {
            if bin.pair_count > 0 {
                assert_eq!(bin.semivariance, Some(0.0));
            }
        }
        assert!(vgram.n_valid() > 0);
    }

    #[test]
    fn linear_trend_semivariance() {
        // z = x on a line: pairs at distance h have (z_i - z_j)² = h²
        let data = PointSet::from_xy(
            &(0..10).map(|i| [i as f64, 0.0]).collect::<Vec<_>>(),
            (0..10).map(|i| i as f64).collect(),
        )
        .unwrap();
        let calc = VariogramCalculator::new(&data, VariogramConfig::new(3, 1.0)).unwrap();
        let vgram = calc.calculate();

        // bin [0.5, 1.5) holds the 9 unit pairs
        assert_eq!(vgram.lags[1].pair_count, 9);
        assert_relative_eq!(vgram.lags[1].semivariance.unwrap(), 0.5);
        assert_relative_eq!(vgram.lags[1].mean_distance.unwrap(), 1.0);
        assert_eq!(vgram.lags[2].pair_count, 8);
        assert_relative_eq!(vgram.lags[2].semivariance.unwrap(), 2.0);
    }

    #[test]
    fn empty_bins_are_marked() {
        let data = PointSet::from_xy(&[[0.0, 0.0], [10.0, 0.0]], vec![1.0, 3.0]).unwrap();
        let calc = VariogramCalculator::new(&data, VariogramConfig::new(12, 1.0)).unwrap();
        let vgram = calc.calculate();

        assert_eq!(vgram.lags.len(), 12);
        assert!(vgram.lags[0].semivariance.is_none());
        assert!(vgram.lags[0].mean_distance.is_none());
        assert_relative_eq!(vgram.lags[10].semivariance.unwrap(), 2.0);
        assert_eq!(vgram.n_valid(), 1);
    }

    #[test]
    fn directional_variogram_separates_axes() {
        // values vary along x only
        let data = regular_grid(6, 6, |i, _| i as f64);
        let north = VariogramConfig::new(3, 1.0).with_direction(Direction::new(0.0, 0.0, 10.0, 0.5));
        let east = VariogramConfig::new(3, 1.0).with_direction(Direction::new(90.0, 0.0, 10.0, 0.5));

        let vn = VariogramCalculator::new(&data, north).unwrap().calculate();
        let ve = VariogramCalculator::new(&data, east).unwrap().calculate();

        assert_eq!(vn.lags[1].semivariance, Some(0.0));
        assert_relative_eq!(ve.lags[1].semivariance.unwrap(), 0.5);
        assert_eq!(vn.lags[1].pair_count, 30);
    }

    #[test]
    fn cross_variogram_of_variable_with_itself() {
        let data = regular_grid(5, 5, |i, j| (i * j) as f64);
        let calc = VariogramCalculator::new(&data, VariogramConfig::new(4, 1.0)).unwrap();
        let direct = calc.calculate();
        let cross = calc.calculate_cross(&data.data.clone()).unwrap();
        assert_eq!(direct, cross);
        assert!(calc.calculate_cross(&[1.0]).is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let data = regular_grid(2, 2, |_, _| 1.0);
        assert!(VariogramCalculator::new(&data, VariogramConfig::new(0, 1.0)).is_err());
        assert!(VariogramCalculator::new(&data, VariogramConfig::new(3, -1.0)).is_err());
    }
}
