use serde::{Deserialize, Serialize};

use crate::error::{GeostatError, Result};

pub mod cloud;
pub mod cpu_calculator;

pub use cloud::{CloudPair, VariogramCloud};
pub use cpu_calculator::VariogramCalculator;

/// Direction of a directional variogram, angles in degrees.
///
/// Azimuth is clockwise from north (+y), dip is positive downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction {
    pub azimuth: f64,
    pub dip: f64,
    pub angle_tolerance: f64,
    pub bandwidth: f64,
}

impl Direction {
    pub fn new(azimuth: f64, dip: f64, angle_tolerance: f64, bandwidth: f64) -> Self {
        Self {
            azimuth,
            dip,
            angle_tolerance,
            bandwidth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariogramConfig {
    pub n_lags: usize,
    pub lag_size: f64,
    /// Half width of each bin, defaults to half the lag size.
    pub lag_tolerance: Option<f64>,
    pub direction: Option<Direction>,
}

impl VariogramConfig {
    pub fn new(n_lags: usize, lag_size: f64) -> Self {
        Self {
            n_lags,
            lag_size,
            lag_tolerance: None,
            direction: None,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_lag_tolerance(mut self, lag_tolerance: f64) -> Self {
        self.lag_tolerance = Some(lag_tolerance);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_lags == 0 {
            return Err(GeostatError::InvalidInput(
                "n_lags must be positive".to_string(),
            ));
        }
        if !(self.lag_size.is_finite() && self.lag_size > 0.0) {
            return Err(GeostatError::InvalidInput(format!(
                "lag_size must be positive, got {}",
                self.lag_size
            )));
        }
        if let Some(tol) = self.lag_tolerance {
            if !(tol.is_finite() && tol > 0.0) {
                return Err(GeostatError::InvalidInput(format!(
                    "lag_tolerance must be positive, got {tol}"
                )));
            }
        }
        if let Some(dir) = self.direction {
            if !(dir.angle_tolerance > 0.0 && dir.angle_tolerance <= 90.0) {
                return Err(GeostatError::InvalidInput(format!(
                    "angle tolerance must be in (0, 90], got {}",
                    dir.angle_tolerance
                )));
            }
            if !(dir.bandwidth > 0.0) {
                return Err(GeostatError::InvalidInput(format!(
                    "bandwidth must be positive, got {}",
                    dir.bandwidth
                )));
            }
        }
        Ok(())
    }

    pub fn lag_bounds(&self) -> Vec<LagBounds> {
        let tol = self.lag_tolerance.unwrap_or(self.lag_size / 2.0);
        (0..self.n_lags)
            .map(|k| {
                let center = (k as f64 + 0.5) * self.lag_size;
                LagBounds::new((center - tol).max(0.0), center + tol)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagBounds {
    pub lb: f64,
    pub ub: f64,
}

impl LagBounds {
    pub fn new(lb: f64, ub: f64) -> Self {
        Self { lb, ub }
    }

    pub fn mid_point(&self) -> f64 {
        (self.lb + self.ub) / 2.0
    }

    #[inline(always)]
    pub fn contains(&self, h: f64) -> bool {
        self.lb <= h && h < self.ub
    }
}

/// One lag of an experimental variogram. `None` marks a bin without pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagBin {
    pub bounds: LagBounds,
    pub pair_count: u64,
    pub mean_distance: Option<f64>,
    pub semivariance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentalVariogram {
    pub direction: Option<Direction>,
    pub lags: Vec<LagBin>,
}

impl ExperimentalVariogram {
    /// (distance, semivariance, pair count) of the bins holding data.
    pub fn valid_lags(&self) -> impl Iterator<Item = (f64, f64, u64)> + '_ {
        self.lags.iter().filter_map(|bin| {
            let gamma = bin.semivariance?;
            let h = bin.mean_distance.unwrap_or_else(|| bin.bounds.mid_point());
            Some((h, gamma, bin.pair_count))
        })
    }

    pub fn n_valid(&self) -> usize {
        self.lags.iter().filter(|b| b.semivariance.is_some()).count()
    }
}
