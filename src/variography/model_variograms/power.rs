use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{anisotropy::Anisotropy, IsoVariogramModel, VariogramModel};

/// Unbounded power structure γ(h) = slope · |h|^exponent.
///
/// There is no sill, so `c_0` is zero and the covariogram is the pseudo covariance -γ(h).
/// The anisotropy ranges act as relative stretch factors along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerVariogram {
    pub slope: f64,
    pub exponent: f64,
    pub anisotropy: Anisotropy,
}

impl PowerVariogram {
    pub fn new(slope: f64, exponent: f64, anisotropy: Anisotropy) -> Self {
        Self {
            slope,
            exponent,
            anisotropy,
        }
    }

    pub fn isotropic(slope: f64, exponent: f64) -> Self {
        Self::new(slope, exponent, Anisotropy::isotropic(1.0))
    }
}

impl IsoVariogramModel for PowerVariogram {
    fn c_0(&self) -> f64 {
        0.0
    }

    fn variogram(&self, h: f64) -> f64 {
        self.slope * h.abs().powf(self.exponent)
    }
}

impl VariogramModel for PowerVariogram {
    #[inline(always)]
    fn c_0(&self) -> f64 {
        0.0
    }

    #[inline(always)]
    fn variogram(&self, h: Vector3<f64>) -> f64 {
        self.slope * self.anisotropy.scaled_distance(&h).powf(self.exponent)
    }
}
