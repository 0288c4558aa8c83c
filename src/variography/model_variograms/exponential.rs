use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{anisotropy::Anisotropy, IsoVariogramModel, VariogramModel};

/// Exponential structure, 95% of the sill is reached at the practical range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialVariogram {
    pub sill: f64,
    pub anisotropy: Anisotropy,
}

impl ExponentialVariogram {
    pub fn new(sill: f64, anisotropy: Anisotropy) -> Self {
        Self { sill, anisotropy }
    }

    #[inline(always)]
    pub fn shape(r: f64) -> f64 {
        1.0 - (-3.0 * r).exp()
    }
}

impl IsoVariogramModel for ExponentialVariogram {
    fn c_0(&self) -> f64 {
        self.sill
    }

    fn variogram(&self, h: f64) -> f64 {
        self.sill * Self::shape(h.abs() / self.anisotropy.major)
    }
}

impl VariogramModel for ExponentialVariogram {
    #[inline(always)]
    fn c_0(&self) -> f64 {
        self.sill
    }

    #[inline(always)]
    fn variogram(&self, h: Vector3<f64>) -> f64 {
        self.sill * Self::shape(self.anisotropy.reduced_distance(&h))
    }
}
