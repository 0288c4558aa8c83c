use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{anisotropy::Anisotropy, IsoVariogramModel, VariogramModel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianVariogram {
    pub sill: f64,
    pub anisotropy: Anisotropy,
}

impl GaussianVariogram {
    pub fn new(sill: f64, anisotropy: Anisotropy) -> Self {
        Self { sill, anisotropy }
    }

    #[inline(always)]
    pub fn shape(r: f64) -> f64 {
        1.0 - (-3.0 * r * r).exp()
    }
}

impl IsoVariogramModel for GaussianVariogram {
    fn c_0(&self) -> f64 {
        self.sill
    }

    fn variogram(&self, h: f64) -> f64 {
        self.sill * Self::shape(h.abs() / self.anisotropy.major)
    }
}

impl VariogramModel for GaussianVariogram {
    #[inline(always)]
    fn c_0(&self) -> f64 {
        self.sill
    }

    #[inline(always)]
    fn variogram(&self, h: Vector3<f64>) -> f64 {
        self.sill * Self::shape(self.anisotropy.reduced_distance(&h))
    }
}
