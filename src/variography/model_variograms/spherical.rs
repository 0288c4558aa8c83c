use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{anisotropy::Anisotropy, IsoVariogramModel, VariogramModel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalVariogram {
    pub sill: f64,
    pub anisotropy: Anisotropy,
}

impl SphericalVariogram {
    pub fn new(sill: f64, anisotropy: Anisotropy) -> Self {
        Self { sill, anisotropy }
    }

    /// Unit sill shape at reduced distance `r`.
    #[inline(always)]
    pub fn shape(r: f64) -> f64 {
        if r < 1.0 {
            1.5 * r - 0.5 * r * r * r
        } else {
            1.0
        }
    }
}

impl IsoVariogramModel for SphericalVariogram {
    fn c_0(&self) -> f64 {
        self.sill
    }

    fn variogram(&self, h: f64) -> f64 {
        self.sill * Self::shape(h.abs() / self.anisotropy.major)
    }
}

impl VariogramModel for SphericalVariogram {
    #[inline(always)]
    fn c_0(&self) -> f64 {
        self.sill
    }

    #[inline(always)]
    fn variogram(&self, h: Vector3<f64>) -> f64 {
        self.sill * Self::shape(self.anisotropy.reduced_distance(&h))
    }
}
