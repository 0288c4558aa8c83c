use std::f64::consts::PI;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{anisotropy::Anisotropy, IsoVariogramModel, VariogramModel, ZERO_LAG};

/// Dampened periodic structure, γ overshoots the sill before settling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoleEffectVariogram {
    pub sill: f64,
    pub anisotropy: Anisotropy,
}

impl HoleEffectVariogram {
    pub fn new(sill: f64, anisotropy: Anisotropy) -> Self {
        Self { sill, anisotropy }
    }

    #[inline(always)]
    pub fn shape(r: f64) -> f64 {
        if r < ZERO_LAG {
            return 0.0;
        }
        let x = PI * r;
        1.0 - x.sin() / x
    }
}

impl IsoVariogramModel for HoleEffectVariogram {
    fn c_0(&self) -> f64 {
        self.sill
    }

    fn variogram(&self, h: f64) -> f64 {
        self.sill * Self::shape(h.abs() / self.anisotropy.major)
    }
}

impl VariogramModel for HoleEffectVariogram {
    #[inline(always)]
    fn c_0(&self) -> f64 {
        self.sill
    }

    #[inline(always)]
    fn variogram(&self, h: Vector3<f64>) -> f64 {
        self.sill * Self::shape(self.anisotropy.reduced_distance(&h))
    }
}
