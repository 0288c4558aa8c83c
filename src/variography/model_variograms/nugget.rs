use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{IsoVariogramModel, VariogramModel, ZERO_LAG};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nugget {
    pub sill: f64,
}

impl Nugget {
    pub fn new(sill: f64) -> Self {
        Self { sill }
    }
}

impl IsoVariogramModel for Nugget {
    fn c_0(&self) -> f64 {
        self.sill
    }

    fn variogram(&self, h: f64) -> f64 {
        if h.abs() < ZERO_LAG {
            0.0
        } else {
            self.sill
        }
    }
}

impl VariogramModel for Nugget {
    #[inline(always)]
    fn c_0(&self) -> f64 {
        self.sill
    }

    #[inline(always)]
    fn variogram(&self, h: Vector3<f64>) -> f64 {
        if h.norm() < ZERO_LAG {
            0.0
        } else {
            self.sill
        }
    }
}
