use nalgebra::{Unit, Vector3};

use crate::spatial_database::coordinate_system::rotation_from_angles;
use crate::FORWARD;

/// Direction cone with bandwidth used to accept pairs for a directional variogram.
#[derive(Clone, Debug)]
pub struct VariogramTolerance {
    pub axis: Unit<Vector3<f64>>,
    pub cos_tol: f64,
    pub bandwidth: f64,
}

impl VariogramTolerance {
    /// Azimuth and dip in degrees, `angle_tolerance` is the cone half angle in degrees.
    pub fn new(azimuth: f64, dip: f64, angle_tolerance: f64, bandwidth: f64) -> Self {
        let axis = Unit::new_normalize(rotation_from_angles(azimuth, dip, 0.0) * FORWARD);
        Self {
            axis,
            cos_tol: angle_tolerance.to_radians().cos(),
            bandwidth,
        }
    }

    /// Whether a separation vector lies in the cone (either sense) and within the bandwidth.
    pub fn contains(&self, h: &Vector3<f64>) -> bool {
        let len = h.norm();
        if len == 0.0 {
            return false;
        }
        let axis = self.axis.into_inner();
        let along = h.dot(&axis);
        if along.abs() < self.cos_tol * len {
            return false;
        }
        let perp = (h - axis * along).norm();
        perp <= self.bandwidth
    }
}
