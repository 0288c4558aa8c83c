use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{GeostatError, Result};
use crate::spatial_database::coordinate_system::rotation_from_angles;

/// Range ellipsoid of a variogram structure.
///
/// The major range lies along the local y axis, the semi-major along local x and the
/// minor along local z, matching the search ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anisotropy {
    pub major: f64,
    pub semi: f64,
    pub minor: f64,
    /// Local to world rotation.
    pub rotation: UnitQuaternion<f64>,
}

impl Anisotropy {
    pub fn isotropic(range: f64) -> Self {
        Self {
            major: range,
            semi: range,
            minor: range,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Ranges with mining angles in degrees.
    pub fn new(major: f64, semi: f64, minor: f64, azimuth: f64, dip: f64, rake: f64) -> Self {
        Self {
            major,
            semi,
            minor,
            rotation: rotation_from_angles(azimuth, dip, rake),
        }
    }

    /// |h| scaled so that 1.0 is reached at the range in every direction.
    #[inline(always)]
    pub fn reduced_distance(&self, h: &Vector3<f64>) -> f64 {
        let local = self.rotation.inverse_transform_vector(h);
        let u = local.y / self.major;
        let v = local.x / self.semi;
        let w = local.z / self.minor;
        (u * u + v * v + w * w).sqrt()
    }

    /// Anisotropic distance expressed in units of the major axis.
    #[inline(always)]
    pub fn scaled_distance(&self, h: &Vector3<f64>) -> f64 {
        self.reduced_distance(h) * self.major
    }

    pub fn major_range(&self) -> f64 {
        self.major
    }

    /// Rescale all three ranges, keeping the anisotropy ratios.
    pub fn set_major_range(&mut self, range: f64) {
        let ratio = range / self.major;
        self.major = range;
        self.semi *= ratio;
        self.minor *= ratio;
    }

    pub fn validate(&self) -> Result<()> {
        for (name, r) in [
            ("major", self.major),
            ("semi", self.semi),
            ("minor", self.minor),
        ] {
            if !(r.is_finite() && r > 0.0) {
                return Err(GeostatError::ModelInvalid(format!(
                    "{name} range must be positive, got {r}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Anisotropy {
    fn default() -> Self {
        Self::isotropic(1.0)
    }
}
