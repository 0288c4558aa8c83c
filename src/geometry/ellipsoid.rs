use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{GeostatError, Result};
use crate::spatial_database::coordinate_system::{octant, CoordinateSystem};

/// Search ellipsoid.
///
/// `a` is the major semi-axis (local y), `b` the semi-major (local x) and `c` the minor (local z).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub coordinate_system: CoordinateSystem,
}

impl Ellipsoid {
    /// Create a new Ellipsoid with given major (a), semi-major (b), and minor axis (c)
    ///  coordinate system defines location and orientation of ellipsoid
    ///      - location is defined by the translation component of the coordinate system
    ///      - orientation is defined by the rotation component of the coordinate system
    pub fn new(a: f64, b: f64, c: f64, coordinate_system: CoordinateSystem) -> Self {
        Self {
            a,
            b,
            c,
            coordinate_system,
        }
    }

    pub fn isotropic(radius: f64) -> Self {
        Self::new(radius, radius, radius, CoordinateSystem::default())
    }

    /// Ellipsoid oriented by azimuth, dip and rake in degrees.
    pub fn from_angles(a: f64, b: f64, c: f64, azimuth: f64, dip: f64, rake: f64) -> Self {
        let cs = CoordinateSystem::from_origin_and_angles(Point3::origin(), azimuth, dip, rake);
        Self::new(a, b, c, cs)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("a", self.a), ("b", self.b), ("c", self.c)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(GeostatError::InvalidInput(format!(
                    "search radius {name} must be positive, got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Largest semi-axis, no point further than this can be inside.
    pub fn bounding_radius(&self) -> f64 {
        self.a.max(self.b).max(self.c)
    }

    pub fn translate_to(&mut self, translation: &Point3<f64>) {
        self.coordinate_system.set_origin(*translation);
    }

    pub fn normalized_local_distance_sq(&self, point: &Point3<f64>) -> f64 {
        let u = point.y / self.a;
        let v = point.x / self.b;
        let w = point.z / self.c;

        u * u + v * v + w * w
    }

    pub fn normalized_local_distance(&self, point: &Point3<f64>) -> f64 {
        self.normalized_local_distance_sq(point).sqrt()
    }

    /// Checks if ellipsoid contains a point (world coordinates)
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        let point = self.coordinate_system.global_to_local(point);

        self.normalized_local_distance_sq(&point) <= 1.0
    }

    /// Normalized distance and octant of a world point, `None` when outside.
    pub fn locate(&self, point: &Point3<f64>) -> Option<(f64, u8)> {
        let local = self.coordinate_system.global_to_local(point);
        let dist_sq = self.normalized_local_distance_sq(&local);
        if dist_sq > 1.0 {
            return None;
        }
        Some((dist_sq.sqrt(), octant(&local)))
    }
}
