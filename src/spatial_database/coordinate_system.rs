use nalgebra::{Isometry, Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSystem {
    pub translation: Translation3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub world_to_local: Isometry3<f64>,
    pub local_to_world: Isometry3<f64>,
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self::new(Translation3::identity(), UnitQuaternion::identity())
    }
}

impl CoordinateSystem {
    /// Creates a new coordinate system from a translation and a rotation quaternion
    /// # Arguments
    /// * `translation` - translation component of the coordinate system (origin of coordinate system)
    /// * `quat` - rotation component of the coordinate system
    pub fn new(translation: Translation3<f64>, quat: UnitQuaternion<f64>) -> Self {
        let local_to_world = Isometry::from_parts(translation, quat);
        let world_to_local = local_to_world.inverse();
        Self {
            translation,
            rotation: quat,
            world_to_local,
            local_to_world,
        }
    }

    /// Set the origin of the coordinate system
    pub fn set_origin(&mut self, origin: Point3<f64>) {
        self.translation = Translation3::new(origin.x, origin.y, origin.z);
        self.local_to_world = Isometry::from_parts(self.translation, self.rotation);
        self.world_to_local = self.local_to_world.inverse();
    }

    /// Create a coordinate system from an origin and mining angles in degrees.
    ///
    /// The local y axis is rotated onto the azimuth (clockwise from north), tilted
    /// down by the dip, then rolled about itself by the rake.
    pub fn from_origin_and_angles(origin: Point3<f64>, azimuth: f64, dip: f64, rake: f64) -> Self {
        let trans = Translation3::new(origin.x, origin.y, origin.z);
        Self::new(trans, rotation_from_angles(azimuth, dip, rake))
    }

    /// Origin of the coordinate system
    pub fn origin(&self) -> Point3<f64> {
        Point3::new(self.translation.x, self.translation.y, self.translation.z)
    }

    /// Convert a point from global to local coordinates
    pub fn global_to_local(&self, point: &Point3<f64>) -> Point3<f64> {
        self.world_to_local.transform_point(point)
    }

    /// Convert a point from local to global coordinates
    pub fn local_to_global(&self, point: &Point3<f64>) -> Point3<f64> {
        self.local_to_world.transform_point(point)
    }
}

/// Rotation taking the local frame (major axis along +y) to world coordinates.
pub fn rotation_from_angles(azimuth: f64, dip: f64, rake: f64) -> UnitQuaternion<f64> {
    let az = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -azimuth.to_radians());
    let dp = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -dip.to_radians());
    let rk = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), rake.to_radians());
    az * dp * rk
}

/// Octant of a point
pub fn octant(point: &Point3<f64>) -> u8 {
    match (point.x >= 0.0, point.y >= 0.0, point.z >= 0.0) {
        (true, true, true) => 0,
        (false, true, true) => 1,
        (false, false, true) => 2,
        (true, false, true) => 3,
        (true, true, false) => 4,
        (false, true, false) => 5,
        (false, false, false) => 6,
        (true, false, false) => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FORWARD;
    use approx::assert_relative_eq;

    #[test]
    fn no_offset_no_rotation() {
        let coordinate_system =
            CoordinateSystem::from_origin_and_angles(Point3::origin(), 0.0, 0.0, 0.0);
        let point = Point3::new(1.0, 1.0, 1.0);
        let transformed_point = coordinate_system.global_to_local(&point);
        assert_relative_eq!(transformed_point, point, epsilon = 1e-12);
    }

    #[test]
    fn offset_no_rotation() {
        let coordinate_system =
            CoordinateSystem::from_origin_and_angles(Point3::new(1.0, 1.0, 1.0), 0.0, 0.0, 0.0);
        let transformed_point = coordinate_system.global_to_local(&Point3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(
            transformed_point,
            Point3::new(1.0, 1.0, 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn azimuth_points_major_axis_east() {
        let rot = rotation_from_angles(90.0, 0.0, 0.0);
        let major = rot * FORWARD;
        assert_relative_eq!(major, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn dip_points_major_axis_down() {
        let rot = rotation_from_angles(0.0, 90.0, 0.0);
        let major = rot * FORWARD;
        assert_relative_eq!(major, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn back_offset_rotation() {
        let coordinate_system =
            CoordinateSystem::from_origin_and_angles(Point3::new(1.0, 2.0, 3.0), 30.0, 45.0, 60.0);
        let point = Point3::new(1.3660254, 4.38013939, 2.55171226);
        let transformed_point = coordinate_system.global_to_local(&point);
        let back_transformed_point = coordinate_system.local_to_global(&transformed_point);
        assert_relative_eq!(point, back_transformed_point, epsilon = 1e-10);
    }

    #[test]
    fn octants_are_distinct() {
        let mut seen = [false; 8];
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for z in [-1.0, 1.0] {
                    seen[octant(&Point3::new(x, y, z)) as usize] = true;
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
    }
}
