pub mod aabb;
pub mod ellipsoid;
pub mod support;
pub mod variogram_tolerance;
