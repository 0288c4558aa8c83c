use nalgebra::Vector3;

pub mod anisotropy;
pub mod auto_fit;
pub mod composite;
pub mod exponential;
pub mod gaussian;
pub mod hole_effect;
pub mod iso_fitter;
pub mod nugget;
pub mod power;
pub mod spherical;

/// Lags shorter than this are treated as zero separation.
pub const ZERO_LAG: f64 = 1e-10;

/// Variogram of a lag along a scalar distance, used when fitting omnidirectional curves.
pub trait IsoVariogramModel {
    fn c_0(&self) -> f64;
    fn variogram(&self, h: f64) -> f64;
    fn covariogram(&self, h: f64) -> f64 {
        self.c_0() - self.variogram(h)
    }
}

/// Anisotropic variogram of a lag vector.
///
/// For unbounded models `c_0` is zero and `covariogram` is the pseudo covariance -γ(h).
pub trait VariogramModel: Clone + Send + Sync {
    fn c_0(&self) -> f64;
    fn variogram(&self, h: Vector3<f64>) -> f64;
    fn covariogram(&self, h: Vector3<f64>) -> f64 {
        self.c_0() - self.variogram(h)
    }
}
