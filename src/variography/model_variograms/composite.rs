use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GeostatError, Result};
use crate::spatial_database::coordinate_system::rotation_from_angles;

use super::{
    anisotropy::Anisotropy, exponential::ExponentialVariogram, gaussian::GaussianVariogram,
    hole_effect::HoleEffectVariogram, nugget::Nugget, power::PowerVariogram,
    spherical::SphericalVariogram, IsoVariogramModel, VariogramModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VariogramType {
    Nugget(Nugget),
    Spherical(SphericalVariogram),
    Exponential(ExponentialVariogram),
    Gaussian(GaussianVariogram),
    Power(PowerVariogram),
    HoleEffect(HoleEffectVariogram),
}

impl VariogramType {
    pub fn nugget(sill: f64) -> Self {
        VariogramType::Nugget(Nugget::new(sill))
    }

    pub fn spherical(sill: f64, anisotropy: Anisotropy) -> Self {
        VariogramType::Spherical(SphericalVariogram::new(sill, anisotropy))
    }

    pub fn exponential(sill: f64, anisotropy: Anisotropy) -> Self {
        VariogramType::Exponential(ExponentialVariogram::new(sill, anisotropy))
    }

    pub fn gaussian(sill: f64, anisotropy: Anisotropy) -> Self {
        VariogramType::Gaussian(GaussianVariogram::new(sill, anisotropy))
    }

    pub fn hole_effect(sill: f64, anisotropy: Anisotropy) -> Self {
        VariogramType::HoleEffect(HoleEffectVariogram::new(sill, anisotropy))
    }

    pub fn power(slope: f64, exponent: f64) -> Self {
        VariogramType::Power(PowerVariogram::isotropic(slope, exponent))
    }

    pub fn name(&self) -> &'static str {
        match self {
            VariogramType::Nugget(_) => "nugget",
            VariogramType::Spherical(_) => "spherical",
            VariogramType::Exponential(_) => "exponential",
            VariogramType::Gaussian(_) => "gaussian",
            VariogramType::Power(_) => "power",
            VariogramType::HoleEffect(_) => "hole_effect",
        }
    }

    pub fn is_bounded(&self) -> bool {
        !matches!(self, VariogramType::Power(_))
    }

    fn anisotropy_mut(&mut self) -> Option<&mut Anisotropy> {
        match self {
            VariogramType::Nugget(_) => None,
            VariogramType::Spherical(v) => Some(&mut v.anisotropy),
            VariogramType::Exponential(v) => Some(&mut v.anisotropy),
            VariogramType::Gaussian(v) => Some(&mut v.anisotropy),
            VariogramType::Power(v) => Some(&mut v.anisotropy),
            VariogramType::HoleEffect(v) => Some(&mut v.anisotropy),
        }
    }

    pub fn anisotropy(&self) -> Option<&Anisotropy> {
        match self {
            VariogramType::Nugget(_) => None,
            VariogramType::Spherical(v) => Some(&v.anisotropy),
            VariogramType::Exponential(v) => Some(&v.anisotropy),
            VariogramType::Gaussian(v) => Some(&v.anisotropy),
            VariogramType::Power(v) => Some(&v.anisotropy),
            VariogramType::HoleEffect(v) => Some(&v.anisotropy),
        }
    }

    /// Number of parameters adjusted by the fitter.
    pub fn param_cnt(&self) -> usize {
        match self {
            VariogramType::Nugget(_) => 1,
            _ => 2,
        }
    }

    /// Fitted parameters: `[sill]` for the nugget, `[range, sill]` for bounded
    /// structures and `[slope, exponent]` for the power model.
    pub fn params(&self) -> Vec<f64> {
        match self {
            VariogramType::Nugget(v) => vec![v.sill],
            VariogramType::Spherical(v) => vec![v.anisotropy.major, v.sill],
            VariogramType::Exponential(v) => vec![v.anisotropy.major, v.sill],
            VariogramType::Gaussian(v) => vec![v.anisotropy.major, v.sill],
            VariogramType::HoleEffect(v) => vec![v.anisotropy.major, v.sill],
            VariogramType::Power(v) => vec![v.slope, v.exponent],
        }
    }

    pub fn set_params_from_slice(&mut self, params: &[f64]) {
        match self {
            VariogramType::Nugget(v) => v.sill = params[0],
            VariogramType::Power(v) => {
                v.slope = params[0];
                v.exponent = params[1];
            }
            VariogramType::Spherical(v) => {
                v.anisotropy.set_major_range(params[0]);
                v.sill = params[1];
            }
            VariogramType::Exponential(v) => {
                v.anisotropy.set_major_range(params[0]);
                v.sill = params[1];
            }
            VariogramType::Gaussian(v) => {
                v.anisotropy.set_major_range(params[0]);
                v.sill = params[1];
            }
            VariogramType::HoleEffect(v) => {
                v.anisotropy.set_major_range(params[0]);
                v.sill = params[1];
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            VariogramType::Power(v) => {
                if !(v.slope.is_finite() && v.slope >= 0.0) {
                    return Err(GeostatError::ModelInvalid(format!(
                        "power slope must be non-negative, got {}",
                        v.slope
                    )));
                }
                if !(v.exponent > 0.0 && v.exponent < 2.0) {
                    return Err(GeostatError::ModelInvalid(format!(
                        "power exponent must be in (0, 2), got {}",
                        v.exponent
                    )));
                }
                v.anisotropy.validate()
            }
            _ => {
                let sill = IsoVariogramModel::c_0(self);
                if !(sill.is_finite() && sill >= 0.0) {
                    return Err(GeostatError::ModelInvalid(format!(
                        "{} sill must be non-negative, got {sill}",
                        self.name()
                    )));
                }
                match self.anisotropy() {
                    Some(aniso) => aniso.validate(),
                    None => Ok(()),
                }
            }
        }
    }
}

impl IsoVariogramModel for VariogramType {
    fn c_0(&self) -> f64 {
        match self {
            VariogramType::Nugget(v) => IsoVariogramModel::c_0(v),
            VariogramType::Spherical(v) => IsoVariogramModel::c_0(v),
            VariogramType::Exponential(v) => IsoVariogramModel::c_0(v),
            VariogramType::Gaussian(v) => IsoVariogramModel::c_0(v),
            VariogramType::Power(v) => IsoVariogramModel::c_0(v),
            VariogramType::HoleEffect(v) => IsoVariogramModel::c_0(v),
        }
    }

    fn variogram(&self, h: f64) -> f64 {
        match self {
            VariogramType::Nugget(v) => IsoVariogramModel::variogram(v, h),
            VariogramType::Spherical(v) => IsoVariogramModel::variogram(v, h),
            VariogramType::Exponential(v) => IsoVariogramModel::variogram(v, h),
            VariogramType::Gaussian(v) => IsoVariogramModel::variogram(v, h),
            VariogramType::Power(v) => IsoVariogramModel::variogram(v, h),
            VariogramType::HoleEffect(v) => IsoVariogramModel::variogram(v, h),
        }
    }
}

impl VariogramModel for VariogramType {
    #[inline(always)]
    fn c_0(&self) -> f64 {
        IsoVariogramModel::c_0(self)
    }

    #[inline(always)]
    fn variogram(&self, h: Vector3<f64>) -> f64 {
        match self {
            VariogramType::Nugget(v) => VariogramModel::variogram(v, h),
            VariogramType::Spherical(v) => VariogramModel::variogram(v, h),
            VariogramType::Exponential(v) => VariogramModel::variogram(v, h),
            VariogramType::Gaussian(v) => VariogramModel::variogram(v, h),
            VariogramType::Power(v) => VariogramModel::variogram(v, h),
            VariogramType::HoleEffect(v) => VariogramModel::variogram(v, h),
        }
    }
}

/// Nested variogram structures, summed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeVariogram {
    pub variograms: Vec<VariogramType>,
}

impl CompositeVariogram {
    pub fn new(variograms: Vec<VariogramType>) -> Self {
        Self { variograms }
    }

    pub fn nugget(&self) -> f64 {
        self.variograms
            .iter()
            .filter_map(|v| match v {
                VariogramType::Nugget(n) => Some(n.sill),
                _ => None,
            })
            .sum()
    }

    /// Nugget plus the sills of all bounded structures.
    pub fn total_sill(&self) -> f64 {
        VariogramModel::c_0(self)
    }

    pub fn is_bounded(&self) -> bool {
        self.variograms.iter().all(VariogramType::is_bounded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.variograms.is_empty() {
            return Err(GeostatError::ModelInvalid(
                "model has no structures".to_string(),
            ));
        }
        self.variograms.iter().try_for_each(VariogramType::validate)
    }

    /// Warn when the total sill departs from the data variance by more than `tolerance` (relative).
    pub fn validate_against_variance(&self, data_variance: f64, tolerance: f64) -> Result<()> {
        self.validate()?;
        if !self.is_bounded() || data_variance <= 0.0 {
            return Ok(());
        }
        let sill = self.total_sill();
        let rel = (sill - data_variance).abs() / data_variance;
        if rel > tolerance {
            warn!(
                total_sill = sill,
                data_variance,
                relative_difference = rel,
                "variogram sill does not match the data variance"
            );
        }
        Ok(())
    }

    pub fn iso_variogram(&self, h: f64) -> f64 {
        IsoVariogramModel::variogram(self, h)
    }

    /// Orient every structure, keeping their ranges.
    pub fn set_orientation(&mut self, azimuth: f64, dip: f64, rake: f64) {
        let rotation = rotation_from_angles(azimuth, dip, rake);
        for v in self.variograms.iter_mut() {
            if let Some(aniso) = v.anisotropy_mut() {
                aniso.rotation = rotation;
            }
        }
    }

    /// Set semi/major and minor/major range ratios on every structure.
    pub fn set_range_ratios(&mut self, semi_ratio: f64, minor_ratio: f64) {
        for v in self.variograms.iter_mut() {
            if let Some(aniso) = v.anisotropy_mut() {
                aniso.semi = aniso.major * semi_ratio;
                aniso.minor = aniso.major * minor_ratio;
            }
        }
    }
}

impl IsoVariogramModel for CompositeVariogram {
    fn c_0(&self) -> f64 {
        self.variograms.iter().map(IsoVariogramModel::c_0).sum()
    }

    fn variogram(&self, h: f64) -> f64 {
        self.variograms
            .iter()
            .fold(0.0, |acc, v| acc + IsoVariogramModel::variogram(v, h))
    }
}

impl VariogramModel for CompositeVariogram {
    #[inline(always)]
    fn c_0(&self) -> f64 {
        self.variograms.iter().map(VariogramModel::c_0).sum()
    }

    #[inline(always)]
    fn variogram(&self, h: Vector3<f64>) -> f64 {
        self.variograms
            .iter()
            .fold(0.0, |acc, v| acc + VariogramModel::variogram(v, h))
    }
}
