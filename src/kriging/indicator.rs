use itertools::izip;
use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GeostatError, Result};
use crate::geometry::{ellipsoid::Ellipsoid, support::Support};
use crate::spatial_database::rtree_point_set::point_set::{Dimension, PointSet};
use crate::spatial_database::{ConditioningParams, Neighbor, Neighborhood};
use crate::systems::solved_systems::{ok_system::OKSystemBuilder, SolvedSystem};
use crate::variography::model_variograms::composite::CompositeVariogram;

use super::{solve_neighborhood, validate_inputs, KrigingWorkspace};

/// Conditional cumulative distribution estimated at the thresholds `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IKCPDF {
    pub p: Vec<f64>,
    pub x: Vec<f64>,
}

impl IKCPDF {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            p: Vec::with_capacity(capacity),
            x: Vec::with_capacity(capacity),
        }
    }

    /// Order relation correction: clip to [0, 1] then average the forward running
    /// maximum with the backward running minimum.
    pub fn correct(&mut self) {
        self.p.iter_mut().for_each(|x| *x = x.clamp(0.0, 1.0));

        let mut curr_max = f64::MIN;
        let forward_running_max = self.p.iter().map(|v| {
            if *v > curr_max {
                curr_max = *v;
            }
            curr_max
        });

        let mut curr_min = f64::MAX;
        let backward_min = self
            .p
            .iter()
            .rev()
            .map(|v| {
                if *v < curr_min {
                    curr_min = *v;
                }
                curr_min
            })
            .collect::<Vec<_>>();

        self.p = izip!(forward_running_max, backward_min.iter().rev())
            .map(|(f, b)| (f + b) / 2.0)
            .collect::<Vec<f64>>();
    }

    /// Class drawn for the uniform number `u`: the first threshold whose probability
    /// reaches `u`, or `x.len()` for the class above the last threshold.
    pub fn sample_class(&self, u: f64) -> usize {
        self.p
            .iter()
            .position(|p| u <= *p)
            .unwrap_or(self.p.len())
    }

    pub fn is_monotone(&self) -> bool {
        self.p.windows(2).all(|w| w[0] <= w[1])
            && self.p.iter().all(|p| (0.0..=1.0).contains(p))
    }
}

/// Thresholds with either one shared variogram or one variogram per threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorKriging {
    pub thresholds: Vec<f64>,
    pub models: Vec<CompositeVariogram>,
}

impl IndicatorKriging {
    pub fn new(thresholds: Vec<f64>, models: Vec<CompositeVariogram>) -> Result<Self> {
        let ik = Self { thresholds, models };
        ik.validate()?;
        Ok(ik)
    }

    pub fn validate(&self) -> Result<()> {
        if self.thresholds.is_empty() {
            return Err(GeostatError::InvalidInput(
                "at least one threshold is required".to_string(),
            ));
        }
        if self.thresholds.iter().any(|t| !t.is_finite())
            || self.thresholds.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(GeostatError::InvalidInput(
                "thresholds must be finite and strictly increasing".to_string(),
            ));
        }
        if self.models.len() != 1 && self.models.len() != self.thresholds.len() {
            return Err(GeostatError::InvalidInput(format!(
                "{} models for {} thresholds",
                self.models.len(),
                self.thresholds.len()
            )));
        }
        self.models.iter().try_for_each(CompositeVariogram::validate)
    }

    pub fn n_thresholds(&self) -> usize {
        self.thresholds.len()
    }

    pub fn model(&self, k: usize) -> &CompositeVariogram {
        if self.models.len() == 1 {
            &self.models[0]
        } else {
            &self.models[k]
        }
    }

    /// Number of thresholds at or above `value`, i.e. the index of its class.
    pub fn class_of(&self, value: f64) -> usize {
        self.thresholds
            .iter()
            .position(|t| value <= *t)
            .unwrap_or(self.thresholds.len())
    }

    /// Corrected ccdf at `target` from the neighbours of `hood`.
    ///
    /// `indicator(neighbor, k)` is the indicator of `neighbor` at threshold `k`.
    pub fn ccdf_from_neighborhood<F>(
        &self,
        hood: &Neighborhood,
        target: &Support,
        dimension: Dimension,
        workspace: &mut KrigingWorkspace,
        indicator: F,
    ) -> Result<IKCPDF>
    where
        F: Fn(&Neighbor, usize) -> f64,
    {
        let mut cpdf = IKCPDF::with_capacity(self.n_thresholds());
        let mut values = Vec::with_capacity(hood.len());

        let mut solved: Option<SolvedSystem> = None;
        for (k, threshold) in self.thresholds.iter().enumerate() {
            // one model for every threshold means the weights are shared as well
            let system = match solved.take() {
                Some(system) if self.models.len() == 1 => system,
                _ => solve_neighborhood(
                    hood,
                    target,
                    self.model(k),
                    &OKSystemBuilder,
                    dimension,
                    workspace,
                )?,
            };

            values.clear();
            values.extend(hood.neighbors.iter().map(|n| indicator(n, k)));
            cpdf.p.push(system.estimate(&values));
            cpdf.x.push(*threshold);
            solved = Some(system);
        }

        cpdf.correct();
        Ok(cpdf)
    }
}

/// Indicator kriging of the conditional distribution at each target, in parallel.
pub fn estimate_ccdf(
    data: &PointSet,
    ik: &IndicatorKriging,
    ellipsoid: &Ellipsoid,
    params: &ConditioningParams,
    targets: &[Point3<f64>],
) -> Result<Vec<Result<IKCPDF>>> {
    ik.validate()?;
    for model in ik.models.iter() {
        validate_inputs(model, ellipsoid, params, &OKSystemBuilder)?;
    }

    let thresholds = &ik.thresholds;
    let results = targets
        .par_iter()
        .map_with(KrigingWorkspace::default(), |workspace, point| {
            let hood = data.query(point, ellipsoid, params)?;
            ik.ccdf_from_neighborhood(
                &hood,
                &Support::Point(*point),
                data.dimension,
                workspace,
                |n, k| {
                    if n.value <= thresholds[k] {
                        1.0
                    } else {
                        0.0
                    }
                },
            )
        })
        .collect::<Vec<_>>();

    info!(
        n_targets = targets.len(),
        n_failed = results.iter().filter(|r| r.is_err()).count(),
        "indicator kriging complete"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variography::model_variograms::anisotropy::Anisotropy;
    use crate::variography::model_variograms::composite::VariogramType;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ik_model(range: f64) -> CompositeVariogram {
        CompositeVariogram::new(vec![
            VariogramType::nugget(0.05),
            VariogramType::spherical(0.2, Anisotropy::isotropic(range)),
        ])
    }

    #[test]
    fn correction_enforces_order_relations() {
        let mut cpdf = IKCPDF {
            p: vec![0.2, -0.1, 0.5, 0.4, 1.3],
            x: vec![1.0, 2.0, 3.0, 4.0, 5.0],
        };
        cpdf.correct();

        assert!(cpdf.is_monotone());
        assert_relative_eq!(cpdf.p[0], 0.1);
        assert_relative_eq!(cpdf.p[4], 1.0);
    }

    #[test]
    fn correction_keeps_valid_ccdf() {
        let mut cpdf = IKCPDF {
            p: vec![0.1, 0.3, 0.8],
            x: vec![1.0, 2.0, 3.0],
        };
        cpdf.correct();
        assert_eq!(cpdf.p, vec![0.1, 0.3, 0.8]);
    }

    #[test]
    fn class_sampling() {
        let cpdf = IKCPDF {
            p: vec![0.25, 0.5, 0.75],
            x: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(cpdf.sample_class(0.1), 0);
        assert_eq!(cpdf.sample_class(0.5), 1);
        assert_eq!(cpdf.sample_class(0.9), 3);
    }

    #[test]
    fn thresholds_must_increase() {
        assert!(IndicatorKriging::new(vec![1.0, 1.0], vec![ik_model(10.0)]).is_err());
        assert!(IndicatorKriging::new(vec![2.0, 1.0], vec![ik_model(10.0)]).is_err());
        assert!(IndicatorKriging::new(vec![1.0, 2.0], vec![ik_model(10.0); 3]).is_err());
        assert!(IndicatorKriging::new(vec![1.0, 2.0], vec![ik_model(10.0); 2]).is_ok());
    }

    #[test]
    fn ccdf_is_monotone_and_bounded() {
        let mut rng = StdRng::seed_from_u64(11);
        let coords = (0..300)
            .map(|_| [rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)])
            .collect::<Vec<_>>();
        let values = (0..300).map(|_| rng.gen_range(0.0..10.0)).collect();
        let data = PointSet::from_xy(&coords, values).unwrap();

        // distinct models per threshold can break order relations before correction
        let ik = IndicatorKriging::new(
            vec![2.0, 4.0, 6.0, 8.0],
            vec![ik_model(5.0), ik_model(40.0), ik_model(10.0), ik_model(60.0)],
        )
        .unwrap();
        let targets = (0..50)
            .map(|_| Point3::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0), 0.0))
            .collect::<Vec<_>>();
        let params = ConditioningParams::new(12, 4, None, 1);

        let ccdfs = estimate_ccdf(&data, &ik, &Ellipsoid::isotropic(30.0), &params, &targets)
            .unwrap();
        for ccdf in ccdfs {
            let ccdf = ccdf.unwrap();
            assert!(ccdf.is_monotone(), "{:?}", ccdf.p);
            assert_eq!(ccdf.x, ik.thresholds);
        }
    }

    #[test]
    fn shared_model_at_sample_reproduces_indicator() {
        let data =
            PointSet::from_xy(&[[0.0, 0.0], [10.0, 0.0], [20.0, 0.0]], vec![1.0, 5.0, 9.0]).unwrap();
        let ik = IndicatorKriging::new(vec![3.0, 6.0], vec![ik_model(15.0)]).unwrap();
        let ccdf = estimate_ccdf(
            &data,
            &ik,
            &Ellipsoid::isotropic(50.0),
            &ConditioningParams::new(8, 1, None, 1),
            &[Point3::new(10.0, 0.0, 0.0)],
        )
        .unwrap()
        .remove(0)
        .unwrap();
        assert_relative_eq!(ccdf.p[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(ccdf.p[1], 1.0, epsilon = 1e-9);
    }
}
