use tracing::{debug, info, warn};

use crate::error::{GeostatError, Result};
use crate::variography::experimental::ExperimentalVariogram;

use super::anisotropy::Anisotropy;
use super::composite::{CompositeVariogram, VariogramType};
use super::iso_fitter::{CompositeVariogramFitter, FitConfig, FitResult};

/// Semivariances at or below this are treated as a flat variogram.
const DEGENERATE_GAMMA: f64 = 1e-12;

/// Relative SSE difference under which the model with fewer structures is preferred.
pub const PARSIMONY_TOLERANCE: f64 = 1e-9;

/// Spherical, exponential and nugget + spherical structure sets.
pub fn default_candidates() -> Vec<Vec<VariogramType>> {
    let aniso = Anisotropy::isotropic(1.0);
    vec![
        vec![VariogramType::spherical(1.0, aniso)],
        vec![VariogramType::exponential(1.0, aniso)],
        vec![
            VariogramType::nugget(0.0),
            VariogramType::spherical(1.0, aniso),
        ],
    ]
}

/// Fit spherical, exponential and nugget + spherical models and keep the lowest weighted SSE.
pub fn auto_fit(exp_vgram: &ExperimentalVariogram, config: &FitConfig) -> Result<FitResult> {
    auto_fit_with(exp_vgram, config, default_candidates())
}

/// Fit each candidate structure set and keep the lowest weighted SSE.
pub fn auto_fit_with(
    exp_vgram: &ExperimentalVariogram,
    config: &FitConfig,
    candidates: Vec<Vec<VariogramType>>,
) -> Result<FitResult> {
    config.validate()?;
    if candidates.is_empty() || candidates.iter().any(|c| c.is_empty()) {
        return Err(GeostatError::InvalidInput(
            "auto-fit needs at least one non-empty candidate".to_string(),
        ));
    }
    let valid = exp_vgram.valid_lags().collect::<Vec<_>>();
    if valid.is_empty() {
        return Err(GeostatError::InsufficientData {
            found: 0,
            required: 1,
        });
    }

    if valid.iter().all(|(_, gamma, _)| *gamma <= DEGENERATE_GAMMA) {
        info!("flat experimental variogram, using a zero nugget model");
        let model = CompositeVariogram::new(vec![VariogramType::nugget(0.0)]);
        let weighted_sse = valid.iter().map(|(_, g, n)| *n as f64 * g * g).sum();
        return Ok(FitResult {
            model,
            weighted_sse,
        });
    }

    let results = candidates
        .into_iter()
        .map(|structures| {
            CompositeVariogramFitter::new(exp_vgram, structures).and_then(|f| f.fit(config))
        })
        .collect::<Vec<_>>();

    select_best(results)
}

/// Lowest SSE wins, near ties go to the model with fewer structures.
pub fn select_best(results: Vec<Result<FitResult>>) -> Result<FitResult> {
    let mut first_error = None;
    let mut best: Option<FitResult> = None;

    for result in results {
        let candidate = match result {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(error = %e, "auto-fit candidate failed");
                first_error.get_or_insert(e);
                continue;
            }
        };
        debug!(
            structures = ?candidate.model.variograms.iter().map(|v| v.name()).collect::<Vec<_>>(),
            sse = candidate.weighted_sse,
            "auto-fit candidate"
        );

        best = match best {
            None => Some(candidate),
            Some(current) => Some(prefer(current, candidate)),
        };
    }

    match best {
        Some(best) => {
            info!(
                structures = ?best.model.variograms.iter().map(|v| v.name()).collect::<Vec<_>>(),
                sse = best.weighted_sse,
                "auto-fit selected model"
            );
            Ok(best)
        }
        None => Err(first_error.unwrap_or(GeostatError::InsufficientData {
            found: 0,
            required: 1,
        })),
    }
}

fn prefer(current: FitResult, candidate: FitResult) -> FitResult {
    let scale = current
        .weighted_sse
        .abs()
        .max(candidate.weighted_sse.abs())
        .max(f64::MIN_POSITIVE);
    let diff = candidate.weighted_sse - current.weighted_sse;
    if diff.abs() <= PARSIMONY_TOLERANCE * scale {
        if candidate.model.variograms.len() < current.model.variograms.len() {
            candidate
        } else {
            current
        }
    } else if diff < 0.0 {
        candidate
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial_database::rtree_point_set::point_set::PointSet;
    use crate::variography::experimental::{LagBin, LagBounds, VariogramCalculator, VariogramConfig};
    use crate::variography::model_variograms::gaussian::GaussianVariogram;
    use crate::variography::model_variograms::spherical::SphericalVariogram;

    fn result(n_structures: usize, sse: f64) -> Result<FitResult> {
        Ok(FitResult {
            model: CompositeVariogram::new(vec![VariogramType::nugget(0.0); n_structures]),
            weighted_sse: sse,
        })
    }

    #[test]
    fn constant_grid_fits_zero_nugget() {
        let mut coords = vec![];
        for j in 0..4 {
            for i in 0..5 {
                coords.push([i as f64, j as f64]);
            }
        }
        let data = PointSet::from_xy(&coords, vec![10.0; 20]).unwrap();
        let vgram = VariogramCalculator::new(&data, VariogramConfig::new(5, 1.0))
            .unwrap()
            .calculate();
        assert!(vgram.valid_lags().all(|(_, g, _)| g == 0.0));

        let fit = auto_fit(&vgram, &FitConfig::default()).unwrap();
        assert_eq!(fit.model.variograms, vec![VariogramType::nugget(0.0)]);
        assert_eq!(fit.model.total_sill(), 0.0);
    }

    #[test]
    fn no_data_is_insufficient() {
        let vgram = ExperimentalVariogram {
            direction: None,
            lags: vec![LagBin {
                bounds: LagBounds::new(0.0, 1.0),
                pair_count: 0,
                mean_distance: None,
                semivariance: None,
            }],
        };
        assert!(matches!(
            auto_fit(&vgram, &FitConfig::default()),
            Err(GeostatError::InsufficientData { .. })
        ));
    }

    #[test]
    fn spherical_data_selects_a_spherical_model() {
        let lags = (1..=12)
            .map(|k| {
                let h = k as f64 * 10.0;
                LagBin {
                    bounds: LagBounds::new(h - 5.0, h + 5.0),
                    pair_count: 50,
                    mean_distance: Some(h),
                    semivariance: Some(SphericalVariogram::shape(h / 60.0)),
                }
            })
            .collect();
        let vgram = ExperimentalVariogram {
            direction: None,
            lags,
        };
        let fit = auto_fit(&vgram, &FitConfig::default()).unwrap();
        assert!(fit
            .model
            .variograms
            .iter()
            .any(|v| matches!(v, VariogramType::Spherical(_))));
        assert!(fit.weighted_sse < 1e-4);
    }

    #[test]
    fn caller_candidates_are_used() {
        let lags = (1..=12)
            .map(|k| {
                let h = k as f64 * 5.0;
                LagBin {
                    bounds: LagBounds::new(h - 2.5, h + 2.5),
                    pair_count: 50,
                    mean_distance: Some(h),
                    semivariance: Some(2.0 * GaussianVariogram::shape(h / 30.0)),
                }
            })
            .collect();
        let vgram = ExperimentalVariogram {
            direction: None,
            lags,
        };
        let aniso = Anisotropy::isotropic(1.0);
        let candidates = vec![
            vec![VariogramType::spherical(1.0, aniso)],
            vec![VariogramType::gaussian(1.0, aniso)],
        ];
        let fit = auto_fit_with(&vgram, &FitConfig::default(), candidates).unwrap();
        assert!(matches!(fit.model.variograms[..], [VariogramType::Gaussian(_)]));
        assert!((fit.model.total_sill() - 2.0).abs() < 0.1);

        assert!(matches!(
            auto_fit_with(&vgram, &FitConfig::default(), vec![]),
            Err(GeostatError::InvalidInput(_))
        ));
    }

    #[test]
    fn ties_prefer_fewer_structures() {
        let best = select_best(vec![result(2, 1.0), result(1, 1.0 + 1e-12)]).unwrap();
        assert_eq!(best.model.variograms.len(), 1);

        let best = select_best(vec![result(1, 2.0), result(2, 1.0)]).unwrap();
        assert_eq!(best.model.variograms.len(), 2);
    }

    #[test]
    fn failed_candidates_are_skipped() {
        let best = select_best(vec![
            Err(GeostatError::OptimizerNonConvergence { iterations: 10 }),
            result(1, 3.0),
        ])
        .unwrap();
        assert_eq!(best.weighted_sse, 3.0);

        let err = select_best(vec![
            Err(GeostatError::OptimizerNonConvergence { iterations: 10 }),
            Err(GeostatError::ModelInvalid("x".into())),
        ])
        .unwrap_err();
        assert!(matches!(err, GeostatError::OptimizerNonConvergence { .. }));
    }
}
