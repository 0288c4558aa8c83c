use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::geometry::{ellipsoid::Ellipsoid, support::Support};
use crate::spatial_database::rtree_point_set::point_set::PointSet;
use crate::spatial_database::ConditioningParams;
use crate::systems::solved_systems::SolvedSystemBuilder;
use crate::variography::model_variograms::composite::CompositeVariogram;

use super::{estimate_support, validate_inputs, KrigingWorkspace};

/// Outcome of re-estimating one sample from its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationRecord {
    pub index: usize,
    pub true_value: f64,
    pub estimate: Option<f64>,
    pub variance: Option<f64>,
    /// estimate - true value
    pub error: Option<f64>,
    pub failure: Option<String>,
}

impl CrossValidationRecord {
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }
}

/// Leave-one-out diagnostics, computed over the successful folds only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub records: Vec<CrossValidationRecord>,
    pub mean_error: Option<f64>,
    pub mean_squared_error: Option<f64>,
    /// Mean of error² / variance over folds with a positive variance.
    pub standardized_error_variance: Option<f64>,
    pub n_valid: usize,
    pub n_failed: usize,
}

impl CrossValidationReport {
    fn from_records(records: Vec<CrossValidationRecord>) -> Self {
        let errors = records
            .iter()
            .filter_map(|r| r.error.zip(r.variance))
            .collect::<Vec<_>>();
        let n_valid = errors.len();
        let n_failed = records.len() - n_valid;

        let mean = |iter: &mut dyn Iterator<Item = f64>| {
            let (sum, count) = iter.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            (count > 0).then(|| sum / count as f64)
        };

        let mean_error = mean(&mut errors.iter().map(|(e, _)| *e));
        let mean_squared_error = mean(&mut errors.iter().map(|(e, _)| e * e));
        let standardized_error_variance = mean(
            &mut errors
                .iter()
                .filter(|(_, var)| *var > 0.0)
                .map(|(e, var)| e * e / var),
        );

        Self {
            records,
            mean_error,
            mean_squared_error,
            standardized_error_variance,
            n_valid,
            n_failed,
        }
    }
}

/// Leave-one-out cross-validation of `vgram` with the search of `ellipsoid` and `params`.
///
/// Each fold excludes its own sample from the neighbourhood, failed folds are
/// recorded with their reason and left out of the diagnostics.
pub fn cross_validate<B>(
    data: &PointSet,
    vgram: &CompositeVariogram,
    ellipsoid: &Ellipsoid,
    params: &ConditioningParams,
    builder: &B,
) -> Result<CrossValidationReport>
where
    B: SolvedSystemBuilder,
{
    validate_inputs(vgram, ellipsoid, params, builder)?;

    let records = (0..data.len())
        .into_par_iter()
        .map_with(KrigingWorkspace::default(), |workspace, i| {
            let true_value = data.data[i];
            let fold = estimate_support(
                data,
                vgram,
                ellipsoid,
                params,
                builder,
                &Support::Point(data.points[i]),
                |j| j != i,
                workspace,
            );
            match fold {
                Ok(est) => CrossValidationRecord {
                    index: i,
                    true_value,
                    estimate: Some(est.value),
                    variance: Some(est.variance),
                    error: Some(est.value - true_value),
                    failure: None,
                },
                Err(e) => CrossValidationRecord {
                    index: i,
                    true_value,
                    estimate: None,
                    variance: None,
                    error: None,
                    failure: Some(e.to_string()),
                },
            }
        })
        .collect::<Vec<_>>();

    let report = CrossValidationReport::from_records(records);
    info!(
        n_valid = report.n_valid,
        n_failed = report.n_failed,
        mean_error = report.mean_error,
        mean_squared_error = report.mean_squared_error,
        "cross validation complete"
    );
    Ok(report)
}
