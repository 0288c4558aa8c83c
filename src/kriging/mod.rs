use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GeostatError, Result};
use crate::geometry::{ellipsoid::Ellipsoid, support::Support};
use crate::spatial_database::rtree_point_set::point_set::{Dimension, PointSet};
use crate::spatial_database::{ConditioningParams, Neighborhood};
use crate::systems::lu::LUSystem;
use crate::systems::solved_systems::{SolvedSystem, SolvedSystemBuilder};
use crate::systems::system_builder::SystemBuffers;
use crate::variography::model_variograms::composite::CompositeVariogram;
use crate::variography::model_variograms::VariogramModel;

pub mod cross_validation;
pub mod indicator;

/// Kriged value at one point or block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KrigingEstimate {
    pub value: f64,
    /// Kriging variance, clamped to be non-negative.
    pub variance: f64,
    pub weights: Vec<f64>,
    /// Indices of the conditioning samples, aligned with `weights`.
    pub indices: Vec<usize>,
    /// Lagrange multipliers, empty for simple kriging.
    pub multipliers: Vec<f64>,
}

/// Per worker scratch space.
#[derive(Debug, Clone, Default)]
pub struct KrigingWorkspace {
    pub system: LUSystem,
    pub buffers: SystemBuffers,
    pub supports: Vec<Support>,
}

/// Checks shared by every batch entry point, failures here abort the whole batch.
pub fn validate_inputs<B: SolvedSystemBuilder>(
    vgram: &CompositeVariogram,
    ellipsoid: &Ellipsoid,
    params: &ConditioningParams,
    builder: &B,
) -> Result<()> {
    ellipsoid.validate()?;
    params.validate()?;
    vgram.validate()?;
    if builder.requires_bounded_model() && !vgram.is_bounded() {
        return Err(GeostatError::ModelInvalid(
            "simple kriging requires a bounded variogram".to_string(),
        ));
    }
    Ok(())
}

/// Build and solve the kriging system of `target` against the points of `hood`.
pub fn solve_neighborhood<V, B>(
    hood: &Neighborhood,
    target: &Support,
    vgram: &V,
    builder: &B,
    dimension: Dimension,
    workspace: &mut KrigingWorkspace,
) -> Result<SolvedSystem>
where
    V: VariogramModel,
    B: SolvedSystemBuilder,
{
    let required = builder.min_samples(dimension);
    if hood.len() < required {
        return Err(GeostatError::InsufficientData {
            found: hood.len(),
            required,
        });
    }

    workspace.supports.clear();
    workspace
        .supports
        .extend(hood.neighbors.iter().map(|n| Support::Point(n.point)));

    workspace.system.build(
        &workspace.supports,
        target,
        vgram,
        builder,
        dimension,
        &mut workspace.buffers,
    );
    builder.solve(&workspace.system)
}

/// Krige a single support, searching around its centre among the samples accepted by `filter`.
#[allow(clippy::too_many_arguments)]
pub fn estimate_support<B, F>(
    data: &PointSet,
    vgram: &CompositeVariogram,
    ellipsoid: &Ellipsoid,
    params: &ConditioningParams,
    builder: &B,
    target: &Support,
    filter: F,
    workspace: &mut KrigingWorkspace,
) -> Result<KrigingEstimate>
where
    B: SolvedSystemBuilder,
    F: Fn(usize) -> bool,
{
    let hood = data.query_filtered(&target.center(), ellipsoid, params, filter)?;
    let solved = solve_neighborhood(&hood, target, vgram, builder, data.dimension, workspace)?;

    Ok(KrigingEstimate {
        value: solved.estimate(&hood.values()),
        variance: solved.variance,
        weights: solved.weights,
        indices: hood.indices(),
        multipliers: solved.multipliers,
    })
}

/// Krige a batch of supports in parallel.
///
/// The outer error rejects the whole batch, inner errors are local to one target.
pub fn estimate_blocks<B>(
    data: &PointSet,
    vgram: &CompositeVariogram,
    ellipsoid: &Ellipsoid,
    params: &ConditioningParams,
    builder: &B,
    targets: &[Support],
) -> Result<Vec<Result<KrigingEstimate>>>
where
    B: SolvedSystemBuilder,
{
    validate_inputs(vgram, ellipsoid, params, builder)?;

    let results = targets
        .par_iter()
        .map_with(KrigingWorkspace::default(), |workspace, target| {
            estimate_support(
                data,
                vgram,
                ellipsoid,
                params,
                builder,
                target,
                |_| true,
                workspace,
            )
        })
        .collect::<Vec<_>>();

    let n_failed = results.iter().filter(|r| r.is_err()).count();
    info!(
        n_targets = targets.len(),
        n_failed, "kriging batch complete"
    );

    Ok(results)
}

/// Krige a batch of points in parallel.
pub fn estimate<B>(
    data: &PointSet,
    vgram: &CompositeVariogram,
    ellipsoid: &Ellipsoid,
    params: &ConditioningParams,
    builder: &B,
    targets: &[Point3<f64>],
) -> Result<Vec<Result<KrigingEstimate>>>
where
    B: SolvedSystemBuilder,
{
    let supports = targets.iter().map(|p| Support::Point(*p)).collect::<Vec<_>>();
    estimate_blocks(data, vgram, ellipsoid, params, builder, &supports)
}
