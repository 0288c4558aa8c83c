use nalgebra::Vector3;

pub mod declustering;
pub mod error;
pub mod geometry;
pub mod grade_tonnage;
pub mod kriging;
pub mod simulation;
pub mod spatial_database;
pub mod systems;
pub mod transforms;
pub mod variography;

pub mod prelude {

    pub mod re_exports {
        pub use nalgebra;
        pub use ndarray;
        pub use rstar;
    }

    pub use crate::declustering::{
        declustered_mean, declustered_variance,
        grid::{DeclusterDirection, DeclusterResult, GridDecluster},
        polygonal::{PolygonalDecluster, PolygonalResult},
    };
    pub use crate::error::{GeostatError, Result};
    pub use crate::geometry::{aabb::Aabb, ellipsoid::Ellipsoid, support::Support};
    pub use crate::grade_tonnage::{
        block_tonnes, grade_tonnage, grade_tonnage_from_estimates, GradeTonnageCurves,
        GradeTonnageRow, GradeTonnageSummary,
    };
    pub use crate::kriging::{
        cross_validation::{cross_validate, CrossValidationReport},
        estimate, estimate_blocks,
        indicator::{estimate_ccdf, IndicatorKriging, IKCPDF},
        KrigingEstimate,
    };
    pub use crate::simulation::{
        sgs::{simulate as sgs_simulate, SGSParameters},
        sis::{simulate as sis_simulate, SISParameters, SisOutput},
        EnsembleStatistics, Realizations, SimulationParameters,
    };
    pub use crate::spatial_database::{
        gridded_databases::GridDefinition, rtree_point_set::point_set::PointSet,
        ConditioningParams,
    };
    pub use crate::systems::solved_systems::{
        ok_system::OKSystemBuilder, sk_system::SKSystemBuilder, uk_system::{Drift, UKSystemBuilder},
        SolvedSystemBuilder,
    };
    pub use crate::transforms::{
        hermite::HermiteAnamorphosis, indicator_transform, normal_score::NormalScoreTransform,
        IdentityTransform, LogTransform, ValueTransform,
    };
    pub use crate::variography::experimental::{
        Direction, ExperimentalVariogram, VariogramCalculator, VariogramCloud, VariogramConfig,
    };
    pub use crate::variography::model_variograms::{
        anisotropy::Anisotropy,
        auto_fit::{auto_fit, auto_fit_with, default_candidates},
        composite::{CompositeVariogram, VariogramType},
        iso_fitter::{CompositeVariogramFitter, FitConfig, FitResult},
        VariogramModel,
    };
}

/// Local axis of the major range (north).
pub const FORWARD: Vector3<f64> = Vector3::new(0.0, 1.0, 0.0);
