use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GeostatError, Result};
use crate::kriging::KrigingEstimate;
use crate::simulation::{quantile, Realizations};
use crate::spatial_database::gridded_databases::GridDefinition;

/// Blocks at or above one cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeTonnageRow {
    pub cutoff: f64,
    pub tonnage: f64,
    /// Tonnage weighted, 0 when no block reaches the cutoff.
    pub mean_grade: f64,
    pub metal: f64,
}

fn check_inputs(grades: &[f64], tonnes: &[f64], cutoffs: &[f64]) -> Result<()> {
    if grades.len() != tonnes.len() {
        return Err(GeostatError::InvalidInput(format!(
            "{} grades and {} block tonnages",
            grades.len(),
            tonnes.len()
        )));
    }
    if grades.iter().chain(cutoffs.iter()).any(|v| !v.is_finite()) {
        return Err(GeostatError::InvalidInput(
            "grades and cutoffs must be finite".to_string(),
        ));
    }
    if tonnes.iter().any(|t| !(t.is_finite() && *t >= 0.0)) {
        return Err(GeostatError::InvalidInput(
            "block tonnages must be finite and non-negative".to_string(),
        ));
    }
    Ok(())
}

fn curve(grades: &[f64], tonnes: &[f64], cutoffs: &[f64]) -> Vec<GradeTonnageRow> {
    cutoffs
        .iter()
        .map(|cutoff| {
            let (tonnage, metal) = grades
                .iter()
                .zip(tonnes.iter())
                .filter(|(g, _)| *g >= cutoff)
                .fold((0.0, 0.0), |(t, m), (g, w)| (t + w, m + g * w));
            let mean_grade = if tonnage > 0.0 { metal / tonnage } else { 0.0 };
            GradeTonnageRow {
                cutoff: *cutoff,
                tonnage,
                mean_grade,
                metal,
            }
        })
        .collect()
}

/// Tonnage, mean grade and metal above each cutoff.
pub fn grade_tonnage(
    grades: &[f64],
    tonnes: &[f64],
    cutoffs: &[f64],
) -> Result<Vec<GradeTonnageRow>> {
    check_inputs(grades, tonnes, cutoffs)?;
    Ok(curve(grades, tonnes, cutoffs))
}

/// Block tonnages from a density per node, or one density for every node.
pub fn block_tonnes(grid: &GridDefinition, density: &[f64]) -> Result<Vec<f64>> {
    let n = grid.n_nodes();
    if density.iter().any(|d| !(d.is_finite() && *d >= 0.0)) {
        return Err(GeostatError::InvalidInput(
            "density must be finite and non-negative".to_string(),
        ));
    }
    let volume = grid.block_volume();
    match density {
        [d] => Ok(vec![d * volume; n]),
        _ if density.len() == n => Ok(density.iter().map(|d| d * volume).collect()),
        _ => Err(GeostatError::InvalidInput(format!(
            "{} densities for {n} blocks",
            density.len()
        ))),
    }
}

/// Curve of kriged blocks, blocks whose estimate failed are left out.
pub fn grade_tonnage_from_estimates(
    estimates: &[Result<KrigingEstimate>],
    tonnes: &[f64],
    cutoffs: &[f64],
) -> Result<Vec<GradeTonnageRow>> {
    if estimates.len() != tonnes.len() {
        return Err(GeostatError::InvalidInput(format!(
            "{} estimates and {} block tonnages",
            estimates.len(),
            tonnes.len()
        )));
    }
    let (grades, tonnes): (Vec<f64>, Vec<f64>) = estimates
        .iter()
        .zip(tonnes.iter())
        .filter_map(|(e, t)| e.as_ref().ok().map(|e| (e.value, *t)))
        .unzip();
    grade_tonnage(&grades, &tonnes, cutoffs)
}

/// Spread of tonnage and metal across realizations at one cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeTonnageSummary {
    pub cutoff: f64,
    pub tonnage_p10: f64,
    pub tonnage_p50: f64,
    pub tonnage_p90: f64,
    pub metal_p10: f64,
    pub metal_p50: f64,
    pub metal_p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeTonnageCurves {
    /// One curve per realization.
    pub curves: Vec<Vec<GradeTonnageRow>>,
    pub summary: Vec<GradeTonnageSummary>,
}

impl GradeTonnageCurves {
    pub fn from_realizations(
        realizations: &Realizations,
        tonnes: &[f64],
        cutoffs: &[f64],
    ) -> Result<Self> {
        if realizations.values.ncols() != tonnes.len() {
            return Err(GeostatError::InvalidInput(format!(
                "{} nodes and {} block tonnages",
                realizations.values.ncols(),
                tonnes.len()
            )));
        }
        if realizations.n_realizations() == 0 {
            return Err(GeostatError::InsufficientData {
                found: 0,
                required: 1,
            });
        }

        let curves = (0..realizations.n_realizations())
            .into_par_iter()
            .map(|r| {
                let grades = realizations.realization(r).to_vec();
                check_inputs(&grades, tonnes, cutoffs)?;
                Ok(curve(&grades, tonnes, cutoffs))
            })
            .collect::<Result<Vec<_>>>()?;

        let summary = cutoffs
            .iter()
            .enumerate()
            .map(|(c, cutoff)| {
                let sorted = |f: fn(&GradeTonnageRow) -> f64| {
                    let mut v = curves.iter().map(|rows| f(&rows[c])).collect::<Vec<_>>();
                    v.sort_by_key(|x| OrderedFloat(*x));
                    v
                };
                let tonnage = sorted(|row| row.tonnage);
                let metal = sorted(|row| row.metal);
                GradeTonnageSummary {
                    cutoff: *cutoff,
                    tonnage_p10: quantile(&tonnage, 0.1),
                    tonnage_p50: quantile(&tonnage, 0.5),
                    tonnage_p90: quantile(&tonnage, 0.9),
                    metal_p10: quantile(&metal, 0.1),
                    metal_p50: quantile(&metal, 0.5),
                    metal_p90: quantile(&metal, 0.9),
                }
            })
            .collect();

        info!(
            n_realizations = curves.len(),
            n_cutoffs = cutoffs.len(),
            "grade-tonnage curves computed"
        );
        Ok(Self { curves, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ellipsoid::Ellipsoid;
    use crate::kriging::estimate_blocks;
    use crate::spatial_database::rtree_point_set::point_set::PointSet;
    use crate::spatial_database::ConditioningParams;
    use crate::systems::solved_systems::ok_system::OKSystemBuilder;
    use crate::variography::model_variograms::anisotropy::Anisotropy;
    use crate::variography::model_variograms::composite::{CompositeVariogram, VariogramType};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use ndarray::array;

    #[test]
    fn curve_above_cutoffs() {
        let grades = [0.5, 1.0, 2.0, 3.0];
        let tonnes = [10.0, 10.0, 20.0, 10.0];
        let rows = grade_tonnage(&grades, &tonnes, &[0.0, 1.5, 5.0]).unwrap();

        assert_relative_eq!(rows[0].tonnage, 50.0);
        assert_relative_eq!(rows[0].mean_grade, 85.0 / 50.0);
        assert_relative_eq!(rows[1].tonnage, 30.0);
        assert_relative_eq!(rows[1].mean_grade, 70.0 / 30.0);
        assert_relative_eq!(rows[1].metal, 70.0);
        assert_eq!(rows[2].tonnage, 0.0);
        assert_eq!(rows[2].mean_grade, 0.0);
        assert!(rows.windows(2).all(|w| w[0].tonnage >= w[1].tonnage));
    }

    #[test]
    fn cutoff_is_inclusive() {
        let rows = grade_tonnage(&[1.0, 2.0], &[1.0, 1.0], &[2.0]).unwrap();
        assert_relative_eq!(rows[0].tonnage, 1.0);
        assert_relative_eq!(rows[0].mean_grade, 2.0);
    }

    #[test]
    fn invalid_inputs() {
        assert!(grade_tonnage(&[1.0], &[1.0, 2.0], &[0.0]).is_err());
        assert!(grade_tonnage(&[1.0], &[-1.0], &[0.0]).is_err());
        assert!(grade_tonnage(&[f64::NAN], &[1.0], &[0.0]).is_err());
    }

    #[test]
    fn tonnes_from_density() {
        let grid = GridDefinition::new(
            nalgebra::Point3::origin(),
            Vector3::new(10.0, 10.0, 5.0),
            [2, 2, 1],
        );
        assert_eq!(block_tonnes(&grid, &[2.7]).unwrap(), vec![1350.0; 4]);
        let per_node = block_tonnes(&grid, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_relative_eq!(per_node[3], 2000.0);
        assert!(block_tonnes(&grid, &[1.0, 2.0]).is_err());

        let planar = GridDefinition::planar([0.0, 0.0], [10.0, 10.0], [2, 2]);
        assert_eq!(block_tonnes(&planar, &[1.0]).unwrap(), vec![100.0; 4]);
    }

    #[test]
    fn kriged_blocks() {
        let data = PointSet::from_xy(
            &[[5.0, 5.0], [15.0, 5.0], [5.0, 15.0], [15.0, 15.0]],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let vgram = CompositeVariogram::new(vec![VariogramType::spherical(
            1.0,
            Anisotropy::isotropic(30.0),
        )]);
        let grid = GridDefinition::planar([5.0, 5.0], [10.0, 10.0], [2, 2]);
        let blocks = grid.blocks(Vector3::new(2.5, 2.5, 1.0));
        let estimates = estimate_blocks(
            &data,
            &vgram,
            &Ellipsoid::isotropic(50.0),
            &ConditioningParams::new(8, 1, None, 1),
            &OKSystemBuilder,
            &blocks,
        )
        .unwrap();
        let tonnes = block_tonnes(&grid, &[2.5]).unwrap();

        let rows = grade_tonnage_from_estimates(&estimates, &tonnes, &[f64::MIN, 2.5]).unwrap();
        let total_metal = estimates
            .iter()
            .map(|e| e.as_ref().unwrap().value * 250.0)
            .sum::<f64>();
        assert_relative_eq!(rows[0].tonnage, 1000.0);
        assert_relative_eq!(rows[0].metal, total_metal, epsilon = 1e-9);
        assert!(rows[1].tonnage < rows[0].tonnage);
    }

    #[test]
    fn failed_estimates_are_skipped() {
        let estimates = vec![
            Ok(KrigingEstimate {
                value: 2.0,
                variance: 0.1,
                weights: vec![1.0],
                indices: vec![0],
                multipliers: vec![],
            }),
            Err(GeostatError::InsufficientData {
                found: 0,
                required: 1,
            }),
        ];
        let rows = grade_tonnage_from_estimates(&estimates, &[5.0, 5.0], &[0.0]).unwrap();
        assert_relative_eq!(rows[0].tonnage, 5.0);
        assert_relative_eq!(rows[0].mean_grade, 2.0);
    }

    #[test]
    fn realization_spread() {
        let realizations = Realizations {
            grid: GridDefinition::planar([0.0, 0.0], [1.0, 1.0], [2, 1]),
            values: array![[1.0, 3.0], [2.0, 2.0], [0.5, 0.5]],
        };
        let curves =
            GradeTonnageCurves::from_realizations(&realizations, &[1.0, 1.0], &[1.5]).unwrap();

        assert_eq!(curves.curves.len(), 3);
        assert_relative_eq!(curves.curves[0][0].tonnage, 1.0);
        assert_relative_eq!(curves.curves[1][0].tonnage, 2.0);
        assert_relative_eq!(curves.curves[2][0].tonnage, 0.0);

        let summary = curves.summary[0];
        assert_relative_eq!(summary.tonnage_p50, 1.0);
        assert_relative_eq!(summary.tonnage_p10, 0.2);
        assert_relative_eq!(summary.tonnage_p90, 1.8);
        assert_relative_eq!(summary.metal_p50, 3.0);
        assert!(summary.tonnage_p10 <= summary.tonnage_p50 && summary.tonnage_p50 <= summary.tonnage_p90);

        assert!(GradeTonnageCurves::from_realizations(&realizations, &[1.0], &[1.5]).is_err());
    }
}
