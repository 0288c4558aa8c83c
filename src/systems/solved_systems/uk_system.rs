use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::spatial_database::rtree_point_set::point_set::Dimension;

use super::SolvedSystemBuilder;

/// Polynomial trend filtered by universal kriging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Drift {
    /// 1, x, y (, z)
    #[default]
    Linear,
    /// Linear terms plus x², y², xy (, z², xz, yz)
    Quadratic,
}

impl Drift {
    pub fn n_terms(&self, dimension: Dimension) -> usize {
        match (self, dimension) {
            (Drift::Linear, Dimension::Two) => 3,
            (Drift::Linear, Dimension::Three) => 4,
            (Drift::Quadratic, Dimension::Two) => 6,
            (Drift::Quadratic, Dimension::Three) => 10,
        }
    }
}

/// Universal kriging with a polynomial drift in coordinates centred on the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UKSystemBuilder {
    pub drift: Drift,
}

impl UKSystemBuilder {
    pub fn new(drift: Drift) -> Self {
        Self { drift }
    }
}

impl SolvedSystemBuilder for UKSystemBuilder {
    fn n_constraints(&self, dimension: Dimension) -> usize {
        self.drift.n_terms(dimension)
    }

    fn constraint_values(&self, offset: &Vector3<f64>, dimension: Dimension, out: &mut [f64]) {
        let (x, y, z) = (offset.x, offset.y, offset.z);
        match dimension {
            Dimension::Two => {
                out[..3].copy_from_slice(&[1.0, x, y]);
                if self.drift == Drift::Quadratic {
                    out[3..6].copy_from_slice(&[x * x, y * y, x * y]);
                }
            }
            Dimension::Three => {
                out[..4].copy_from_slice(&[1.0, x, y, z]);
                if self.drift == Drift::Quadratic {
                    out[4..10].copy_from_slice(&[x * x, y * y, z * z, x * y, x * z, y * z]);
                }
            }
        }
    }

    /// The drift basis must leave at least one degree of freedom.
    fn min_samples(&self, dimension: Dimension) -> usize {
        self.n_constraints(dimension) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeostatError;
    use crate::geometry::support::Support;
    use crate::systems::lu::LUSystem;
    use crate::systems::system_builder::SystemBuffers;
    use crate::variography::model_variograms::anisotropy::Anisotropy;
    use crate::variography::model_variograms::composite::{CompositeVariogram, VariogramType};
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn grid_supports() -> Vec<Support> {
        let mut cond = vec![];
        for j in 0..4 {
            for i in 0..4 {
                cond.push(Support::Point(Point3::new(i as f64 * 10.0, j as f64 * 10.0, 0.0)));
            }
        }
        cond
    }

    fn vgram() -> CompositeVariogram {
        CompositeVariogram::new(vec![
            VariogramType::nugget(0.1),
            VariogramType::spherical(1.0, Anisotropy::isotropic(40.0)),
        ])
    }

    #[test]
    fn linear_drift_is_reproduced() {
        let cond = grid_supports();
        let values = cond
            .iter()
            .map(|s| 5.0 + 0.3 * s.center().x - 0.2 * s.center().y)
            .collect::<Vec<_>>();
        let target = Support::Point(Point3::new(17.0, 12.0, 0.0));
        let builder = UKSystemBuilder::new(Drift::Linear);
        let mut system = LUSystem::default();
        let mut buffers = SystemBuffers::default();
        system.build(&cond, &target, &vgram(), &builder, Dimension::Two, &mut buffers);
        let solved = builder.solve(&system).unwrap();

        assert_relative_eq!(solved.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(solved.multipliers.len(), 3);
        assert_relative_eq!(
            solved.estimate(&values),
            5.0 + 0.3 * 17.0 - 0.2 * 12.0,
            epsilon = 1e-8
        );
    }

    #[test]
    fn quadratic_drift_weights_sum_to_one() {
        let cond = grid_supports();
        let target = Support::Point(Point3::new(5.0, 25.0, 0.0));
        let builder = UKSystemBuilder::new(Drift::Quadratic);
        let mut system = LUSystem::default();
        let mut buffers = SystemBuffers::default();
        system.build(&cond, &target, &vgram(), &builder, Dimension::Two, &mut buffers);
        let solved = builder.solve(&system).unwrap();

        assert_relative_eq!(solved.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(builder.min_samples(Dimension::Two), 7);
        assert_eq!(builder.min_samples(Dimension::Three), 11);
    }

    #[test]
    fn collinear_samples_cannot_fit_planar_drift() {
        // every sample has y = 0, so the y drift column is identically zero
        let cond = (0..5)
            .map(|i| Support::Point(Point3::new(i as f64 * 10.0, 0.0, 0.0)))
            .collect::<Vec<_>>();
        let target = Support::Point(Point3::new(15.0, 0.0, 0.0));
        let builder = UKSystemBuilder::new(Drift::Linear);
        let mut system = LUSystem::default();
        let mut buffers = SystemBuffers::default();
        system.build(&cond, &target, &vgram(), &builder, Dimension::Two, &mut buffers);

        assert!(matches!(
            builder.solve(&system),
            Err(GeostatError::SingularSystem { size: 8 })
        ));
    }
}
