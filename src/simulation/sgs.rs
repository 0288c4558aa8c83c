use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::support::Support;
use crate::kriging::{solve_neighborhood, validate_inputs, KrigingWorkspace};
use crate::spatial_database::rtree_point_set::point_set::{Dimension, PointSet};
use crate::spatial_database::Neighborhood;
use crate::systems::solved_systems::sk_system::SKSystemBuilder;
use crate::transforms::ValueTransform;
use crate::variography::model_variograms::composite::CompositeVariogram;

use super::{run, NodeDraw, NodeSampler, Realizations, SimulationParameters};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SGSParameters {
    /// Mean of the normal scores used by simple kriging.
    pub mean: f64,
}

struct GaussianSampler<'a, T> {
    vgram: &'a CompositeVariogram,
    builder: SKSystemBuilder,
    transform: &'a T,
    mean: f64,
    sill: f64,
}

impl<'a, T: ValueTransform> GaussianSampler<'a, T> {
    fn draw(&self, mean: f64, variance: f64, rng: &mut StdRng) -> NodeDraw {
        let z: f64 = rng.sample(StandardNormal);
        let working = mean + variance.max(0.0).sqrt() * z;
        NodeDraw {
            working,
            output: self.transform.backward(working),
        }
    }
}

impl<'a, T: ValueTransform> NodeSampler for GaussianSampler<'a, T> {
    fn conditional(
        &self,
        hood: &Neighborhood,
        node: &Support,
        dimension: Dimension,
        workspace: &mut KrigingWorkspace,
        rng: &mut StdRng,
    ) -> Result<NodeDraw> {
        let solved = solve_neighborhood(hood, node, self.vgram, &self.builder, dimension, workspace)?;
        let mean = solved.estimate(&hood.values());
        Ok(self.draw(mean, solved.variance, rng))
    }

    fn marginal(&self, rng: &mut StdRng) -> NodeDraw {
        self.draw(self.mean, self.sill, rng)
    }
}

/// Sequential Gaussian simulation of normal-score `data`.
///
/// Each node is simple kriged from the samples and previously simulated nodes and
/// drawn from the resulting normal distribution. Realizations are reported after
/// `transform.backward`.
pub fn simulate<T: ValueTransform>(
    data: &PointSet,
    vgram: &CompositeVariogram,
    transform: &T,
    sgs: &SGSParameters,
    params: &SimulationParameters,
) -> Result<Realizations> {
    let builder = SKSystemBuilder::new(sgs.mean);
    validate_inputs(vgram, &params.ellipsoid, &params.search, &builder)?;
    if data.len() > 1 {
        vgram.validate_against_variance(data.variance(), 0.2)?;
    }

    let sampler = GaussianSampler {
        vgram,
        builder,
        transform,
        mean: sgs.mean,
        sill: vgram.total_sill(),
    };
    run(data, params, &sampler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeostatError;
    use crate::geometry::ellipsoid::Ellipsoid;
    use crate::kriging::cross_validation::cross_validate;
    use crate::spatial_database::gridded_databases::GridDefinition;
    use crate::spatial_database::ConditioningParams;
    use crate::systems::solved_systems::ok_system::OKSystemBuilder;
    use crate::transforms::normal_score::NormalScoreTransform;
    use crate::transforms::IdentityTransform;
    use crate::variography::model_variograms::anisotropy::Anisotropy;
    use crate::variography::model_variograms::composite::VariogramType;
    use approx::assert_relative_eq;

    fn vgram() -> CompositeVariogram {
        CompositeVariogram::new(vec![
            VariogramType::nugget(0.1),
            VariogramType::spherical(0.9, Anisotropy::isotropic(10.0)),
        ])
    }

    fn empty() -> PointSet {
        PointSet::from_xy(&[], vec![]).unwrap()
    }

    fn params(n_realizations: usize, seed: u64, nx: usize) -> SimulationParameters {
        SimulationParameters::new(
            n_realizations,
            GridDefinition::planar([0.5, 0.5], [1.0, 1.0], [nx, nx]),
            seed,
            Ellipsoid::isotropic(15.0),
        )
        .with_search(ConditioningParams::new(16, 1, None, 1))
        .with_max_simulated(12)
    }

    #[test]
    fn realizations_are_reproducible() {
        let run = |seed| {
            simulate(
                &empty(),
                &vgram(),
                &IdentityTransform,
                &SGSParameters::default(),
                &params(3, seed, 8),
            )
            .unwrap()
        };
        let a = run(7);
        let b = run(7);
        let c = run(8);

        assert_eq!(a.values, b.values);
        assert_eq!(a.values.shape(), &[3, 64]);
        // neighbouring seeds share no realization
        for r in 0..3 {
            for s in 0..3 {
                assert_ne!(a.realization(r), c.realization(s));
            }
        }
    }

    #[test]
    fn data_is_honoured_without_nugget() {
        let data = PointSet::from_xy(&[[2.5, 2.5], [6.5, 4.5]], vec![1.5, -0.7]).unwrap();
        let vgram = CompositeVariogram::new(vec![VariogramType::spherical(
            1.0,
            Anisotropy::isotropic(10.0),
        )]);
        let params = params(4, 3, 8);
        let result = simulate(
            &data,
            &vgram,
            &IdentityTransform,
            &SGSParameters::default(),
            &params,
        )
        .unwrap();

        let node_a = params.grid.node_index(2, 2, 0);
        let node_b = params.grid.node_index(6, 4, 0);
        for r in 0..4 {
            assert_relative_eq!(result.values[(r, node_a)], 1.5, epsilon = 1e-6);
            assert_relative_eq!(result.values[(r, node_b)], -0.7, epsilon = 1e-6);
        }
    }

    #[test]
    fn unconditional_ensemble_is_standard_normal() {
        let result = simulate(
            &empty(),
            &vgram(),
            &IdentityTransform,
            &SGSParameters::default(),
            &params(40, 11, 12),
        )
        .unwrap();

        let n = result.values.len() as f64;
        let mean = result.values.sum() / n;
        let var = result.values.mapv(|v| (v - mean).powi(2)).sum() / n;
        assert!(mean.abs() < 0.3, "mean {mean}");
        assert!((0.5..1.5).contains(&var), "variance {var}");

        let stats = result.statistics();
        assert!(stats.unordered_nodes().is_empty());
    }

    #[test]
    fn cross_validation_of_simulated_field() {
        let params = params(1, 21, 30);
        let field = simulate(
            &empty(),
            &vgram(),
            &IdentityTransform,
            &SGSParameters::default(),
            &params,
        )
        .unwrap();

        let nodes = params.grid.nodes();
        let data = PointSet::new(nodes, field.realization(0).to_vec()).unwrap();
        let report = cross_validate(
            &data,
            &vgram(),
            &Ellipsoid::isotropic(15.0),
            &ConditioningParams::new(16, 4, None, 1),
            &OKSystemBuilder,
        )
        .unwrap();

        let sev = report.standardized_error_variance.unwrap();
        assert_eq!(report.n_failed, 0);
        assert!((0.5..=2.0).contains(&sev), "standardized error variance {sev}");
    }

    #[test]
    fn back_transformed_values_stay_within_data_range() {
        let coords = [[1.0, 1.0], [5.0, 2.0], [3.0, 6.0], [7.0, 7.0], [2.0, 4.0]];
        let raw = vec![0.5, 2.0, 8.0, 3.5, 1.2];
        let nst = NormalScoreTransform::fit(&raw, None).unwrap();
        let data = PointSet::from_xy(&coords, nst.forward_all(&raw)).unwrap();

        let result = simulate(
            &data,
            &vgram(),
            &nst,
            &SGSParameters::default(),
            &params(5, 2, 8),
        )
        .unwrap();
        assert!(result.values.iter().all(|v| (0.5..=8.0).contains(v)));
    }

    #[test]
    fn unbounded_model_is_rejected() {
        let vgram = CompositeVariogram::new(vec![VariogramType::power(1.0, 1.5)]);
        let res = simulate(
            &empty(),
            &vgram,
            &IdentityTransform,
            &SGSParameters::default(),
            &params(1, 1, 4),
        );
        assert!(matches!(res, Err(GeostatError::ModelInvalid(_))));
    }
}
