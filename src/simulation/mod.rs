use bitvec::prelude::*;
use indicatif::{ParallelProgressIterator, ProgressBar};
use itertools::izip;
use nalgebra::Point3;
use ndarray::{Array2, ArrayView1, Axis};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rstar::RTree;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GeostatError, Result};
use crate::geometry::{ellipsoid::Ellipsoid, support::Support};
use crate::kriging::KrigingWorkspace;
use crate::spatial_database::gridded_databases::GridDefinition;
use crate::spatial_database::rtree_point_set::point_set::{Dimension, Point, PointSet};
use crate::spatial_database::{ConditioningDataCollector, ConditioningParams, Neighborhood};

pub mod sgs;
pub mod sis;

/// Settings shared by every sequential simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub n_realizations: usize,
    pub grid: GridDefinition,
    /// Seeds the generator that draws one seed per realization.
    pub seed: u64,
    pub search: ConditioningParams,
    pub ellipsoid: Ellipsoid,
    /// Cap on previously simulated nodes among the conditioning data.
    pub max_simulated: usize,
    pub show_progress: bool,
}

impl SimulationParameters {
    pub fn new(n_realizations: usize, grid: GridDefinition, seed: u64, ellipsoid: Ellipsoid) -> Self {
        Self {
            n_realizations,
            grid,
            seed,
            search: ConditioningParams::default(),
            ellipsoid,
            max_simulated: 16,
            show_progress: false,
        }
    }

    pub fn with_search(mut self, search: ConditioningParams) -> Self {
        self.search = search;
        self
    }

    pub fn with_max_simulated(mut self, max_simulated: usize) -> Self {
        self.max_simulated = max_simulated;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_realizations == 0 {
            return Err(GeostatError::InvalidInput(
                "n_realizations must be positive".to_string(),
            ));
        }
        self.grid.validate()?;
        self.search.validate()?;
        self.ellipsoid.validate()
    }
}

/// Value drawn at one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeDraw {
    /// Value later nodes are conditioned on.
    pub working: f64,
    /// Value reported in the realization.
    pub output: f64,
}

/// Local distribution model of a sequential simulation.
pub trait NodeSampler: Sync {
    /// Draw from the distribution conditioned on `hood`.
    fn conditional(
        &self,
        hood: &Neighborhood,
        node: &Support,
        dimension: Dimension,
        workspace: &mut KrigingWorkspace,
        rng: &mut StdRng,
    ) -> Result<NodeDraw>;

    /// Draw used when the node has too little conditioning data.
    fn marginal(&self, rng: &mut StdRng) -> NodeDraw;
}

/// Grid nodes indexed once per run, shared by every realization.
struct SimulationGrid {
    tree: RTree<Point>,
    nodes: Vec<Point3<f64>>,
}

impl SimulationGrid {
    fn new(grid: &GridDefinition) -> Self {
        let nodes = grid.nodes();
        let tree = RTree::bulk_load(
            nodes
                .iter()
                .enumerate()
                .map(|(i, p)| Point::new([p.x, p.y, p.z], i))
                .collect(),
        );
        Self { tree, nodes }
    }

    /// Samples plus already simulated nodes around `node`.
    fn neighborhood(
        &self,
        data: &PointSet,
        node: &Point3<f64>,
        ellipsoid: &Ellipsoid,
        params: &SimulationParameters,
        visited: &BitSlice,
        values: &[f64],
    ) -> Result<Neighborhood> {
        let mut collector = ConditioningDataCollector::new(ellipsoid, &params.search);
        data.collect_into(node, &mut collector, |_| true);

        let max_dist_sq = ellipsoid.bounding_radius().powi(2);
        for (geom, dist_sq) in self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[node.x, node.y, node.z])
        {
            if dist_sq > max_dist_sq {
                break;
            }
            let idx = geom.data;
            if visited[idx] {
                collector.try_insert(self.nodes[idx], values[idx], idx, true);
            }
        }

        collector.finish(Some(params.max_simulated))
    }
}

/// Per realization seeds drawn in order from a generator seeded with `seed`.
///
/// The first `n` seeds do not depend on how many realizations are requested.
fn realization_seeds(seed: u64, n: usize) -> Vec<u64> {
    let mut master = StdRng::seed_from_u64(seed);
    (0..n).map(|_| master.gen()).collect()
}

/// Simulate every realization, in parallel across realizations and sequentially within one.
pub(crate) fn run<S: NodeSampler>(
    data: &PointSet,
    params: &SimulationParameters,
    sampler: &S,
) -> Result<Realizations> {
    params.validate()?;
    let sim_grid = SimulationGrid::new(&params.grid);
    let n_nodes = sim_grid.nodes.len();

    info!(
        n_realizations = params.n_realizations,
        n_nodes,
        n_samples = data.len(),
        "simulation started"
    );

    let bar = if params.show_progress {
        ProgressBar::new(params.n_realizations as u64)
    } else {
        ProgressBar::hidden()
    };

    let seeds = realization_seeds(params.seed, params.n_realizations);
    let realizations = seeds
        .into_par_iter()
        .enumerate()
        .progress_with(bar)
        .map_with(KrigingWorkspace::default(), |workspace, (r, seed)| {
            let mut rng = StdRng::seed_from_u64(seed);

            let mut path = (0..n_nodes).collect::<Vec<_>>();
            path.shuffle(&mut rng);

            let mut visited = bitvec![0; n_nodes];
            let mut working = vec![0.0; n_nodes];
            let mut output = vec![0.0; n_nodes];
            let mut ellipsoid = params.ellipsoid.clone();
            let mut n_marginal = 0usize;

            for idx in path {
                let node = sim_grid.nodes[idx];
                ellipsoid.translate_to(&node);

                let draw = sim_grid
                    .neighborhood(data, &node, &ellipsoid, params, &visited, &working)
                    .and_then(|hood| {
                        sampler.conditional(
                            &hood,
                            &Support::Point(node),
                            data.dimension,
                            workspace,
                            &mut rng,
                        )
                    });
                let draw = match draw {
                    Ok(draw) => draw,
                    Err(e) if e.is_local() => {
                        n_marginal += 1;
                        sampler.marginal(&mut rng)
                    }
                    Err(e) => return Err(e),
                };

                working[idx] = draw.working;
                output[idx] = draw.output;
                visited.set(idx, true);
            }

            debug!(realization = r, n_marginal, "realization complete");
            Ok(output)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut values = Array2::zeros((params.n_realizations, n_nodes));
    for (mut row, realization) in values.axis_iter_mut(Axis(0)).zip(realizations) {
        row.assign(&ArrayView1::from(&realization));
    }

    info!(n_realizations = params.n_realizations, "simulation finished");
    Ok(Realizations {
        grid: params.grid.clone(),
        values,
    })
}

/// Ensemble of realizations, one row per realization and one column per grid node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Realizations {
    pub grid: GridDefinition,
    pub values: Array2<f64>,
}

/// Per node summaries of the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleStatistics {
    pub e_type: Vec<f64>,
    pub variance: Vec<f64>,
    pub p10: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
}

/// Quantile of sorted values, interpolated between order statistics.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (pos - lower as f64) * (sorted[upper] - sorted[lower])
}

impl Realizations {
    pub fn n_realizations(&self) -> usize {
        self.values.nrows()
    }

    pub fn realization(&self, r: usize) -> ArrayView1<'_, f64> {
        self.values.row(r)
    }

    pub fn statistics(&self) -> EnsembleStatistics {
        let n_nodes = self.values.ncols();
        let mut stats = EnsembleStatistics {
            e_type: Vec::with_capacity(n_nodes),
            variance: Vec::with_capacity(n_nodes),
            p10: Vec::with_capacity(n_nodes),
            p50: Vec::with_capacity(n_nodes),
            p90: Vec::with_capacity(n_nodes),
        };
        if self.values.nrows() == 0 {
            return stats;
        }

        let mut sorted = Vec::with_capacity(self.values.nrows());
        for column in self.values.axis_iter(Axis(1)) {
            sorted.clear();
            sorted.extend(column.iter().copied());
            sorted.sort_by_key(|v| OrderedFloat(*v));

            let n = sorted.len() as f64;
            let mean = sorted.iter().sum::<f64>() / n;
            stats.e_type.push(mean);
            stats
                .variance
                .push(sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n);
            stats.p10.push(quantile(&sorted, 0.1));
            stats.p50.push(quantile(&sorted, 0.5));
            stats.p90.push(quantile(&sorted, 0.9));
        }
        stats
    }

    /// Fraction of realizations above `threshold` at each node.
    pub fn probability_above(&self, threshold: f64) -> Vec<f64> {
        let n = self.values.nrows() as f64;
        self.values
            .axis_iter(Axis(1))
            .map(|column| column.iter().filter(|v| **v > threshold).count() as f64 / n)
            .collect()
    }
}

impl EnsembleStatistics {
    /// Nodes where the percentiles are not ordered, empty for a valid ensemble.
    pub fn unordered_nodes(&self) -> Vec<usize> {
        izip!(self.p10.iter(), self.p50.iter(), self.p90.iter())
            .enumerate()
            .filter(|(_, (p10, p50, p90))| !(p10 <= p50 && p50 <= p90))
            .map(|(i, _)| i)
            .collect()
    }
}
