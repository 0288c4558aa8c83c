use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::declustering::declustered_mean;
use crate::error::{GeostatError, Result};
use crate::geometry::support::Support;
use crate::kriging::indicator::{IndicatorKriging, IKCPDF};
use crate::kriging::{validate_inputs, KrigingWorkspace};
use crate::spatial_database::rtree_point_set::point_set::{Dimension, PointSet};
use crate::spatial_database::Neighborhood;
use crate::systems::solved_systems::ok_system::OKSystemBuilder;

use super::{run, NodeDraw, NodeSampler, Realizations, SimulationParameters};

/// What a realization stores at each node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SisOutput {
    /// Index of the drawn class, 0 is at or below the first threshold.
    #[default]
    ClassIndex,
    /// Value interpolated inside the drawn class, tails bounded by the data extremes.
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SISParameters {
    pub ik: IndicatorKriging,
    pub output: SisOutput,
    /// Declustering weights for the marginal distribution, uniform when absent.
    pub weights: Option<Vec<f64>>,
}

impl SISParameters {
    pub fn new(ik: IndicatorKriging) -> Self {
        Self {
            ik,
            output: SisOutput::default(),
            weights: None,
        }
    }

    pub fn with_output(mut self, output: SisOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }
}

struct IndicatorSampler<'a> {
    ik: &'a IndicatorKriging,
    output: SisOutput,
    marginal: IKCPDF,
    z_min: f64,
    z_max: f64,
}

impl<'a> IndicatorSampler<'a> {
    fn draw(&self, cpdf: &IKCPDF, rng: &mut StdRng) -> NodeDraw {
        let u: f64 = rng.gen();
        let class = cpdf.sample_class(u);
        let output = match self.output {
            SisOutput::ClassIndex => class as f64,
            SisOutput::Continuous => self.within_class(cpdf, class, u),
        };
        NodeDraw {
            working: class as f64,
            output,
        }
    }

    /// Linear interpolation of `u` between the class bounds.
    fn within_class(&self, cpdf: &IKCPDF, class: usize, u: f64) -> f64 {
        let t = &self.ik.thresholds;
        let k = t.len();
        let (lo, p_lo) = if class == 0 {
            (self.z_min.min(t[0]), 0.0)
        } else {
            (t[class - 1], cpdf.p[class - 1])
        };
        let (hi, p_hi) = if class == k {
            (self.z_max.max(t[k - 1]), 1.0)
        } else {
            (t[class], cpdf.p[class])
        };
        let frac = if p_hi > p_lo {
            ((u - p_lo) / (p_hi - p_lo)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        lo + frac * (hi - lo)
    }
}

impl<'a> NodeSampler for IndicatorSampler<'a> {
    fn conditional(
        &self,
        hood: &Neighborhood,
        node: &Support,
        dimension: Dimension,
        workspace: &mut KrigingWorkspace,
        rng: &mut StdRng,
    ) -> Result<NodeDraw> {
        // neighbours carry class indices, class c is at or below threshold k when c <= k
        let cpdf = self.ik.ccdf_from_neighborhood(hood, node, dimension, workspace, |n, k| {
            if n.value <= k as f64 {
                1.0
            } else {
                0.0
            }
        })?;
        Ok(self.draw(&cpdf, rng))
    }

    fn marginal(&self, rng: &mut StdRng) -> NodeDraw {
        self.draw(&self.marginal, rng)
    }
}

/// Weighted proportion of `values` at or below each threshold.
fn marginal_cdf(ik: &IndicatorKriging, values: &[f64], weights: &[f64]) -> Result<IKCPDF> {
    let mut cpdf = IKCPDF::with_capacity(ik.n_thresholds());
    let mut indicators = vec![0.0; values.len()];
    for threshold in ik.thresholds.iter() {
        for (ind, v) in indicators.iter_mut().zip(values) {
            *ind = if v <= threshold { 1.0 } else { 0.0 };
        }
        cpdf.p.push(declustered_mean(&indicators, weights)?);
        cpdf.x.push(*threshold);
    }
    Ok(cpdf)
}

/// Sequential indicator simulation of the classes delimited by the indicator thresholds.
pub fn simulate(
    data: &PointSet,
    sis: &SISParameters,
    params: &SimulationParameters,
) -> Result<Realizations> {
    let ik = &sis.ik;
    ik.validate()?;
    for model in ik.models.iter() {
        validate_inputs(model, &params.ellipsoid, &params.search, &OKSystemBuilder)?;
    }
    if data.is_empty() {
        return Err(GeostatError::InsufficientData {
            found: 0,
            required: 1,
        });
    }

    let weights = match &sis.weights {
        Some(w) => w.clone(),
        None => vec![1.0; data.len()],
    };
    let marginal = marginal_cdf(ik, &data.data, &weights)?;

    let (z_min, z_max) = data
        .data
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

    let classes = data
        .data
        .iter()
        .map(|v| ik.class_of(*v) as f64)
        .collect::<Vec<_>>();
    let class_data = data.with_values(classes)?;

    let sampler = IndicatorSampler {
        ik,
        output: sis.output,
        marginal,
        z_min,
        z_max,
    };
    run(&class_data, params, &sampler)
}
