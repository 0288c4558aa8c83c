use argmin::core::{CostFunction, Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;
use itertools::izip;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GeostatError, Result};
use crate::variography::experimental::ExperimentalVariogram;

use super::composite::{CompositeVariogram, VariogramType};

/// Nelder-Mead stopping rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    pub max_iters: u64,
    /// Standard deviation of the simplex costs at convergence, relative to Σ N·γ².
    pub sd_tolerance: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            sd_tolerance: 1e-12,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iters == 0 {
            return Err(GeostatError::InvalidInput(
                "max_iters must be positive".to_string(),
            ));
        }
        if !(self.sd_tolerance.is_finite() && self.sd_tolerance > 0.0) {
            return Err(GeostatError::InvalidInput(format!(
                "sd_tolerance must be positive, got {}",
                self.sd_tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: CompositeVariogram,
    /// Σ N_k (γ_k - γ_model(h_k))² over the bins with data.
    pub weighted_sse: f64,
}

/// Pair-count weighted least squares fit of nested structures to an experimental variogram.
#[derive(Debug, Clone)]
pub struct CompositeVariogramFitter {
    pub lags: Vec<f64>,
    pub exp_var: Vec<f64>,
    pub weights: Vec<f64>,
    pub variograms: Vec<VariogramType>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

// Starting ranges as fractions of the largest lag.
const START_RANGE_FRACTIONS: [f64; 3] = [0.25, 0.5, 1.0];

impl CompositeVariogramFitter {
    pub fn new(exp_vgram: &ExperimentalVariogram, variograms: Vec<VariogramType>) -> Result<Self> {
        let (lags, exp_var, weights) = exp_vgram.valid_lags().fold(
            (vec![], vec![], vec![]),
            |(mut h, mut g, mut w), (lag, gamma, count)| {
                h.push(lag);
                g.push(gamma);
                w.push(count as f64);
                (h, g, w)
            },
        );
        Self::from_lags(lags, exp_var, weights, variograms)
    }

    pub fn from_lags(
        lags: Vec<f64>,
        exp_var: Vec<f64>,
        weights: Vec<f64>,
        variograms: Vec<VariogramType>,
    ) -> Result<Self> {
        if lags.len() != exp_var.len() || lags.len() != weights.len() {
            return Err(GeostatError::InvalidInput(format!(
                "{} lags, {} semivariances and {} weights",
                lags.len(),
                exp_var.len(),
                weights.len()
            )));
        }
        if lags.is_empty() {
            return Err(GeostatError::InsufficientData {
                found: 0,
                required: 1,
            });
        }
        if variograms.is_empty() {
            return Err(GeostatError::ModelInvalid(
                "no structures to fit".to_string(),
            ));
        }
        if izip!(lags.iter(), exp_var.iter(), weights.iter())
            .any(|(h, g, w)| !(h.is_finite() && g.is_finite() && w.is_finite() && *w >= 0.0))
        {
            return Err(GeostatError::InvalidInput(
                "non-finite lag, semivariance or weight".to_string(),
            ));
        }

        let h_max = lags.iter().cloned().fold(0.0, f64::max);
        let h_min = lags
            .iter()
            .cloned()
            .filter(|h| *h > 0.0)
            .min_by_key(|h| OrderedFloat(*h))
            .unwrap_or(h_max);
        if !(h_max > 0.0) {
            return Err(GeostatError::InvalidInput(
                "all lags are at zero distance".to_string(),
            ));
        }
        let g_max = exp_var.iter().cloned().fold(0.0, f64::max);

        let mut lower = vec![];
        let mut upper = vec![];
        for v in variograms.iter() {
            let (lo, hi) = param_bounds(v, h_min, h_max, g_max);
            lower.extend(lo);
            upper.extend(hi);
        }

        Ok(Self {
            lags,
            exp_var,
            weights,
            variograms,
            lower,
            upper,
        })
    }

    pub fn n_params(&self) -> usize {
        self.lower.len()
    }

    /// Box constraints per fitted parameter, in [`VariogramType::params`] order.
    pub fn bounds(&self) -> (&[f64], &[f64]) {
        (&self.lower, &self.upper)
    }

    fn g_max(&self) -> f64 {
        self.exp_var.iter().cloned().fold(0.0, f64::max)
    }

    fn h_max(&self) -> f64 {
        self.lags.iter().cloned().fold(0.0, f64::max)
    }

    fn project(&self, params: &[f64]) -> Vec<f64> {
        izip!(params.iter(), self.lower.iter(), self.upper.iter())
            .map(|(p, lo, hi)| p.clamp(*lo, *hi))
            .collect()
    }

    fn model_from_params(&self, params: &[f64]) -> CompositeVariogram {
        let mut variograms = self.variograms.clone();
        let mut param_ind = 0;
        for vgram in variograms.iter_mut() {
            let cnt = vgram.param_cnt();
            vgram.set_params_from_slice(&params[param_ind..param_ind + cnt]);
            param_ind += cnt;
        }
        CompositeVariogram::new(variograms)
    }

    pub fn weighted_sse(&self, model: &CompositeVariogram) -> f64 {
        izip!(self.lags.iter(), self.exp_var.iter(), self.weights.iter())
            .map(|(h, g, w)| {
                let d = g - model.iso_variogram(*h);
                w * d * d
            })
            .sum()
    }

    /// Scale of the objective, used for relative tolerances and penalties.
    fn cost_scale(&self) -> f64 {
        let scale = izip!(self.exp_var.iter(), self.weights.iter())
            .map(|(g, w)| w * g * g)
            .sum::<f64>();
        scale.max(f64::MIN_POSITIVE)
    }

    fn penalty(&self, params: &[f64]) -> f64 {
        let violation = izip!(params.iter(), self.lower.iter(), self.upper.iter())
            .map(|(p, lo, hi)| {
                let width = (hi - lo).max(f64::EPSILON);
                let d = if p < lo {
                    lo - p
                } else if p > hi {
                    p - hi
                } else {
                    0.0
                };
                (d / width).powi(2)
            })
            .sum::<f64>();
        violation * self.cost_scale() * 1e3
    }

    fn initial_params(&self, range_fraction: f64) -> Vec<f64> {
        let g_max = self.g_max();
        let h_max = self.h_max();
        let n_structures = self.variograms.len() as f64;
        let has_nugget = self
            .variograms
            .iter()
            .any(|v| matches!(v, VariogramType::Nugget(_)));
        // a nugget starts at a tenth of the sill, the rest is shared by the other structures
        let nugget_share = if has_nugget { 0.1 * g_max } else { 0.0 };
        let structured_share = if has_nugget && n_structures > 1.0 {
            (g_max - nugget_share) / (n_structures - 1.0)
        } else if has_nugget {
            g_max
        } else {
            g_max / n_structures
        };

        let mut params = Vec::with_capacity(self.n_params());
        for v in self.variograms.iter() {
            match v {
                VariogramType::Nugget(_) if n_structures > 1.0 => params.push(nugget_share),
                VariogramType::Nugget(_) => params.push(structured_share),
                VariogramType::Power(_) => {
                    let exponent = 1.0;
                    params.push(structured_share / (range_fraction * h_max).powf(exponent));
                    params.push(exponent);
                }
                _ => {
                    params.push(range_fraction * h_max);
                    params.push(structured_share);
                }
            }
        }
        self.project(&params)
    }

    fn simplex(&self, x0: &[f64]) -> Vec<Vec<f64>> {
        let mut simplex = vec![x0.to_vec()];
        for i in 0..x0.len() {
            let mut vertex = x0.to_vec();
            let step = 0.1 * (self.upper[i] - self.lower[i]);
            vertex[i] = if vertex[i] + step <= self.upper[i] {
                vertex[i] + step
            } else {
                vertex[i] - step
            };
            simplex.push(vertex);
        }
        simplex
    }

    /// Fit from several deterministic starts and keep the best converged result.
    pub fn fit(&self, config: &FitConfig) -> Result<FitResult> {
        config.validate()?;
        let sd_tolerance = (config.sd_tolerance * self.cost_scale()).max(f64::EPSILON);

        let mut best: Option<(f64, Vec<f64>)> = None;
        let mut iterations = 0;
        for fraction in START_RANGE_FRACTIONS {
            let x0 = self.initial_params(fraction);
            let solver = NelderMead::new(self.simplex(&x0))
                .with_sd_tolerance(sd_tolerance)
                .map_err(|e| GeostatError::InvalidInput(e.to_string()))?;
            let res = match Executor::new(self.clone(), solver)
                .configure(|state| state.max_iters(config.max_iters))
                .run()
            {
                Ok(res) => res,
                Err(e) => {
                    debug!(error = %e, fraction, "nelder-mead start failed");
                    continue;
                }
            };

            let state = res.state();
            iterations = iterations.max(state.get_iter());
            let converged = matches!(
                state.get_termination_reason(),
                Some(TerminationReason::SolverConverged)
            );
            let Some(param) = state.get_best_param() else {
                continue;
            };
            if !converged {
                debug!(fraction, "nelder-mead start reached the iteration cap");
                continue;
            }

            let param = self.project(param);
            let sse = self.weighted_sse(&self.model_from_params(&param));
            debug!(fraction, sse, ?param, "nelder-mead start converged");
            if best.as_ref().map_or(true, |(b, _)| sse < *b) {
                best = Some((sse, param));
            }
        }

        let (weighted_sse, param) =
            best.ok_or(GeostatError::OptimizerNonConvergence { iterations })?;
        Ok(FitResult {
            model: self.model_from_params(&param),
            weighted_sse,
        })
    }
}

impl CostFunction for CompositeVariogramFitter {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        let projected = self.project(params);
        let model = self.model_from_params(&projected);
        Ok(self.weighted_sse(&model) + self.penalty(params))
    }
}

/// Lower and upper bounds for the fitted parameters of one structure.
fn param_bounds(v: &VariogramType, h_min: f64, h_max: f64, g_max: f64) -> (Vec<f64>, Vec<f64>) {
    let sill_hi = (2.0 * g_max).max(f64::MIN_POSITIVE);
    match v {
        VariogramType::Nugget(_) => (vec![0.0], vec![sill_hi]),
        VariogramType::Power(_) => {
            // largest slope that can still reach 4·max γ at the shortest lag
            let slope_hi = 4.0 * g_max * h_min.powf(-0.01).max(h_min.powf(-1.99));
            (vec![0.0, 0.01], vec![slope_hi.max(f64::MIN_POSITIVE), 1.99])
        }
        _ => (vec![1e-6 * h_max, 0.0], vec![3.0 * h_max, sill_hi]),
    }
}
