use serde::{Deserialize, Serialize};

use crate::error::{GeostatError, Result};

use super::normal_score::NormalScoreTransform;
use super::ValueTransform;

/// Gaussian anamorphosis z = φ(y) expanded on probabilists' Hermite polynomials.
///
/// `coefficients[k]` multiplies He_k. Normal scores come from the empirical
/// [`NormalScoreTransform`], which also provides the forward mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HermiteAnamorphosis {
    pub coefficients: Vec<f64>,
    pub nst: NormalScoreTransform,
}

/// He_0..He_{n-1} at `y`.
fn hermite_polynomials(y: f64, out: &mut [f64]) {
    if let Some(h0) = out.first_mut() {
        *h0 = 1.0;
    }
    if let Some(h1) = out.get_mut(1) {
        *h1 = y;
    }
    for k in 2..out.len() {
        out[k] = y * out[k - 1] - (k - 1) as f64 * out[k - 2];
    }
}

impl HermiteAnamorphosis {
    /// Fit `n_hermite` coefficients to `values` with optional declustering weights.
    pub fn fit(values: &[f64], weights: Option<&[f64]>, n_hermite: usize) -> Result<Self> {
        if n_hermite == 0 {
            return Err(GeostatError::InvalidInput(
                "n_hermite must be positive".to_string(),
            ));
        }
        let nst = NormalScoreTransform::fit(values, weights)?;
        let weights = match weights {
            Some(w) => w.to_vec(),
            None => vec![1.0; values.len()],
        };
        let total = weights.iter().sum::<f64>();

        let mut he = vec![0.0; n_hermite];
        let mut coefficients = vec![0.0; n_hermite];
        for (z, w) in values.iter().zip(weights.iter()) {
            hermite_polynomials(nst.forward(*z), &mut he);
            for (c, h) in coefficients.iter_mut().zip(he.iter()) {
                *c += w * z * h;
            }
        }

        let mut factorial = 1.0;
        for (k, c) in coefficients.iter_mut().enumerate() {
            if k > 0 {
                factorial *= k as f64;
            }
            *c /= total * factorial;
        }

        Ok(Self { coefficients, nst })
    }

    pub fn n_hermite(&self) -> usize {
        self.coefficients.len()
    }

    /// Point variance of φ(Y), the sum of c_k² k! over k >= 1.
    pub fn variance(&self) -> f64 {
        let mut factorial = 1.0;
        self.coefficients
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, c)| {
                factorial *= k as f64;
                c * c * factorial
            })
            .sum()
    }

    /// Evaluates the expansion at normal score `y`.
    pub fn anamorphosis(&self, y: f64) -> f64 {
        let c = &self.coefficients;
        let Some(c0) = c.first() else {
            return f64::NAN;
        };
        let mut value = *c0;
        if c.len() < 2 {
            return value;
        }
        value += c[1] * y;
        let (mut prev, mut cur) = (1.0, y);
        for (k, ck) in c.iter().enumerate().skip(2) {
            let next = y * cur - (k - 1) as f64 * prev;
            value += ck * next;
            prev = cur;
            cur = next;
        }
        value
    }
}

impl ValueTransform for HermiteAnamorphosis {
    fn forward(&self, value: f64) -> f64 {
        self.nst.forward(value)
    }

    fn backward(&self, value: f64) -> f64 {
        self.anamorphosis(value)
    }
}
