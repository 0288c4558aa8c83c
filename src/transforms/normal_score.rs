use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{GeostatError, Result};

use super::ValueTransform;

/// Weighted empirical mapping between data values and standard normal scores.
///
/// `z` holds the distinct data values with positive weight in increasing order and
/// `y` their normal scores. Values between table entries are interpolated linearly and values
/// beyond either end are clamped to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalScoreTransform {
    pub z: Vec<f64>,
    pub y: Vec<f64>,
}

impl NormalScoreTransform {
    /// Build the table from `values` and optional declustering weights.
    pub fn fit(values: &[f64], weights: Option<&[f64]>) -> Result<Self> {
        if values.is_empty() {
            return Err(GeostatError::InvalidInput(
                "normal score transform of an empty set".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GeostatError::InvalidInput(
                "values must be finite".to_string(),
            ));
        }
        let weights = match weights {
            Some(w) if w.len() != values.len() => {
                return Err(GeostatError::InvalidInput(format!(
                    "{} values and {} weights",
                    values.len(),
                    w.len()
                )))
            }
            Some(w) => w.to_vec(),
            None => vec![1.0; values.len()],
        };
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(GeostatError::InvalidInput(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        let total = weights.iter().sum::<f64>();
        if !(total > 0.0) {
            return Err(GeostatError::InvalidInput(
                "weights must have a positive sum".to_string(),
            ));
        }

        let mut pairs = values
            .iter()
            .copied()
            .zip(weights.iter().copied())
            .collect::<Vec<_>>();
        pairs.sort_by_key(|(v, _)| OrderedFloat(*v));

        // merge ties
        let mut z: Vec<f64> = Vec::with_capacity(pairs.len());
        let mut w: Vec<f64> = Vec::with_capacity(pairs.len());
        for (value, weight) in pairs {
            match z.last() {
                Some(last) if *last == value => {
                    if let Some(acc) = w.last_mut() {
                        *acc += weight;
                    }
                }
                _ => {
                    z.push(value);
                    w.push(weight);
                }
            }
        }

        // a weightless value has no probability mass and would map to an infinite score
        let (z, w): (Vec<f64>, Vec<f64>) = z
            .into_iter()
            .zip(w)
            .filter(|(_, wi)| *wi > 0.0)
            .unzip();

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| GeostatError::InvalidInput(e.to_string()))?;
        let mut cumulative = 0.0;
        let y = w
            .iter()
            .map(|wi| {
                let p = (cumulative + wi / 2.0) / total;
                cumulative += wi;
                normal.inverse_cdf(p)
            })
            .collect();

        Ok(Self { z, y })
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }
}

/// Piecewise linear interpolation of `ys` over increasing `xs`, clamped at both ends.
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let (Some(first), Some(last)) = (xs.first(), xs.last()) else {
        return f64::NAN;
    };
    if x <= *first {
        return ys[0];
    }
    if x >= *last {
        return ys[ys.len() - 1];
    }
    let upper = xs.partition_point(|v| *v <= x);
    let lower = upper - 1;
    let t = (x - xs[lower]) / (xs[upper] - xs[lower]);
    ys[lower] + t * (ys[upper] - ys[lower])
}

impl ValueTransform for NormalScoreTransform {
    fn forward(&self, value: f64) -> f64 {
        interpolate(&self.z, &self.y, value)
    }

    fn backward(&self, value: f64) -> f64 {
        interpolate(&self.y, &self.z, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, LogNormal};

    #[test]
    fn lognormal_scores_are_standard() {
        let mut rng = StdRng::seed_from_u64(42);
        let dist = LogNormal::new(0.0, 1.0).unwrap();
        let values = (0..1000).map(|_| dist.sample(&mut rng)).collect::<Vec<_>>();
        let nst = NormalScoreTransform::fit(&values, None).unwrap();
        let scores = nst.forward_all(&values);

        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let var = scores.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        assert!(mean.abs() < 1e-3);
        assert!((var - 1.0).abs() < 0.05);
        assert!(nst.y.windows(2).all(|w| w[0] < w[1]));

        for (v, y) in values.iter().zip(scores.iter()) {
            assert_relative_eq!(nst.backward(*y), *v, epsilon = 1e-9);
        }
    }

    #[test]
    fn ties_are_merged() {
        let nst = NormalScoreTransform::fit(&[2.0, 1.0, 2.0, 3.0], None).unwrap();
        assert_eq!(nst.z, vec![1.0, 2.0, 3.0]);
        // p = 0.125, 0.5, 0.875
        assert_relative_eq!(nst.y[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(nst.y[0], -nst.y[2], epsilon = 1e-12);
        assert_relative_eq!(nst.y[0], -1.1503493803760079, epsilon = 1e-9);
    }

    #[test]
    fn weights_shift_scores() {
        let values = [1.0, 2.0, 3.0];
        let uniform = NormalScoreTransform::fit(&values, None).unwrap();
        let weighted = NormalScoreTransform::fit(&values, Some(&[1.0, 1.0, 4.0])).unwrap();
        // a heavier high value pushes the lower scores down
        assert!(weighted.y[0] < uniform.y[0]);
        assert!(weighted.y[1] < uniform.y[1]);
    }

    #[test]
    fn weightless_values_stay_finite() {
        let nst =
            NormalScoreTransform::fit(&[1.0, 2.0, 3.0, 4.0], Some(&[0.0, 1.0, 1.0, 0.0])).unwrap();
        assert_eq!(nst.z, vec![2.0, 3.0]);
        assert!(nst.y.iter().all(|y| y.is_finite()));
        assert_relative_eq!(nst.y[0], -nst.y[1], epsilon = 1e-12);

        // excluded extremes clamp to the nearest weighted value
        assert_relative_eq!(nst.forward(1.0), nst.y[0]);
        assert_relative_eq!(nst.forward(4.0), nst.y[1]);
        assert_relative_eq!(nst.backward(-3.0), 2.0);
        assert_relative_eq!(nst.backward(3.0), 3.0);
    }

    #[test]
    fn ends_are_clamped() {
        let nst = NormalScoreTransform::fit(&[1.0, 2.0, 3.0, 4.0], None).unwrap();
        assert_relative_eq!(nst.forward(-10.0), nst.y[0]);
        assert_relative_eq!(nst.forward(10.0), nst.y[3]);
        assert_relative_eq!(nst.backward(-10.0), 1.0);
        assert_relative_eq!(nst.backward(10.0), 4.0);
        let mid = nst.forward(2.5);
        assert_relative_eq!(mid, (nst.y[1] + nst.y[2]) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_data_maps_to_zero() {
        let nst = NormalScoreTransform::fit(&[5.0, 5.0, 5.0], None).unwrap();
        assert_eq!(nst.len(), 1);
        assert_relative_eq!(nst.forward(5.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(nst.backward(1.3), 5.0);
    }

    #[test]
    fn invalid_input() {
        assert!(NormalScoreTransform::fit(&[], None).is_err());
        assert!(NormalScoreTransform::fit(&[1.0, 2.0], Some(&[0.0, 0.0])).is_err());
        assert!(NormalScoreTransform::fit(&[1.0, 2.0], Some(&[1.0])).is_err());
    }
}
