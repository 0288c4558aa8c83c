use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{GeostatError, Result};

pub mod hermite;
pub mod normal_score;

/// Invertible mapping between data values and a working space.
pub trait ValueTransform: Send + Sync {
    fn forward(&self, value: f64) -> f64;
    fn backward(&self, value: f64) -> f64;

    fn forward_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.forward(*v)).collect()
    }

    fn backward_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.backward(*v)).collect()
    }
}

/// Leaves values untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityTransform;

impl ValueTransform for IdentityTransform {
    fn forward(&self, value: f64) -> f64 {
        value
    }

    fn backward(&self, value: f64) -> f64 {
        value
    }
}

/// Natural log of the shifted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LogTransform {
    pub shift: f64,
}

/// Mean and sample variance of the log values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogStatistics {
    pub mean: f64,
    pub variance: f64,
}

impl LogTransform {
    pub fn new(shift: f64) -> Self {
        Self { shift }
    }

    /// Rejects values the shifted log is undefined for.
    pub fn check(&self, values: &[f64]) -> Result<()> {
        if let Some(v) = values.iter().find(|v| !(**v + self.shift > 0.0)) {
            return Err(GeostatError::InvalidInput(format!(
                "log transform needs value + shift > 0, got {v} + {}",
                self.shift
            )));
        }
        Ok(())
    }

    pub fn statistics(&self, values: &[f64]) -> Result<LogStatistics> {
        self.check(values)?;
        if values.len() < 2 {
            return Err(GeostatError::InsufficientData {
                found: values.len(),
                required: 2,
            });
        }
        let logs = self.forward_all(values);
        let n = logs.len() as f64;
        let mean = logs.iter().sum::<f64>() / n;
        let variance = logs.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Ok(LogStatistics { mean, variance })
    }
}

impl ValueTransform for LogTransform {
    fn forward(&self, value: f64) -> f64 {
        (value + self.shift).ln()
    }

    fn backward(&self, value: f64) -> f64 {
        value.exp() - self.shift
    }
}

/// n × K matrix with 1 where `values[i] <= thresholds[k]`.
pub fn indicator_transform(values: &[f64], thresholds: &[f64]) -> Result<Array2<f64>> {
    if thresholds.is_empty() {
        return Err(GeostatError::InvalidInput(
            "at least one threshold is required".to_string(),
        ));
    }
    if thresholds.iter().chain(values.iter()).any(|v| !v.is_finite()) {
        return Err(GeostatError::InvalidInput(
            "values and thresholds must be finite".to_string(),
        ));
    }
    Ok(Array2::from_shape_fn(
        (values.len(), thresholds.len()),
        |(i, k)| if values[i] <= thresholds[k] { 1.0 } else { 0.0 },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn indicators() {
        let ind = indicator_transform(&[1.0, 3.0, 5.0, 7.0, 9.0], &[4.0, 6.0]).unwrap();
        assert_eq!(ind.shape(), &[5, 2]);
        assert_eq!(ind.column(0).to_vec(), vec![1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(ind.row(2), array![0.0, 1.0]);
        assert!(indicator_transform(&[1.0], &[]).is_err());
    }

    #[test]
    fn log_round_trip_with_shift() {
        let t = LogTransform::new(1.0);
        assert_relative_eq!(t.forward(0.0), 0.0);
        assert_relative_eq!(t.backward(t.forward(3.5)), 3.5, epsilon = 1e-12);
        assert!(t.check(&[0.0, -0.5]).is_ok());
        assert!(t.check(&[-1.0]).is_err());
    }

    #[test]
    fn log_statistics() {
        let e = std::f64::consts::E;
        let stats = LogTransform::default()
            .statistics(&[1.0, e, e * e])
            .unwrap();
        assert_relative_eq!(stats.mean, 1.0, epsilon = 1e-12);
        assert_relative_eq!(stats.variance, 1.0, epsilon = 1e-12);
        assert!(LogTransform::default().statistics(&[0.0, 1.0]).is_err());
    }
}
