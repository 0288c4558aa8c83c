use crate::error::{GeostatError, Result};

pub mod grid;
pub mod polygonal;

fn check_weights(values: &[f64], weights: &[f64]) -> Result<f64> {
    if values.len() != weights.len() {
        return Err(GeostatError::InvalidInput(format!(
            "{} values and {} weights",
            values.len(),
            weights.len()
        )));
    }
    if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
        return Err(GeostatError::InvalidInput(
            "weights must be finite and non-negative".to_string(),
        ));
    }
    let total = weights.iter().sum::<f64>();
    if total <= 0.0 {
        return Err(GeostatError::InvalidInput(
            "weights must have a positive sum".to_string(),
        ));
    }
    Ok(total)
}

/// Weighted mean of `values`.
pub fn declustered_mean(values: &[f64], weights: &[f64]) -> Result<f64> {
    let total = check_weights(values, weights)?;
    Ok(values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total)
}

/// Weighted population variance of `values`.
pub fn declustered_variance(values: &[f64], weights: &[f64]) -> Result<f64> {
    let mean = declustered_mean(values, weights)?;
    let total = weights.iter().sum::<f64>();
    Ok(values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean).powi(2))
        .sum::<f64>()
        / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weighted_statistics() {
        let values = [1.0, 2.0, 10.0];
        let weights = [1.0, 1.0, 2.0];
        assert_relative_eq!(declustered_mean(&values, &weights).unwrap(), 23.0 / 4.0);
        let mean = 23.0 / 4.0;
        let var = (f64::powi(1.0 - mean, 2) + f64::powi(2.0 - mean, 2) + 2.0 * f64::powi(10.0 - mean, 2)) / 4.0;
        assert_relative_eq!(declustered_variance(&values, &weights).unwrap(), var);
    }

    #[test]
    fn bad_weights_are_rejected() {
        assert!(declustered_mean(&[1.0], &[1.0, 2.0]).is_err());
        assert!(declustered_mean(&[1.0, 2.0], &[0.0, 0.0]).is_err());
        assert!(declustered_mean(&[1.0, 2.0], &[-1.0, 2.0]).is_err());
    }
}
