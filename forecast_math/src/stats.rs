//! Descriptive statistics over dense series

use crate::{MathError, Result};

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the mean of an empty series".to_string(),
        ));
    }

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population (n) standard deviation
pub fn population_std(values: &[f64]) -> Result<f64> {
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    Ok(variance.sqrt())
}

/// Sample (n - 1) standard deviation
pub fn sample_std(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(MathError::InsufficientData(format!(
            "Sample standard deviation needs at least 2 values, got {}",
            values.len()
        )));
    }

    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;

    Ok(variance.sqrt())
}

/// Ratio of population standard deviation to mean; zero for non-positive means
pub fn coefficient_of_variation(values: &[f64]) -> Result<f64> {
    let mean = mean(values)?;
    if mean <= 0.0 {
        return Ok(0.0);
    }

    Ok(population_std(values)? / mean)
}

/// Mean of consecutive differences
pub fn mean_difference(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(MathError::InsufficientData(
            "Differencing needs at least 2 values".to_string(),
        ));
    }

    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    mean(&diffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(mean(&values).unwrap(), 5.0);
        assert_abs_diff_eq!(population_std(&values).unwrap(), 2.0);
        assert_abs_diff_eq!(sample_std(&values).unwrap(), 2.138, epsilon = 1e-3);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(mean(&[]).is_err());
        assert!(population_std(&[]).is_err());
        assert!(sample_std(&[1.0]).is_err());
        assert!(mean_difference(&[1.0]).is_err());
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_abs_diff_eq!(coefficient_of_variation(&[10.0, 10.0]).unwrap(), 0.0);
        assert_abs_diff_eq!(coefficient_of_variation(&[-1.0, -3.0]).unwrap(), 0.0);
        assert_abs_diff_eq!(coefficient_of_variation(&[5.0, 15.0]).unwrap(), 0.5);
    }

    #[test]
    fn test_mean_difference() {
        assert_abs_diff_eq!(mean_difference(&[1.0, 3.0, 5.0]).unwrap(), 2.0);
    }
}
