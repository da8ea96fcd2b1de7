//! First-degree trend fitting over the observation index

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Least-squares line `value = intercept + slope * index`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    slope: f64,
    intercept: f64,
}

impl LinearTrend {
    /// Fit a line through `values` indexed 0, 1, 2, ...
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.len() < 2 {
            return Err(MathError::InsufficientData(
                "Not enough data for a trend fit. Need at least 2 points.".to_string(),
            ));
        }

        let n = values.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for (i, &y) in values.iter().enumerate() {
            let x = i as f64;
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        if !numerator.is_finite() {
            return Err(MathError::CalculationError(
                "Trend fit produced a non-finite slope".to_string(),
            ));
        }

        let slope = numerator / denominator;

        Ok(Self {
            slope,
            intercept: y_mean - slope * x_mean,
        })
    }

    /// A flat line at `level`
    pub fn flat(level: f64) -> Self {
        Self {
            slope: 0.0,
            intercept: level,
        }
    }

    /// Get the slope (change per period)
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Get the intercept (fitted value at index 0)
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Fitted value at `index`
    pub fn value_at(&self, index: f64) -> f64 {
        self.intercept + self.slope * index
    }

    /// Subtract the fitted line from `values`, which must share the fit's indexing
    pub fn detrend(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| v - self.value_at(i as f64))
            .collect()
    }

    /// Coefficient of determination of the fit over `values`
    pub fn r_squared(&self, values: &[f64]) -> Result<f64> {
        if values.len() < 2 {
            return Err(MathError::InsufficientData(
                "Not enough data to calculate R-squared. Need at least 2 points.".to_string(),
            ));
        }

        let y_mean = values.iter().sum::<f64>() / values.len() as f64;
        let mut ss_total = 0.0;
        let mut ss_residual = 0.0;

        for (i, &y) in values.iter().enumerate() {
            ss_total += (y - y_mean).powi(2);
            ss_residual += (y - self.value_at(i as f64)).powi(2);
        }

        if ss_total.abs() < 1e-10 {
            return Err(MathError::CalculationError(
                "Cannot calculate R-squared: total sum of squares is too small".to_string(),
            ));
        }

        Ok(1.0 - (ss_residual / ss_total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_exact_line() {
        let values: Vec<f64> = (0..20).map(|i| 5.0 + 2.0 * i as f64).collect();
        let trend = LinearTrend::fit(&values).unwrap();

        assert_abs_diff_eq!(trend.slope(), 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(trend.intercept(), 5.0, epsilon = 1e-10);
        assert_abs_diff_eq!(trend.r_squared(&values).unwrap(), 1.0, epsilon = 1e-10);
        assert!(trend.detrend(&values).iter().all(|r| r.abs() < 1e-9));
    }

    #[test]
    fn test_flat_series() {
        let trend = LinearTrend::fit(&[3.0, 3.0, 3.0]).unwrap();
        assert_abs_diff_eq!(trend.slope(), 0.0);
        assert!(trend.r_squared(&[3.0, 3.0, 3.0]).is_err());
        assert_eq!(LinearTrend::flat(3.0).value_at(10.0), 3.0);
    }

    #[test]
    fn test_insufficient_points() {
        assert!(LinearTrend::fit(&[1.0]).is_err());
        assert!(LinearTrend::fit(&[]).is_err());
    }
}
