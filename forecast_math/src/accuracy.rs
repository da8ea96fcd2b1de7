//! Forecast accuracy metrics

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Forecast accuracy metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error, in percent, over non-zero actuals
    pub mape: f64,
}

/// Calculate accuracy metrics of `forecast` against `actual`
pub fn forecast_accuracy(actual: &[f64], forecast: &[f64]) -> Result<Accuracy> {
    check_lengths(actual, forecast)?;

    let mse = mean_squared_error(actual, forecast)?;

    Ok(Accuracy {
        mae: mean_absolute_error(actual, forecast)?,
        mse,
        rmse: mse.sqrt(),
        mape: mean_absolute_percentage_error(actual, forecast)?,
    })
}

/// Mean Absolute Error
pub fn mean_absolute_error(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    check_lengths(actual, forecast)?;

    Ok(actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).abs())
        .sum::<f64>()
        / actual.len() as f64)
}

/// Mean Squared Error
pub fn mean_squared_error(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    check_lengths(actual, forecast)?;

    Ok(actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).powi(2))
        .sum::<f64>()
        / actual.len() as f64)
}

/// Root Mean Squared Error
pub fn root_mean_squared_error(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    Ok(mean_squared_error(actual, forecast)?.sqrt())
}

/// Mean Absolute Percentage Error in percent.
///
/// Periods with a zero actual are left out of the mean; when every actual
/// is zero the error is infinite.
pub fn mean_absolute_percentage_error(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    check_lengths(actual, forecast)?;

    let ratios: Vec<f64> = actual
        .iter()
        .zip(forecast.iter())
        .filter(|&(&a, _)| a != 0.0)
        .map(|(&a, &f)| ((a - f) / a).abs())
        .collect();

    if ratios.is_empty() {
        return Ok(f64::INFINITY);
    }

    Ok(ratios.iter().sum::<f64>() / ratios.len() as f64 * 100.0)
}

fn check_lengths(actual: &[f64], forecast: &[f64]) -> Result<()> {
    if actual.len() != forecast.len() || actual.is_empty() {
        return Err(MathError::InvalidInput(format!(
            "Actual ({}) and forecast ({}) must have the same non-zero length",
            actual.len(),
            forecast.len()
        )));
    }
    Ok(())
}
