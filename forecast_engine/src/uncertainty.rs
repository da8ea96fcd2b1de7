//! Residual-based prediction intervals

use crate::config::UncertaintyConfig;
use crate::ensemble::Ensemble;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::models::ModelSet;
use forecast_math::normal::two_sided_z;
use forecast_math::stats;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Where the residual dispersion came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualSource {
    /// In-sample ensemble residuals
    InSample,
    /// Configured default after the residual fit failed
    Fallback,
}

/// Residual dispersion of the fitted ensemble
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyState {
    residual_std: f64,
    residual_mean: f64,
    n_residuals: usize,
    source: ResidualSource,
}

/// Symmetric interval band at one confidence level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInterval {
    pub confidence: f64,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl PredictionInterval {
    /// Upper minus lower, per period
    pub fn widths(&self) -> Vec<f64> {
        self.upper
            .iter()
            .zip(&self.lower)
            .map(|(u, l)| u - l)
            .collect()
    }
}

impl UncertaintyState {
    /// A state with a fixed residual standard deviation
    pub fn with_std(residual_std: f64) -> Self {
        Self {
            residual_std,
            residual_mean: 0.0,
            n_residuals: 0,
            source: ResidualSource::Fallback,
        }
    }

    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    pub fn residual_mean(&self) -> f64 {
        self.residual_mean
    }

    pub fn n_residuals(&self) -> usize {
        self.n_residuals
    }

    pub fn source(&self) -> ResidualSource {
        self.source
    }

    /// `forecast ± z · residual_std` for each confidence level.
    ///
    /// Width is the same for every period of the horizon.
    pub fn calculate_intervals(
        &self,
        forecast: &[f64],
        confidence_levels: &[f64],
        horizon: usize,
    ) -> Result<Vec<PredictionInterval>> {
        validate_confidence_levels(confidence_levels)?;
        if forecast.len() != horizon {
            return Err(ForecastError::config(format!(
                "Forecast has {} values for a horizon of {}",
                forecast.len(),
                horizon
            )));
        }

        confidence_levels
            .iter()
            .map(|&confidence| -> Result<PredictionInterval> {
                let margin = two_sided_z((1.0 - confidence) / 2.0)? * self.residual_std;
                Ok(PredictionInterval {
                    confidence,
                    lower: forecast.iter().map(|f| f - margin).collect(),
                    upper: forecast.iter().map(|f| f + margin).collect(),
                })
            })
            .collect()
    }
}

/// Checks that there is at least one level and each lies strictly in (0, 1)
pub(crate) fn validate_confidence_levels(levels: &[f64]) -> Result<()> {
    if levels.is_empty() {
        return Err(ForecastError::config("At least one confidence level is required"));
    }
    if let Some(bad) = levels.iter().find(|&&c| !(c > 0.0 && c < 1.0)) {
        return Err(ForecastError::config(format!(
            "Confidence level must lie in (0, 1), got {}",
            bad
        )));
    }
    Ok(())
}

/// Estimates residual dispersion and scores forecast confidence
#[derive(Debug, Clone)]
pub struct UncertaintyQuantifier {
    config: UncertaintyConfig,
}

impl UncertaintyQuantifier {
    pub fn new(config: UncertaintyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn default_confidence_levels(&self) -> &[f64] {
        &self.config.default_confidence_levels
    }

    /// Residual dispersion of the ensemble over its own training table.
    ///
    /// Never fails: any error, or a non-finite result, yields the configured
    /// fallback standard deviation.
    pub fn fit(&self, models: &ModelSet, ensemble: &Ensemble, table: &FeatureTable) -> UncertaintyState {
        match Self::in_sample_residuals(models, ensemble, table) {
            Ok(state) if state.residual_std.is_finite() => {
                info!(
                    residual_std = state.residual_std,
                    residuals = state.n_residuals,
                    "uncertainty fitted"
                );
                state
            }
            Ok(state) => {
                warn!(residual_std = state.residual_std, "non-finite residual std, using fallback");
                UncertaintyState::with_std(self.config.fallback_std)
            }
            Err(e) => {
                warn!(error = %e, "uncertainty fit failed, using fallback");
                UncertaintyState::with_std(self.config.fallback_std)
            }
        }
    }

    fn in_sample_residuals(
        models: &ModelSet,
        ensemble: &Ensemble,
        table: &FeatureTable,
    ) -> Result<UncertaintyState> {
        let predictions = ensemble.predict(table, table.len(), models)?;
        let residuals: Vec<f64> = table
            .target()
            .iter()
            .zip(&predictions)
            .map(|(actual, predicted)| actual - predicted)
            .collect();

        Ok(UncertaintyState {
            residual_std: stats::population_std(&residuals)?,
            residual_mean: stats::mean(&residuals)?,
            n_residuals: residuals.len(),
            source: ResidualSource::InSample,
        })
    }

    /// Score in [0, 1] that falls linearly with the residual std
    pub fn confidence_score(&self, state: &UncertaintyState) -> f64 {
        (1.0 - state.residual_std / self.config.confidence_scale).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_interval_width_uses_table_z() {
        let state = UncertaintyState::with_std(2.0);
        let intervals = state.calculate_intervals(&[10.0, 20.0], &[0.95], 2).unwrap();
        assert_abs_diff_eq!(intervals[0].lower[0], 10.0 - 3.92, epsilon = 1e-12);
        assert_abs_diff_eq!(intervals[0].upper[1], 20.0 + 3.92, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_levels_and_horizon() {
        let state = UncertaintyState::with_std(1.0);
        assert!(state.calculate_intervals(&[1.0], &[1.0], 1).is_err());
        assert!(state.calculate_intervals(&[1.0], &[], 1).is_err());
        assert!(state.calculate_intervals(&[1.0], &[0.9], 2).is_err());
    }

    #[test]
    fn test_confidence_score_clamped() {
        let quantifier = UncertaintyQuantifier::new(UncertaintyConfig::default()).unwrap();
        assert_abs_diff_eq!(quantifier.confidence_score(&UncertaintyState::with_std(2.5)), 0.75);
        assert_eq!(quantifier.confidence_score(&UncertaintyState::with_std(50.0)), 0.0);
    }
}
