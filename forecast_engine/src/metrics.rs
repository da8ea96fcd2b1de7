//! Metrics for evaluating forecast performance

use crate::ensemble::Ensemble;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::models::{ForecastModel, ModelSet};
use chrono::{DateTime, Utc};
use forecast_math::forecast_accuracy;
use forecast_math::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Error metrics for forecast evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error over non-zero actuals
    pub mape: f64,
}

impl ErrorMetrics {
    /// Score `predicted` against `actual`
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        let accuracy = forecast_accuracy(actual, predicted)?;
        Ok(Self {
            mae: accuracy.mae,
            rmse: accuracy.rmse,
            mape: accuracy.mape,
        })
    }

    /// Metrics recorded for a model that could not be evaluated
    pub fn failed() -> Self {
        Self {
            mae: f64::INFINITY,
            rmse: f64::INFINITY,
            mape: f64::INFINITY,
        }
    }
}

/// Held-out performance of every model and the ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub models: BTreeMap<String, ErrorMetrics>,
    pub ensemble: ErrorMetrics,
    pub n_observations: usize,
    pub evaluated_at: DateTime<Utc>,
}

/// Rolling-origin backtest summary for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    /// Mean MAE over successful folds; infinite when every fold failed
    pub mean_mae: f64,
    /// Population std of MAE over successful folds
    pub std_mae: f64,
    pub folds: usize,
    pub failures: usize,
}

/// Evaluates trained models on held-out feature tables
#[derive(Debug, Clone, Default)]
pub struct ModelEvaluator;

impl ModelEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Score each model and the ensemble on `test`.
    ///
    /// A model or ensemble that cannot predict scores infinite on every
    /// metric instead of failing the evaluation.
    pub fn evaluate(
        &self,
        models: &ModelSet,
        ensemble: &Ensemble,
        test: &FeatureTable,
    ) -> Result<EvaluationReport> {
        if test.is_empty() {
            return Err(ForecastError::data("Test table is empty"));
        }
        let actual = test.target();

        let mut per_model = BTreeMap::new();
        for model in models.iter() {
            let metrics = model
                .predict(test)
                .and_then(|predicted| ErrorMetrics::calculate(actual, &predicted))
                .unwrap_or_else(|e| {
                    warn!(model = %model.kind(), error = %e, "evaluation failed");
                    ErrorMetrics::failed()
                });
            per_model.insert(model.name().to_string(), metrics);
        }

        let ensemble_metrics = ensemble
            .predict(test, test.len(), models)
            .and_then(|predicted| ErrorMetrics::calculate(actual, &predicted))
            .unwrap_or_else(|e| {
                warn!(error = %e, "ensemble evaluation failed");
                ErrorMetrics::failed()
            });

        info!(
            mae = ensemble_metrics.mae,
            rmse = ensemble_metrics.rmse,
            rows = test.len(),
            "ensemble evaluated"
        );

        Ok(EvaluationReport {
            models: per_model,
            ensemble: ensemble_metrics,
            n_observations: test.len(),
            evaluated_at: Utc::now(),
        })
    }

    /// Rolling-origin backtest of fresh model copies.
    ///
    /// Each of `n_splits` folds tests on a window of `test_size` of the rows,
    /// moving the window back by `test rows / n_splits` rows per fold (at
    /// least one) and training on everything before it. Folds stop once
    /// training would be shorter than the test window.
    pub fn backtest(
        &self,
        models: &ModelSet,
        table: &FeatureTable,
        test_size: f64,
        n_splits: usize,
    ) -> Result<BTreeMap<String, BacktestSummary>> {
        if !(test_size > 0.0 && test_size < 1.0) || n_splits == 0 {
            return Err(ForecastError::config(
                "Backtest needs test_size in (0, 1) and at least one split",
            ));
        }

        let total = table.len();
        let test_rows = (total as f64 * test_size) as usize;
        if test_rows == 0 {
            return Err(ForecastError::data(format!(
                "{} rows leave no room for a test window",
                total
            )));
        }
        let stride = (test_rows / n_splits).max(1);

        let mut scores: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for split in 0..n_splits {
            let test_end = total - split * stride;
            let Some(test_start) = test_end.checked_sub(test_rows) else {
                break;
            };
            if test_start < test_rows {
                break;
            }
            let train = table.slice(0, test_start);
            let test = table.slice(test_start, test_end);

            for model in models.iter() {
                let mut copy = model.fresh();
                let mae = copy
                    .fit(&train)
                    .and_then(|_| copy.predict(&test))
                    .and_then(|predicted| ErrorMetrics::calculate(test.target(), &predicted))
                    .map(|metrics| metrics.mae);

                let entry = scores.entry(model.name().to_string()).or_default();
                match mae {
                    Ok(mae) => entry.push(Some(mae)),
                    Err(e) => {
                        warn!(model = %model.kind(), split, error = %e, "backtest fold failed");
                        entry.push(None);
                    }
                }
            }
        }

        scores
            .into_iter()
            .map(|(name, folds)| -> Result<(String, BacktestSummary)> {
                let finite: Vec<f64> = folds.iter().flatten().copied().collect();
                let summary = if finite.is_empty() {
                    BacktestSummary {
                        mean_mae: f64::INFINITY,
                        std_mae: 0.0,
                        folds: folds.len(),
                        failures: folds.len(),
                    }
                } else {
                    BacktestSummary {
                        mean_mae: stats::mean(&finite)?,
                        std_mae: stats::population_std(&finite)?,
                        folds: folds.len(),
                        failures: folds.len() - finite.len(),
                    }
                };
                Ok((name, summary))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_error_metrics() {
        let metrics = ErrorMetrics::calculate(&[100.0, 200.0], &[110.0, 180.0]).unwrap();
        assert_abs_diff_eq!(metrics.mae, 15.0);
        assert_abs_diff_eq!(metrics.mape, 10.0, epsilon = 1e-10);
        assert_abs_diff_eq!(metrics.rmse, 250.0_f64.sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn test_failed_metrics_are_infinite() {
        let failed = ErrorMetrics::failed();
        assert!(failed.mae.is_infinite() && failed.rmse.is_infinite() && failed.mape.is_infinite());
    }
}
