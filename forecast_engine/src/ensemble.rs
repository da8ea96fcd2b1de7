//! Weighted combination of model forecasts

use crate::config::EnsembleConfig;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::models::{ForecastModel, Model, ModelKind, ModelSet};
use crate::utils::train_test_split;
use forecast_math::accuracy::mean_absolute_error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// How member forecasts are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleMethod {
    /// Inverse holdout-MAE weights
    #[default]
    WeightedAverage,
    /// Equal weights
    SimpleAverage,
}

/// Ensemble weights learned from holdout error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    config: EnsembleConfig,
    weights: BTreeMap<ModelKind, f64>,
    /// Holdout MAE per model; `None` when the model failed during weighting
    validation_mae: BTreeMap<ModelKind, Option<f64>>,
}

impl Ensemble {
    pub fn new(config: EnsembleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            weights: BTreeMap::new(),
            validation_mae: BTreeMap::new(),
        })
    }

    pub fn is_fitted(&self) -> bool {
        !self.weights.is_empty()
    }

    /// Normalized weights, summing to one
    pub fn weights(&self) -> &BTreeMap<ModelKind, f64> {
        &self.weights
    }

    pub fn validation_mae(&self) -> &BTreeMap<ModelKind, Option<f64>> {
        &self.validation_mae
    }

    pub fn method(&self) -> EnsembleMethod {
        self.config.method
    }

    /// Learn weights for `models`.
    ///
    /// Fresh copies of each model are trained on the chronologically first
    /// part of `table` and scored on the rest. A copy that fails gets the
    /// configured fallback weight instead of being dropped.
    pub fn fit(&mut self, models: &ModelSet, table: &FeatureTable) -> Result<()> {
        if models.is_empty() {
            return Err(ForecastError::AllModelsFailed(
                "no trained models to weight".to_string(),
            ));
        }

        let (train, validation) = train_test_split(table, self.config.validation_split)?;
        let mut raw = BTreeMap::new();
        let mut maes = BTreeMap::new();

        for model in models.iter() {
            let kind = model.kind();
            let score = match self.config.method {
                EnsembleMethod::SimpleAverage => {
                    raw.insert(kind, 1.0);
                    continue;
                }
                EnsembleMethod::WeightedAverage => Self::holdout_mae(model, &train, &validation),
            };

            match score {
                Ok(mae) => {
                    debug!(model = %kind, mae, "holdout error");
                    raw.insert(kind, 1.0 / (mae + self.config.epsilon));
                    maes.insert(kind, Some(mae));
                }
                Err(e) => {
                    warn!(model = %kind, error = %e, "weighting failed, using fallback weight");
                    raw.insert(kind, self.config.fallback_weight);
                    maes.insert(kind, None);
                }
            }
        }

        self.weights = normalize(raw);
        self.validation_mae = maes;

        info!(weights = ?self.weights, "ensemble weights fitted");
        Ok(())
    }

    fn holdout_mae(model: &Model, train: &FeatureTable, validation: &FeatureTable) -> Result<f64> {
        if train.is_empty() || validation.is_empty() {
            return Err(ForecastError::data(format!(
                "cannot split {} rows for validation",
                train.len() + validation.len()
            )));
        }

        let mut copy = model.fresh();
        copy.fit(train)?;
        let predictions = copy.predict(validation)?;
        let mae = mean_absolute_error(validation.target(), &predictions)?;

        if !mae.is_finite() {
            return Err(ForecastError::ModelPrediction {
                model: model.name().to_string(),
                reason: "non-finite holdout error".to_string(),
            });
        }
        Ok(mae)
    }

    /// Weighted forecast over the models that predict successfully.
    ///
    /// Failing models are logged and skipped, and the remaining weights are
    /// renormalized. Fails with `NoPredictions` when every model fails.
    pub fn predict(
        &self,
        features: &FeatureTable,
        horizon: usize,
        models: &ModelSet,
    ) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(ForecastError::NotFitted("ensemble".to_string()));
        }
        if horizon == 0 {
            return Err(ForecastError::config("Horizon must be positive"));
        }
        if features.len() != horizon {
            return Err(ForecastError::config(format!(
                "Prediction features have {} rows for a horizon of {}",
                features.len(),
                horizon
            )));
        }

        let mut successes: Vec<(f64, Vec<f64>)> = Vec::new();
        for model in models.iter() {
            let Some(&weight) = self.weights.get(&model.kind()) else {
                warn!(model = %model.kind(), "model has no ensemble weight, skipping");
                continue;
            };

            match model.predict(features) {
                Ok(values) if values.len() == horizon && values.iter().all(|v| v.is_finite()) => {
                    successes.push((weight, values));
                }
                Ok(values) => {
                    warn!(
                        model = %model.kind(),
                        len = values.len(),
                        "discarding malformed prediction"
                    );
                }
                Err(e) => {
                    warn!(model = %model.kind(), error = %e, "model prediction failed, skipping");
                }
            }
        }

        if successes.is_empty() {
            return Err(ForecastError::NoPredictions);
        }

        let total: f64 = successes.iter().map(|(w, _)| w).sum();
        let count = successes.len() as f64;

        Ok((0..horizon)
            .map(|i| {
                successes
                    .iter()
                    .map(|(w, values)| {
                        let share = if total > 0.0 { w / total } else { 1.0 / count };
                        share * values[i]
                    })
                    .sum()
            })
            .collect())
    }
}

/// Scale weights to sum to one; equal weights when they sum to zero
fn normalize(raw: BTreeMap<ModelKind, f64>) -> BTreeMap<ModelKind, f64> {
    let total: f64 = raw.values().sum();
    let count = raw.len() as f64;

    raw.into_iter()
        .map(|(kind, w)| {
            let weight = if total > 0.0 { w / total } else { 1.0 / count };
            (kind, weight)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_normalize_handles_zero_total() {
        let mut raw = BTreeMap::new();
        raw.insert(ModelKind::Linear, 0.0);
        raw.insert(ModelKind::TrendSeasonal, 0.0);
        let weights = normalize(raw);
        assert_abs_diff_eq!(weights[&ModelKind::Linear], 0.5);
    }

    #[test]
    fn test_unfitted_ensemble_refuses_to_predict() {
        let ensemble = Ensemble::new(EnsembleConfig::default()).unwrap();
        let features = FeatureTable::from_columns(Vec::new(), "y", Vec::new(), Vec::new()).unwrap();
        assert!(matches!(
            ensemble.predict(&features, 1, &ModelSet::default()),
            Err(ForecastError::NotFitted(_))
        ));
    }
}
