//! Bagged regression trees

use crate::config::TreeEnsembleConfig;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::models::{dense, prediction_error, training_error, ForecastModel, ModelKind};
use forecast_math::accuracy::mean_squared_error;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Random forest regressor over every feature column
#[derive(Serialize, Deserialize)]
pub struct TreeEnsembleModel {
    config: TreeEnsembleConfig,
    feature_columns: Vec<String>,
    forest: Option<Forest>,
    importance: BTreeMap<String, f64>,
}

impl fmt::Debug for TreeEnsembleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeEnsembleModel")
            .field("config", &self.config)
            .field("feature_columns", &self.feature_columns)
            .field("fitted", &self.forest.is_some())
            .finish()
    }
}

impl TreeEnsembleModel {
    pub fn new(config: TreeEnsembleConfig) -> Self {
        Self {
            config,
            feature_columns: Vec::new(),
            forest: None,
            importance: BTreeMap::new(),
        }
    }

    fn parameters(&self) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters::default()
            .with_n_trees(self.config.n_trees)
            .with_max_depth(self.config.max_depth)
            .with_min_samples_split(self.config.min_samples_split)
            .with_min_samples_leaf(self.config.min_samples_leaf)
            .with_seed(self.config.seed)
    }

    /// Increase in training MSE when one column is shuffled, normalized to sum 1
    fn permutation_importance(
        &self,
        forest: &Forest,
        rows: &[Vec<f64>],
        target: &[f64],
    ) -> Result<BTreeMap<String, f64>> {
        let kind = self.kind();
        let predict = |rows: &[Vec<f64>]| -> Result<Vec<f64>> {
            forest
                .predict(&dense(rows, self.feature_columns.len()))
                .map_err(|e| training_error(kind, e))
        };

        let baseline = mean_squared_error(target, &predict(rows)?)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut drops = Vec::with_capacity(self.feature_columns.len());

        for j in 0..self.feature_columns.len() {
            let mut column: Vec<f64> = rows.iter().map(|row| row[j]).collect();
            column.shuffle(&mut rng);

            let permuted: Vec<Vec<f64>> = rows
                .iter()
                .zip(column)
                .map(|(row, value)| {
                    let mut row = row.clone();
                    row[j] = value;
                    row
                })
                .collect();

            let mse = mean_squared_error(target, &predict(&permuted)?)?;
            drops.push((mse - baseline).max(0.0));
        }

        let total: f64 = drops.iter().sum();
        let uniform = 1.0 / drops.len() as f64;

        Ok(self
            .feature_columns
            .iter()
            .zip(drops)
            .map(|(name, drop)| {
                let score = if total > 0.0 { drop / total } else { uniform };
                (name.clone(), score)
            })
            .collect())
    }
}

impl ForecastModel for TreeEnsembleModel {
    fn kind(&self) -> ModelKind {
        ModelKind::TreeEnsemble
    }

    fn is_fitted(&self) -> bool {
        self.forest.is_some()
    }

    fn fit(&mut self, table: &FeatureTable) -> Result<()> {
        let columns = table.feature_columns().to_vec();
        if columns.is_empty() {
            return Err(training_error(self.kind(), "no feature columns"));
        }
        if table.len() < self.config.min_samples_split {
            return Err(training_error(
                self.kind(),
                format!("{} rows is fewer than min_samples_split", table.len()),
            ));
        }

        let rows = table.matrix(&columns, self.name())?;
        let x = dense(&rows, columns.len());
        let y = table.target().to_vec();

        let forest = RandomForestRegressor::fit(&x, &y, self.parameters())
            .map_err(|e| training_error(self.kind(), e))?;

        self.feature_columns = columns;
        self.importance = self.permutation_importance(&forest, &rows, table.target())?;
        self.forest = Some(forest);

        debug!(
            trees = self.config.n_trees,
            columns = self.feature_columns.len(),
            "random forest fitted"
        );
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>> {
        let forest = self
            .forest
            .as_ref()
            .ok_or_else(|| ForecastError::NotFitted(self.name().to_string()))?;
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let rows = features.matrix(&self.feature_columns, self.name())?;
        let predictions = forest
            .predict(&dense(&rows, self.feature_columns.len()))
            .map_err(|e| prediction_error(self.kind(), e))?;

        if predictions.iter().any(|p| !p.is_finite()) {
            return Err(prediction_error(self.kind(), "non-finite prediction"));
        }
        Ok(predictions)
    }

    fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    fn feature_importance(&self) -> Option<BTreeMap<String, f64>> {
        self.forest.as_ref().map(|_| self.importance.clone())
    }

    fn fresh(&self) -> Self {
        Self::new(self.config)
    }
}
