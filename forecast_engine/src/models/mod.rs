//! Forecasting models over feature tables

use crate::config::ModelConfig;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use tracing::{info, warn};

pub mod linear;
pub mod trend_seasonal;
pub mod tree_ensemble;

pub use linear::LinearModel;
pub use trend_seasonal::TrendSeasonalModel;
pub use tree_ensemble::TreeEnsembleModel;

/// Model variants the engine can train
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "trend_seasonal")]
    TrendSeasonal,
    #[serde(rename = "random_forest")]
    TreeEnsemble,
    #[serde(rename = "linear")]
    Linear,
}

impl ModelKind {
    /// Identifier used in logs, weights and reports
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::TrendSeasonal => "trend_seasonal",
            ModelKind::TreeEnsemble => "random_forest",
            ModelKind::Linear => "linear",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Common interface for forecasting models
pub trait ForecastModel: Debug {
    /// Variant of this model
    fn kind(&self) -> ModelKind;

    /// Get the name of the model
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Whether `fit` has succeeded at least once
    fn is_fitted(&self) -> bool;

    /// Train on `table`, replacing any previous fit and its column snapshot
    fn fit(&mut self, table: &FeatureTable) -> Result<()>;

    /// One prediction per row of `features`
    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>>;

    /// Feature columns captured by the last fit
    fn feature_columns(&self) -> &[String];

    /// Normalized importance per feature column, if the model has a notion of it
    fn feature_importance(&self) -> Option<BTreeMap<String, f64>> {
        None
    }

    /// An unfitted model with the same hyper-parameters
    fn fresh(&self) -> Self
    where
        Self: Sized;
}

/// A trained or untrained model of any variant
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    TrendSeasonal(TrendSeasonalModel),
    TreeEnsemble(TreeEnsembleModel),
    Linear(LinearModel),
}

impl Model {
    fn inner(&self) -> &dyn ForecastModel {
        match self {
            Model::TrendSeasonal(m) => m,
            Model::TreeEnsemble(m) => m,
            Model::Linear(m) => m,
        }
    }
}

impl ForecastModel for Model {
    fn kind(&self) -> ModelKind {
        self.inner().kind()
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }

    fn fit(&mut self, table: &FeatureTable) -> Result<()> {
        match self {
            Model::TrendSeasonal(m) => m.fit(table),
            Model::TreeEnsemble(m) => m.fit(table),
            Model::Linear(m) => m.fit(table),
        }
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>> {
        self.inner().predict(features)
    }

    fn feature_columns(&self) -> &[String] {
        self.inner().feature_columns()
    }

    fn feature_importance(&self) -> Option<BTreeMap<String, f64>> {
        self.inner().feature_importance()
    }

    fn fresh(&self) -> Self {
        match self {
            Model::TrendSeasonal(m) => Model::TrendSeasonal(m.fresh()),
            Model::TreeEnsemble(m) => Model::TreeEnsemble(m.fresh()),
            Model::Linear(m) => Model::Linear(m.fresh()),
        }
    }
}

/// The models that survived training, in training order
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModelSet {
    models: Vec<Model>,
}

impl ModelSet {
    /// Wrap already-fitted models; unfitted ones are rejected
    pub fn new(models: Vec<Model>) -> Result<Self> {
        if let Some(model) = models.iter().find(|m| !m.is_fitted()) {
            return Err(ForecastError::NotFitted(model.name().to_string()));
        }
        Ok(Self { models })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn get(&self, kind: ModelKind) -> Option<&Model> {
        self.models.iter().find(|m| m.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<ModelKind> {
        self.models.iter().map(|m| m.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Creates and trains the enabled model variants
#[derive(Debug, Clone)]
pub struct ModelFactory {
    config: ModelConfig,
}

impl ModelFactory {
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// An unfitted model of `kind`
    pub fn create(&self, kind: ModelKind) -> Model {
        match kind {
            ModelKind::TrendSeasonal => {
                Model::TrendSeasonal(TrendSeasonalModel::new(self.config.trend_seasonal))
            }
            ModelKind::TreeEnsemble => {
                Model::TreeEnsemble(TreeEnsembleModel::new(self.config.tree_ensemble))
            }
            ModelKind::Linear => Model::Linear(LinearModel::new()),
        }
    }

    /// Train every enabled model on `table`.
    ///
    /// A model that fails is logged and left out; the call only fails when
    /// no model trains.
    pub fn train_models(&self, table: &FeatureTable) -> Result<ModelSet> {
        let mut trained = Vec::new();
        let mut failures = Vec::new();

        for &kind in &self.config.enabled {
            if trained.iter().any(|m: &Model| m.kind() == kind) {
                continue;
            }

            let mut model = self.create(kind);
            match model.fit(table) {
                Ok(()) => {
                    info!(model = %kind, rows = table.len(), "model trained");
                    trained.push(model);
                }
                Err(e) => {
                    warn!(model = %kind, error = %e, "model training failed, excluding");
                    failures.push(format!("{}: {}", kind, e));
                }
            }
        }

        if trained.is_empty() {
            return Err(ForecastError::AllModelsFailed(failures.join("; ")));
        }

        ModelSet::new(trained)
    }
}

/// Wrap a training failure of `model`
pub(crate) fn training_error(model: ModelKind, reason: impl ToString) -> ForecastError {
    ForecastError::ModelTraining {
        model: model.name().to_string(),
        reason: reason.to_string(),
    }
}

/// Wrap a prediction failure of `model`
pub(crate) fn prediction_error(model: ModelKind, reason: impl ToString) -> ForecastError {
    ForecastError::ModelPrediction {
        model: model.name().to_string(),
        reason: reason.to_string(),
    }
}

/// Row-major rows as a smartcore matrix
pub(crate) fn dense(rows: &[Vec<f64>], ncols: usize) -> DenseMatrix<f64> {
    let values: Vec<f64> = rows.iter().flatten().copied().collect();
    DenseMatrix::new(rows.len(), ncols, values, false)
}
