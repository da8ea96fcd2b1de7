//! Engine configuration
//!
//! Every section derives `Deserialize` with `#[serde(default)]`, so a JSON
//! document only needs to name the values it overrides.

use crate::ensemble::EnsembleMethod;
use crate::error::{ForecastError, Result};
use crate::models::ModelKind;
use crate::scenario::BaselineSource;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Feature construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Lag periods over the target
    pub lags: Vec<usize>,
    /// Window sizes for the target's rolling mean and standard deviation
    pub rolling_windows: Vec<usize>,
    /// Add weekend flag and cyclical month encoding
    pub seasonality: bool,
    /// Lag periods for external signal columns
    pub external_lags: Vec<usize>,
    /// Rolling mean window for external signal columns
    pub external_rolling_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 2, 3, 7, 14, 30],
            rolling_windows: vec![7, 14, 30],
            seasonality: true,
            external_lags: vec![1, 3, 7],
            external_rolling_window: 7,
        }
    }
}

impl FeatureConfig {
    /// Number of leading rows consumed by lags and rolling windows
    pub fn required_history(&self) -> usize {
        let max_lag = self.lags.iter().copied().max().unwrap_or(0);
        let max_window = self.rolling_windows.iter().copied().max().unwrap_or(0);
        max_lag.max(max_window)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.lags.is_empty() {
            return Err(ForecastError::config("At least one lag period is required"));
        }
        if self.lags.contains(&0) || self.external_lags.contains(&0) {
            return Err(ForecastError::config("Lag periods must be positive"));
        }
        if self.rolling_windows.iter().any(|&w| w < 2) {
            return Err(ForecastError::config(
                "Rolling windows must span at least 2 periods",
            ));
        }
        if self.external_rolling_window == 0 {
            return Err(ForecastError::config(
                "External rolling window must be positive",
            ));
        }
        Ok(())
    }
}

/// Trend-seasonal model settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSeasonalConfig {
    /// Number of seasonal buckets
    pub season_length: usize,
    /// Trailing observations used for seasonal offsets
    pub seasonal_window: usize,
    /// Below this many observations the seasonal offsets stay zero
    pub min_seasonal_observations: usize,
}

impl Default for TrendSeasonalConfig {
    fn default() -> Self {
        Self {
            season_length: 7,
            seasonal_window: 21,
            min_seasonal_observations: 14,
        }
    }
}

/// Tree-ensemble model settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeEnsembleConfig {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Seed for bootstrap sampling and permutation importance
    pub seed: u64,
}

impl Default for TreeEnsembleConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// Which models to train and their hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub enabled: Vec<ModelKind>,
    pub trend_seasonal: TrendSeasonalConfig,
    pub tree_ensemble: TreeEnsembleConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                ModelKind::TrendSeasonal,
                ModelKind::TreeEnsemble,
                ModelKind::Linear,
            ],
            trend_seasonal: TrendSeasonalConfig::default(),
            tree_ensemble: TreeEnsembleConfig::default(),
        }
    }
}

impl ModelConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.enabled.is_empty() {
            return Err(ForecastError::config("At least one model must be enabled"));
        }
        let ts = &self.trend_seasonal;
        if ts.season_length == 0 || ts.seasonal_window == 0 {
            return Err(ForecastError::config(
                "Season length and seasonal window must be positive",
            ));
        }
        let tree = &self.tree_ensemble;
        if tree.n_trees == 0 || tree.max_depth == 0 {
            return Err(ForecastError::config(
                "Tree ensemble needs at least one tree of positive depth",
            ));
        }
        if tree.min_samples_leaf == 0 || tree.min_samples_split < 2 {
            return Err(ForecastError::config(
                "Tree ensemble needs min_samples_leaf >= 1 and min_samples_split >= 2",
            ));
        }
        Ok(())
    }
}

/// Ensemble weighting settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub method: EnsembleMethod,
    /// Fraction of rows, taken chronologically, used to train the weighting copies
    pub validation_split: f64,
    /// Added to the holdout MAE before inversion
    pub epsilon: f64,
    /// Pre-normalization weight for models that fail during weighting
    pub fallback_weight: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            method: EnsembleMethod::WeightedAverage,
            validation_split: 0.8,
            epsilon: 1e-8,
            fallback_weight: 0.1,
        }
    }
}

impl EnsembleConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return Err(ForecastError::config(format!(
                "Validation split must lie in (0, 1), got {}",
                self.validation_split
            )));
        }
        if !(self.epsilon > 0.0) {
            return Err(ForecastError::config("Epsilon must be positive"));
        }
        if !(self.fallback_weight >= 0.0) {
            return Err(ForecastError::config(
                "Fallback weight must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Uncertainty settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    /// Residual standard deviation used when the residual fit fails
    pub fallback_std: f64,
    /// Confidence levels used when a caller does not name any
    pub default_confidence_levels: Vec<f64>,
    /// Residual std at which the confidence score reaches zero
    pub confidence_scale: f64,
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            fallback_std: 1.0,
            default_confidence_levels: vec![0.8, 0.95],
            confidence_scale: 10.0,
        }
    }
}

impl UncertaintyConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.fallback_std >= 0.0) || !self.fallback_std.is_finite() {
            return Err(ForecastError::config(
                "Fallback residual std must be finite and non-negative",
            ));
        }
        if !(self.confidence_scale > 0.0) {
            return Err(ForecastError::config("Confidence scale must be positive"));
        }
        crate::uncertainty::validate_confidence_levels(&self.default_confidence_levels)
    }
}

/// Scenario engine settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    /// Features the baseline forecast is computed from
    pub baseline: BaselineSource,
    /// Elasticity applied when a scenario changes price without naming one
    pub default_price_elasticity: f64,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            baseline: BaselineSource::LatestFeatures,
            default_price_elasticity: -0.5,
        }
    }
}

/// Explanation settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Number of top drivers reported
    pub top_n: usize,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self { top_n: 5 }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub features: FeatureConfig,
    pub models: ModelConfig,
    pub ensemble: EnsembleConfig,
    pub uncertainty: UncertaintyConfig,
    pub scenario: ScenarioSettings,
    pub explainer: ExplainerConfig,
    /// Relative MAE drift that triggers a retrain
    pub retrain_threshold: f64,
    /// Retrain once the trained state is this many days old
    pub retrain_days: Option<i64>,
    /// Number of MAE observations kept by the performance monitor
    pub monitor_capacity: usize,
    /// Recent observations averaged for the drift baseline
    pub drift_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            models: ModelConfig::default(),
            ensemble: EnsembleConfig::default(),
            uncertainty: UncertaintyConfig::default(),
            scenario: ScenarioSettings::default(),
            explainer: ExplainerConfig::default(),
            retrain_threshold: 0.1,
            retrain_days: None,
            monitor_capacity: 20,
            drift_window: 5,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check every section for out-of-range values
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.models.validate()?;
        self.ensemble.validate()?;
        self.uncertainty.validate()?;

        if !(self.retrain_threshold > 0.0) {
            return Err(ForecastError::config("Retrain threshold must be positive"));
        }
        if matches!(self.retrain_days, Some(days) if days <= 0) {
            return Err(ForecastError::config("Retrain days must be positive"));
        }
        if self.drift_window == 0 || self.monitor_capacity < self.drift_window {
            return Err(ForecastError::config(
                "Monitor capacity must hold at least one drift window",
            ));
        }
        if self.explainer.top_n == 0 {
            return Err(ForecastError::config("Explainer must report at least one driver"));
        }
        Ok(())
    }
}
