//! Orchestration of the forecasting pipeline
//!
//! [`ForecastEngine::fit`] produces an immutable [`TrainedState`] that is
//! swapped in only when every stage succeeds. Prediction, scenarios and
//! evaluation read that snapshot, so a failed refit never disturbs the
//! state already serving forecasts.

use crate::config::EngineConfig;
use crate::data::{DataLoader, DataSource, TimeSeriesData};
use crate::drift::{is_stale, PerformanceMonitor, RetrainTriggers};
use crate::ensemble::Ensemble;
use crate::error::{ForecastError, Result};
use crate::explain::{Explanation, ForecastExplainer};
use crate::features::{FeatureBuilder, FeatureTable};
use crate::metrics::{EvaluationReport, ModelEvaluator};
use crate::models::{ModelFactory, ModelSet};
use crate::scenario::{BaselineSource, Scenario, ScenarioEngine, ScenarioResult};
use crate::uncertainty::{validate_confidence_levels, PredictionInterval, UncertaintyQuantifier, UncertaintyState};
use crate::utils::{future_timestamps, infer_step, train_test_split};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// What to train on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRequest {
    pub target_column: String,
    pub date_column: String,
    /// External signal columns; `None` asks the data source
    pub external_features: Option<Vec<String>>,
    /// Ignore observations after this instant
    pub end_date: Option<DateTime<Utc>>,
}

impl FitRequest {
    pub fn new(target_column: impl Into<String>, date_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
            date_column: date_column.into(),
            external_features: None,
            end_date: None,
        }
    }

    pub fn with_external_features(mut self, columns: Vec<String>) -> Self {
        self.external_features = Some(columns);
        self
    }

    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }
}

/// Everything a successful fit produces
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedState {
    pub models: ModelSet,
    pub ensemble: Ensemble,
    pub uncertainty: UncertaintyState,
    pub target_column: String,
    pub date_column: String,
    /// External columns that were present and turned into features
    pub external_columns: Vec<String>,
    pub feature_columns: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
}

impl TrainedState {
    /// Timestamp-derived version string, e.g. `v20240131_120000`
    pub fn version_tag(&self) -> String {
        self.trained_at.format("v%Y%m%d_%H%M%S").to_string()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A forecast with its intervals and context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    values: Vec<f64>,
    intervals: Vec<PredictionInterval>,
    confidence_levels: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
    confidence_score: f64,
    explanation: Option<Explanation>,
    model_performance: Option<EvaluationReport>,
    version: String,
}

impl ForecastResult {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn intervals(&self) -> &[PredictionInterval] {
        &self.intervals
    }

    /// Interval at `confidence`, if it was requested
    pub fn interval(&self, confidence: f64) -> Option<&PredictionInterval> {
        self.intervals
            .iter()
            .find(|i| (i.confidence - confidence).abs() < 1e-12)
    }

    pub fn confidence_levels(&self) -> &[f64] {
        &self.confidence_levels
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    pub fn explanation(&self) -> Option<&Explanation> {
        self.explanation.as_ref()
    }

    /// Latest evaluation at the time of the forecast
    pub fn model_performance(&self) -> Option<&EvaluationReport> {
        self.model_performance.as_ref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn horizon(&self) -> usize {
        self.values.len()
    }
}

/// Trains, serves and retrains the ensemble forecaster
pub struct ForecastEngine {
    config: EngineConfig,
    source: Box<dyn DataSource>,
    feature_builder: FeatureBuilder,
    model_factory: ModelFactory,
    quantifier: UncertaintyQuantifier,
    scenario_engine: ScenarioEngine,
    explainer: ForecastExplainer,
    evaluator: ModelEvaluator,
    monitor: PerformanceMonitor,
    request: Option<FitRequest>,
    state: Option<Arc<TrainedState>>,
    latest_report: Option<EvaluationReport>,
}

impl fmt::Debug for ForecastEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecastEngine")
            .field("config", &self.config)
            .field("request", &self.request)
            .field("trained", &self.is_trained())
            .field("version", &self.state.as_ref().map(|s| s.version_tag()))
            .finish()
    }
}

impl ForecastEngine {
    /// Validate `config` and build every component
    pub fn new(config: EngineConfig, source: impl DataSource + 'static) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            feature_builder: FeatureBuilder::new(config.features.clone())?,
            model_factory: ModelFactory::new(config.models.clone())?,
            quantifier: UncertaintyQuantifier::new(config.uncertainty.clone())?,
            scenario_engine: ScenarioEngine::new(config.scenario),
            explainer: ForecastExplainer::new(config.explainer),
            evaluator: ModelEvaluator::new(),
            monitor: PerformanceMonitor::new(config.monitor_capacity, config.drift_window)?,
            source: Box::new(source),
            request: None,
            state: None,
            latest_report: None,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    /// Snapshot of the current trained state
    pub fn state(&self) -> Option<Arc<TrainedState>> {
        self.state.clone()
    }

    pub fn fit_request(&self) -> Option<&FitRequest> {
        self.request.as_ref()
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn latest_report(&self) -> Option<&EvaluationReport> {
        self.latest_report.as_ref()
    }

    pub fn default_confidence_levels(&self) -> &[f64] {
        self.quantifier.default_confidence_levels()
    }

    /// Swap the data source, e.g. once new observations arrive
    pub fn set_data_source(&mut self, source: impl DataSource + 'static) {
        self.source = Box::new(source);
    }

    /// Serve a previously persisted state.
    ///
    /// The state's columns become the fit request used by later retrains.
    pub fn load_state(&mut self, state: TrainedState) -> Result<()> {
        if state.models.is_empty() || !state.ensemble.is_fitted() {
            return Err(ForecastError::NotFitted("trained state".to_string()));
        }
        self.request = Some(FitRequest {
            target_column: state.target_column.clone(),
            date_column: state.date_column.clone(),
            external_features: Some(state.external_columns.clone()),
            end_date: None,
        });
        info!(version = %state.version_tag(), "trained state loaded");
        self.state = Some(Arc::new(state));
        Ok(())
    }

    /// Train on the data source and swap in the result.
    ///
    /// Any failure leaves the previous state in place.
    pub fn fit(&mut self, request: FitRequest) -> Result<Arc<TrainedState>> {
        info!(
            target = %request.target_column,
            date = %request.date_column,
            "starting fit"
        );

        let data = self.source.load_training_data(
            &request.target_column,
            &request.date_column,
            request.end_date,
        )?;
        let requested = request
            .external_features
            .clone()
            .unwrap_or_else(|| self.source.external_features());
        let external_columns = present_signals(&data, &requested);

        let table = self
            .feature_builder
            .build_from_series(&data, &external_columns)?;
        let models = self.model_factory.train_models(&table)?;

        let mut ensemble = Ensemble::new(self.config.ensemble)?;
        ensemble.fit(&models, &table)?;
        let uncertainty = self.quantifier.fit(&models, &ensemble, &table);

        let state = Arc::new(TrainedState {
            models,
            ensemble,
            uncertainty,
            target_column: request.target_column.clone(),
            date_column: request.date_column.clone(),
            external_columns,
            feature_columns: table.feature_columns().to_vec(),
            trained_at: Utc::now(),
            training_rows: table.len(),
        });

        info!(
            version = %state.version_tag(),
            models = state.models.len(),
            rows = state.training_rows,
            "fit complete"
        );

        self.state = Some(Arc::clone(&state));
        self.request = Some(request);
        Ok(state)
    }

    fn current_state(&self, operation: &str) -> Result<Arc<TrainedState>> {
        self.state
            .clone()
            .ok_or_else(|| ForecastError::NotTrained(operation.to_string()))
    }

    /// Forecast `horizon` periods past the latest observation
    pub fn predict(
        &self,
        horizon: usize,
        confidence_levels: &[f64],
        include_explanation: bool,
    ) -> Result<ForecastResult> {
        let state = self.current_state("predicting")?;
        self.predict_with(&state, horizon, confidence_levels, include_explanation)
    }

    /// Forecast from an explicit state snapshot
    pub fn predict_with(
        &self,
        state: &TrainedState,
        horizon: usize,
        confidence_levels: &[f64],
        include_explanation: bool,
    ) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(ForecastError::config("Horizon must be positive"));
        }
        validate_confidence_levels(confidence_levels)?;

        let (latest, history, features) = self.prediction_features(state, horizon)?;
        let values = state.ensemble.predict(&features, horizon, &state.models)?;
        let intervals = state
            .uncertainty
            .calculate_intervals(&values, confidence_levels, horizon)?;

        let explanation = if include_explanation {
            Some(self.explainer.explain_forecast(
                &values,
                &history,
                &state.models,
                &state.ensemble,
                &state.external_columns,
                None,
            )?)
        } else {
            None
        };

        let last = latest
            .last_timestamp()
            .ok_or_else(|| ForecastError::data("Latest data is empty"))?;

        info!(horizon, version = %state.version_tag(), "forecast produced");

        Ok(ForecastResult {
            timestamps: future_timestamps(last, horizon, infer_step(latest.timestamps())),
            confidence_score: self.quantifier.confidence_score(&state.uncertainty),
            confidence_levels: confidence_levels.to_vec(),
            model_performance: self.latest_report.clone(),
            version: state.version_tag(),
            values,
            intervals,
            explanation,
        })
    }

    /// Latest data, its feature table and the replicated prediction rows
    fn prediction_features(
        &self,
        state: &TrainedState,
        horizon: usize,
    ) -> Result<(TimeSeriesData, FeatureTable, FeatureTable)> {
        let latest = self
            .source
            .load_latest_data(&state.target_column, &state.date_column)?;
        let history = self
            .feature_builder
            .build_from_series(&latest, &state.external_columns)?;
        let features = self
            .feature_builder
            .build_prediction_features(&history, horizon)?;
        Ok((latest, history, features))
    }

    /// Apply `scenario` to a baseline forecast of the current state
    pub fn run_scenario(&self, scenario: &Scenario, horizon: usize) -> Result<ScenarioResult> {
        let state = self.current_state("running scenarios")?;
        if horizon == 0 {
            return Err(ForecastError::config("Horizon must be positive"));
        }
        let features = match self.scenario_engine.settings().baseline {
            BaselineSource::LatestFeatures => Some(self.prediction_features(&state, horizon)?.2),
            BaselineSource::Placeholder => None,
        };
        self.scenario_engine.run_scenario(
            scenario,
            &state.models,
            &state.ensemble,
            horizon,
            features.as_ref(),
        )
    }

    /// Score the current state on held-out data and record the ensemble MAE.
    ///
    /// Uses `test_data` when given, else the source's test data. Without
    /// either, the chronological tail of the training features is scored.
    /// A test frame needs enough leading rows to build its lag features.
    pub fn evaluate_performance(&mut self, test_data: Option<&DataFrame>) -> Result<EvaluationReport> {
        let state = self.current_state("evaluating")?;

        let series = match test_data {
            Some(df) => Some(DataLoader::from_dataframe(
                df,
                &state.target_column,
                &state.date_column,
            )?),
            None => self
                .source
                .load_test_data(&state.target_column, &state.date_column)?,
        };

        let test = match series {
            Some(series) => self
                .feature_builder
                .build_from_series(&series, &state.external_columns)?,
            None => {
                let training = self.source.load_training_data(
                    &state.target_column,
                    &state.date_column,
                    self.request.as_ref().and_then(|r| r.end_date),
                )?;
                let table = self
                    .feature_builder
                    .build_from_series(&training, &state.external_columns)?;
                let (_, holdout) = train_test_split(&table, self.config.ensemble.validation_split)?;
                holdout
            }
        };

        let report = self.evaluator.evaluate(&state.models, &state.ensemble, &test)?;
        if let Some(drift) = self.monitor.record(report.ensemble.mae) {
            info!(drift, "ensemble MAE drift");
        }
        self.latest_report = Some(report.clone());
        Ok(report)
    }

    /// Conditions that currently call for a retrain
    pub fn should_retrain(&self) -> RetrainTriggers {
        RetrainTriggers {
            performance_drift: self.monitor.drift_exceeds(self.config.retrain_threshold),
            data_drift: self.source.detect_data_drift(),
            time_based: self
                .state
                .as_ref()
                .map_or(false, |s| is_stale(s.trained_at, Utc::now(), self.config.retrain_days)),
        }
    }

    /// Refit with the last request when a trigger fires.
    ///
    /// Returns `Ok(false)` when nothing called for it. An engine with a
    /// request but no state always refits. On failure the previous state
    /// stays in place and the error is returned.
    pub fn retrain(&mut self, reason: &str) -> Result<bool> {
        let request = self.request.clone().ok_or_else(|| {
            ForecastError::config("No fit request recorded; call fit before retrain")
        })?;
        info!(reason, "retrain requested");

        if self.is_trained() {
            let triggers = self.should_retrain();
            if !triggers.any() {
                info!("retraining not needed");
                return Ok(false);
            }
            info!(?triggers, "retrain triggered");
        }

        match self.fit(request) {
            Ok(_) => {
                self.monitor =
                    PerformanceMonitor::new(self.config.monitor_capacity, self.config.drift_window)?;
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "retraining failed, keeping previous state");
                Err(e)
            }
        }
    }
}

/// Requested external columns that exist in `data`
fn present_signals(data: &TimeSeriesData, requested: &[String]) -> Vec<String> {
    let mut present = Vec::new();
    for name in requested {
        if name.as_str() == data.target_column() || present.contains(name) {
            continue;
        }
        if data.signal(name).is_some() {
            present.push(name.clone());
        } else {
            warn!(column = %name, "external feature not found in data");
        }
    }
    present
}
