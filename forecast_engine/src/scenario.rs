//! What-if perturbation of ensemble forecasts

use crate::config::ScenarioSettings;
use crate::ensemble::Ensemble;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::models::ModelSet;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Feature rows the scenario baseline is predicted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// The prediction features `predict` would use
    #[default]
    LatestFeatures,
    /// A constant table with a handful of nominal columns
    Placeholder,
}

/// A named set of forecast modifications.
///
/// Each present field is one rule. Rules apply in a fixed order: price,
/// demand, seasonal boost, economic impact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    /// Relative price change, e.g. 0.1 for +10%
    pub price_change: Option<f64>,
    /// Demand response per unit of relative price change
    pub price_elasticity: Option<f64>,
    pub demand_multiplier: Option<f64>,
    /// Peak relative boost, decaying over the horizon
    pub seasonal_boost: Option<f64>,
    pub economic_impact: Option<f64>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_price_change(mut self, change: f64, elasticity: Option<f64>) -> Self {
        self.price_change = Some(change);
        self.price_elasticity = elasticity;
        self
    }

    pub fn with_demand_multiplier(mut self, multiplier: f64) -> Self {
        self.demand_multiplier = Some(multiplier);
        self
    }

    pub fn with_seasonal_boost(mut self, boost: f64) -> Self {
        self.seasonal_boost = Some(boost);
        self
    }

    pub fn with_economic_impact(mut self, impact: f64) -> Self {
        self.economic_impact = Some(impact);
        self
    }

    fn validate(&self) -> Result<()> {
        let values = [
            self.price_change,
            self.price_elasticity,
            self.demand_multiplier,
            self.seasonal_boost,
            self.economic_impact,
        ];
        if values.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ForecastError::config(format!(
                "Scenario '{}' has a non-finite parameter",
                self.name
            )));
        }
        Ok(())
    }
}

/// Difference between a scenario forecast and its baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    /// Scenario minus baseline, per period
    pub absolute_difference: Vec<f64>,
    /// Difference as a percentage of the baseline; zero where the baseline is zero
    pub percentage_difference: Vec<f64>,
    pub total_absolute: f64,
    pub total_percentage: f64,
    pub average_absolute: f64,
    pub average_percentage: f64,
}

/// Outcome of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub baseline: Vec<f64>,
    pub forecast: Vec<f64>,
    pub impact: ImpactAnalysis,
}

/// Apply the scenario's rules to `baseline`
pub fn apply_modifications(baseline: &[f64], scenario: &Scenario, default_elasticity: f64) -> Vec<f64> {
    let mut forecast = baseline.to_vec();
    let horizon = forecast.len();

    if let Some(change) = scenario.price_change {
        let elasticity = scenario.price_elasticity.unwrap_or(default_elasticity);
        let factor = 1.0 + elasticity * change;
        forecast.iter_mut().for_each(|v| *v *= factor);
    }

    if let Some(multiplier) = scenario.demand_multiplier {
        forecast.iter_mut().for_each(|v| *v *= multiplier);
    }

    if let Some(boost) = scenario.seasonal_boost {
        for (i, v) in forecast.iter_mut().enumerate() {
            let decay = (1.0 - (i as f64 / horizon as f64) * 0.5).max(0.1);
            *v *= 1.0 + boost * decay;
        }
    }

    if let Some(impact) = scenario.economic_impact {
        let factor = 1.0 + impact;
        forecast.iter_mut().for_each(|v| *v *= factor);
    }

    forecast
}

/// Per-period and aggregate differences of `forecast` against `baseline`
pub fn impact_analysis(baseline: &[f64], forecast: &[f64]) -> Result<ImpactAnalysis> {
    if baseline.len() != forecast.len() || baseline.is_empty() {
        return Err(ForecastError::data(format!(
            "Baseline ({}) and scenario ({}) must have the same non-zero length",
            baseline.len(),
            forecast.len()
        )));
    }

    let absolute_difference: Vec<f64> = forecast
        .iter()
        .zip(baseline)
        .map(|(s, b)| s - b)
        .collect();
    let percentage_difference: Vec<f64> = absolute_difference
        .iter()
        .zip(baseline)
        .map(|(d, &b)| if b == 0.0 { 0.0 } else { d / b * 100.0 })
        .collect();

    let n = baseline.len() as f64;
    let total_absolute: f64 = absolute_difference.iter().sum();
    let average_percentage = percentage_difference.iter().sum::<f64>() / n;

    Ok(ImpactAnalysis {
        total_absolute,
        total_percentage: average_percentage,
        average_absolute: total_absolute / n,
        average_percentage,
        absolute_difference,
        percentage_difference,
    })
}

/// Constant feature rows used when the baseline is not taken from live data
pub fn placeholder_features(horizon: usize, target_column: &str) -> Result<FeatureTable> {
    if horizon == 0 {
        return Err(ForecastError::config("Horizon must be positive"));
    }
    let epoch = Utc
        .timestamp_opt(0, 0)
        .single()
        .ok_or_else(|| ForecastError::data("Invalid placeholder timestamp"))?;

    let columns = [
        ("lag_1", 100.0),
        ("lag_7", 100.0),
        ("rolling_mean_7", 100.0),
        ("day_of_week", 1.0),
        ("month", 1.0),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), vec![value; horizon]))
    .collect();

    FeatureTable::from_columns(vec![epoch; horizon], target_column, vec![0.0; horizon], columns)
}

/// Runs scenarios against a trained ensemble without retraining it
#[derive(Debug, Clone)]
pub struct ScenarioEngine {
    settings: ScenarioSettings,
}

impl ScenarioEngine {
    pub fn new(settings: ScenarioSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScenarioSettings {
        &self.settings
    }

    /// Predict a baseline, apply the scenario and measure the impact.
    ///
    /// `latest` holds the live prediction features; it is ignored when the
    /// baseline source is `Placeholder`. If no model can predict, the error
    /// is returned rather than a made-up baseline.
    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        models: &ModelSet,
        ensemble: &Ensemble,
        horizon: usize,
        latest: Option<&FeatureTable>,
    ) -> Result<ScenarioResult> {
        scenario.validate()?;
        if horizon == 0 {
            return Err(ForecastError::config("Horizon must be positive"));
        }

        let placeholder;
        let features = match (self.settings.baseline, latest) {
            (BaselineSource::LatestFeatures, Some(features)) => features,
            (BaselineSource::LatestFeatures, None) => {
                return Err(ForecastError::config(
                    "Latest features are required for a live scenario baseline",
                ))
            }
            (BaselineSource::Placeholder, _) => {
                placeholder = placeholder_features(horizon, "target")?;
                &placeholder
            }
        };

        let baseline = ensemble.predict(features, horizon, models)?;
        let forecast =
            apply_modifications(&baseline, scenario, self.settings.default_price_elasticity);
        let impact = impact_analysis(&baseline, &forecast)?;

        info!(
            scenario = %scenario.name,
            average_percentage = impact.average_percentage,
            "scenario evaluated"
        );

        Ok(ScenarioResult {
            scenario: scenario.clone(),
            baseline,
            forecast,
            impact,
        })
    }
}
