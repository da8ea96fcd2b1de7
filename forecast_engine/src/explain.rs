//! Human-readable explanations of a forecast

use crate::config::ExplainerConfig;
use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::features::FeatureTable;
use crate::models::{ForecastModel, ModelSet};
use forecast_math::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const KEY_FEATURES: [&str; 5] = ["lag_1", "lag_7", "rolling_mean_7", "day_of_week", "month"];

/// Current value of one feature behind the forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDriver {
    pub feature: String,
    pub current_value: f64,
    pub description: String,
    pub is_external: bool,
}

/// How a forecast moved against a previous one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    pub change: Vec<f64>,
    /// Change in percent of the previous forecast; zero where it was zero
    pub change_percentage: Vec<f64>,
    pub summary: Option<String>,
}

/// Explanation attached to a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Mean importance per feature across models that report it
    pub aggregated_importance: BTreeMap<String, f64>,
    /// Highest-importance features, most important first
    pub top_drivers: Vec<(String, f64)>,
    pub feature_explanations: BTreeMap<String, String>,
    pub forecast_drivers: Vec<ForecastDriver>,
    pub business_insights: Vec<String>,
    pub model_weights: BTreeMap<String, f64>,
    pub change_analysis: Option<ChangeAnalysis>,
}

/// Builds explanations from model importances and the latest features
#[derive(Debug, Clone)]
pub struct ForecastExplainer {
    config: ExplainerConfig,
}

impl ForecastExplainer {
    pub fn new(config: ExplainerConfig) -> Self {
        Self { config }
    }

    pub fn explain_forecast(
        &self,
        forecast: &[f64],
        features: &FeatureTable,
        models: &ModelSet,
        ensemble: &Ensemble,
        external_columns: &[String],
        previous_forecast: Option<&[f64]>,
    ) -> Result<Explanation> {
        let aggregated_importance = aggregate_importance(models);
        let mut top_drivers: Vec<(String, f64)> = aggregated_importance
            .iter()
            .map(|(name, score)| (name.clone(), *score))
            .collect();
        top_drivers.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_drivers.truncate(self.config.top_n);

        let feature_explanations = top_drivers
            .iter()
            .map(|(name, score)| {
                let level = if *score > 0.2 {
                    "strongly influences"
                } else if *score > 0.1 {
                    "moderately influences"
                } else {
                    "slightly influences"
                };
                (
                    name.clone(),
                    format!("{} {} the forecast", describe_feature(name), level),
                )
            })
            .collect();

        let mut business_insights = business_insights(forecast)?;
        business_insights.push(weight_summary(ensemble));

        let change_analysis = previous_forecast
            .map(|previous| change_analysis(forecast, previous))
            .transpose()?;

        debug!(drivers = top_drivers.len(), "forecast explained");

        Ok(Explanation {
            aggregated_importance,
            top_drivers,
            feature_explanations,
            forecast_drivers: forecast_drivers(features, external_columns),
            business_insights,
            model_weights: ensemble
                .weights()
                .iter()
                .map(|(kind, w)| (kind.name().to_string(), *w))
                .collect(),
            change_analysis,
        })
    }
}

/// Mean importance per feature over models that report importances;
/// a feature a model does not report counts as zero for it
pub fn aggregate_importance(models: &ModelSet) -> BTreeMap<String, f64> {
    let reports: Vec<BTreeMap<String, f64>> =
        models.iter().filter_map(|m| m.feature_importance()).collect();
    if reports.is_empty() {
        return BTreeMap::new();
    }

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for report in &reports {
        for (feature, score) in report {
            *totals.entry(feature.clone()).or_insert(0.0) += score;
        }
    }

    let n = reports.len() as f64;
    totals.into_iter().map(|(k, v)| (k, v / n)).collect()
}

fn forecast_drivers(features: &FeatureTable, external_columns: &[String]) -> Vec<ForecastDriver> {
    let external_derived = |column: &str| {
        external_columns
            .iter()
            .any(|ext| column == ext.as_str() || column.starts_with(&format!("{}_", ext)))
    };

    features
        .feature_columns()
        .iter()
        .filter(|c| KEY_FEATURES.contains(&c.as_str()) || external_derived(c.as_str()))
        .filter_map(|c| {
            features.latest_value(c).map(|value| ForecastDriver {
                feature: c.clone(),
                current_value: value,
                description: describe_value(c, value),
                is_external: external_derived(c.as_str()),
            })
        })
        .collect()
}

fn business_insights(forecast: &[f64]) -> Result<Vec<String>> {
    let mut insights = Vec::new();
    if forecast.len() > 1 {
        let trend = stats::mean_difference(forecast)?;
        insights.push(
            if trend > 0.0 {
                "Forecast shows positive growth trend"
            } else if trend < 0.0 {
                "Forecast indicates declining trend"
            } else {
                "Forecast shows stable pattern"
            }
            .to_string(),
        );

        let cv = stats::coefficient_of_variation(forecast)?;
        insights.push(
            if cv > 0.2 {
                "High volatility detected - monitor closely"
            } else if cv > 0.1 {
                "Moderate volatility in forecast"
            } else {
                "Stable forecast with low volatility"
            }
            .to_string(),
        );
    }
    Ok(insights)
}

fn weight_summary(ensemble: &Ensemble) -> String {
    let parts: Vec<String> = ensemble
        .weights()
        .iter()
        .map(|(kind, w)| format!("{} {:.0}%", kind, w * 100.0))
        .collect();
    format!("Ensemble weights: {}", parts.join(", "))
}

/// Period-by-period change of `current` against `previous`
pub fn change_analysis(current: &[f64], previous: &[f64]) -> Result<ChangeAnalysis> {
    let impact = crate::scenario::impact_analysis(previous, current)?;
    let mean_pct = impact.average_percentage;

    let summary = (mean_pct.abs() > 5.0).then(|| {
        let direction = if mean_pct > 0.0 { "increased" } else { "decreased" };
        format!(
            "Forecast {} by {:.1}% from previous period",
            direction,
            mean_pct.abs()
        )
    });

    Ok(ChangeAnalysis {
        change: impact.absolute_difference,
        change_percentage: impact.percentage_difference,
        summary,
    })
}

fn describe_feature(name: &str) -> String {
    let description = match name {
        "lag_1" => "Previous period value",
        "lag_7" => "Same day last week",
        "lag_30" => "Same day last month",
        "rolling_mean_7" => "7-day average trend",
        "rolling_mean_14" => "14-day average trend",
        "day_of_week" => "Day of week pattern",
        "month" => "Monthly seasonality",
        "is_weekend" => "Weekend effect",
        other => other,
    };
    description.to_string()
}

fn describe_value(name: &str, value: f64) -> String {
    match name {
        "lag_1" => format!("Previous period value was {:.1}", value),
        "lag_7" => format!("Same day last week was {:.1}", value),
        "rolling_mean_7" => format!("7-day average is {:.1}", value),
        "day_of_week" => format!("Day of week effect: {}", value as i64),
        "month" => format!("Monthly pattern: {}", value as i64),
        other => format!("Current {}: {:.2}", other, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_change_summary_threshold() {
        let up = change_analysis(&[110.0, 110.0], &[100.0, 100.0]).unwrap();
        assert_eq!(
            up.summary.as_deref(),
            Some("Forecast increased by 10.0% from previous period")
        );

        let flat = change_analysis(&[101.0], &[100.0]).unwrap();
        assert_eq!(flat.summary, None);
    }

    #[test]
    fn test_insights_for_rising_forecast() {
        let insights = business_insights(&[100.0, 101.0, 102.0]).unwrap();
        assert_eq!(
            insights,
            vec![
                "Forecast shows positive growth trend".to_string(),
                "Stable forecast with low volatility".to_string(),
            ]
        );
    }
}
