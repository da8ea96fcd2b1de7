//! Linear trend plus weekly seasonal offsets

use crate::config::TrendSeasonalConfig;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::models::{training_error, ForecastModel, ModelKind};
use forecast_math::LinearTrend;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedTrendSeasonal {
    trend: LinearTrend,
    last_value: f64,
    seasonal: Vec<f64>,
    /// Seasonal position of the first forecast step
    phase: usize,
}

/// Extrapolates the last observation along a fitted trend and adds a
/// seasonal offset per step.
///
/// Only the horizon (row count) of the prediction features is read.
/// Forecasts are floored at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeasonalModel {
    config: TrendSeasonalConfig,
    feature_columns: Vec<String>,
    fitted: Option<FittedTrendSeasonal>,
}

impl TrendSeasonalModel {
    pub fn new(config: TrendSeasonalConfig) -> Self {
        Self {
            config,
            feature_columns: Vec::new(),
            fitted: None,
        }
    }

    /// Fitted trend slope per period
    pub fn slope(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.trend.slope())
    }

    /// Seasonal offsets by position, zeros when history was too short
    pub fn seasonal_offsets(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.seasonal.as_slice())
    }

    /// Offsets over the detrended tail of `values`.
    ///
    /// Bucket `k` holds the mean residual at positions `k, k + season, ...`
    /// of the tail, minus the tail's mean residual.
    fn seasonal_offsets_for(&self, values: &[f64], trend: &LinearTrend) -> (Vec<f64>, usize) {
        let season = self.config.season_length;
        if values.len() < self.config.min_seasonal_observations {
            return (vec![0.0; season], 0);
        }

        let window = self.config.seasonal_window.min(values.len());
        let start = values.len() - window;
        let residuals: Vec<f64> = values[start..]
            .iter()
            .enumerate()
            .map(|(k, &v)| v - trend.value_at((start + k) as f64))
            .collect();
        let overall = residuals.iter().sum::<f64>() / residuals.len() as f64;

        let offsets = (0..season)
            .map(|bucket| {
                let members: Vec<f64> = residuals
                    .iter()
                    .skip(bucket)
                    .step_by(season)
                    .copied()
                    .collect();
                if members.is_empty() {
                    0.0
                } else {
                    members.iter().sum::<f64>() / members.len() as f64 - overall
                }
            })
            .collect();

        (offsets, window % season)
    }
}

impl ForecastModel for TrendSeasonalModel {
    fn kind(&self) -> ModelKind {
        ModelKind::TrendSeasonal
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn fit(&mut self, table: &FeatureTable) -> Result<()> {
        let values = table.target();
        let last_value = *values
            .last()
            .ok_or_else(|| training_error(self.kind(), "empty training table"))?;

        let trend = if values.len() < 2 {
            LinearTrend::flat(last_value)
        } else {
            LinearTrend::fit(values).map_err(|e| training_error(self.kind(), e))?
        };
        let (seasonal, phase) = self.seasonal_offsets_for(values, &trend);

        self.feature_columns = table.feature_columns().to_vec();
        self.fitted = Some(FittedTrendSeasonal {
            trend,
            last_value,
            seasonal,
            phase,
        });
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ForecastError::NotFitted(self.name().to_string()))?;
        let season = fitted.seasonal.len();

        Ok((0..features.len())
            .map(|step| {
                let offset = fitted.seasonal[(fitted.phase + step) % season];
                let value =
                    fitted.last_value + fitted.trend.slope() * (step + 1) as f64 + offset;
                value.max(0.0)
            })
            .collect())
    }

    fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    fn fresh(&self) -> Self {
        Self::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn table(values: Vec<f64>) -> FeatureTable {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..values.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        FeatureTable::from_columns(timestamps, "sales", values, Vec::new()).unwrap()
    }

    #[test]
    fn test_weekly_pattern_continues_phase() {
        // Flat level with a +7 bump every seventh day, starting at index 0.
        let values: Vec<f64> = (0..28).map(|i| if i % 7 == 0 { 57.0 } else { 50.0 }).collect();
        let mut model = TrendSeasonalModel::new(TrendSeasonalConfig::default());
        model.fit(&table(values)).unwrap();

        let forecast = model.predict(&table(vec![0.0; 7])).unwrap();
        // Index 28 is the next bump day and is forecast first.
        let peak = forecast
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        assert_abs_diff_eq!(forecast[0], peak, epsilon = 1e-9);
        assert!(forecast[1] < forecast[0]);
    }

    #[test]
    fn test_short_history_has_no_seasonality() {
        let mut model = TrendSeasonalModel::new(TrendSeasonalConfig::default());
        model.fit(&table(vec![5.0; 10])).unwrap();
        assert!(model.seasonal_offsets().unwrap().iter().all(|&o| o == 0.0));

        let mut single = TrendSeasonalModel::new(TrendSeasonalConfig::default());
        single.fit(&table(vec![4.0])).unwrap();
        assert_eq!(single.predict(&table(vec![0.0; 3])).unwrap(), vec![4.0; 3]);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = TrendSeasonalModel::new(TrendSeasonalConfig::default());
        assert!(matches!(
            model.predict(&table(vec![1.0])),
            Err(ForecastError::NotFitted(_))
        ));
    }
}
