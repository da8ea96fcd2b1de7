//! Supervised feature tables built from a target series

use crate::config::FeatureConfig;
use crate::data::{DataLoader, TimeSeriesData};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, Utc};
use forecast_math::window::{complete, lag, rolling_mean, rolling_std};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info, warn};

/// Column-major table of feature values keyed by timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    timestamps: Vec<DateTime<Utc>>,
    target_column: String,
    target: Vec<f64>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl FeatureTable {
    /// Build a table from named feature columns
    pub fn from_columns(
        timestamps: Vec<DateTime<Utc>>,
        target_column: impl Into<String>,
        target: Vec<f64>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let target_column = target_column.into();
        let rows = target.len();

        if timestamps.len() != rows {
            return Err(ForecastError::data(format!(
                "Feature table has {} timestamps for {} rows",
                timestamps.len(),
                rows
            )));
        }

        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            if column.len() != rows {
                return Err(ForecastError::data(format!(
                    "Feature column '{}' has {} values, table has {} rows",
                    name,
                    column.len(),
                    rows
                )));
            }
            if name == target_column || names.contains(&name) {
                return Err(ForecastError::data(format!(
                    "Duplicate feature column '{}'",
                    name
                )));
            }
            names.push(name);
            values.push(column);
        }

        Ok(Self {
            timestamps,
            target_column,
            target,
            columns: names,
            values,
        })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Feature column names in table order
    pub fn feature_columns(&self) -> &[String] {
        &self.columns
    }

    /// Values of one feature column
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }

    /// Value of a feature column in the most recent row
    pub fn latest_value(&self, name: &str) -> Option<f64> {
        self.column(name).and_then(|c| c.last().copied())
    }

    /// Rows `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);

        Self {
            timestamps: self.timestamps[start..end].to_vec(),
            target_column: self.target_column.clone(),
            target: self.target[start..end].to_vec(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|column| column[start..end].to_vec())
                .collect(),
        }
    }

    /// Row-major matrix of exactly `columns`, in that order.
    ///
    /// Fails with `FeatureMismatch` naming every absent column.
    pub fn matrix(&self, columns: &[String], model: &str) -> Result<Vec<Vec<f64>>> {
        let missing: Vec<String> = columns
            .iter()
            .filter(|c| self.column(c).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::FeatureMismatch {
                model: model.to_string(),
                missing,
            });
        }

        let selected: Vec<&[f64]> = columns.iter().filter_map(|c| self.column(c)).collect();
        Ok((0..self.len())
            .map(|row| selected.iter().map(|column| column[row]).collect())
            .collect())
    }

    /// The last row repeated `horizon` times
    pub fn replicate_last(&self, horizon: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(ForecastError::config("Horizon must be positive"));
        }
        let last = self
            .len()
            .checked_sub(1)
            .ok_or_else(|| ForecastError::data("Cannot build prediction features from an empty table"))?;

        Ok(Self {
            timestamps: vec![self.timestamps[last]; horizon],
            target_column: self.target_column.clone(),
            target: vec![self.target[last]; horizon],
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|column| vec![column[last]; horizon])
                .collect(),
        })
    }
}

/// Builds lag, rolling, calendar and external-signal features
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    /// Create a builder, rejecting empty or zero-length lag and window settings
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Build features straight from a DataFrame
    pub fn build_features(
        &self,
        df: &DataFrame,
        target_column: &str,
        date_column: &str,
        external_columns: &[String],
    ) -> Result<FeatureTable> {
        let data = DataLoader::from_dataframe(df, target_column, date_column)?;
        self.build_from_series(&data, external_columns)
    }

    /// Build features from a parsed series.
    ///
    /// Rows whose lag or rolling columns lack history are dropped, so the
    /// table starts `required_history()` rows into the series.
    pub fn build_from_series(
        &self,
        data: &TimeSeriesData,
        external_columns: &[String],
    ) -> Result<FeatureTable> {
        let target = complete(data.target());
        let mut columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();

        for &period in &self.config.lags {
            columns.push((format!("lag_{}", period), lag(&target, period)));
        }

        for &window in &self.config.rolling_windows {
            columns.push((
                format!("rolling_mean_{}", window),
                lag(&rolling_mean(&target, window)?, 1),
            ));
            columns.push((
                format!("rolling_std_{}", window),
                lag(&rolling_std(&target, window)?, 1),
            ));
        }

        columns.extend(self.calendar_features(data.timestamps()));

        for name in external_columns {
            if columns.iter().any(|(c, _)| c == name) || name == data.target_column() {
                debug!(column = %name, "external column already consumed");
                continue;
            }
            let Some(signal) = data.signal(name) else {
                warn!(column = %name, "external column not present in data, skipping");
                continue;
            };

            columns.push((name.clone(), signal.to_vec()));
            for &period in &self.config.external_lags {
                columns.push((format!("{}_lag_{}", name, period), lag(signal, period)));
            }
            let window = self.config.external_rolling_window;
            columns.push((
                format!("{}_rolling_{}", name, window),
                rolling_mean(signal, window)?,
            ));
        }

        let keep: Vec<usize> = (0..data.len())
            .filter(|&row| columns.iter().all(|(_, values)| values[row].is_some()))
            .collect();

        if keep.is_empty() {
            return Err(ForecastError::data(format!(
                "Series of {} rows is too short for features needing {} rows of history",
                data.len(),
                self.config.required_history()
            )));
        }

        let table = FeatureTable::from_columns(
            keep.iter().map(|&row| data.timestamps()[row]).collect(),
            data.target_column(),
            keep.iter().map(|&row| data.target()[row]).collect(),
            columns
                .into_iter()
                .map(|(name, values)| {
                    let dense = keep.iter().filter_map(|&row| values[row]).collect();
                    (name, dense)
                })
                .collect(),
        )?;

        info!(
            rows = table.len(),
            columns = table.feature_columns().len(),
            dropped = data.len() - table.len(),
            "built feature table"
        );
        Ok(table)
    }

    /// Features for `horizon` future periods.
    ///
    /// The most recent row is replicated rather than rolled forward with
    /// predicted values, so lag columns stay fixed across the horizon.
    pub fn build_prediction_features(
        &self,
        table: &FeatureTable,
        horizon: usize,
    ) -> Result<FeatureTable> {
        table.replicate_last(horizon)
    }

    fn calendar_features(&self, timestamps: &[DateTime<Utc>]) -> Vec<(String, Vec<Option<f64>>)> {
        let extract = |f: fn(&DateTime<Utc>) -> f64| -> Vec<Option<f64>> {
            timestamps.iter().map(|ts| Some(f(ts))).collect()
        };

        let mut columns = vec![
            (
                "day_of_week".to_string(),
                extract(|ts| ts.weekday().num_days_from_monday() as f64),
            ),
            ("month".to_string(), extract(|ts| ts.month() as f64)),
            ("day_of_year".to_string(), extract(|ts| ts.ordinal() as f64)),
        ];

        if self.config.seasonality {
            columns.push((
                "is_weekend".to_string(),
                extract(|ts| {
                    if ts.weekday().num_days_from_monday() >= 5 {
                        1.0
                    } else {
                        0.0
                    }
                }),
            ));
            columns.push((
                "month_sin".to_string(),
                extract(|ts| (2.0 * PI * ts.month() as f64 / 12.0).sin()),
            ));
            columns.push((
                "month_cos".to_string(),
                extract(|ts| (2.0 * PI * ts.month() as f64 / 12.0).cos()),
            ));
        }

        columns
    }
}
