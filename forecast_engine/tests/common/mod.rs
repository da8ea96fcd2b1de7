#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use forecast_engine::config::{EngineConfig, TreeEnsembleConfig};
use forecast_engine::{FeatureTable, TimeSeriesData};
use polars::prelude::{DataFrame, NamedFrom, Series};

const WEEKLY: [f64; 7] = [0.0, -5.0, -3.0, 0.0, 4.0, 12.0, 10.0];

/// Midnight UTC, `offset` days after 2024-01-01
pub fn day(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(offset)
}

/// Trending daily sales with a weekly pattern and a temperature signal
pub fn sales_values(days: usize) -> (Vec<f64>, Vec<f64>) {
    (0..days)
        .map(|d| {
            let temp = 15.0 + 10.0 * (d as f64 / 20.0).sin();
            let noise = 2.0 * (d as f64 * 1.7).sin();
            (100.0 + 0.5 * d as f64 + WEEKLY[d % 7] + 0.8 * temp + noise, temp)
        })
        .unzip()
}

pub fn sales_frame(days: usize) -> DataFrame {
    let (sales, temperature) = sales_values(days);
    let dates: Vec<String> = (0..days)
        .map(|d| day(d as i64).format("%Y-%m-%d").to_string())
        .collect();

    DataFrame::new(vec![
        Series::new("date", dates),
        Series::new("sales", sales),
        Series::new("temperature", temperature),
    ])
    .unwrap()
}

pub fn sales_series(days: usize) -> TimeSeriesData {
    let (sales, temperature) = sales_values(days);
    let timestamps = (0..days).map(|d| day(d as i64)).collect();
    TimeSeriesData::new(timestamps, "sales", sales)
        .unwrap()
        .with_signal("temperature", temperature.into_iter().map(Some).collect())
        .unwrap()
}

/// A table with only a target column, for models that read the target alone
pub fn target_table(values: Vec<f64>) -> FeatureTable {
    let timestamps = (0..values.len()).map(|d| day(d as i64)).collect();
    FeatureTable::from_columns(timestamps, "sales", values, Vec::new()).unwrap()
}

/// Default settings with a smaller forest to keep tests quick
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.models.tree_ensemble = TreeEnsembleConfig {
        n_trees: 20,
        ..TreeEnsembleConfig::default()
    };
    config
}
