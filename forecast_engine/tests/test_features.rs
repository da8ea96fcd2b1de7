mod common;

use common::{sales_frame, sales_series};
use forecast_engine::config::FeatureConfig;
use forecast_engine::{FeatureBuilder, ForecastError};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn builder(lags: Vec<usize>, windows: Vec<usize>) -> FeatureBuilder {
    FeatureBuilder::new(FeatureConfig {
        lags,
        rolling_windows: windows,
        ..FeatureConfig::default()
    })
    .unwrap()
}

#[rstest]
#[case(vec![1, 2, 3, 7, 14, 30], vec![7, 14, 30], 120)]
#[case(vec![1], vec![7], 40)]
#[case(vec![1, 14], vec![3], 60)]
#[case(vec![45], vec![7, 14], 90)]
fn test_row_count_matches_longest_history(
    #[case] lags: Vec<usize>,
    #[case] windows: Vec<usize>,
    #[case] n: usize,
) {
    let builder = builder(lags.clone(), windows.clone());
    let table = builder.build_from_series(&sales_series(n), &[]).unwrap();

    let longest = lags.iter().chain(&windows).copied().max().unwrap();
    assert_eq!(table.len(), n - longest);
    for column in table.feature_columns() {
        assert!(table.column(column).unwrap().iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_column_order() {
    let builder = builder(vec![1, 7], vec![7]);
    let table = builder
        .build_from_series(&sales_series(60), &["temperature".to_string()])
        .unwrap();

    let expected: Vec<String> = [
        "lag_1",
        "lag_7",
        "rolling_mean_7",
        "rolling_std_7",
        "day_of_week",
        "month",
        "day_of_year",
        "is_weekend",
        "month_sin",
        "month_cos",
        "temperature",
        "temperature_lag_1",
        "temperature_lag_3",
        "temperature_lag_7",
        "temperature_rolling_7",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(table.feature_columns(), expected.as_slice());
}

#[test]
fn test_lag_values_follow_target() {
    let builder = builder(vec![1, 7], vec![7]);
    let series = sales_series(40);
    let table = builder.build_from_series(&series, &[]).unwrap();

    // first kept row is index 7 of the series
    let lag_1 = table.column("lag_1").unwrap();
    let lag_7 = table.column("lag_7").unwrap();
    assert_eq!(lag_1[0], series.target()[6]);
    assert_eq!(lag_7[0], series.target()[0]);
    assert_eq!(table.target()[0], series.target()[7]);
}

#[test]
fn test_without_seasonality() {
    let builder = FeatureBuilder::new(FeatureConfig {
        seasonality: false,
        ..FeatureConfig::default()
    })
    .unwrap();
    let table = builder.build_from_series(&sales_series(50), &[]).unwrap();
    assert!(table.column("day_of_week").is_some());
    assert!(table.column("is_weekend").is_none());
    assert!(table.column("month_sin").is_none());
}

#[test]
fn test_missing_external_column_is_skipped() {
    let builder = FeatureBuilder::new(FeatureConfig::default()).unwrap();
    let table = builder
        .build_from_series(&sales_series(50), &["footfall".to_string()])
        .unwrap();
    assert!(table.feature_columns().iter().all(|c| !c.starts_with("footfall")));
}

#[test]
fn test_build_from_dataframe() {
    let builder = FeatureBuilder::new(FeatureConfig::default()).unwrap();
    let table = builder
        .build_features(&sales_frame(100), "sales", "date", &["temperature".to_string()])
        .unwrap();
    assert_eq!(table.len(), 70);
    assert_eq!(table.target_column(), "sales");

    let missing = builder.build_features(&sales_frame(100), "revenue", "date", &[]);
    assert!(matches!(missing, Err(ForecastError::ConfigurationError(_))));
}

#[test]
fn test_prediction_features_replicate_last_row() {
    let builder = FeatureBuilder::new(FeatureConfig::default()).unwrap();
    let table = builder.build_from_series(&sales_series(80), &[]).unwrap();
    let future = builder.build_prediction_features(&table, 5).unwrap();

    assert_eq!(future.len(), 5);
    assert_eq!(future.feature_columns(), table.feature_columns());
    let last = table.latest_value("lag_1").unwrap();
    assert_eq!(future.column("lag_1").unwrap(), &[last; 5]);
    assert!(builder.build_prediction_features(&table, 0).is_err());
}

#[test]
fn test_series_too_short() {
    let builder = FeatureBuilder::new(FeatureConfig::default()).unwrap();
    let result = builder.build_from_series(&sales_series(30), &[]);
    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[test]
fn test_invalid_config_rejected() {
    assert!(FeatureBuilder::new(FeatureConfig {
        lags: vec![],
        ..FeatureConfig::default()
    })
    .is_err());
    assert!(FeatureBuilder::new(FeatureConfig {
        rolling_windows: vec![1],
        ..FeatureConfig::default()
    })
    .is_err());
}
