//! Utility functions for the forecast_engine crate

use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use chrono::{DateTime, Duration, Utc};

/// Split a feature table chronologically, keeping the first
/// `train_fraction` of rows for training
pub fn train_test_split(
    table: &FeatureTable,
    train_fraction: f64,
) -> Result<(FeatureTable, FeatureTable)> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(ForecastError::config(format!(
            "Train fraction must lie in (0, 1), got {}",
            train_fraction
        )));
    }

    let train_size = (table.len() as f64 * train_fraction).floor() as usize;
    Ok((
        table.slice(0, train_size),
        table.slice(train_size, table.len()),
    ))
}

/// Interval between the last two timestamps, one day when there are fewer than two
pub fn infer_step(timestamps: &[DateTime<Utc>]) -> Duration {
    match timestamps {
        [.., previous, last] if last > previous => *last - *previous,
        _ => Duration::days(1),
    }
}

/// Create future timestamps for forecasting
pub fn future_timestamps(
    last_timestamp: DateTime<Utc>,
    horizon: usize,
    step: Duration,
) -> Vec<DateTime<Utc>> {
    (1..=horizon)
        .map(|i| last_timestamp + step * i as i32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_step_and_future_timestamps() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let hourly = [start, start + Duration::hours(1)];
        assert_eq!(infer_step(&hourly), Duration::hours(1));
        assert_eq!(infer_step(&hourly[..1]), Duration::days(1));

        let future = future_timestamps(start, 3, Duration::days(1));
        assert_eq!(future.len(), 3);
        assert_eq!(future[2], start + Duration::days(3));
    }

    #[test]
    fn test_split_is_chronological() {
        let timestamps: Vec<_> = (0..10)
            .map(|i| Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i))
            .collect();
        let target: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let table = FeatureTable::from_columns(timestamps, "y", target, Vec::new()).unwrap();

        let (train, test) = train_test_split(&table, 0.8).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.target(), &[8.0, 9.0]);
        assert!(train_test_split(&table, 1.0).is_err());
    }
}
