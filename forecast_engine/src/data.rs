//! Time series data handling for forecasting

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use polars::prelude::{DataFrame, DataType, FillNullStrategy, NamedFrom, Series, TimeUnit};
use tracing::debug;

/// A target series with its timestamps and optional signal columns.
///
/// Rows are sorted by strictly increasing timestamp and the target has no
/// gaps. Signal columns keep their gaps as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesData {
    timestamps: Vec<DateTime<Utc>>,
    target_column: String,
    target: Vec<f64>,
    signals: Vec<(String, Vec<Option<f64>>)>,
}

/// Data loader for time series data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Create time series data from an existing DataFrame
    pub fn from_dataframe(
        df: &DataFrame,
        target_column: &str,
        date_column: &str,
    ) -> Result<TimeSeriesData> {
        let column_names = df.get_column_names();
        for required in [target_column, date_column] {
            if !column_names.contains(&required) {
                return Err(ForecastError::config(format!(
                    "Column '{}' not found in data",
                    required
                )));
            }
        }

        let timestamps = Self::parse_timestamps(df.column(date_column)?)?;
        let target = Self::parse_target(df.column(target_column)?)?;

        let mut signals = Vec::new();
        for series in df.get_columns() {
            let name = series.name();
            if name == target_column || name == date_column {
                continue;
            }
            if !series.dtype().is_numeric() {
                debug!(column = name, dtype = %series.dtype(), "skipping non-numeric column");
                continue;
            }
            signals.push((name.to_string(), Self::numeric_values(series)?));
        }

        TimeSeriesData::from_parts(timestamps, target_column.to_string(), target, signals)
    }

    /// Find the date column of a DataFrame by name or by temporal type
    pub fn detect_date_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower_name = name.to_lowercase();
            if lower_name.contains("date")
                || lower_name.contains("time")
                || lower_name.contains("timestamp")
            {
                return Ok(name.to_string());
            }
        }

        df.get_columns()
            .iter()
            .find(|s| s.dtype().is_temporal())
            .map(|s| s.name().to_string())
            .ok_or_else(|| ForecastError::data("No date column found in data"))
    }

    fn parse_timestamps(series: &Series) -> Result<Vec<DateTime<Utc>>> {
        let parsed: Vec<Option<DateTime<Utc>>> = match series.dtype() {
            DataType::Datetime(unit, _) => {
                let per_second = match unit {
                    TimeUnit::Nanoseconds => 1_000_000_000,
                    TimeUnit::Microseconds => 1_000_000,
                    TimeUnit::Milliseconds => 1_000,
                };
                series
                    .cast(&DataType::Int64)?
                    .i64()?
                    .into_iter()
                    .map(|v| v.and_then(|v| from_epoch(v, per_second)))
                    .collect()
            }
            DataType::Date => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                    .ok_or_else(|| ForecastError::data("Invalid epoch date"))?;
                series
                    .cast(&DataType::Int32)?
                    .i32()?
                    .into_iter()
                    .map(|days| {
                        days.and_then(|d| (epoch + Duration::days(d as i64)).and_hms_opt(0, 0, 0))
                            .map(|naive| Utc.from_utc_datetime(&naive))
                    })
                    .collect()
            }
            DataType::Utf8 => series
                .utf8()?
                .into_iter()
                .map(|s| s.and_then(parse_date_str))
                .collect(),
            DataType::Int64 => series
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|ms| from_epoch(ms, 1_000)))
                .collect(),
            other => {
                return Err(ForecastError::data(format!(
                    "Date column '{}' has unsupported type {}",
                    series.name(),
                    other
                )))
            }
        };

        parsed
            .into_iter()
            .enumerate()
            .map(|(row, ts)| {
                ts.ok_or_else(|| {
                    ForecastError::data(format!(
                        "Missing or unparseable date in column '{}' at row {}",
                        series.name(),
                        row
                    ))
                })
            })
            .collect()
    }

    /// Target values with NaN and other non-finite entries read as gaps.
    /// Gaps are filled by `TimeSeriesData` once rows are in time order.
    fn parse_target(series: &Series) -> Result<Vec<Option<f64>>> {
        if !series.dtype().is_numeric() {
            return Err(ForecastError::data(format!(
                "Target column '{}' must be numeric, found {}",
                series.name(),
                series.dtype()
            )));
        }

        let values = Self::numeric_values(series)?;
        if values.iter().all(Option::is_none) {
            return Err(ForecastError::data(format!(
                "Target column '{}' has no values",
                series.name()
            )));
        }
        Ok(values)
    }

    fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
        Ok(series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|v| v.is_finite()))
            .collect())
    }
}

fn fill_gaps(name: &str, values: Vec<Option<f64>>) -> Result<Vec<f64>> {
    let filled = Series::new(name, values)
        .fill_null(FillNullStrategy::Forward(None))?
        .fill_null(FillNullStrategy::Backward(None))?;

    filled
        .f64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| ForecastError::data(format!("Target column '{}' has no values", name)))
        })
        .collect()
}

fn from_epoch(value: i64, per_second: i64) -> Option<DateTime<Utc>> {
    let seconds = value.div_euclid(per_second);
    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
    Utc.timestamp_opt(seconds, nanos as u32).single()
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl TimeSeriesData {
    /// Create a series without signal columns
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        target_column: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::data("Target values must be finite"));
        }
        let values = values.into_iter().map(Some).collect();
        Self::from_parts(timestamps, target_column.into(), values, Vec::new())
    }

    /// Add a signal column
    pub fn with_signal(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<Self> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(ForecastError::data(format!(
                "Signal '{}' has {} values, series has {}",
                name,
                values.len(),
                self.len()
            )));
        }
        if name == self.target_column || self.signal(&name).is_some() {
            return Err(ForecastError::data(format!("Duplicate column '{}'", name)));
        }
        self.signals.push((name, values));
        Ok(self)
    }

    fn from_parts(
        timestamps: Vec<DateTime<Utc>>,
        target_column: String,
        target: Vec<Option<f64>>,
        signals: Vec<(String, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        if timestamps.len() != target.len() {
            return Err(ForecastError::data(format!(
                "Timestamps ({}) and target values ({}) differ in length",
                timestamps.len(),
                target.len()
            )));
        }
        if timestamps.is_empty() {
            return Err(ForecastError::data("Time series is empty"));
        }

        let mut order: Vec<usize> = (0..timestamps.len()).collect();
        order.sort_by_key(|&i| timestamps[i]);

        if let Some(pair) = order
            .windows(2)
            .find(|pair| timestamps[pair[0]] == timestamps[pair[1]])
        {
            return Err(ForecastError::data(format!(
                "Duplicate timestamp {}",
                timestamps[pair[0]]
            )));
        }

        let reorder = |values: &[Option<f64>]| -> Vec<Option<f64>> {
            order.iter().map(|&i| values[i]).collect()
        };

        // Gaps take the nearest earlier value, leading gaps the first one after
        let target = fill_gaps(&target_column, reorder(&target))?;

        Ok(Self {
            timestamps: order.iter().map(|&i| timestamps[i]).collect(),
            target_column,
            target,
            signals: signals
                .iter()
                .map(|(name, values)| (name.clone(), reorder(values)))
                .collect(),
        })
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.target.len()
    }

    /// Whether there are no observations
    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Observation timestamps in increasing order
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Name of the target column
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Target values, gap-free
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Values of a signal column
    pub fn signal(&self, name: &str) -> Option<&[Option<f64>]> {
        self.signals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Names of the signal columns in input order
    pub fn signal_names(&self) -> Vec<&str> {
        self.signals.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Last observation timestamp
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Keep observations up to and including `end`
    pub fn truncate_after(&self, end: DateTime<Utc>) -> Result<Self> {
        let keep = self.timestamps.partition_point(|ts| *ts <= end);
        if keep == 0 {
            return Err(ForecastError::data(format!(
                "No observations on or before {}",
                end
            )));
        }
        Ok(self.slice(0, keep))
    }

    /// Rows `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);

        Self {
            timestamps: self.timestamps[start..end].to_vec(),
            target_column: self.target_column.clone(),
            target: self.target[start..end].to_vec(),
            signals: self
                .signals
                .iter()
                .map(|(name, values)| (name.clone(), values[start..end].to_vec()))
                .collect(),
        }
    }
}

/// Supplier of training, latest and test data for the engine
pub trait DataSource: Send + Sync {
    /// Data to train on, optionally cut off after `end_date`
    fn load_training_data(
        &self,
        target_column: &str,
        date_column: &str,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<TimeSeriesData>;

    /// Most recent data, used to build prediction features
    fn load_latest_data(&self, target_column: &str, date_column: &str) -> Result<TimeSeriesData>;

    /// Held-out data for evaluation, if the source has any
    fn load_test_data(
        &self,
        target_column: &str,
        date_column: &str,
    ) -> Result<Option<TimeSeriesData>>;

    /// Columns to treat as external signals when the caller names none
    fn external_features(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the input distribution has shifted since training
    fn detect_data_drift(&self) -> bool {
        false
    }
}

/// In-memory data source over polars frames
#[derive(Debug, Clone)]
pub struct FrameSource {
    training: DataFrame,
    test: Option<DataFrame>,
    external: Vec<String>,
}

impl FrameSource {
    pub fn new(training: DataFrame) -> Self {
        Self {
            training,
            test: None,
            external: Vec::new(),
        }
    }

    /// Attach a held-out frame for evaluation
    pub fn with_test_frame(mut self, test: DataFrame) -> Self {
        self.test = Some(test);
        self
    }

    /// Declare which columns are external signals
    pub fn with_external_features(mut self, columns: Vec<String>) -> Self {
        self.external = columns;
        self
    }

    /// Replace the training frame, e.g. when new observations arrive
    pub fn replace_training(&mut self, training: DataFrame) {
        self.training = training;
    }

    pub fn training_frame(&self) -> &DataFrame {
        &self.training
    }
}

impl DataSource for FrameSource {
    fn load_training_data(
        &self,
        target_column: &str,
        date_column: &str,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<TimeSeriesData> {
        let data = DataLoader::from_dataframe(&self.training, target_column, date_column)?;
        match end_date {
            Some(end) => data.truncate_after(end),
            None => Ok(data),
        }
    }

    fn load_latest_data(&self, target_column: &str, date_column: &str) -> Result<TimeSeriesData> {
        DataLoader::from_dataframe(&self.training, target_column, date_column)
    }

    fn load_test_data(
        &self,
        target_column: &str,
        date_column: &str,
    ) -> Result<Option<TimeSeriesData>> {
        self.test
            .as_ref()
            .map(|df| DataLoader::from_dataframe(df, target_column, date_column))
            .transpose()
    }

    fn external_features(&self) -> Vec<String> {
        self.external.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::NamedFrom;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let data = TimeSeriesData::new(vec![day(3), day(1), day(2)], "sales", vec![3.0, 1.0, 2.0])
            .unwrap();
        assert_eq!(data.target(), &[1.0, 2.0, 3.0]);
        assert_eq!(data.timestamps()[0], day(1));
    }

    #[test]
    fn test_duplicate_timestamps_rejected() {
        let result = TimeSeriesData::new(vec![day(1), day(1)], "sales", vec![1.0, 2.0]);
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_string_dates_and_null_fill() {
        let df = DataFrame::new(vec![
            Series::new("date", &["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"]),
            Series::new("sales", &[None, Some(10.0), None, Some(12.0)]),
            Series::new("temp", &[Some(1.0), None, Some(3.0), Some(4.0)]),
            Series::new("note", &["a", "b", "c", "d"]),
        ])
        .unwrap();

        let data = DataLoader::from_dataframe(&df, "sales", "date").unwrap();
        assert_eq!(data.target(), &[10.0, 10.0, 10.0, 12.0]);
        assert_eq!(data.signal_names(), vec!["temp"]);
        assert_eq!(data.signal("temp").unwrap()[1], None);
    }

    #[test]
    fn test_truncate_after() {
        let data = TimeSeriesData::new(vec![day(1), day(2), day(3)], "sales", vec![1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(data.truncate_after(day(2)).unwrap().len(), 2);
        assert!(data
            .truncate_after(Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap())
            .is_err());
    }
}
