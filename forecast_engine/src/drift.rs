//! Retraining policy: performance drift, data drift and state age

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Bounded history of ensemble MAE observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMonitor {
    capacity: usize,
    drift_window: usize,
    history: VecDeque<f64>,
    last_drift: Option<f64>,
}

impl PerformanceMonitor {
    pub fn new(capacity: usize, drift_window: usize) -> Result<Self> {
        if drift_window == 0 || capacity < drift_window {
            return Err(ForecastError::config(format!(
                "Monitor capacity {} must hold a drift window of {}",
                capacity, drift_window
            )));
        }
        Ok(Self {
            capacity,
            drift_window,
            history: VecDeque::with_capacity(capacity),
            last_drift: None,
        })
    }

    /// Record a new MAE and return its drift against the recent baseline.
    ///
    /// The baseline is the mean of the last `drift_window` observations
    /// before this one. The first observation, or a zero baseline, has no
    /// drift.
    pub fn record(&mut self, mae: f64) -> Option<f64> {
        let drift = self.baseline().and_then(|baseline| {
            (baseline > 0.0 && mae.is_finite()).then(|| (mae - baseline).abs() / baseline)
        });

        if mae.is_finite() {
            if self.history.len() == self.capacity {
                self.history.pop_front();
            }
            self.history.push_back(mae);
        } else {
            warn!(mae, "ignoring non-finite MAE observation");
        }

        if let Some(d) = drift {
            debug!(mae, drift = d, "performance recorded");
        }
        self.last_drift = drift;
        drift
    }

    fn baseline(&self) -> Option<f64> {
        if self.history.is_empty() {
            return None;
        }
        let recent: Vec<f64> = self
            .history
            .iter()
            .rev()
            .take(self.drift_window)
            .copied()
            .collect();
        Some(recent.iter().sum::<f64>() / recent.len() as f64)
    }

    /// Drift computed by the most recent `record`
    pub fn last_drift(&self) -> Option<f64> {
        self.last_drift
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Whether the last recorded drift exceeds `threshold`
    pub fn drift_exceeds(&self, threshold: f64) -> bool {
        self.last_drift.map_or(false, |d| d > threshold)
    }
}

/// Which retraining conditions currently hold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrainTriggers {
    pub performance_drift: bool,
    pub data_drift: bool,
    pub time_based: bool,
}

impl RetrainTriggers {
    pub fn any(&self) -> bool {
        self.performance_drift || self.data_drift || self.time_based
    }
}

/// True when the state trained at `trained_at` is older than `retrain_days`
pub fn is_stale(trained_at: DateTime<Utc>, now: DateTime<Utc>, retrain_days: Option<i64>) -> bool {
    retrain_days.map_or(false, |days| now - trained_at > Duration::days(days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    #[test]
    fn test_first_observation_has_no_drift() {
        let mut monitor = PerformanceMonitor::new(20, 5).unwrap();
        assert_eq!(monitor.record(10.0), None);
        assert!(!monitor.drift_exceeds(0.1));
    }

    #[test]
    fn test_drift_against_recent_mean() {
        let mut monitor = PerformanceMonitor::new(20, 2).unwrap();
        monitor.record(100.0);
        monitor.record(10.0);
        monitor.record(10.0);
        let drift = monitor.record(12.0).unwrap();
        assert_abs_diff_eq!(drift, 0.2, epsilon = 1e-12);
        assert!(monitor.drift_exceeds(0.1));
        assert!(!monitor.drift_exceeds(0.25));
    }

    #[test]
    fn test_capacity_is_bounded() {
        let mut monitor = PerformanceMonitor::new(3, 2).unwrap();
        for mae in [1.0, 2.0, 3.0, 4.0] {
            monitor.record(mae);
        }
        assert_eq!(monitor.history().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert!(PerformanceMonitor::new(2, 3).is_err());
    }

    #[test]
    fn test_staleness() {
        let trained = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        assert!(is_stale(trained, now, Some(7)));
        assert!(!is_stale(trained, now, Some(10)));
        assert!(!is_stale(trained, now, None));
        assert!(RetrainTriggers { time_based: true, ..Default::default() }.any());
        assert!(!RetrainTriggers::default().any());
    }
}
