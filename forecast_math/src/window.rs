//! Lag and trailing-window statistics
//!
//! Series are passed as `Option<f64>` so that gaps (missing signal values,
//! insufficient history) travel through the calculations instead of being
//! silently replaced. A window that contains a gap yields `None`.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Fixed-size trailing window over a stream of observations
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<Option<f64>>,
}

impl RollingWindow {
    /// Create a new window holding the last `period` observations
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Window period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
        })
    }

    /// Push a new observation, evicting the oldest once the window is full
    pub fn update(&mut self, value: Option<f64>) {
        self.values.push_back(value.filter(|v| v.is_finite()));

        if self.values.len() > self.period {
            self.values.pop_front();
        }
    }

    /// Whether the window is full and holds no gaps
    pub fn is_ready(&self) -> bool {
        self.values.len() == self.period && self.values.iter().all(Option::is_some)
    }

    /// Mean of the observations in the window
    pub fn mean(&self) -> Result<f64> {
        let values = self.complete_values()?;
        Ok(values.iter().sum::<f64>() / self.period as f64)
    }

    /// Sample (n - 1) standard deviation of the observations in the window
    pub fn std_dev(&self) -> Result<f64> {
        if self.period < 2 {
            return Err(MathError::InvalidInput(
                "Standard deviation needs a window of at least 2".to_string(),
            ));
        }

        let values = self.complete_values()?;
        let mean = values.iter().sum::<f64>() / self.period as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (self.period - 1) as f64;

        Ok(variance.sqrt())
    }

    /// Get the window period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Clear all observations
    pub fn reset(&mut self) {
        self.values.clear();
    }

    fn complete_values(&self) -> Result<Vec<f64>> {
        if !self.is_ready() {
            return Err(MathError::InsufficientData(format!(
                "Window of {} needs {} complete observations, has {}",
                self.period,
                self.period,
                self.values.iter().filter(|v| v.is_some()).count()
            )));
        }

        Ok(self.values.iter().flatten().copied().collect())
    }
}

/// Value `periods` steps back; `None` until enough history exists
pub fn lag(values: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= periods { values[i - periods] } else { None })
        .collect()
}

/// Rolling mean over the window ending at (and including) each position
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    rolling(values, window, RollingWindow::mean)
}

/// Rolling sample standard deviation over the window ending at each position
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    if window < 2 {
        return Err(MathError::InvalidInput(format!(
            "Rolling standard deviation needs a window of at least 2, got {}",
            window
        )));
    }
    rolling(values, window, RollingWindow::std_dev)
}

fn rolling<F>(values: &[Option<f64>], window: usize, stat: F) -> Result<Vec<Option<f64>>>
where
    F: Fn(&RollingWindow) -> Result<f64>,
{
    let mut state = RollingWindow::new(window)?;

    Ok(values
        .iter()
        .map(|&value| {
            state.update(value);
            stat(&state).ok()
        })
        .collect())
}

/// Wrap a dense series for the window functions
pub fn complete(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|&v| Some(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lag_shifts_and_pads() {
        let series = complete(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(lag(&series, 2), vec![None, None, Some(1.0), Some(2.0)]);
        assert_eq!(lag(&series, 0), series);
        assert!(lag(&series, 10).iter().all(Option::is_none));
    }

    #[test]
    fn test_rolling_mean_and_std() {
        let series = complete(&[10.0, 11.0, 9.0, 12.0]);
        let means = rolling_mean(&series, 3).unwrap();
        let stds = rolling_std(&series, 3).unwrap();

        assert_eq!(means[0], None);
        assert_eq!(means[1], None);
        assert_abs_diff_eq!(means[2].unwrap(), 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(means[3].unwrap(), 32.0 / 3.0, epsilon = 1e-12);

        assert_abs_diff_eq!(stds[2].unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gap_poisons_window() {
        let series = vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let means = rolling_mean(&series, 2).unwrap();
        assert_eq!(means, vec![None, None, None, Some(3.5), Some(4.5)]);
    }

    #[test]
    fn test_invalid_windows() {
        assert!(RollingWindow::new(0).is_err());
        assert!(rolling_std(&complete(&[1.0, 2.0]), 1).is_err());
    }

    #[test]
    fn test_window_reset() {
        let mut window = RollingWindow::new(2).unwrap();
        window.update(Some(1.0));
        window.update(Some(2.0));
        assert!(window.is_ready());

        window.reset();
        assert!(!window.is_ready());
        assert!(window.mean().is_err());
    }
}
