//! # Ensemble Forecast
//!
//! Workspace root re-exporting the member crates.
//!
//! - [`forecast_math`]: window statistics, trend fitting, accuracy metrics
//!   and normal quantiles
//! - [`forecast_engine`]: the ensemble forecaster, scenarios and retraining
//!
//! ## Example
//!
//! ```
//! use ensemble_forecast_workspace::forecast_math::LinearTrend;
//!
//! let trend = LinearTrend::fit(&[1.0, 2.0, 3.0]).unwrap();
//! assert!((trend.slope() - 1.0).abs() < 1e-12);
//! ```

pub use forecast_engine;
pub use forecast_math;
