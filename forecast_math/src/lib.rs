//! # Forecast Math
//!
//! Numeric building blocks shared by the forecasting engine:
//! lag and trailing-window statistics, descriptive statistics,
//! first-degree trend fitting, forecast accuracy metrics and
//! standard-normal quantiles for prediction intervals.

use thiserror::Error;

pub mod accuracy;
pub mod normal;
pub mod stats;
pub mod trend;
pub mod window;

pub use accuracy::{forecast_accuracy, Accuracy};
pub use trend::LinearTrend;
pub use window::RollingWindow;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
