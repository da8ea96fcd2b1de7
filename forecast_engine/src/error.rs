//! Error types for the forecast_engine crate

use forecast_math::MathError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the forecast_engine crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Missing column, invalid horizon or confidence level, bad settings
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A model was asked to predict before it was fitted
    #[error("Model not fitted: {0}")]
    NotFitted(String),

    /// The engine was queried before a successful fit
    #[error("Engine must be trained before {0}")]
    NotTrained(String),

    /// One model failed to train; handled by excluding it from the set
    #[error("Training failed for {model}: {reason}")]
    ModelTraining { model: String, reason: String },

    /// Every enabled model failed to train
    #[error("All models failed to train: {0}")]
    AllModelsFailed(String),

    /// One model failed to predict; handled by excluding it from the blend
    #[error("Prediction failed for {model}: {reason}")]
    ModelPrediction { model: String, reason: String },

    /// No model produced a prediction
    #[error("No models produced predictions")]
    NoPredictions,

    /// Prediction features lack columns the model was trained on
    #[error("Feature mismatch for {model}: missing columns {missing:?}")]
    FeatureMismatch { model: String, missing: Vec<String> },

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from numeric kernels
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl ForecastError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        ForecastError::ConfigurationError(message.into())
    }

    /// Shorthand for a data error
    pub fn data(message: impl Into<String>) -> Self {
        ForecastError::DataError(message.into())
    }
}
