//! # Forecast Engine
//!
//! An ensemble forecaster for time-indexed quantities such as daily sales.
//!
//! ## Features
//!
//! - Feature construction from a target series and external signals (lags,
//!   shifted rolling statistics, calendar and seasonal encodings)
//! - Trend-seasonal, random forest and linear models behind one interface
//! - Ensemble weights from inverse holdout MAE
//! - Residual-based prediction intervals
//! - What-if scenarios (price, demand, seasonal boost, economic impact)
//! - Forecast explanations and drift-driven retraining
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_engine::{EngineConfig, FitRequest, ForecastEngine, FrameSource, Scenario};
//! # fn run(df: polars::prelude::DataFrame) -> forecast_engine::Result<()> {
//! let source = FrameSource::new(df).with_external_features(vec!["temperature".to_string()]);
//! let mut engine = ForecastEngine::new(EngineConfig::default(), source)?;
//!
//! engine.fit(FitRequest::new("sales", "date"))?;
//!
//! let forecast = engine.predict(14, &[0.8, 0.95], true)?;
//! println!("{:?}", forecast.values());
//!
//! let promo = Scenario::new("promotion").with_price_change(-0.1, None);
//! let result = engine.run_scenario(&promo, 14)?;
//! println!("{:.1}%", result.impact.average_percentage);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod drift;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod explain;
pub mod features;
pub mod metrics;
pub mod models;
pub mod scenario;
pub mod uncertainty;
pub mod utils;

// Re-export commonly used types
pub use crate::config::EngineConfig;
pub use crate::data::{DataLoader, DataSource, FrameSource, TimeSeriesData};
pub use crate::engine::{FitRequest, ForecastEngine, ForecastResult, TrainedState};
pub use crate::ensemble::{Ensemble, EnsembleMethod};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{FeatureBuilder, FeatureTable};
pub use crate::models::{ForecastModel, Model, ModelKind, ModelSet};
pub use crate::scenario::{Scenario, ScenarioResult};
pub use crate::uncertainty::PredictionInterval;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
