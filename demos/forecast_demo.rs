//! Fits the ensemble forecaster on a synthetic daily sales series, then
//! prints a forecast, a price scenario and an evaluation.
//!
//! Run with `RUST_LOG=info cargo run --example forecast_demo`.

use chrono::{Duration, NaiveDate};
use forecast_engine::{EngineConfig, FitRequest, ForecastEngine, FrameSource, Scenario};
use polars::prelude::{DataFrame, NamedFrom, Series};
use tracing::info;

fn synthetic_sales(days: usize) -> Result<DataFrame, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid start date")?;
    let weekly = [0.0, -5.0, -3.0, 0.0, 4.0, 12.0, 10.0];

    let mut dates = Vec::with_capacity(days);
    let mut sales = Vec::with_capacity(days);
    let mut temperature = Vec::with_capacity(days);
    for day in 0..days {
        let date = start + Duration::days(day as i64);
        let temp = 15.0 + 10.0 * (day as f64 * 2.0 * std::f64::consts::PI / 365.0).sin();
        let noise = 3.0 * (day as f64 * 1.7).sin();
        dates.push(date.format("%Y-%m-%d").to_string());
        temperature.push(temp);
        sales.push(100.0 + 0.3 * day as f64 + weekly[day % 7] + 0.8 * temp + noise);
    }

    Ok(DataFrame::new(vec![
        Series::new("date", dates),
        Series::new("sales", sales),
        Series::new("temperature", temperature),
    ])?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let history = synthetic_sales(240)?;
    let training = history.slice(0, 200);
    let test = history.slice(150, 90);

    let source = FrameSource::new(training)
        .with_test_frame(test)
        .with_external_features(vec!["temperature".to_string()]);
    let mut engine = ForecastEngine::new(EngineConfig::default(), source)?;

    let state = engine.fit(FitRequest::new("sales", "date"))?;
    info!(version = %state.version_tag(), "engine trained");
    for (kind, weight) in state.ensemble.weights() {
        println!("{:<16} weight {:.3}", kind, weight);
    }

    let report = engine.evaluate_performance(None)?;
    println!("\nHeld-out ensemble MAE {:.2}, RMSE {:.2}", report.ensemble.mae, report.ensemble.rmse);
    for (model, metrics) in &report.models {
        println!("  {:<16} MAE {:.2}", model, metrics.mae);
    }

    let forecast = engine.predict(14, &[0.8, 0.95], true)?;
    println!("\n14-day forecast (confidence score {:.2})", forecast.confidence_score());
    if let Some(band) = forecast.interval(0.95) {
        for (i, (ts, value)) in forecast.timestamps().iter().zip(forecast.values()).enumerate() {
            println!(
                "  {}  {:>8.2}  [{:.2}, {:.2}]",
                ts.format("%Y-%m-%d"),
                value,
                band.lower[i],
                band.upper[i]
            );
        }
    }
    if let Some(explanation) = forecast.explanation() {
        println!("\nTop drivers:");
        for (feature, score) in &explanation.top_drivers {
            println!("  {:<20} {:.3}", feature, score);
        }
        for insight in &explanation.business_insights {
            println!("  - {}", insight);
        }
    }

    let discount = Scenario::new("10% discount").with_price_change(-0.1, Some(-1.2));
    let result = engine.run_scenario(&discount, 14)?;
    println!(
        "\nScenario '{}': {:+.1} units in total ({:+.1}%)",
        result.scenario.name, result.impact.total_absolute, result.impact.average_percentage
    );

    let retrained = engine.retrain("scheduled")?;
    println!("\nRetrained: {}", retrained);

    Ok(())
}
