mod common;

use approx::assert_abs_diff_eq;
use common::{fast_config, sales_series};
use forecast_engine::config::{EnsembleConfig, FeatureConfig, ScenarioSettings};
use forecast_engine::models::ModelFactory;
use forecast_engine::scenario::{apply_modifications, impact_analysis, BaselineSource, ScenarioEngine};
use forecast_engine::{Ensemble, FeatureBuilder, FeatureTable, ForecastError, ModelKind, ModelSet, Scenario};
use pretty_assertions::assert_eq;

#[test]
fn test_demand_multiplier_is_exact() {
    let scenario = Scenario::new("demand spike").with_demand_multiplier(1.2);
    let forecast = apply_modifications(&[100.0; 30], &scenario, -0.5);
    assert_eq!(forecast, vec![120.0; 30]);
}

#[test]
fn test_price_change_with_elasticity_is_exact() {
    let scenario = Scenario::new("price rise").with_price_change(0.1, Some(-0.5));
    let forecast = apply_modifications(&[100.0; 10], &scenario, -0.5);
    assert_eq!(forecast, vec![95.0; 10]);
}

#[test]
fn test_price_change_uses_default_elasticity() {
    let scenario = Scenario::new("price rise").with_price_change(0.2, None);
    let forecast = apply_modifications(&[200.0; 3], &scenario, -0.5);
    for value in forecast {
        assert_abs_diff_eq!(value, 180.0, epsilon = 1e-9);
    }
}

#[test]
fn test_rules_compose_in_order() {
    let scenario = Scenario::new("recession")
        .with_price_change(-0.1, Some(-1.0))
        .with_demand_multiplier(0.9)
        .with_economic_impact(-0.05);
    let forecast = apply_modifications(&[100.0; 2], &scenario, -0.5);
    for value in forecast {
        assert_abs_diff_eq!(value, 100.0 * 1.1 * 0.9 * 0.95, epsilon = 1e-9);
    }
}

#[test]
fn test_empty_scenario_leaves_baseline() {
    let baseline = vec![10.0, 20.0, 30.0];
    assert_eq!(apply_modifications(&baseline, &Scenario::new("noop"), -0.5), baseline);
}

#[test]
fn test_impact_totals() {
    let impact = impact_analysis(&[100.0, 200.0], &[110.0, 180.0]).unwrap();
    assert_eq!(impact.absolute_difference, vec![10.0, -20.0]);
    assert_eq!(impact.percentage_difference, vec![10.0, -10.0]);
    assert_abs_diff_eq!(impact.total_absolute, -10.0);
    assert_abs_diff_eq!(impact.average_absolute, -5.0);
    assert_abs_diff_eq!(impact.average_percentage, 0.0);
    assert!(impact_analysis(&[1.0], &[1.0, 2.0]).is_err());
}

fn trained(enabled: Vec<ModelKind>) -> (FeatureTable, ModelSet, Ensemble) {
    let table = FeatureBuilder::new(FeatureConfig::default())
        .unwrap()
        .build_from_series(&sales_series(140), &[])
        .unwrap();
    let mut config = fast_config().models;
    config.enabled = enabled;
    let models = ModelFactory::new(config).unwrap().train_models(&table).unwrap();
    let mut ensemble = Ensemble::new(EnsembleConfig::default()).unwrap();
    ensemble.fit(&models, &table).unwrap();
    (table, models, ensemble)
}

#[test]
fn test_live_baseline_matches_ensemble_forecast() {
    let (table, models, ensemble) = trained(vec![ModelKind::TrendSeasonal, ModelKind::Linear]);
    let latest = table.replicate_last(5).unwrap();
    let engine = ScenarioEngine::new(ScenarioSettings::default());

    let scenario = Scenario::new("boost").with_demand_multiplier(1.5);
    let result = engine
        .run_scenario(&scenario, &models, &ensemble, 5, Some(&latest))
        .unwrap();

    assert_eq!(result.baseline, ensemble.predict(&latest, 5, &models).unwrap());
    for (s, b) in result.forecast.iter().zip(&result.baseline) {
        assert_abs_diff_eq!(*s, b * 1.5, epsilon = 1e-9);
    }
    assert_abs_diff_eq!(result.impact.average_percentage, 50.0, epsilon = 1e-9);
}

#[test]
fn test_placeholder_baseline_without_live_features() {
    let (_, models, ensemble) = trained(vec![ModelKind::TrendSeasonal]);
    let engine = ScenarioEngine::new(ScenarioSettings {
        baseline: BaselineSource::Placeholder,
        ..ScenarioSettings::default()
    });

    let result = engine
        .run_scenario(&Scenario::new("flat"), &models, &ensemble, 4, None)
        .unwrap();
    assert_eq!(result.baseline.len(), 4);
    assert_eq!(result.forecast, result.baseline);
}

#[test]
fn test_total_failure_is_not_masked() {
    let (_, models, ensemble) = trained(vec![ModelKind::Linear]);
    let engine = ScenarioEngine::new(ScenarioSettings {
        baseline: BaselineSource::Placeholder,
        ..ScenarioSettings::default()
    });

    let result = engine.run_scenario(&Scenario::new("any"), &models, &ensemble, 4, None);
    assert!(matches!(result, Err(ForecastError::NoPredictions)));
}

#[test]
fn test_invalid_scenario_inputs() {
    let (table, models, ensemble) = trained(vec![ModelKind::TrendSeasonal]);
    let engine = ScenarioEngine::new(ScenarioSettings::default());
    let latest = table.replicate_last(3).unwrap();

    let bad = Scenario::new("nan").with_demand_multiplier(f64::NAN);
    assert!(engine.run_scenario(&bad, &models, &ensemble, 3, Some(&latest)).is_err());
    assert!(engine
        .run_scenario(&Scenario::new("ok"), &models, &ensemble, 0, Some(&latest))
        .is_err());
    assert!(matches!(
        engine.run_scenario(&Scenario::new("ok"), &models, &ensemble, 3, None),
        Err(ForecastError::ConfigurationError(_))
    ));
}
