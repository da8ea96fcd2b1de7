mod common;

use approx::assert_abs_diff_eq;
use common::{fast_config, sales_series};
use forecast_engine::config::{EnsembleConfig, FeatureConfig, UncertaintyConfig};
use forecast_engine::models::ModelFactory;
use forecast_engine::uncertainty::{ResidualSource, UncertaintyQuantifier, UncertaintyState};
use forecast_engine::{Ensemble, FeatureBuilder, ModelSet};
use rstest::rstest;

#[rstest]
#[case(0.5)]
#[case(1.0)]
#[case(7.3)]
fn test_width_is_monotonic_in_confidence(#[case] residual_std: f64) {
    let state = UncertaintyState::with_std(residual_std);
    let levels: Vec<f64> = (1..100).map(|i| i as f64 / 100.0).collect();
    let forecast = vec![100.0, 90.0, 110.0];
    let intervals = state.calculate_intervals(&forecast, &levels, 3).unwrap();

    for pair in intervals.windows(2) {
        let (narrow, wide) = (pair[0].widths(), pair[1].widths());
        for (n, w) in narrow.iter().zip(&wide) {
            assert!(n <= w, "{} > {} between {} and {}", n, w, pair[0].confidence, pair[1].confidence);
        }
    }
}

#[rstest]
#[case(0.5, 0.674)]
#[case(0.8, 1.282)]
#[case(0.9, 1.645)]
#[case(0.95, 1.96)]
fn test_tabulated_levels(#[case] confidence: f64, #[case] z: f64) {
    let state = UncertaintyState::with_std(1.5);
    let interval = &state.calculate_intervals(&[50.0], &[confidence], 1).unwrap()[0];
    assert_abs_diff_eq!(interval.upper[0] - 50.0, z * 1.5, epsilon = 1e-12);
    assert_abs_diff_eq!(50.0 - interval.lower[0], z * 1.5, epsilon = 1e-12);
}

#[test]
fn test_width_constant_over_horizon() {
    let state = UncertaintyState::with_std(2.0);
    let intervals = state
        .calculate_intervals(&[1.0, 5.0, 9.0, 13.0], &[0.9], 4)
        .unwrap();
    let widths = intervals[0].widths();
    assert!(widths.iter().all(|w| (w - widths[0]).abs() < 1e-12));
}

#[test]
fn test_fit_uses_in_sample_residuals() {
    let table = FeatureBuilder::new(FeatureConfig::default())
        .unwrap()
        .build_from_series(&sales_series(150), &[])
        .unwrap();
    let models = ModelFactory::new(fast_config().models)
        .unwrap()
        .train_models(&table)
        .unwrap();
    let mut ensemble = Ensemble::new(EnsembleConfig::default()).unwrap();
    ensemble.fit(&models, &table).unwrap();

    let quantifier = UncertaintyQuantifier::new(UncertaintyConfig::default()).unwrap();
    let state = quantifier.fit(&models, &ensemble, &table);
    assert_eq!(state.source(), ResidualSource::InSample);
    assert_eq!(state.n_residuals(), table.len());
    assert!(state.residual_std() > 0.0 && state.residual_std().is_finite());

    let score = quantifier.confidence_score(&state);
    assert!((0.0..=1.0).contains(&score));
}

#[test]
fn test_fit_failure_degrades_to_fallback() {
    let table = FeatureBuilder::new(FeatureConfig::default())
        .unwrap()
        .build_from_series(&sales_series(100), &[])
        .unwrap();
    let unfitted = Ensemble::new(EnsembleConfig::default()).unwrap();
    let quantifier = UncertaintyQuantifier::new(UncertaintyConfig {
        fallback_std: 3.0,
        ..UncertaintyConfig::default()
    })
    .unwrap();

    let state = quantifier.fit(&ModelSet::default(), &unfitted, &table);
    assert_eq!(state.source(), ResidualSource::Fallback);
    assert_eq!(state.residual_std(), 3.0);
}
