use forecast_engine::ForecastError;
use forecast_math::MathError;

#[test]
fn test_error_messages() {
    assert_eq!(
        ForecastError::config("Horizon must be positive").to_string(),
        "Configuration error: Horizon must be positive"
    );
    assert_eq!(
        ForecastError::NotTrained("predicting".to_string()).to_string(),
        "Engine must be trained before predicting"
    );
    assert_eq!(
        ForecastError::NoPredictions.to_string(),
        "No models produced predictions"
    );

    let training = ForecastError::ModelTraining {
        model: "linear".to_string(),
        reason: "singular matrix".to_string(),
    };
    assert_eq!(training.to_string(), "Training failed for linear: singular matrix");

    let mismatch = ForecastError::FeatureMismatch {
        model: "random_forest".to_string(),
        missing: vec!["lag_1".to_string()],
    };
    assert!(mismatch.to_string().contains("lag_1"));
}

#[test]
fn test_error_conversions() {
    let math: ForecastError = MathError::InsufficientData("need 2 points".to_string()).into();
    assert!(matches!(math, ForecastError::MathError(_)));

    let io: ForecastError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
    assert!(matches!(io, ForecastError::IoError(_)));

    let json: ForecastError = serde_json::from_str::<f64>("oops").unwrap_err().into();
    assert!(matches!(json, ForecastError::SerializationError(_)));
}
