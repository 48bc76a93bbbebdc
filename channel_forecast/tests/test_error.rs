use channel_forecast::ForecastError;
use forecast_math::MathError;
use std::io;

#[test]
fn test_error_messages() {
    let err = ForecastError::InsufficientData { needed: 24, got: 12 };
    assert_eq!(
        err.to_string(),
        "Insufficient data: need at least 24 observations, got 12"
    );

    let err = ForecastError::FitError("constant series".to_string());
    assert_eq!(err.to_string(), "Fit error: constant series");

    let err = ForecastError::AlignmentFailure("2 values for 3 periods".to_string());
    assert!(err.to_string().starts_with("Alignment failure"));
}

#[test]
fn test_error_conversions() {
    let err: ForecastError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
    assert!(matches!(err, ForecastError::IoError(_)));

    let err: ForecastError = MathError::InvalidInput("lag must be positive".to_string()).into();
    assert!(matches!(err, ForecastError::MathError(_)));
    assert!(err.to_string().contains("lag must be positive"));

    let err: ForecastError = serde_json::from_str::<u32>("x").unwrap_err().into();
    assert!(matches!(err, ForecastError::JsonError(_)));

    let err: ForecastError = candle_core::Error::Msg("shape mismatch".to_string()).into();
    assert!(matches!(err, ForecastError::NetworkError(_)));
    assert!(err.to_string().starts_with("Network error"));
}
