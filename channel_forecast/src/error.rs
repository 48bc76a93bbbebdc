//! Error types for the channel_forecast crate

use thiserror::Error;

/// Custom error types for the channel_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data loading or preparation
    #[error("Data error: {0}")]
    DataError(String),

    /// A series is too short for the requested operation
    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A model could not be fitted to its training series
    #[error("Fit error: {0}")]
    FitError(String),

    /// Error related to forecasting operations
    #[error("Forecasting error: {0}")]
    ForecastingError(String),

    /// A forecast could not be placed on the channel's future grid
    #[error("Alignment failure: {0}")]
    AlignmentFailure(String),

    /// Forecasts could not be scored against the holdout
    #[error("Evaluation failure: {0}")]
    EvaluationFailure(String),

    /// Error related to value or shape validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from the numeric building blocks
    #[error("Math error: {0}")]
    MathError(#[from] forecast_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error writing CSV exports
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error reading or writing JSON
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error building, training or running a neural network
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<polars::prelude::PolarsError> for ForecastError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<candle_core::Error> for ForecastError {
    fn from(err: candle_core::Error) -> Self {
        ForecastError::NetworkError(err.to_string())
    }
}
