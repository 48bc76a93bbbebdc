//! # Forecast Math
//!
//! Numeric building blocks shared by the notification forecasting models.
//! This crate provides the small pieces the models are assembled from:
//! bounded sliding windows, differencing, min-max scaling, descriptive
//! statistics and bounded Nelder-Mead minimisation.

use thiserror::Error;

pub mod differencing;
pub mod optimize;
pub mod scaling;
pub mod stats;
pub mod window;

pub use crate::differencing::{difference, undifference};
pub use crate::optimize::{minimize_bounded, Minimum, NelderMeadConfig};
pub use crate::scaling::MinMaxScaler;
pub use crate::window::RingBuffer;

/// Errors that can occur in forecasting-related calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for forecasting math operations
pub type Result<T> = std::result::Result<T, MathError>;
