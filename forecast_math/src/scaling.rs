//! Min-max scaling to the unit interval

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Scaler mapping the fitted range onto `[0, 1]`
///
/// A constant input has no range; it is scaled with a unit range so that
/// values map to zero instead of dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    /// Fit the scaler to the observed values
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit a scaler to an empty series".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Scaler input contains non-finite values".to_string(),
            ));
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if max - min > f64::EPSILON { max - min } else { 1.0 };

        Ok(Self { min, range })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.range
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.range + self.min
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform(v)).collect()
    }

    pub fn inverse_all(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().map(|&v| self.inverse(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn scales_to_unit_interval() {
        let scaler = MinMaxScaler::fit(&[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(scaler.transform_all(&[10.0, 20.0, 30.0]), vec![0.0, 0.5, 1.0]);
        assert_approx_eq!(scaler.inverse(0.25), 15.0);
    }

    #[test]
    fn constant_series_maps_to_zero() {
        let scaler = MinMaxScaler::fit(&[7.0, 7.0, 7.0]).unwrap();
        assert_eq!(scaler.range(), 1.0);
        assert_eq!(scaler.transform(7.0), 0.0);
        assert_eq!(scaler.inverse(0.0), 7.0);
    }

    #[test]
    fn rejects_empty_and_non_finite() {
        assert!(MinMaxScaler::fit(&[]).is_err());
        assert!(MinMaxScaler::fit(&[1.0, f64::NAN]).is_err());
    }
}
