//! Point-forecast accuracy metrics
//!
//! Each metric returns `None` when it is undefined for the inputs: empty or
//! mismatched slices, constant actuals for R², or a zero actual for MAPE.

use forecast_math::stats;

fn paired(actual: &[f64], predicted: &[f64]) -> Option<usize> {
    if actual.is_empty() || actual.len() != predicted.len() {
        None
    } else {
        Some(actual.len())
    }
}

/// Mean absolute error
pub fn mae(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = paired(actual, predicted)?;
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Some(total / n as f64)
}

/// Mean squared error
pub fn mse(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = paired(actual, predicted)?;
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Some(total / n as f64)
}

/// Root mean squared error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    mse(actual, predicted).map(f64::sqrt)
}

/// Coefficient of determination
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    paired(actual, predicted)?;
    let mean = stats::mean(actual)?;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return None;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Some(1.0 - ss_res / ss_tot)
}

/// Mean absolute percentage error, in percent
pub fn mape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = paired(actual, predicted)?;
    if actual.iter().any(|a| *a == 0.0) {
        return None;
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| ((a - p) / a).abs())
        .sum();
    Some(100.0 * total / n as f64)
}
