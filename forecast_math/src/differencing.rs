//! Differencing and its inverse for integrated models

use crate::{MathError, Result};

/// Lagged difference `y[t] - y[t - lag]`
///
/// The result is `lag` values shorter than the input.
pub fn difference(values: &[f64], lag: usize) -> Result<Vec<f64>> {
    if lag == 0 {
        return Err(MathError::InvalidInput(
            "Differencing lag must be greater than zero".to_string(),
        ));
    }
    if values.len() <= lag {
        return Err(MathError::InsufficientData(format!(
            "Differencing at lag {} needs more than {} values, have {}",
            lag,
            lag,
            values.len()
        )));
    }

    Ok(values
        .iter()
        .skip(lag)
        .zip(values.iter())
        .map(|(current, previous)| current - previous)
        .collect())
}

/// Rebuild levels from differences appended after `history`
///
/// Each future level is its difference plus the level `lag` steps earlier,
/// where earlier levels may themselves be reconstructed values.
pub fn undifference(history: &[f64], diffs: &[f64], lag: usize) -> Result<Vec<f64>> {
    if lag == 0 {
        return Err(MathError::InvalidInput(
            "Differencing lag must be greater than zero".to_string(),
        ));
    }
    if history.len() < lag {
        return Err(MathError::InsufficientData(format!(
            "Integration at lag {} needs {} historical levels, have {}",
            lag,
            lag,
            history.len()
        )));
    }

    let mut levels = Vec::with_capacity(history.len() + diffs.len());
    levels.extend_from_slice(history);
    for &diff in diffs {
        let base = levels[levels.len() - lag];
        levels.push(base + diff);
    }

    Ok(levels.split_off(history.len()))
}
