//! Feature engineering for tree-ensemble models
//!
//! Each period is described by calendar fields, a trend index, lagged
//! values, trailing rolling means and a cyclical encoding of its position
//! in the year. Training rows are built from the observed history;
//! forecasting rows are built from a sliding window that the recursive
//! forecaster extends with its own predictions.

use crate::data::{Frequency, TimeSeries};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use forecast_math::RingBuffer;
use ndarray::Array2;
use std::f64::consts::TAU;

/// Layout of the feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    frequency: Frequency,
    lags: Vec<usize>,
    windows: Vec<usize>,
}

/// Training design matrix with its targets
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub features: Array2<f64>,
    pub targets: Vec<f64>,
    /// Column means used to fill missing lag and rolling values
    pub fill_values: Vec<f64>,
}

impl FeatureSpec {
    pub fn new(frequency: Frequency, lags: Vec<usize>, windows: Vec<usize>) -> Result<Self> {
        if lags.is_empty() || lags.contains(&0) || windows.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "Lags must be non-empty and lags and windows must be positive".to_string(),
            ));
        }
        Ok(Self {
            frequency,
            lags,
            windows,
        })
    }

    /// Lags 1, 2, 3, 6 and 12 with rolling means over 3, 6 and 12 periods
    pub fn default_for(frequency: Frequency) -> Self {
        Self {
            frequency,
            lags: vec![1, 2, 3, 6, 12],
            windows: vec![3, 6, 12],
        }
    }

    /// Column names, in feature order
    pub fn names(&self) -> Vec<String> {
        let period = match self.frequency {
            Frequency::Monthly => "month",
            Frequency::Weekly => "week",
        };
        let mut names = vec![
            "year".to_string(),
            period.to_string(),
            "quarter".to_string(),
            "day_of_year".to_string(),
            "trend".to_string(),
        ];
        names.extend(self.lags.iter().map(|lag| format!("lag_{}", lag)));
        names.extend(self.windows.iter().map(|w| format!("rolling_mean_{}", w)));
        names.push(format!("{}_sin", period));
        names.push(format!("{}_cos", period));
        names
    }

    pub fn width(&self) -> usize {
        5 + self.lags.len() + self.windows.len() + 2
    }

    /// Values the sliding window must retain
    pub fn history_len(&self) -> usize {
        self.lags
            .iter()
            .chain(self.windows.iter())
            .copied()
            .max()
            .unwrap_or(1)
    }

    /// Feature row for `period`, given the values observed before it
    ///
    /// Lags and rolling means reaching past the available history are
    /// `None`.
    pub fn row(&self, period: NaiveDate, trend: usize, history: &RingBuffer) -> Vec<Option<f64>> {
        let (position, cycle) = match self.frequency {
            Frequency::Monthly => (period.month(), 12.0),
            Frequency::Weekly => (period.iso_week().week(), 52.0),
        };
        let angle = TAU * f64::from(position) / cycle;

        let mut row = Vec::with_capacity(self.width());
        row.push(Some(f64::from(period.year())));
        row.push(Some(f64::from(position)));
        row.push(Some(f64::from((period.month() - 1) / 3 + 1)));
        row.push(Some(f64::from(period.ordinal())));
        row.push(Some(trend as f64));
        row.extend(self.lags.iter().map(|&lag| history.lag(lag)));
        row.extend(self.windows.iter().map(|&w| history.mean_last(w)));
        row.push(Some(angle.sin()));
        row.push(Some(angle.cos()));
        row
    }

    /// Design matrix for every observed period
    ///
    /// Missing values are replaced by the column mean over the rows where
    /// the value exists, or zero when it never exists.
    pub fn training_set(&self, series: &TimeSeries) -> Result<TrainingSet> {
        let mut history = RingBuffer::new(self.history_len())?;
        let mut raw_rows = Vec::with_capacity(series.len());
        for (trend, (period, value)) in series.iter().enumerate() {
            raw_rows.push(self.row(period, trend, &history));
            history.push(value);
        }

        let width = self.width();
        let fill_values: Vec<f64> = (0..width)
            .map(|col| {
                let present: Vec<f64> = raw_rows.iter().filter_map(|row| row[col]).collect();
                forecast_math::stats::mean(&present).unwrap_or(0.0)
            })
            .collect();

        let flat: Vec<f64> = raw_rows
            .iter()
            .flat_map(|row| fill_row(row, &fill_values))
            .collect();
        let features = Array2::from_shape_vec((raw_rows.len(), width), flat)
            .map_err(|e| ForecastError::ValidationError(e.to_string()))?;

        Ok(TrainingSet {
            features,
            targets: series.values().to_vec(),
            fill_values,
        })
    }
}

/// Replace missing entries with their column fill values
pub fn fill_row(row: &[Option<f64>], fill_values: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(fill_values.iter())
        .map(|(value, fill)| value.unwrap_or(*fill))
        .collect()
}
