//! Aligned forecasts and per-channel forecast collections

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::Serialize;

/// One model's forecast, aligned to the channel's future grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    model: String,
    periods: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl Forecast {
    /// Create a forecast, checking its shape and non-negativity
    pub fn new(model: impl Into<String>, periods: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if periods.len() != values.len() {
            return Err(ForecastError::ValidationError(format!(
                "Forecast has {} values for {} periods",
                values.len(),
                periods.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(ForecastError::ValidationError(format!(
                "Forecast values must be finite and non-negative, got {}",
                bad
            )));
        }

        Ok(Self {
            model: model.into(),
            periods,
            values,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(period, value)` pairs in time order
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.periods.iter().copied().zip(self.values.iter().copied())
    }
}

/// Forecasts keyed by model name, in the order the models ran
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ForecastSet {
    entries: Vec<Forecast>,
}

impl ForecastSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a forecast, replacing any earlier one from the same model
    pub fn insert(&mut self, forecast: Forecast) {
        match self.entries.iter_mut().find(|f| f.model == forecast.model) {
            Some(existing) => *existing = forecast,
            None => self.entries.push(forecast),
        }
    }

    pub fn get(&self, model: &str) -> Option<&Forecast> {
        self.entries.iter().find(|f| f.model == model)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.get(model).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Forecast> {
        self.entries.iter()
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|f| f.model.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<NaiveDate> {
        vec![
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        ]
    }

    #[test]
    fn rejects_misaligned_or_negative_values() {
        assert!(Forecast::new("ARIMA", grid(), vec![1.0]).is_err());
        assert!(Forecast::new("ARIMA", grid(), vec![1.0, -2.0]).is_err());
        assert!(Forecast::new("ARIMA", grid(), vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut set = ForecastSet::new();
        set.insert(Forecast::new("ARIMA", grid(), vec![1.0, 2.0]).unwrap());
        set.insert(Forecast::new("ETS", grid(), vec![3.0, 4.0]).unwrap());
        set.insert(Forecast::new("ARIMA", grid(), vec![5.0, 6.0]).unwrap());

        assert_eq!(set.len(), 2);
        assert_eq!(set.model_names().collect::<Vec<_>>(), vec!["ARIMA", "ETS"]);
        assert_eq!(set.get("ARIMA").unwrap().values(), &[5.0, 6.0]);
    }
}
