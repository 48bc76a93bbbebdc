//! Seasonal ARIMA(1,1,1)(1,1,1)_S
//!
//! The series is differenced once at the seasonal lag and once at lag one.
//! The multiplicative ARMA part is fitted by conditional sum of squares with
//! zero pre-sample values, and coefficients are only box-bounded.

use crate::config::StatisticalConfig;
use crate::data::{Frequency, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ModelFamily, ModelKind, TrainedForecastModel};
use forecast_math::{difference, minimize_bounded, stats, undifference, NelderMeadConfig};
use tracing::info;

const COEFFICIENT_BOUND: f64 = 0.99;
const DEGENERATE_VARIANCE: f64 = 1e-12;

/// Seasonal ARIMA model with fixed order
#[derive(Debug, Clone)]
pub struct SarimaModel {
    season_length: usize,
    /// Full seasonal cycles required before fitting
    min_cycles: usize,
    optimizer: NelderMeadConfig,
}

/// Fitted SARIMA coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SarimaCoefficients {
    pub ar: f64,
    pub ma: f64,
    pub seasonal_ar: f64,
    pub seasonal_ma: f64,
}

/// Trained SARIMA model
#[derive(Debug, Clone)]
pub struct TrainedSarimaModel {
    season_length: usize,
    coefficients: SarimaCoefficients,
    history: Vec<f64>,
    /// Seasonal then regular differences of the history
    differenced: Vec<f64>,
    residuals: Vec<f64>,
}

impl SarimaModel {
    pub fn new(season_length: usize, min_cycles: usize) -> Result<Self> {
        if season_length < 2 {
            return Err(ForecastError::InvalidParameter(
                "Season length must be at least 2".to_string(),
            ));
        }
        if min_cycles < 2 {
            return Err(ForecastError::InvalidParameter(
                "SARIMA needs at least two seasonal cycles".to_string(),
            ));
        }

        Ok(Self {
            season_length,
            min_cycles,
            optimizer: NelderMeadConfig::default(),
        })
    }

    pub fn from_config(config: &StatisticalConfig, frequency: Frequency) -> Self {
        Self {
            season_length: frequency.season_length(),
            min_cycles: config.sarima_min_cycles,
            optimizer: NelderMeadConfig {
                max_iters: config.optimizer_max_iters,
                ..NelderMeadConfig::default()
            },
        }
    }
}

impl SarimaCoefficients {
    fn from_slice(params: &[f64]) -> Self {
        Self {
            ar: params[0],
            ma: params[1],
            seasonal_ar: params[2],
            seasonal_ma: params[3],
        }
    }

    /// Prediction for index `t` from the values and residuals before it
    ///
    /// Expands `(1 - φB)(1 - ΦB^S) w_t = (1 + θB)(1 + ΘB^S) e_t`, treating
    /// anything before the start of the series as zero.
    fn step(&self, w: &[f64], residuals: &[f64], t: usize, season: usize) -> f64 {
        let at = |values: &[f64], lag: usize| t.checked_sub(lag).map_or(0.0, |i| values[i]);

        self.ar * at(w, 1) + self.seasonal_ar * at(w, season)
            - self.ar * self.seasonal_ar * at(w, season + 1)
            + self.ma * at(residuals, 1)
            + self.seasonal_ma * at(residuals, season)
            + self.ma * self.seasonal_ma * at(residuals, season + 1)
    }

    fn residuals(&self, w: &[f64], season: usize) -> Vec<f64> {
        let mut residuals = vec![0.0; w.len()];
        for t in 0..w.len() {
            residuals[t] = w[t] - self.step(w, &residuals, t, season);
        }
        residuals
    }
}

impl ForecastModel for SarimaModel {
    fn name(&self) -> &str {
        ModelKind::Sarima.name()
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Statistical
    }

    fn min_observations(&self) -> usize {
        self.min_cycles * self.season_length
    }

    fn train(&self, series: &TimeSeries) -> Result<Box<dyn TrainedForecastModel>> {
        self.check_length(series)?;
        let season = self.season_length;
        let history = series.values().to_vec();
        let differenced = difference(&difference(&history, season)?, 1)?;

        let variance = stats::population_variance(&differenced).unwrap_or(0.0);
        if variance < DEGENERATE_VARIANCE {
            return Err(ForecastError::FitError(
                "Differenced series is constant; SARIMA is not identifiable".to_string(),
            ));
        }

        let objective = |params: &[f64]| {
            SarimaCoefficients::from_slice(params)
                .residuals(&differenced, season)
                .iter()
                .map(|e| e * e)
                .sum::<f64>()
        };
        let bounds = [(-COEFFICIENT_BOUND, COEFFICIENT_BOUND); 4];
        let minimum = minimize_bounded(objective, &[0.1, 0.1, 0.1, 0.1], &bounds, self.optimizer)?;

        let coefficients = SarimaCoefficients::from_slice(&minimum.point);
        let residuals = coefficients.residuals(&differenced, season);
        info!(
            ar = coefficients.ar,
            ma = coefficients.ma,
            seasonal_ar = coefficients.seasonal_ar,
            seasonal_ma = coefficients.seasonal_ma,
            css = minimum.cost,
            "Fitted SARIMA(1,1,1)(1,1,1)"
        );

        Ok(Box::new(TrainedSarimaModel {
            season_length: season,
            coefficients,
            history,
            differenced,
            residuals,
        }))
    }
}

impl TrainedSarimaModel {
    pub fn coefficients(&self) -> SarimaCoefficients {
        self.coefficients
    }
}

impl TrainedForecastModel for TrainedSarimaModel {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let season = self.season_length;
        let mut w = self.differenced.clone();
        let mut residuals = self.residuals.clone();
        for _ in 0..horizon {
            let t = w.len();
            let next = self.coefficients.step(&w, &residuals, t, season);
            w.push(next);
            residuals.push(0.0);
        }

        // Undo the regular difference on the seasonal differences, then the
        // seasonal difference on the levels.
        let seasonal_history = difference(&self.history, season)?;
        let seasonal_future =
            undifference(&seasonal_history, &w[self.differenced.len()..], 1)?;
        let levels = undifference(&self.history, &seasonal_future, season)?;

        if levels.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ForecastingError(
                "SARIMA produced non-finite forecasts".to_string(),
            ));
        }
        Ok(levels)
    }

    fn name(&self) -> &str {
        ModelKind::Sarima.name()
    }
}
