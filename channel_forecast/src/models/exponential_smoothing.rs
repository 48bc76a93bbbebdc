//! Exponential smoothing (ETS) models for notification forecasting
//!
//! Additive-trend Holt smoothing, with an additive seasonal component once
//! the series spans enough seasonal cycles. Smoothing weights are fitted by
//! minimising the one-step squared error.

use crate::config::StatisticalConfig;
use crate::data::{Frequency, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ModelFamily, ModelKind, TrainedForecastModel};
use forecast_math::{minimize_bounded, stats, NelderMeadConfig};
use tracing::{debug, info};

const WEIGHT_BOUNDS: (f64, f64) = (1e-4, 0.9999);

/// Holt or Holt-Winters additive exponential smoothing
#[derive(Debug, Clone)]
pub struct EtsModel {
    season_length: usize,
    min_observations: usize,
    /// Seasonal cycles needed before a seasonal component is added
    seasonal_cycles: usize,
    floor: f64,
    optimizer: NelderMeadConfig,
}

/// Smoothing weights for level, trend and season
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingWeights {
    pub alpha: f64,
    pub beta: f64,
    /// Absent for the non-seasonal variant
    pub gamma: Option<f64>,
}

/// State after filtering the whole series
#[derive(Debug, Clone)]
struct FilterState {
    level: f64,
    trend: f64,
    /// Indexed by absolute time modulo the season length
    seasonals: Vec<f64>,
    residuals: Vec<f64>,
}

/// Trained ETS model
#[derive(Debug, Clone)]
pub struct TrainedEtsModel {
    weights: SmoothingWeights,
    state: FilterState,
    observations: usize,
    /// Mean one-step residual, added back to every forecast
    bias: f64,
    floor: f64,
}

impl EtsModel {
    /// Create an ETS model with the given seasonal period and floor
    pub fn new(season_length: usize, min_observations: usize, floor: f64) -> Result<Self> {
        if season_length < 2 {
            return Err(ForecastError::InvalidParameter(
                "Season length must be at least 2".to_string(),
            ));
        }
        if min_observations < 2 {
            return Err(ForecastError::InvalidParameter(
                "ETS needs at least 2 observations".to_string(),
            ));
        }
        if !floor.is_finite() || floor < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast floor must be non-negative".to_string(),
            ));
        }

        Ok(Self {
            season_length,
            min_observations,
            seasonal_cycles: 2,
            floor,
            optimizer: NelderMeadConfig::default(),
        })
    }

    pub fn from_config(config: &StatisticalConfig, frequency: Frequency) -> Self {
        Self {
            season_length: frequency.season_length(),
            min_observations: config.ets_min_observations,
            seasonal_cycles: config.ets_seasonal_cycles,
            floor: config.ets_floor,
            optimizer: NelderMeadConfig {
                max_iters: config.optimizer_max_iters,
                ..NelderMeadConfig::default()
            },
        }
    }

    /// Whether a series of `len` points gets a seasonal component
    pub fn is_seasonal(&self, len: usize) -> bool {
        len >= self.seasonal_cycles * self.season_length
    }
}

/// Run the smoothing recursions over `values`
fn filter(values: &[f64], weights: &SmoothingWeights, season: usize) -> FilterState {
    let SmoothingWeights { alpha, beta, gamma } = *weights;

    let (mut level, mut trend, mut seasonals, start) = match gamma {
        Some(_) => {
            let first = stats::mean(&values[..season]).unwrap_or(0.0);
            let second = stats::mean(&values[season..2 * season]).unwrap_or(first);
            let seasonals = values[..season].iter().map(|v| v - first).collect();
            (first, (second - first) / season as f64, seasonals, 0)
        }
        None => (values[0], values[1] - values[0], Vec::new(), 1),
    };

    let mut residuals = Vec::with_capacity(values.len() - start);
    for (t, &y) in values.iter().enumerate().skip(start) {
        let seasonal = if seasonals.is_empty() { 0.0 } else { seasonals[t % season] };
        let fitted = level + trend + seasonal;
        residuals.push(y - fitted);

        let previous_level = level;
        let previous_trend = trend;
        level = alpha * (y - seasonal) + (1.0 - alpha) * (previous_level + previous_trend);
        trend = beta * (level - previous_level) + (1.0 - beta) * previous_trend;
        if let Some(gamma) = gamma {
            seasonals[t % season] =
                gamma * (y - previous_level - previous_trend) + (1.0 - gamma) * seasonal;
        }
    }

    FilterState {
        level,
        trend,
        seasonals,
        residuals,
    }
}

impl ForecastModel for EtsModel {
    fn name(&self) -> &str {
        ModelKind::Ets.name()
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Statistical
    }

    fn min_observations(&self) -> usize {
        self.min_observations
    }

    fn train(&self, series: &TimeSeries) -> Result<Box<dyn TrainedForecastModel>> {
        self.check_length(series)?;
        let values = series.values();
        let season = self.season_length;
        let seasonal = self.is_seasonal(values.len());

        let (initial, bounds): (Vec<f64>, Vec<(f64, f64)>) = if seasonal {
            (vec![0.3, 0.1, 0.1], vec![WEIGHT_BOUNDS; 3])
        } else {
            (vec![0.3, 0.1], vec![WEIGHT_BOUNDS; 2])
        };
        let to_weights = |params: &[f64]| SmoothingWeights {
            alpha: params[0],
            beta: params[1],
            gamma: params.get(2).copied(),
        };

        let objective = |params: &[f64]| {
            filter(values, &to_weights(params), season)
                .residuals
                .iter()
                .map(|e| e * e)
                .sum::<f64>()
        };
        let minimum = minimize_bounded(objective, &initial, &bounds, self.optimizer)?;
        let weights = to_weights(&minimum.point);
        let state = filter(values, &weights, season);
        let bias = stats::mean(&state.residuals).unwrap_or(0.0);

        debug!(sse = minimum.cost, iterations = minimum.iterations, "ETS optimisation finished");
        info!(
            alpha = weights.alpha,
            beta = weights.beta,
            gamma = ?weights.gamma,
            seasonal,
            "Fitted ETS"
        );

        Ok(Box::new(TrainedEtsModel {
            weights,
            state,
            observations: values.len(),
            bias,
            floor: self.floor,
        }))
    }
}

impl TrainedEtsModel {
    pub fn weights(&self) -> SmoothingWeights {
        self.weights
    }

    pub fn is_seasonal(&self) -> bool {
        self.weights.gamma.is_some()
    }
}

impl TrainedForecastModel for TrainedEtsModel {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let state = &self.state;
        let season = state.seasonals.len();

        let forecasts: Vec<f64> = (1..=horizon)
            .map(|h| {
                let seasonal = if season == 0 {
                    0.0
                } else {
                    state.seasonals[(self.observations + h - 1) % season]
                };
                state.level + h as f64 * state.trend + seasonal + self.bias
            })
            .collect();

        if forecasts.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ForecastingError(
                "ETS produced non-finite forecasts".to_string(),
            ));
        }
        Ok(forecasts.into_iter().map(|v| v.max(self.floor)).collect())
    }

    fn name(&self) -> &str {
        ModelKind::Ets.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn monthly(values: Vec<f64>) -> TimeSeries {
        TimeSeries::new(Frequency::Monthly, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), values)
            .unwrap()
    }

    #[test]
    fn seasonal_component_needs_two_cycles() {
        let model = EtsModel::new(12, 12, 1.0).unwrap();
        assert!(!model.is_seasonal(23));
        assert!(model.is_seasonal(24));
    }

    #[test]
    fn short_series_uses_trend_only() {
        let values: Vec<f64> = (0..12).map(|i| 50.0 + 3.0 * i as f64).collect();
        let model = EtsModel::new(12, 12, 1.0).unwrap();
        let trained = model.train(&monthly(values)).unwrap();
        let forecast = trained.forecast(3).unwrap();

        assert_eq!(forecast.len(), 3);
        assert!(forecast[0] > 80.0 && forecast[0] < 95.0, "{:?}", forecast);
        assert!(forecast[2] > forecast[0]);
    }

    #[test]
    fn forecasts_respect_floor() {
        let values: Vec<f64> = (0..12).map(|i| 120.0 - 10.0 * i as f64).collect();
        let trained = EtsModel::new(12, 12, 1.0).unwrap().train(&monthly(values)).unwrap();
        let forecast = trained.forecast(12).unwrap();
        assert!(forecast.iter().all(|v| *v >= 1.0));
        assert_eq!(forecast[11], 1.0);
    }

    #[test]
    fn nan_state_is_not_hidden_by_floor() {
        let trained = TrainedEtsModel {
            weights: SmoothingWeights {
                alpha: 0.5,
                beta: 0.1,
                gamma: None,
            },
            state: FilterState {
                level: f64::NAN,
                trend: 0.0,
                seasonals: Vec::new(),
                residuals: Vec::new(),
            },
            observations: 12,
            bias: 0.0,
            floor: 1.0,
        };
        assert!(matches!(trained.forecast(2), Err(ForecastError::ForecastingError(_))));
    }
}
