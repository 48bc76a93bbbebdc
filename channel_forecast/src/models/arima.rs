//! ARIMA models for notification forecasting
//!
//! The series is differenced once and an ARMA(p, q) with intercept is fitted
//! to the differences by conditional sum of squares. The order is chosen by
//! AIC over a small grid, starting from (1, 1, 1).

use crate::config::StatisticalConfig;
use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ModelFamily, ModelKind, TrainedForecastModel};
use forecast_math::{difference, minimize_bounded, stats, undifference, NelderMeadConfig};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Bound on every AR and MA coefficient
const COEFFICIENT_BOUND: f64 = 0.99;

/// ARIMA order `(p, d, q)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

/// ARIMA model with automatic order selection
#[derive(Debug, Clone)]
pub struct ArimaModel {
    /// Largest AR order tried
    max_p: usize,
    /// Largest MA order tried
    max_q: usize,
    min_observations: usize,
    optimizer: NelderMeadConfig,
}

/// Trained ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedArimaModel {
    order: ArimaOrder,
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    /// Observed levels
    history: Vec<f64>,
    /// First differences of the history
    differenced: Vec<f64>,
    residuals: Vec<f64>,
    aic: f64,
}

/// Result of fitting one candidate order
#[derive(Debug, Clone)]
struct ArimaFit {
    p: usize,
    q: usize,
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    residuals: Vec<f64>,
    aic: f64,
}

impl ArimaModel {
    /// Create an ARIMA model searching `p <= max_p`, `q <= max_q`
    pub fn new(max_p: usize, max_q: usize, min_observations: usize) -> Result<Self> {
        if min_observations < 3 {
            return Err(ForecastError::InvalidParameter(
                "ARIMA needs at least 3 observations".to_string(),
            ));
        }

        Ok(Self {
            max_p,
            max_q,
            min_observations,
            optimizer: NelderMeadConfig::default(),
        })
    }

    pub fn from_config(config: &StatisticalConfig) -> Self {
        Self {
            max_p: config.arima_max_p,
            max_q: config.arima_max_q,
            min_observations: config.arima_min_observations,
            optimizer: NelderMeadConfig {
                max_iters: config.optimizer_max_iters,
                ..NelderMeadConfig::default()
            },
        }
    }

    /// Candidate `(p, q)` pairs, starting from `(1, 1)`
    fn candidate_orders(&self) -> Vec<(usize, usize)> {
        let mut orders = Vec::new();
        if self.max_p >= 1 && self.max_q >= 1 {
            orders.push((1, 1));
        }
        for p in 0..=self.max_p {
            for q in 0..=self.max_q {
                if (p, q) != (1, 1) {
                    orders.push((p, q));
                }
            }
        }
        orders
    }

    fn fit_order(&self, differenced: &[f64], p: usize, q: usize) -> Result<ArimaFit> {
        let start = p.max(q);
        if differenced.len() < start + 2 {
            return Err(ForecastError::InsufficientData {
                needed: start + 3,
                got: differenced.len() + 1,
            });
        }

        let mean = stats::mean(differenced).unwrap_or(0.0);
        let mut initial = vec![mean];
        initial.extend((0..p).map(|i| 0.1 / (i + 1) as f64));
        initial.extend(std::iter::repeat(0.0).take(q));

        let mut bounds = vec![(f64::NEG_INFINITY, f64::INFINITY)];
        bounds.extend(std::iter::repeat((-COEFFICIENT_BOUND, COEFFICIENT_BOUND)).take(p + q));

        let objective = |params: &[f64]| {
            let residuals = conditional_residuals(differenced, params[0], &params[1..=p], &params[1 + p..]);
            residuals[start..].iter().map(|e| e * e).sum::<f64>()
        };
        let minimum = minimize_bounded(objective, &initial, &bounds, self.optimizer)?;

        let params = minimum.point;
        let intercept = params[0];
        let ar = params[1..=p].to_vec();
        let ma = params[1 + p..].to_vec();
        let residuals = conditional_residuals(differenced, intercept, &ar, &ma);

        let effective = (differenced.len() - start) as f64;
        let sigma2 = (minimum.cost / effective).max(f64::MIN_POSITIVE);
        let n_params = (1 + p + q + 1) as f64;
        let aic = effective * sigma2.ln() + 2.0 * n_params;

        Ok(ArimaFit {
            p,
            q,
            intercept,
            ar,
            ma,
            residuals,
            aic,
        })
    }
}

/// One-step conditional residuals of an ARMA model on `w`
///
/// Residuals before the first fully-determined step are zero.
fn conditional_residuals(w: &[f64], intercept: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let start = ar.len().max(ma.len());
    let mut residuals = vec![0.0; w.len()];
    for t in start..w.len() {
        residuals[t] = w[t] - arma_step(w, &residuals, t, intercept, ar, ma);
    }
    residuals
}

/// ARMA prediction for index `t` from values and residuals before it
fn arma_step(w: &[f64], residuals: &[f64], t: usize, intercept: f64, ar: &[f64], ma: &[f64]) -> f64 {
    let mut prediction = intercept;
    for (i, phi) in ar.iter().enumerate() {
        prediction += phi * (w[t - 1 - i] - intercept);
    }
    for (j, theta) in ma.iter().enumerate() {
        prediction += theta * residuals[t - 1 - j];
    }
    prediction
}

impl ForecastModel for ArimaModel {
    fn name(&self) -> &str {
        ModelKind::Arima.name()
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Statistical
    }

    fn min_observations(&self) -> usize {
        self.min_observations
    }

    fn train(&self, series: &TimeSeries) -> Result<Box<dyn TrainedForecastModel>> {
        self.check_length(series)?;
        let history = series.values().to_vec();
        let differenced = difference(&history, 1)?;

        let mut best: Option<ArimaFit> = None;
        for (p, q) in self.candidate_orders() {
            match self.fit_order(&differenced, p, q) {
                Ok(fit) if fit.aic.is_finite() => {
                    debug!(p, q, aic = fit.aic, "Fitted ARIMA candidate");
                    if best.as_ref().map_or(true, |b| fit.aic < b.aic) {
                        best = Some(fit);
                    }
                }
                Ok(_) => debug!(p, q, "Discarding ARIMA candidate with non-finite AIC"),
                Err(err) => debug!(p, q, error = %err, "ARIMA candidate failed"),
            }
        }

        let fit = best.ok_or_else(|| {
            ForecastError::FitError("No ARIMA order could be fitted".to_string())
        })?;
        let order = ArimaOrder { p: fit.p, d: 1, q: fit.q };
        info!(%order, aic = fit.aic, "Selected ARIMA order");

        Ok(Box::new(TrainedArimaModel {
            order,
            intercept: fit.intercept,
            ar: fit.ar,
            ma: fit.ma,
            history,
            differenced,
            residuals: fit.residuals,
            aic: fit.aic,
        }))
    }
}

impl TrainedArimaModel {
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }
}

impl TrainedForecastModel for TrainedArimaModel {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let mut w = self.differenced.clone();
        let mut residuals = self.residuals.clone();
        for _ in 0..horizon {
            let t = w.len();
            let next = arma_step(&w, &residuals, t, self.intercept, &self.ar, &self.ma);
            w.push(next);
            residuals.push(0.0);
        }

        let levels = undifference(&self.history, &w[self.differenced.len()..], 1)?;
        if levels.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ForecastingError(format!(
                "ARIMA{} produced non-finite forecasts",
                self.order
            )));
        }
        Ok(levels)
    }

    fn name(&self) -> &str {
        ModelKind::Arima.name()
    }
}
