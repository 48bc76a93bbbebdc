//! Holdout evaluation and model ranking

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::forecast::ForecastSet;
use crate::metrics;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Accuracy metrics reported per model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Metric {
    Mae,
    Mse,
    Rmse,
    R2,
    Mape,
}

impl Metric {
    pub const ALL: [Metric; 5] = [Metric::Mae, Metric::Mse, Metric::Rmse, Metric::R2, Metric::Mape];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Mae => "MAE",
            Metric::Mse => "MSE",
            Metric::Rmse => "RMSE",
            Metric::R2 => "R2",
            Metric::Mape => "MAPE",
        }
    }

    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::R2)
    }

    fn improves(&self, candidate: f64, best: f64) -> bool {
        if self.higher_is_better() {
            candidate > best
        } else {
            candidate < best
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Metric values for one model; undefined metrics are `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSet {
    pub mae: Option<f64>,
    pub mse: Option<f64>,
    pub rmse: Option<f64>,
    pub r2: Option<f64>,
    pub mape: Option<f64>,
}

impl MetricSet {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            mae: metrics::mae(actual, predicted),
            mse: metrics::mse(actual, predicted),
            rmse: metrics::rmse(actual, predicted),
            r2: metrics::r_squared(actual, predicted),
            mape: metrics::mape(actual, predicted),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Mae => self.mae,
            Metric::Mse => self.mse,
            Metric::Rmse => self.rmse,
            Metric::R2 => self.r2,
            Metric::Mape => self.mape,
        }
    }

    /// Defined metrics keyed by label
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        Metric::ALL
            .iter()
            .filter_map(|m| self.get(*m).map(|v| (m.label(), v)))
            .collect()
    }
}

/// Scores of one model; `None` when its forecast could not be scored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEvaluation {
    pub model: String,
    pub metrics: Option<MetricSet>,
}

/// Best model for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestModel {
    pub metric: Metric,
    pub model: String,
    pub value: f64,
}

/// Best model per metric, for metrics any model could be scored on
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BestModels {
    entries: Vec<BestModel>,
}

impl BestModels {
    pub fn get(&self, metric: Metric) -> Option<&BestModel> {
        self.entries.iter().find(|b| b.metric == metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BestModel> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluation of every forecast of a channel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelEvaluation {
    /// Number of trailing observations scored
    pub holdout: usize,
    pub entries: Vec<ModelEvaluation>,
}

impl ChannelEvaluation {
    pub fn get(&self, model: &str) -> Option<&ModelEvaluation> {
        self.entries.iter().find(|e| e.model == model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best model per metric; ties keep the earlier model
    pub fn best_models(&self) -> BestModels {
        let entries = Metric::ALL
            .iter()
            .filter_map(|&metric| {
                let mut best: Option<(&str, f64)> = None;
                for entry in &self.entries {
                    let Some(value) = entry.metrics.and_then(|m| m.get(metric)) else {
                        continue;
                    };
                    if !value.is_finite() {
                        continue;
                    }
                    if best.map_or(true, |(_, current)| metric.improves(value, current)) {
                        best = Some((entry.model.as_str(), value));
                    }
                }
                best.map(|(model, value)| BestModel {
                    metric,
                    model: model.to_string(),
                    value,
                })
            })
            .collect();
        BestModels { entries }
    }

    /// Keep exactly the models of `forecasts`, in their order
    ///
    /// Models without a score here get an empty metric set.
    pub fn aligned_to(&self, forecasts: &ForecastSet) -> Self {
        let entries = forecasts
            .model_names()
            .map(|name| ModelEvaluation {
                model: name.to_string(),
                metrics: self.get(name).and_then(|e| e.metrics),
            })
            .collect();
        Self {
            holdout: self.holdout,
            entries,
        }
    }
}

/// Scores forecasts against the trailing observations of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    holdout: usize,
}

impl Evaluator {
    pub fn new(holdout: usize) -> Result<Self> {
        if holdout == 0 {
            return Err(ForecastError::EvaluationFailure(
                "Holdout must contain at least one observation".to_string(),
            ));
        }
        Ok(Self { holdout })
    }

    /// 3 points for horizons up to 12, otherwise 12
    pub fn for_horizon(horizon: usize) -> Self {
        Self {
            holdout: if horizon > 12 { 12 } else { 3 },
        }
    }

    pub fn holdout(&self) -> usize {
        self.holdout
    }

    /// Compare the first `holdout` forecast values with the last `holdout`
    /// observations of `series`
    ///
    /// Forecasts shorter than the holdout, or a series shorter than it,
    /// leave the model's metric set empty.
    pub fn evaluate(&self, series: &TimeSeries, forecasts: &ForecastSet) -> ChannelEvaluation {
        let k = self.holdout;
        let actual = (series.len() >= k).then(|| series.tail(k));

        let entries = forecasts
            .iter()
            .map(|forecast| {
                let metrics = match actual {
                    Some(actual) if forecast.len() >= k => {
                        Some(MetricSet::compute(actual, &forecast.values()[..k]))
                    }
                    _ => None,
                };
                debug!(model = forecast.model(), scored = metrics.is_some(), "Evaluated forecast");
                ModelEvaluation {
                    model: forecast.model().to_string(),
                    metrics,
                }
            })
            .collect();

        ChannelEvaluation {
            holdout: k,
            entries,
        }
    }
}
