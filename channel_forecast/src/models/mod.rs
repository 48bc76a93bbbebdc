//! Forecasting models for notification time series
//!
//! Every model follows the same two-step shape: an untrained
//! [`ForecastModel`] holds hyperparameters and fits itself to a series,
//! producing a [`TrainedForecastModel`] that extrapolates past the end of
//! that series. Models are boxed so the orchestrator can run a mixed panel.

use crate::config::ForecastConfig;
use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

pub mod arima;
pub mod ensemble;
pub mod exponential_smoothing;
pub mod features;
pub mod neural;
pub mod sarima;
pub mod sequence;
pub mod trees;

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Forecast the `horizon` periods after the training series
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a notification series
pub trait ForecastModel: Debug {
    /// Name of the model, also the key of its forecasts
    fn name(&self) -> &str;

    fn family(&self) -> ModelFamily;

    /// Shortest series the model will attempt to fit
    fn min_observations(&self) -> usize;

    /// Train the model on a prepared series
    fn train(&self, series: &TimeSeries) -> Result<Box<dyn TrainedForecastModel>>;

    /// Fail with [`ForecastError::InsufficientData`] if the series is too short
    fn check_length(&self, series: &TimeSeries) -> Result<()> {
        let needed = self.min_observations();
        if series.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: series.len(),
            });
        }
        Ok(())
    }
}

/// Model families, trained in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelFamily {
    Statistical,
    MachineLearning,
    Sequence,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::Statistical,
        ModelFamily::MachineLearning,
        ModelFamily::Sequence,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ModelFamily::Statistical => "Statistical",
            ModelFamily::MachineLearning => "Machine Learning",
            ModelFamily::Sequence => "Deep Learning",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The fixed panel of models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Arima,
    Sarima,
    Ets,
    RandomForest,
    XGBoost,
    LightGbm,
    Lstm,
    NBeats,
}

impl ModelKind {
    /// Every model in panel order
    pub const ALL: [ModelKind; 8] = [
        ModelKind::Arima,
        ModelKind::Sarima,
        ModelKind::Ets,
        ModelKind::RandomForest,
        ModelKind::XGBoost,
        ModelKind::LightGbm,
        ModelKind::Lstm,
        ModelKind::NBeats,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Arima => "ARIMA",
            ModelKind::Sarima => "SARIMA",
            ModelKind::Ets => "ETS",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::XGBoost => "XGBoost",
            ModelKind::LightGbm => "LightGBM",
            ModelKind::Lstm => "LSTM",
            ModelKind::NBeats => "N-BEATS",
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            ModelKind::Arima | ModelKind::Sarima | ModelKind::Ets => ModelFamily::Statistical,
            ModelKind::RandomForest | ModelKind::XGBoost | ModelKind::LightGbm => {
                ModelFamily::MachineLearning
            }
            ModelKind::Lstm | ModelKind::NBeats => ModelFamily::Sequence,
        }
    }

    /// Look a model up by its display name
    pub fn from_name(name: &str) -> Option<ModelKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Build the untrained model configured for a run
    pub fn build(&self, config: &ForecastConfig) -> Box<dyn ForecastModel> {
        let frequency = config.frequency;
        match self {
            ModelKind::Arima => Box::new(arima::ArimaModel::from_config(&config.statistical)),
            ModelKind::Sarima => Box::new(sarima::SarimaModel::from_config(
                &config.statistical,
                frequency,
            )),
            ModelKind::Ets => Box::new(exponential_smoothing::EtsModel::from_config(
                &config.statistical,
                frequency,
            )),
            ModelKind::RandomForest => Box::new(ensemble::TreeEnsembleModel::random_forest(
                &config.machine_learning,
                frequency,
            )),
            ModelKind::XGBoost => Box::new(ensemble::TreeEnsembleModel::gradient_boosting(
                self.name(),
                config.machine_learning.xgboost.clone(),
                &config.machine_learning,
                frequency,
            )),
            ModelKind::LightGbm => Box::new(ensemble::TreeEnsembleModel::gradient_boosting(
                self.name(),
                config.machine_learning.lightgbm.clone(),
                &config.machine_learning,
                frequency,
            )),
            ModelKind::Lstm => Box::new(sequence::SequenceModel::lstm(&config.sequence, frequency)),
            ModelKind::NBeats => {
                Box::new(sequence::SequenceModel::nbeats(&config.sequence, frequency))
            }
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build every model of the panel, in panel order
pub fn default_panel(config: &ForecastConfig) -> Vec<Box<dyn ForecastModel>> {
    ModelKind::ALL
        .iter()
        .map(|kind| kind.build(config))
        .collect()
}
