//! Run configuration
//!
//! Every knob has a default matching the reference model panel, so an empty
//! JSON object is a valid configuration file.

use crate::data::Frequency;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default forecast horizon in periods
pub const DEFAULT_HORIZON: usize = 12;

/// Top-level configuration for a forecasting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub frequency: Frequency,
    pub horizon: usize,
    /// Also forecast the sum over all channels
    pub include_total: bool,
    pub statistical: StatisticalConfig,
    pub machine_learning: MachineLearningConfig,
    pub sequence: SequenceConfig,
    pub evaluation: EvaluationConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::Monthly,
            horizon: DEFAULT_HORIZON,
            include_total: true,
            statistical: StatisticalConfig::default(),
            machine_learning: MachineLearningConfig::default(),
            sequence: SequenceConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl ForecastConfig {
    /// Default configuration for the given sampling frequency
    pub fn for_frequency(frequency: Frequency) -> Self {
        Self {
            frequency,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every parameter lies in its valid range
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(invalid("horizon must be at least 1"));
        }
        if let Some(0) = self.evaluation.holdout {
            return Err(invalid("evaluation.holdout must be at least 1"));
        }
        self.statistical.validate()?;
        self.machine_learning.validate()?;
        self.sequence.validate()
    }

    /// Number of trailing observations scored by the evaluator
    pub fn holdout(&self) -> usize {
        self.evaluation.holdout_for(self.horizon)
    }
}

/// ARIMA, SARIMA and ETS settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticalConfig {
    pub arima_min_observations: usize,
    pub arima_max_p: usize,
    pub arima_max_q: usize,
    /// Full seasonal cycles SARIMA needs before it is attempted
    pub sarima_min_cycles: usize,
    pub ets_min_observations: usize,
    /// Full seasonal cycles before ETS adds a seasonal component
    pub ets_seasonal_cycles: usize,
    /// Lower bound applied to ETS forecasts
    pub ets_floor: f64,
    pub optimizer_max_iters: u64,
}

impl Default for StatisticalConfig {
    fn default() -> Self {
        Self {
            arima_min_observations: 6,
            arima_max_p: 2,
            arima_max_q: 2,
            sarima_min_cycles: 2,
            ets_min_observations: 12,
            ets_seasonal_cycles: 2,
            ets_floor: 1.0,
            optimizer_max_iters: 500,
        }
    }
}

impl StatisticalConfig {
    fn validate(&self) -> Result<()> {
        if self.arima_min_observations < 3 {
            return Err(invalid("statistical.arima_min_observations must be at least 3"));
        }
        if self.sarima_min_cycles < 2 {
            return Err(invalid("statistical.sarima_min_cycles must be at least 2"));
        }
        if self.ets_min_observations < 2 {
            return Err(invalid("statistical.ets_min_observations must be at least 2"));
        }
        if self.ets_seasonal_cycles < 2 {
            return Err(invalid("statistical.ets_seasonal_cycles must be at least 2"));
        }
        if !self.ets_floor.is_finite() || self.ets_floor < 0.0 {
            return Err(invalid("statistical.ets_floor must be a non-negative number"));
        }
        if self.optimizer_max_iters == 0 {
            return Err(invalid("statistical.optimizer_max_iters must be positive"));
        }
        Ok(())
    }
}

/// Settings shared by the tree-ensemble models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineLearningConfig {
    pub min_observations: usize,
    pub lags: Vec<usize>,
    pub rolling_windows: Vec<usize>,
    pub seed: u64,
    pub random_forest: ForestParams,
    pub xgboost: BoostingParams,
    pub lightgbm: BoostingParams,
}

impl Default for MachineLearningConfig {
    fn default() -> Self {
        Self {
            min_observations: 12,
            lags: vec![1, 2, 3, 6, 12],
            rolling_windows: vec![3, 6, 12],
            seed: 42,
            random_forest: ForestParams::default(),
            xgboost: BoostingParams::xgboost(),
            lightgbm: BoostingParams::lightgbm(),
        }
    }
}

impl MachineLearningConfig {
    fn validate(&self) -> Result<()> {
        if self.min_observations < 2 {
            return Err(invalid("machine_learning.min_observations must be at least 2"));
        }
        if self.lags.is_empty() || self.lags.contains(&0) {
            return Err(invalid("machine_learning.lags must be non-empty and positive"));
        }
        if self.rolling_windows.contains(&0) {
            return Err(invalid("machine_learning.rolling_windows must be positive"));
        }
        self.random_forest.validate()?;
        self.xgboost.validate("xgboost")?;
        self.lightgbm.validate("lightgbm")
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 5,
            min_samples_leaf: 2,
            min_samples_split: 5,
        }
    }
}

impl ForestParams {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 || self.max_depth == 0 || self.min_samples_leaf == 0 {
            return Err(invalid(
                "random_forest n_estimators, max_depth and min_samples_leaf must be positive",
            ));
        }
        Ok(())
    }
}

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    /// Leaf budget for leaf-wise growth
    pub max_leaves: Option<usize>,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    /// Row fraction sampled per round
    pub subsample: f64,
    /// Feature fraction sampled per tree
    pub colsample: f64,
    pub l2_regularization: f64,
}

impl BoostingParams {
    /// Depth-limited boosting with L2-regularised leaves
    pub fn xgboost() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 4,
            max_leaves: None,
            learning_rate: 0.05,
            min_samples_leaf: 3,
            subsample: 0.8,
            colsample: 0.8,
            l2_regularization: 1.0,
        }
    }

    /// Leaf-wise boosting capped at 15 leaves
    pub fn lightgbm() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 4,
            max_leaves: Some(15),
            learning_rate: 0.05,
            min_samples_leaf: 5,
            subsample: 0.8,
            colsample: 0.8,
            l2_regularization: 0.0,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.n_estimators == 0 || self.max_depth == 0 || self.min_samples_leaf == 0 {
            return Err(invalid(&format!(
                "{} n_estimators, max_depth and min_samples_leaf must be positive",
                name
            )));
        }
        if let Some(leaves) = self.max_leaves {
            if leaves < 2 {
                return Err(invalid(&format!("{}.max_leaves must be at least 2", name)));
            }
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(invalid(&format!("{}.learning_rate must be in (0, 1]", name)));
        }
        for (field, value) in [("subsample", self.subsample), ("colsample", self.colsample)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(&format!("{}.{} must be in (0, 1]", name, field)));
            }
        }
        if !(self.l2_regularization >= 0.0) {
            return Err(invalid(&format!("{}.l2_regularization must be non-negative", name)));
        }
        Ok(())
    }
}

/// Settings shared by the LSTM and N-BEATS models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Input window length; defaults to 6 monthly or 12 weekly
    pub lookback: Option<usize>,
    /// Training epochs; defaults to 100 monthly or 50 weekly
    pub epochs: Option<usize>,
    pub hidden_size: usize,
    pub dropout: f64,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub validation_split: f64,
    pub nbeats_blocks: usize,
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            lookback: None,
            epochs: None,
            hidden_size: 32,
            dropout: 0.2,
            learning_rate: 0.005,
            batch_size: 8,
            validation_split: 0.1,
            nbeats_blocks: 3,
            seed: 42,
        }
    }
}

impl SequenceConfig {
    pub fn lookback(&self, frequency: Frequency) -> usize {
        self.lookback.unwrap_or(match frequency {
            Frequency::Monthly => 6,
            Frequency::Weekly => 12,
        })
    }

    pub fn epochs(&self, frequency: Frequency) -> usize {
        self.epochs.unwrap_or(match frequency {
            Frequency::Monthly => 100,
            Frequency::Weekly => 50,
        })
    }

    fn validate(&self) -> Result<()> {
        if matches!(self.lookback, Some(0)) || matches!(self.epochs, Some(0)) {
            return Err(invalid("sequence.lookback and sequence.epochs must be positive"));
        }
        if self.hidden_size == 0 || self.batch_size == 0 || self.nbeats_blocks == 0 {
            return Err(invalid(
                "sequence.hidden_size, batch_size and nbeats_blocks must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(invalid("sequence.dropout must be in [0, 1)"));
        }
        if !(0.0..0.5).contains(&self.validation_split) {
            return Err(invalid("sequence.validation_split must be in [0, 0.5)"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(invalid("sequence.learning_rate must be positive"));
        }
        Ok(())
    }
}

/// Holdout scoring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Fixed holdout length; derived from the horizon when unset
    pub holdout: Option<usize>,
    /// Refit on the series minus the holdout and score those forecasts
    pub backtest: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            holdout: None,
            backtest: true,
        }
    }
}

impl EvaluationConfig {
    /// 3 points for horizons up to a year of months, otherwise 12
    pub fn holdout_for(&self, horizon: usize) -> usize {
        self.holdout
            .unwrap_or(if horizon > 12 { 12 } else { 3 })
    }
}

fn invalid(message: &str) -> ForecastError {
    ForecastError::InvalidParameter(message.to_string())
}
