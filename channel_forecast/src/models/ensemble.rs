//! Tree-ensemble forecasters
//!
//! Random forest and two gradient-boosting variants share the feature
//! pipeline and forecast recursively: each prediction is floored at zero and
//! pushed into the sliding window that feeds the next step's lag and rolling
//! features.

use crate::config::{BoostingParams, ForestParams, MachineLearningConfig};
use crate::data::{Frequency, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::features::{fill_row, FeatureSpec};
use crate::models::trees::{RegressionTree, TreeParams};
use crate::models::{ForecastModel, ModelFamily, ModelKind, TrainedForecastModel};
use chrono::NaiveDate;
use forecast_math::RingBuffer;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::fmt::Debug;
use tracing::debug;

/// A fitted regressor over feature rows
pub trait Regressor: Debug {
    fn predict(&self, row: ArrayView1<'_, f64>) -> f64;
}

/// Bagged regression trees with bootstrap resampling
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(
        features: &Array2<f64>,
        targets: &[f64],
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self> {
        let n = targets.len();
        if n == 0 {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            max_leaves: None,
            min_samples_leaf: params.min_samples_leaf,
            min_samples_split: params.min_samples_split,
            l2_regularization: 0.0,
            colsample: 1.0,
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(features, targets, &samples, &tree_params, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        sum / self.trees.len() as f64
    }
}

/// Gradient-boosted trees on squared error
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    base: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn fit(
        features: &Array2<f64>,
        targets: &[f64],
        params: &BoostingParams,
        seed: u64,
    ) -> Result<Self> {
        let n = targets.len();
        if n == 0 {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            max_leaves: params.max_leaves,
            min_samples_leaf: params.min_samples_leaf,
            min_samples_split: 2 * params.min_samples_leaf,
            l2_regularization: params.l2_regularization,
            colsample: params.colsample,
        };
        let rows_per_round = ((params.subsample * n as f64).round() as usize).clamp(1, n);

        let base = targets.iter().sum::<f64>() / n as f64;
        let mut fitted = vec![base; n];
        let mut residuals = vec![0.0; n];
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            for i in 0..n {
                residuals[i] = targets[i] - fitted[i];
            }
            let samples = index::sample(&mut rng, n, rows_per_round).into_vec();
            let tree = RegressionTree::fit(features, &residuals, &samples, &tree_params, &mut rng)?;
            for (i, value) in fitted.iter_mut().enumerate() {
                *value += params.learning_rate * tree.predict(features.row(i));
            }
            trees.push(tree);
        }

        Ok(Self {
            base,
            learning_rate: params.learning_rate,
            trees,
        })
    }
}

impl Regressor for GradientBoosting {
    fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.base
            + self.learning_rate * self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>()
    }
}

#[derive(Debug, Clone)]
enum EnsembleKind {
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
}

/// Tree-ensemble forecaster over engineered features
#[derive(Debug, Clone)]
pub struct TreeEnsembleModel {
    name: String,
    kind: EnsembleKind,
    spec: FeatureSpec,
    min_observations: usize,
    seed: u64,
}

/// Trained tree-ensemble forecaster
#[derive(Debug)]
pub struct TrainedTreeEnsemble {
    name: String,
    spec: FeatureSpec,
    regressor: Box<dyn Regressor>,
    fill_values: Vec<f64>,
    /// Most recent observations, oldest first
    history: RingBuffer,
    frequency: Frequency,
    last_period: NaiveDate,
    /// Trend index of the first forecast period
    next_trend: usize,
}

impl TreeEnsembleModel {
    pub fn random_forest(config: &MachineLearningConfig, frequency: Frequency) -> Self {
        Self::with_kind(
            ModelKind::RandomForest.name(),
            EnsembleKind::RandomForest(config.random_forest.clone()),
            config,
            frequency,
        )
    }

    pub fn gradient_boosting(
        name: &str,
        params: BoostingParams,
        config: &MachineLearningConfig,
        frequency: Frequency,
    ) -> Self {
        Self::with_kind(name, EnsembleKind::GradientBoosting(params), config, frequency)
    }

    fn with_kind(
        name: &str,
        kind: EnsembleKind,
        config: &MachineLearningConfig,
        frequency: Frequency,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            spec: feature_spec(config, frequency),
            min_observations: config.min_observations,
            seed: config.seed,
        }
    }

    pub fn feature_spec(&self) -> &FeatureSpec {
        &self.spec
    }
}

/// Feature layout from the configuration, or the default layout if invalid
fn feature_spec(config: &MachineLearningConfig, frequency: Frequency) -> FeatureSpec {
    FeatureSpec::new(frequency, config.lags.clone(), config.rolling_windows.clone())
        .unwrap_or_else(|_| FeatureSpec::default_for(frequency))
}

impl ForecastModel for TreeEnsembleModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::MachineLearning
    }

    fn min_observations(&self) -> usize {
        self.min_observations
    }

    fn train(&self, series: &TimeSeries) -> Result<Box<dyn TrainedForecastModel>> {
        self.check_length(series)?;
        let set = self.spec.training_set(series)?;

        let regressor: Box<dyn Regressor> = match &self.kind {
            EnsembleKind::RandomForest(params) => {
                Box::new(RandomForest::fit(&set.features, &set.targets, params, self.seed)?)
            }
            EnsembleKind::GradientBoosting(params) => {
                Box::new(GradientBoosting::fit(&set.features, &set.targets, params, self.seed)?)
            }
        };
        debug!(
            model = %self.name,
            rows = set.targets.len(),
            features = self.spec.width(),
            "Trained tree ensemble"
        );

        Ok(Box::new(TrainedTreeEnsemble {
            name: self.name.clone(),
            spec: self.spec.clone(),
            regressor,
            fill_values: set.fill_values,
            history: RingBuffer::from_slice(self.spec.history_len(), series.values())?,
            frequency: series.frequency(),
            last_period: series.last_period(),
            next_trend: series.len(),
        }))
    }
}

impl TrainedForecastModel for TrainedTreeEnsemble {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let mut history = self.history.clone();
        let mut forecasts = Vec::with_capacity(horizon);

        for step in 1..=horizon {
            let period = self.frequency.advance(self.last_period, step)?;
            let raw = self.spec.row(period, self.next_trend + step - 1, &history);
            let row = Array1::from(fill_row(&raw, &self.fill_values));
            let prediction = self.regressor.predict(row.view());
            if !prediction.is_finite() {
                return Err(ForecastError::ForecastingError(format!(
                    "{} produced a non-finite prediction at step {}",
                    self.name, step
                )));
            }

            let value = prediction.max(0.0);
            history.push(value);
            forecasts.push(value);
        }

        Ok(forecasts)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
