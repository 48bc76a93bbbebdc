//! Per-channel model orchestration
//!
//! The orchestrator trains every model of the panel on one channel's series,
//! isolating each model's failures, and merges the surviving outputs onto a
//! single future grid.

use crate::config::ForecastConfig;
use crate::data::{TimeSeries, MIN_OBSERVATIONS};
use crate::error::{ForecastError, Result};
use crate::forecast::{Forecast, ForecastSet};
use crate::models::{default_panel, ForecastModel, ModelFamily};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Progress of one channel through the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelState {
    NotStarted,
    Preparing,
    TrainingStatistical,
    TrainingMachineLearning,
    TrainingSequence,
    Merging,
    Done,
    InsufficientData,
}

impl ChannelState {
    fn training(family: ModelFamily) -> Self {
        match family {
            ModelFamily::Statistical => ChannelState::TrainingStatistical,
            ModelFamily::MachineLearning => ChannelState::TrainingMachineLearning,
            ModelFamily::Sequence => ChannelState::TrainingSequence,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Done | ChannelState::InsufficientData)
    }
}

/// Why a model has no forecast for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    InsufficientData,
    FitFailure,
    ForecastFailure,
    AlignmentFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::InsufficientData => "insufficient data",
            FailureKind::FitFailure => "fit failure",
            FailureKind::ForecastFailure => "forecast failure",
            FailureKind::AlignmentFailure => "alignment failure",
        };
        f.write_str(label)
    }
}

/// A model that produced no forecast, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFailure {
    pub model: String,
    pub family: ModelFamily,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of running the panel on one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelForecast {
    state: ChannelState,
    transitions: Vec<ChannelState>,
    /// Future periods every forecast is aligned to
    grid: Vec<NaiveDate>,
    forecasts: ForecastSet,
    failures: Vec<ModelFailure>,
}

impl ChannelForecast {
    fn started() -> Self {
        Self {
            state: ChannelState::NotStarted,
            transitions: vec![ChannelState::NotStarted],
            grid: Vec::new(),
            forecasts: ForecastSet::new(),
            failures: Vec::new(),
        }
    }

    /// Outcome for a channel too short to train anything on
    pub fn insufficient_data() -> Self {
        let mut outcome = Self::started();
        outcome.enter(ChannelState::Preparing);
        outcome.enter(ChannelState::InsufficientData);
        outcome
    }

    fn enter(&mut self, state: ChannelState) {
        debug!(from = ?self.state, to = ?state, "Channel state transition");
        self.state = state;
        self.transitions.push(state);
    }

    fn fail(&mut self, model: &dyn ForecastModel, kind: FailureKind, message: String) {
        warn!(model = model.name(), kind = %kind, %message, "Model produced no forecast");
        self.failures.push(ModelFailure {
            model: model.name().to_string(),
            family: model.family(),
            kind,
            message,
        });
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Every state visited, in order
    pub fn transitions(&self) -> &[ChannelState] {
        &self.transitions
    }

    pub fn grid(&self) -> &[NaiveDate] {
        &self.grid
    }

    pub fn forecasts(&self) -> &ForecastSet {
        &self.forecasts
    }

    pub fn failures(&self) -> &[ModelFailure] {
        &self.failures
    }

    pub fn failure(&self, model: &str) -> Option<&ModelFailure> {
        self.failures.iter().find(|f| f.model == model)
    }
}

/// Raw output of a trained model, before alignment
struct Candidate<'a> {
    model: &'a dyn ForecastModel,
    values: Vec<f64>,
}

/// Runs a panel of models over channel series
#[derive(Debug)]
pub struct ForecastOrchestrator {
    models: Vec<Box<dyn ForecastModel>>,
}

impl ForecastOrchestrator {
    /// Orchestrator over the full model panel
    pub fn new(config: &ForecastConfig) -> Self {
        Self::with_models(default_panel(config))
    }

    /// Orchestrator over a custom set of models
    pub fn with_models(models: Vec<Box<dyn ForecastModel>>) -> Self {
        Self { models }
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name())
    }

    /// Train every model on `series` and forecast `horizon` periods
    ///
    /// Model failures are recorded on the returned outcome; only an invalid
    /// horizon or an unrepresentable future grid is an error.
    pub fn train_and_forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ChannelForecast> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be at least 1".to_string(),
            ));
        }

        let mut outcome = ChannelForecast::started();
        outcome.enter(ChannelState::Preparing);
        if series.len() < MIN_OBSERVATIONS {
            warn!(observations = series.len(), "Series too short to forecast");
            outcome.enter(ChannelState::InsufficientData);
            return Ok(outcome);
        }
        outcome.grid = series.future_periods(horizon)?;

        let mut candidates = Vec::with_capacity(self.models.len());
        for family in ModelFamily::ALL {
            let members: Vec<&dyn ForecastModel> = self
                .models
                .iter()
                .filter(|m| m.family() == family)
                .map(|m| m.as_ref())
                .collect();
            if members.is_empty() {
                continue;
            }

            outcome.enter(ChannelState::training(family));
            for model in members {
                if let Some(values) = run_model(model, series, horizon, &mut outcome) {
                    candidates.push(Candidate { model, values });
                }
            }
        }

        outcome.enter(ChannelState::Merging);
        self.merge(candidates, &mut outcome);
        outcome.enter(ChannelState::Done);

        info!(
            observations = series.len(),
            horizon,
            succeeded = outcome.forecasts.len(),
            failed = outcome.failures.len(),
            "Channel forecast complete"
        );
        Ok(outcome)
    }

    /// Place candidates on the grid in panel order
    fn merge(&self, mut candidates: Vec<Candidate<'_>>, outcome: &mut ChannelForecast) {
        let horizon = outcome.grid.len();
        let order = |name: &str| self.models.iter().position(|m| m.name() == name);
        candidates.sort_by_key(|c| order(c.model.name()));

        for Candidate { model, mut values } in candidates {
            if values.len() < horizon {
                let message = ForecastError::AlignmentFailure(format!(
                    "{} values cover a {}-period grid",
                    values.len(),
                    horizon
                ));
                outcome.fail(model, FailureKind::AlignmentFailure, message.to_string());
                continue;
            }
            if values.len() > horizon {
                warn!(
                    model = model.name(),
                    produced = values.len(),
                    horizon,
                    "Clipping forecast to the grid"
                );
                values.truncate(horizon);
            }
            if values.iter().any(|v| !v.is_finite()) {
                outcome.fail(
                    model,
                    FailureKind::ForecastFailure,
                    "Forecast contains non-finite values".to_string(),
                );
                continue;
            }

            let values = values.into_iter().map(|v| v.max(0.0)).collect();
            match Forecast::new(model.name(), outcome.grid.clone(), values) {
                Ok(forecast) => outcome.forecasts.insert(forecast),
                Err(e) => outcome.fail(model, FailureKind::AlignmentFailure, e.to_string()),
            }
        }
    }
}

/// Train and forecast with one model, recording any failure
fn run_model(
    model: &dyn ForecastModel,
    series: &TimeSeries,
    horizon: usize,
    outcome: &mut ChannelForecast,
) -> Option<Vec<f64>> {
    let trained = match model.train(series) {
        Ok(trained) => trained,
        Err(e @ ForecastError::InsufficientData { .. }) => {
            outcome.fail(model, FailureKind::InsufficientData, e.to_string());
            return None;
        }
        Err(e) => {
            outcome.fail(model, FailureKind::FitFailure, e.to_string());
            return None;
        }
    };

    match trained.forecast(horizon) {
        Ok(values) => {
            info!(model = model.name(), family = %model.family(), "Model forecast succeeded");
            Some(values)
        }
        Err(e) => {
            outcome.fail(model, FailureKind::ForecastFailure, e.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Frequency;
    use crate::models::TrainedForecastModel;

    /// Test double returning a fixed output
    #[derive(Debug, Clone)]
    struct FixedModel {
        name: &'static str,
        family: ModelFamily,
        output: std::result::Result<Vec<f64>, &'static str>,
    }

    #[derive(Debug)]
    struct FixedTrained {
        name: &'static str,
        values: Vec<f64>,
    }

    impl TrainedForecastModel for FixedTrained {
        fn forecast(&self, _horizon: usize) -> Result<Vec<f64>> {
            Ok(self.values.clone())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    impl ForecastModel for FixedModel {
        fn name(&self) -> &str {
            self.name
        }

        fn family(&self) -> ModelFamily {
            self.family
        }

        fn min_observations(&self) -> usize {
            2
        }

        fn train(&self, series: &TimeSeries) -> Result<Box<dyn TrainedForecastModel>> {
            self.check_length(series)?;
            match &self.output {
                Ok(values) => Ok(Box::new(FixedTrained {
                    name: self.name,
                    values: values.clone(),
                })),
                Err(message) => Err(ForecastError::FitError(message.to_string())),
            }
        }
    }

    fn fixed(name: &'static str, family: ModelFamily, output: std::result::Result<Vec<f64>, &'static str>) -> Box<dyn ForecastModel> {
        Box::new(FixedModel { name, family, output })
    }

    fn series(len: usize) -> TimeSeries {
        TimeSeries::new(
            Frequency::Monthly,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            (0..len).map(|i| 10.0 + i as f64).collect(),
        )
        .unwrap()
    }

    #[test]
    fn merges_clips_and_records_failures() {
        let orchestrator = ForecastOrchestrator::with_models(vec![
            fixed("short", ModelFamily::Statistical, Ok(vec![1.0])),
            fixed("long", ModelFamily::Statistical, Ok(vec![1.0, 2.0, 3.0, 4.0])),
            fixed("broken", ModelFamily::MachineLearning, Err("no fit")),
            fixed("negative", ModelFamily::Sequence, Ok(vec![-1.0, 2.0, 3.0])),
            fixed("nan", ModelFamily::Sequence, Ok(vec![1.0, f64::NAN, 3.0])),
        ]);
        let outcome = orchestrator.train_and_forecast(&series(6), 3).unwrap();

        assert_eq!(outcome.state(), ChannelState::Done);
        assert_eq!(outcome.grid().len(), 3);
        assert_eq!(outcome.grid()[0], NaiveDate::from_ymd_opt(2023, 7, 1).unwrap());
        assert_eq!(
            outcome.forecasts().model_names().collect::<Vec<_>>(),
            vec!["long", "negative"]
        );
        assert_eq!(outcome.forecasts().get("long").unwrap().values(), &[1.0, 2.0, 3.0]);
        assert_eq!(outcome.forecasts().get("negative").unwrap().values(), &[0.0, 2.0, 3.0]);

        assert_eq!(outcome.failure("short").unwrap().kind, FailureKind::AlignmentFailure);
        assert_eq!(outcome.failure("broken").unwrap().kind, FailureKind::FitFailure);
        assert_eq!(outcome.failure("nan").unwrap().kind, FailureKind::ForecastFailure);
    }

    #[test]
    fn visits_each_family_with_models() {
        let orchestrator = ForecastOrchestrator::with_models(vec![
            fixed("a", ModelFamily::Statistical, Ok(vec![1.0, 1.0])),
            fixed("b", ModelFamily::Sequence, Ok(vec![2.0, 2.0])),
        ]);
        let outcome = orchestrator.train_and_forecast(&series(4), 2).unwrap();
        assert_eq!(
            outcome.transitions(),
            &[
                ChannelState::NotStarted,
                ChannelState::Preparing,
                ChannelState::TrainingStatistical,
                ChannelState::TrainingSequence,
                ChannelState::Merging,
                ChannelState::Done,
            ]
        );
    }

    #[test]
    fn single_observation_is_insufficient() {
        let orchestrator =
            ForecastOrchestrator::with_models(vec![fixed("a", ModelFamily::Statistical, Ok(vec![1.0]))]);
        let outcome = orchestrator.train_and_forecast(&series(1), 3).unwrap();
        assert_eq!(outcome.state(), ChannelState::InsufficientData);
        assert!(outcome.state().is_terminal());
        assert!(outcome.forecasts().is_empty());
        assert!(outcome.grid().is_empty());
    }

    #[test]
    fn too_short_for_a_model_is_recorded_as_insufficient() {
        let orchestrator = ForecastOrchestrator::new(&ForecastConfig::default());
        let outcome = orchestrator.train_and_forecast(&series(3), 2).unwrap();
        assert!(outcome.forecasts().is_empty());
        assert_eq!(outcome.failures().len(), 8);
        assert!(outcome
            .failures()
            .iter()
            .all(|f| f.kind == FailureKind::InsufficientData));
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let orchestrator = ForecastOrchestrator::with_models(Vec::new());
        assert!(orchestrator.train_and_forecast(&series(4), 0).is_err());
    }
}
