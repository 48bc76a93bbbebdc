//! End-to-end forecasting run over a prepared dataset

use crate::config::ForecastConfig;
use crate::data::{ChannelDataset, TimeSeries, MIN_OBSERVATIONS, TOTAL_CHANNEL};
use crate::error::Result;
use crate::evaluation::{ChannelEvaluation, Evaluator};
use crate::orchestrator::{ChannelForecast, ChannelState, ForecastOrchestrator};
use crate::report::{ChannelReport, RunReport};
use tracing::{info, warn};

/// Forecasts and scores every channel of a dataset
#[derive(Debug)]
pub struct ForecastPipeline {
    config: ForecastConfig,
    orchestrator: ForecastOrchestrator,
    evaluator: Evaluator,
}

impl ForecastPipeline {
    /// Pipeline over the full model panel
    pub fn new(config: ForecastConfig) -> Result<Self> {
        let orchestrator = ForecastOrchestrator::new(&config);
        Self::with_orchestrator(config, orchestrator)
    }

    pub fn with_orchestrator(config: ForecastConfig, orchestrator: ForecastOrchestrator) -> Result<Self> {
        config.validate()?;
        let evaluator = Evaluator::new(config.holdout())?;
        Ok(Self {
            config,
            orchestrator,
            evaluator,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Run every channel, then the skipped channels, then the total
    pub fn run(&self, dataset: &ChannelDataset) -> Result<RunReport> {
        let mut channels = Vec::with_capacity(dataset.len() + dataset.skipped().len() + 1);

        for (name, series) in dataset.channels() {
            channels.push(self.run_channel(name, series)?);
        }
        for skipped in dataset.skipped() {
            warn!(
                channel = %skipped.channel,
                observations = skipped.observations,
                "Reporting channel as insufficient data"
            );
            channels.push(ChannelReport {
                channel: skipped.channel.clone(),
                observations: skipped.observations,
                outcome: ChannelForecast::insufficient_data(),
                evaluation: self.empty_evaluation(),
                best_models: Default::default(),
            });
        }
        if let Some(total) = dataset.total() {
            channels.push(self.run_channel(TOTAL_CHANNEL, total)?);
        }

        Ok(RunReport {
            frequency: dataset.frequency(),
            horizon: self.config.horizon,
            holdout: self.evaluator.holdout(),
            channels,
        })
    }

    /// Forecast and score one channel
    pub fn run_channel(&self, channel: &str, series: &TimeSeries) -> Result<ChannelReport> {
        info!(channel, observations = series.len(), "Forecasting channel");
        let outcome = self
            .orchestrator
            .train_and_forecast(series, self.config.horizon)?;
        let evaluation = self.evaluate(channel, series, &outcome)?;
        let best_models = evaluation.best_models();

        Ok(ChannelReport {
            channel: channel.to_string(),
            observations: series.len(),
            outcome,
            evaluation,
            best_models,
        })
    }

    /// Score a channel's forecasts on its holdout
    ///
    /// In backtest mode the panel is refitted without the holdout and those
    /// forecasts are scored; the entries still follow the final forecasts.
    fn evaluate(&self, channel: &str, series: &TimeSeries, outcome: &ChannelForecast) -> Result<ChannelEvaluation> {
        if outcome.state() != ChannelState::Done {
            return Ok(self.empty_evaluation());
        }

        let holdout = self.evaluator.holdout();
        let training = series
            .truncate_last(holdout)
            .filter(|t| t.len() >= MIN_OBSERVATIONS);
        match training {
            Some(training) if self.config.evaluation.backtest => {
                info!(channel, holdout, observations = training.len(), "Backtesting channel");
                let backtest = self.orchestrator.train_and_forecast(&training, holdout)?;
                Ok(self
                    .evaluator
                    .evaluate(series, backtest.forecasts())
                    .aligned_to(outcome.forecasts()))
            }
            _ => Ok(self.evaluator.evaluate(series, outcome.forecasts())),
        }
    }

    fn empty_evaluation(&self) -> ChannelEvaluation {
        ChannelEvaluation {
            holdout: self.evaluator.holdout(),
            entries: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Frequency, RawRecord};
    use chrono::NaiveDate;

    fn quick_config() -> ForecastConfig {
        let mut config = ForecastConfig::for_frequency(Frequency::Monthly);
        config.horizon = 3;
        config.sequence.epochs = Some(2);
        config.sequence.hidden_size = 4;
        config.machine_learning.random_forest.n_estimators = 5;
        config.machine_learning.xgboost.n_estimators = 5;
        config.machine_learning.lightgbm.n_estimators = 5;
        config
    }

    fn records() -> Vec<RawRecord> {
        let mut records: Vec<RawRecord> = (0..8u32)
            .map(|m| RawRecord::new(NaiveDate::from_ymd_opt(2023, m + 1, 1).unwrap(), "sms", 100 + 10 * m as u64))
            .collect();
        records.push(RawRecord::new(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), "push", 5));
        records
    }

    #[test]
    fn reports_channels_skipped_and_total() {
        let dataset = ChannelDataset::from_records(&records(), Frequency::Monthly)
            .unwrap()
            .with_total()
            .unwrap();
        let pipeline = ForecastPipeline::new(quick_config()).unwrap();
        let report = pipeline.run(&dataset).unwrap();

        let names: Vec<&str> = report.channels.iter().map(|c| c.channel.as_str()).collect();
        assert_eq!(names, vec!["sms", "push", "total"]);

        let push = report.channel("push").unwrap();
        assert_eq!(push.outcome.state(), ChannelState::InsufficientData);
        assert!(push.evaluation.is_empty());

        let sms = report.channel("sms").unwrap();
        assert!(sms.outcome.forecasts().contains("ARIMA"));
        assert_eq!(sms.evaluation.len(), sms.outcome.forecasts().len());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = quick_config();
        config.horizon = 0;
        assert!(ForecastPipeline::new(config).is_err());
    }
}
