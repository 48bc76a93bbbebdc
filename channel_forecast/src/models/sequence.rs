//! LSTM and N-BEATS forecasters
//!
//! Both models see the series through a min-max scaler fitted on the
//! training history, learn to map `lookback` consecutive scaled values to
//! the next one, and forecast autoregressively: each prediction is mapped
//! back to counts, floored at zero, then re-scaled and pushed into the
//! input window.

use crate::config::SequenceConfig;
use crate::data::{Frequency, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::neural::{restore, seed_variables, snapshot, LstmNetwork, NBeatsNetwork, SequenceNetwork};
use crate::models::{ForecastModel, ModelFamily, ModelKind, TrainedForecastModel};
use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use forecast_math::{MinMaxScaler, RingBuffer};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Architecture {
    Lstm,
    NBeats,
}

/// Sequence-model forecaster
#[derive(Debug, Clone)]
pub struct SequenceModel {
    architecture: Architecture,
    config: SequenceConfig,
    lookback: usize,
    epochs: usize,
}

/// Trained sequence-model forecaster
#[derive(Debug, Clone)]
pub struct TrainedSequenceModel<N: SequenceNetwork> {
    name: &'static str,
    network: N,
    device: Device,
    scaler: MinMaxScaler,
    /// Last `lookback` scaled observations
    window: RingBuffer,
    validation_loss: f64,
}

/// A scaled input window and the value that followed it
type Sample = (Vec<f64>, f64);

/// Stack samples into `(batch, lookback)` inputs and `(batch,)` targets
fn to_tensors<'a, I>(samples: I, lookback: usize, device: &Device) -> Result<(Tensor, Tensor)>
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut inputs = Vec::new();
    let mut targets = Vec::new();
    for (window, target) in samples {
        inputs.extend(window.iter().map(|v| *v as f32));
        targets.push(*target as f32);
    }
    let rows = targets.len();
    Ok((
        Tensor::from_vec(inputs, (rows, lookback), device)?,
        Tensor::from_vec(targets, rows, device)?,
    ))
}

fn mean_squared_error<N: SequenceNetwork>(network: &N, inputs: &Tensor, targets: &Tensor) -> Result<f64> {
    let predictions = network.forward(inputs)?;
    let loss = candle_nn::loss::mse(&predictions, targets)?.to_scalar::<f32>()?;
    Ok(f64::from(loss))
}

impl SequenceModel {
    pub fn lstm(config: &SequenceConfig, frequency: Frequency) -> Self {
        Self::with_architecture(Architecture::Lstm, config, frequency)
    }

    pub fn nbeats(config: &SequenceConfig, frequency: Frequency) -> Self {
        Self::with_architecture(Architecture::NBeats, config, frequency)
    }

    fn with_architecture(architecture: Architecture, config: &SequenceConfig, frequency: Frequency) -> Self {
        Self {
            architecture,
            config: config.clone(),
            lookback: config.lookback(frequency),
            epochs: config.epochs(frequency),
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    fn kind(&self) -> ModelKind {
        match self.architecture {
            Architecture::Lstm => ModelKind::Lstm,
            Architecture::NBeats => ModelKind::NBeats,
        }
    }

    /// Sliding windows over the scaled series
    fn samples(&self, scaled: &[f64]) -> Vec<Sample> {
        scaled
            .windows(self.lookback + 1)
            .map(|w| (w[..self.lookback].to_vec(), w[self.lookback]))
            .collect()
    }

    /// Train a network and keep the weights with the lowest validation loss
    ///
    /// The last samples, in time order, form the validation set; with too
    /// few samples the training loss is monitored instead.
    fn fit_network<N: SequenceNetwork>(
        &self,
        network: &N,
        varmap: &VarMap,
        samples: &[Sample],
        device: &Device,
        rng: &mut StdRng,
    ) -> Result<f64> {
        let n_validation = if samples.len() >= 5 {
            ((samples.len() as f64 * self.config.validation_split).round() as usize).max(1)
        } else {
            0
        };
        let (train, validation) = samples.split_at(samples.len() - n_validation);
        let (train_inputs, train_targets) = to_tensors(train, self.lookback, device)?;
        let validation_tensors = if validation.is_empty() {
            None
        } else {
            Some(to_tensors(validation, self.lookback, device)?)
        };

        let params = ParamsAdamW {
            lr: self.config.learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(varmap.all_vars(), params)?;
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut best = (snapshot(varmap)?, f64::INFINITY);

        for epoch in 0..self.epochs {
            order.shuffle(rng);
            for batch in order.chunks(self.config.batch_size) {
                let (inputs, targets) = to_tensors(batch.iter().map(|&i| &train[i]), self.lookback, device)?;
                let predictions = network.forward_train(&inputs, rng)?;
                let loss = candle_nn::loss::mse(&predictions, &targets)?;
                optimizer.backward_step(&loss)?;
            }

            let train_loss = mean_squared_error(network, &train_inputs, &train_targets)?;
            if !train_loss.is_finite() {
                return Err(ForecastError::FitError(format!(
                    "{} training diverged at epoch {}",
                    self.kind(),
                    epoch
                )));
            }
            let monitored = match &validation_tensors {
                Some((inputs, targets)) => mean_squared_error(network, inputs, targets)?,
                None => train_loss,
            };
            if monitored < best.1 {
                best = (snapshot(varmap)?, monitored);
            }
            debug!(model = %self.kind(), epoch, train_loss, monitored, "Sequence training epoch");
        }

        restore(varmap, &best.0)?;
        Ok(best.1)
    }

    fn trained<N>(
        &self,
        network: N,
        varmap: &VarMap,
        samples: &[Sample],
        scaler: MinMaxScaler,
        scaled: &[f64],
        rng: &mut StdRng,
    ) -> Result<Box<dyn TrainedForecastModel>>
    where
        N: SequenceNetwork + 'static,
    {
        let device = Device::Cpu;
        seed_variables(varmap, rng)?;
        let validation_loss = self.fit_network(&network, varmap, samples, &device, rng)?;
        info!(model = %self.kind(), validation_loss, "Trained sequence model");

        Ok(Box::new(TrainedSequenceModel {
            name: self.kind().name(),
            network,
            device,
            scaler,
            window: RingBuffer::from_slice(self.lookback, scaled)?,
            validation_loss,
        }))
    }
}

impl ForecastModel for SequenceModel {
    fn name(&self) -> &str {
        self.kind().name()
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Sequence
    }

    /// Two full windows of history
    fn min_observations(&self) -> usize {
        2 * self.lookback
    }

    fn train(&self, series: &TimeSeries) -> Result<Box<dyn TrainedForecastModel>> {
        self.check_length(series)?;
        let scaler = MinMaxScaler::fit(series.values())?;
        let scaled = scaler.transform_all(series.values());
        let samples = self.samples(&scaled);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        match self.architecture {
            Architecture::Lstm => {
                let network = LstmNetwork::new(vb, self.config.hidden_size, self.config.dropout)?;
                self.trained(network, &varmap, &samples, scaler, &scaled, &mut rng)
            }
            Architecture::NBeats => {
                let network = NBeatsNetwork::new(
                    vb,
                    self.lookback,
                    self.config.hidden_size,
                    self.config.nbeats_blocks,
                )?;
                self.trained(network, &varmap, &samples, scaler, &scaled, &mut rng)
            }
        }
    }
}

impl<N: SequenceNetwork> TrainedSequenceModel<N> {
    /// Loss of the retained weights on the monitored split
    pub fn validation_loss(&self) -> f64 {
        self.validation_loss
    }
}

impl<N: SequenceNetwork> TrainedForecastModel for TrainedSequenceModel<N> {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let mut window = self.window.clone();
        let mut forecasts = Vec::with_capacity(horizon);

        for step in 1..=horizon {
            let inputs: Vec<f32> = window.iter().map(|v| v as f32).collect();
            let inputs = Tensor::from_vec(inputs, (1, window.len()), &self.device)?;
            let scaled = self.network.forward(&inputs)?.squeeze(0)?.to_scalar::<f32>()?;
            let value = self.scaler.inverse(f64::from(scaled));
            if !value.is_finite() {
                return Err(ForecastError::ForecastingError(format!(
                    "{} produced a non-finite prediction at step {}",
                    self.name, step
                )));
            }

            let value = value.max(0.0);
            window.push(self.scaler.transform(value));
            forecasts.push(value);
        }

        Ok(forecasts)
    }

    fn name(&self) -> &str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config() -> SequenceConfig {
        SequenceConfig {
            lookback: Some(3),
            epochs: Some(20),
            hidden_size: 8,
            ..SequenceConfig::default()
        }
    }

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::new(Frequency::Monthly, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(), values)
            .unwrap()
    }

    #[test]
    fn needs_two_windows_of_history() {
        let model = SequenceModel::lstm(&config(), Frequency::Monthly);
        assert_eq!(model.min_observations(), 6);
        let err = model.train(&series(vec![1.0; 5])).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { needed: 6, got: 5 }));
    }

    #[test]
    fn windows_pair_inputs_with_next_value() {
        let model = SequenceModel::nbeats(&config(), Frequency::Monthly);
        let samples = model.samples(&[0.0, 0.1, 0.2, 0.3, 0.4]);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], (vec![0.0, 0.1, 0.2], 0.3));
        assert_eq!(samples[1], (vec![0.1, 0.2, 0.3], 0.4));
    }

    #[test]
    fn forecasts_are_non_negative_and_deterministic() {
        let values: Vec<f64> = (0..18).map(|i| 40.0 + 10.0 * ((i % 6) as f64)).collect();
        for model in [
            SequenceModel::lstm(&config(), Frequency::Monthly),
            SequenceModel::nbeats(&config(), Frequency::Monthly),
        ] {
            let first = model.train(&series(values.clone())).unwrap().forecast(4).unwrap();
            let second = model.train(&series(values.clone())).unwrap().forecast(4).unwrap();
            assert_eq!(first.len(), 4);
            assert!(first.iter().all(|v| *v >= 0.0));
            assert_eq!(first, second);
        }
    }

    #[test]
    fn constant_series_is_handled() {
        let model = SequenceModel::nbeats(&config(), Frequency::Monthly);
        let forecast = model.train(&series(vec![25.0; 8])).unwrap().forecast(2).unwrap();
        assert_eq!(forecast.len(), 2);
        assert!(forecast.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}
