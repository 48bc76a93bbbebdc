//! Candle networks for sequence forecasting
//!
//! Every network is built from a [`VarMap`] so that training can hand all
//! variables to one optimiser and snapshot the best weights. Candle's CPU
//! device cannot be seeded, so initial weights and dropout masks are drawn
//! from the caller's seeded [`StdRng`] instead.

use candle_core::{DType, Device, Shape, Tensor};
use candle_nn::{linear, lstm, LSTMConfig, Linear, Module, VarBuilder, VarMap, LSTM, RNN};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use std::fmt::Debug;

/// A network mapping a batch of scaled windows `(batch, lookback)` to the
/// next scaled value of each window, shape `(batch,)`
pub trait SequenceNetwork: Debug + Clone {
    /// Inference-mode forward pass
    fn forward(&self, inputs: &Tensor) -> candle_core::Result<Tensor>;

    /// Training-mode forward pass; dropout masks are drawn from `rng`
    fn forward_train(&self, inputs: &Tensor, _rng: &mut StdRng) -> candle_core::Result<Tensor> {
        self.forward(inputs)
    }
}

/// Re-draw every variable of `varmap` from `rng`
///
/// Variables are visited in name order, each uniform in `±1/√fan_in`.
pub fn seed_variables(varmap: &VarMap, rng: &mut StdRng) -> candle_core::Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("variable map lock poisoned".to_string()))?;
    let mut names: Vec<&String> = data.keys().collect();
    names.sort();

    for name in names {
        let Some(var) = data.get(name) else { continue };
        let fan_in = match var.dims() {
            [_, fan_in] => *fan_in,
            [len] => *len,
            _ => var.elem_count(),
        };
        let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
        let uniform = Uniform::new(-bound, bound);
        let values: Vec<f32> = (0..var.elem_count())
            .map(|_| uniform.sample(&mut *rng) as f32)
            .collect();
        var.set(&Tensor::from_vec(values, var.shape().clone(), var.device())?)?;
    }
    Ok(())
}

/// Detached copies of every variable
pub fn snapshot(varmap: &VarMap) -> candle_core::Result<Vec<(String, Tensor)>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("variable map lock poisoned".to_string()))?;
    let mut saved = Vec::with_capacity(data.len());
    for (name, var) in data.iter() {
        saved.push((name.clone(), var.as_tensor().copy()?));
    }
    Ok(saved)
}

/// Write a snapshot back into its variables
pub fn restore(varmap: &VarMap, saved: &[(String, Tensor)]) -> candle_core::Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("variable map lock poisoned".to_string()))?;
    for (name, tensor) in saved {
        if let Some(var) = data.get(name) {
            var.set(tensor)?;
        }
    }
    Ok(())
}

/// Inverted dropout mask with entries `0` or `1 / (1 - rate)`
fn dropout_mask(shape: &Shape, rate: f64, rng: &mut StdRng, device: &Device) -> candle_core::Result<Tensor> {
    let keep = 1.0 - rate;
    let scale = (1.0 / keep) as f32;
    let values: Vec<f32> = (0..shape.elem_count())
        .map(|_| if rng.gen::<f64>() < keep { scale } else { 0.0 })
        .collect();
    Tensor::from_vec(values, shape.clone(), device)
}

/// Two stacked LSTM layers with dropout between them and a linear head
#[derive(Debug, Clone)]
pub struct LstmNetwork {
    first: LSTM,
    second: LSTM,
    head: Linear,
    dropout: f64,
}

impl LstmNetwork {
    pub fn new(vb: VarBuilder, hidden_size: usize, dropout: f64) -> candle_core::Result<Self> {
        Ok(Self {
            first: lstm(1, hidden_size, LSTMConfig::default(), vb.pp("lstm_1"))?,
            second: lstm(hidden_size, hidden_size, LSTMConfig::default(), vb.pp("lstm_2"))?,
            head: linear(hidden_size, 1, vb.pp("head"))?,
            dropout,
        })
    }

    fn run(&self, inputs: &Tensor, rng: Option<&mut StdRng>) -> candle_core::Result<Tensor> {
        // (batch, lookback) -> (batch, lookback, 1)
        let sequence = inputs.unsqueeze(2)?;
        let states = self.first.seq(&sequence)?;
        let mut hidden = self.first.states_to_tensor(&states)?;

        if let Some(rng) = rng {
            if self.dropout > 0.0 {
                let mask = dropout_mask(hidden.shape(), self.dropout, rng, hidden.device())?;
                hidden = hidden.mul(&mask)?;
            }
        }

        let states = self.second.seq(&hidden)?;
        let last = states
            .last()
            .ok_or_else(|| candle_core::Error::Msg("empty input window".to_string()))?;
        self.head.forward(last.h())?.squeeze(1)
    }
}

impl SequenceNetwork for LstmNetwork {
    fn forward(&self, inputs: &Tensor) -> candle_core::Result<Tensor> {
        self.run(inputs, None)
    }

    fn forward_train(&self, inputs: &Tensor, rng: &mut StdRng) -> candle_core::Result<Tensor> {
        self.run(inputs, Some(rng))
    }
}

/// Fully connected block emitting a backcast and a one-step forecast
#[derive(Debug, Clone)]
struct ResidualBlock {
    first: Linear,
    second: Linear,
    backcast: Linear,
    forecast: Linear,
}

impl ResidualBlock {
    fn new(vb: VarBuilder, lookback: usize, hidden_size: usize) -> candle_core::Result<Self> {
        Ok(Self {
            first: linear(lookback, hidden_size, vb.pp("fc_1"))?,
            second: linear(hidden_size, hidden_size, vb.pp("fc_2"))?,
            backcast: linear(hidden_size, lookback, vb.pp("backcast"))?,
            forecast: linear(hidden_size, 1, vb.pp("forecast"))?,
        })
    }

    fn forward(&self, input: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
        let hidden = self.first.forward(input)?.relu()?;
        let hidden = self.second.forward(&hidden)?.relu()?;
        Ok((self.backcast.forward(&hidden)?, self.forecast.forward(&hidden)?))
    }
}

/// Stack of residual blocks; each block explains away part of its input
/// and the block forecasts are summed
#[derive(Debug, Clone)]
pub struct NBeatsNetwork {
    blocks: Vec<ResidualBlock>,
}

impl NBeatsNetwork {
    pub fn new(vb: VarBuilder, lookback: usize, hidden_size: usize, n_blocks: usize) -> candle_core::Result<Self> {
        let blocks = (0..n_blocks)
            .map(|i| ResidualBlock::new(vb.pp(format!("block_{}", i)), lookback, hidden_size))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { blocks })
    }
}

impl SequenceNetwork for NBeatsNetwork {
    fn forward(&self, inputs: &Tensor) -> candle_core::Result<Tensor> {
        let mut residual = inputs.clone();
        let mut total: Option<Tensor> = None;
        for block in &self.blocks {
            let (backcast, forecast) = block.forward(&residual)?;
            residual = residual.sub(&backcast)?;
            total = Some(match total {
                Some(sum) => sum.add(&forecast)?,
                None => forecast,
            });
        }
        match total {
            Some(total) => total.squeeze(1),
            None => Tensor::zeros(inputs.dim(0)?, DType::F32, inputs.device()),
        }
    }
}
