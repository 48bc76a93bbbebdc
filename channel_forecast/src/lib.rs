//! # Channel Forecast
//!
//! Multi-model forecasting of notification volumes per delivery channel.
//!
//! ## Features
//!
//! - Series preparation from raw `(period, channel, count)` rows, monthly or weekly
//! - Statistical models (ARIMA, SARIMA, ETS)
//! - Tree ensembles on engineered features (Random Forest, XGBoost- and LightGBM-style boosting)
//! - Sequence networks (LSTM, N-BEATS)
//! - Per-model fault isolation and a shared future grid for every forecast
//! - Holdout evaluation with MAE, MSE, RMSE, R² and MAPE, and best-model ranking
//!
//! ## Quick Start
//!
//! ```no_run
//! use channel_forecast::config::ForecastConfig;
//! use channel_forecast::data::{ChannelDataset, DataLoader, Frequency};
//! use channel_forecast::pipeline::ForecastPipeline;
//!
//! # fn main() -> channel_forecast::error::Result<()> {
//! // Load and prepare notification counts
//! let records = DataLoader::from_csv("notifications.csv", Frequency::Monthly)?;
//! let dataset = ChannelDataset::from_records(&records, Frequency::Monthly)?.with_total()?;
//!
//! // Forecast every channel with the full model panel
//! let pipeline = ForecastPipeline::new(ForecastConfig::for_frequency(Frequency::Monthly))?;
//! let report = pipeline.run(&dataset)?;
//!
//! println!("{}", report.best_models_summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod forecast;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod utils;

// Re-export commonly used types
pub use crate::config::ForecastConfig;
pub use crate::data::{ChannelDataset, DataLoader, Frequency, RawRecord, TimeSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::evaluation::{ChannelEvaluation, Evaluator, Metric, MetricSet};
pub use crate::forecast::{Forecast, ForecastSet};
pub use crate::models::{ForecastModel, ModelFamily, ModelKind, TrainedForecastModel};
pub use crate::orchestrator::{ChannelForecast, ForecastOrchestrator, ModelFailure};
pub use crate::pipeline::ForecastPipeline;
pub use crate::report::RunReport;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
