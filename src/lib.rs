//! # Notification Forecasting
//!
//! Workspace facade over the notification forecasting crates.
//!
//! - [`channel_forecast`]: series preparation, the model panel, orchestration,
//!   evaluation and reporting
//! - [`forecast_math`]: sliding windows, differencing, scaling, statistics and
//!   bounded minimisation
//!
//! ## Example
//!
//! ```
//! use notiforecast_workspace::channel_forecast::{ModelKind, ModelFamily};
//!
//! assert_eq!(ModelKind::ALL.len(), 8);
//! assert_eq!(ModelKind::NBeats.family(), ModelFamily::Sequence);
//! ```

pub use channel_forecast;
pub use forecast_math;
