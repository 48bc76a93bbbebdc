//! Run reports and their exports
//!
//! A [`RunReport`] is the serialisable result of a pipeline run. It can be
//! written as JSON, flattened into a CSV forecast table, or rendered as
//! plain-text summaries.

use crate::data::Frequency;
use crate::error::Result;
use crate::evaluation::{BestModels, ChannelEvaluation, Metric, MetricSet};
use crate::models::{ModelFamily, ModelKind};
use crate::orchestrator::ChannelForecast;
use csv::Writer;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the JSON run report
pub const REPORT_FILE: &str = "report.json";

/// File name of the forecast table
pub const FORECASTS_FILE: &str = "forecasts.csv";

/// Result of forecasting one channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: String,
    pub observations: usize,
    pub outcome: ChannelForecast,
    pub evaluation: ChannelEvaluation,
    pub best_models: BestModels,
}

/// Result of a full run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub frequency: Frequency,
    pub horizon: usize,
    pub holdout: usize,
    pub channels: Vec<ChannelReport>,
}

impl RunReport {
    pub fn channel(&self, name: &str) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.channel == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Write one row per channel, model and future period
    pub fn write_forecasts_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record(["channel", "model", "period", "value"])?;
        for channel in &self.channels {
            for forecast in channel.outcome.forecasts().iter() {
                for (period, value) in forecast.iter() {
                    wtr.write_record([
                        channel.channel.clone(),
                        forecast.model().to_string(),
                        period.format("%Y-%m-%d").to_string(),
                        value.to_string(),
                    ])?;
                }
            }
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the JSON report and the forecast table into `dir`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let report_path = dir.join(REPORT_FILE);
        self.write_json(BufWriter::new(File::create(&report_path)?))?;
        let forecasts_path = dir.join(FORECASTS_FILE);
        self.write_forecasts_csv(BufWriter::new(File::create(&forecasts_path)?))?;

        info!(
            report = %report_path.display(),
            forecasts = %forecasts_path.display(),
            "Saved run report"
        );
        Ok((report_path, forecasts_path))
    }

    /// Metric tables for every channel
    pub fn evaluation_summary(&self) -> String {
        self.channels.iter().map(|c| c.to_string()).collect()
    }

    /// Best model per metric for every channel
    pub fn best_models_summary(&self) -> String {
        let mut out = String::new();
        for channel in &self.channels {
            out.push_str(&format!("{}\n", channel.channel));
            if channel.best_models.is_empty() {
                out.push_str("  no scored models\n");
                continue;
            }
            for best in channel.best_models.iter() {
                out.push_str(&format!(
                    "  {:<5} {} ({:.2})\n",
                    best.metric.label(),
                    best.model,
                    best.value
                ));
            }
        }
        out
    }
}

fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}

fn metric_row(model: &str, metrics: Option<&MetricSet>) -> String {
    let mut row = format!("    {:<14}", model);
    for metric in Metric::ALL {
        let value = metrics.and_then(|m| m.get(metric));
        row.push_str(&format!(" {:>5} {:>12}", metric.label(), format_metric(value)));
    }
    row
}

impl fmt::Display for ChannelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Channel {} ({} observations, {:?})",
            self.channel,
            self.observations,
            self.outcome.state()
        )?;

        let family_of = |model: &str| ModelKind::from_name(model).map(|kind| kind.family());
        let mut groups: Vec<(String, Option<ModelFamily>)> = ModelFamily::ALL
            .iter()
            .map(|family| (family.label().to_string(), Some(*family)))
            .collect();
        groups.push(("Other".to_string(), None));

        for (label, family) in groups {
            let rows: Vec<_> = self
                .evaluation
                .entries
                .iter()
                .filter(|e| family_of(&e.model) == family)
                .collect();
            if rows.is_empty() {
                continue;
            }
            writeln!(f, "  {}", label)?;
            for entry in rows {
                writeln!(f, "{}", metric_row(&entry.model, entry.metrics.as_ref()))?;
            }
        }

        for failure in self.outcome.failures() {
            writeln!(f, "  {} skipped: {} ({})", failure.model, failure.kind, failure.message)?;
        }
        Ok(())
    }
}
