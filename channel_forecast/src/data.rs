//! Notification time series and per-channel preparation

use crate::error::{ForecastError, Result};
use crate::utils::parse_period;
use chrono::{Datelike, Duration, Months, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Name of the synthetic channel summing every channel
pub const TOTAL_CHANNEL: &str = "total";

/// Fewest observations a prepared series may have
pub const MIN_OBSERVATIONS: usize = 2;

/// Column holding the channel label
pub const CHANNEL_COLUMN: &str = "channels";

/// Column holding the notification count
pub const COUNT_COLUMN: &str = "notification_count";

/// Sampling frequency of a notification series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Periods start on the first day of each month
    #[default]
    Monthly,
    /// Periods start on the Monday of each ISO week
    Weekly,
}

impl Frequency {
    /// Name of the input column holding period labels
    pub fn period_column(&self) -> &'static str {
        match self {
            Frequency::Monthly => "month",
            Frequency::Weekly => "week",
        }
    }

    /// Number of periods in one seasonal cycle
    pub fn season_length(&self) -> usize {
        match self {
            Frequency::Monthly => 12,
            Frequency::Weekly => 52,
        }
    }

    /// Normalise a date to the start of its period
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Monthly => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
            }
            Frequency::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
        }
    }

    /// Period `steps` periods after `period`
    pub fn advance(&self, period: NaiveDate, steps: usize) -> Result<NaiveDate> {
        let overflow = || {
            ForecastError::DataError(format!(
                "Advancing {} by {} {} periods leaves the calendar",
                period, steps, self
            ))
        };

        match self {
            Frequency::Monthly => {
                let months = u32::try_from(steps).map_err(|_| overflow())?;
                period
                    .checked_add_months(Months::new(months))
                    .ok_or_else(overflow)
            }
            Frequency::Weekly => {
                let days = i64::try_from(steps)
                    .ok()
                    .and_then(|weeks| weeks.checked_mul(7))
                    .ok_or_else(overflow)?;
                period
                    .checked_add_signed(Duration::days(days))
                    .ok_or_else(overflow)
            }
        }
    }

    /// Every period from the period of `start` to that of `end`, inclusive
    pub fn date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let first = self.period_start(start);
        let last = self.period_start(end);
        if last < first {
            return Err(ForecastError::ValidationError(format!(
                "Range end {} precedes start {}",
                end, start
            )));
        }

        let mut periods = vec![first];
        let mut current = first;
        while current < last {
            current = self.advance(current, 1)?;
            periods.push(current);
        }
        Ok(periods)
    }

    /// The `horizon` periods following `last`
    pub fn future_periods(&self, last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
        (1..=horizon).map(|step| self.advance(last, step)).collect()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Weekly => write!(f, "weekly"),
        }
    }
}

impl FromStr for Frequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "monthly" | "month" | "m" => Ok(Frequency::Monthly),
            "weekly" | "week" | "w" => Ok(Frequency::Weekly),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown frequency {:?}, expected monthly or weekly",
                other
            ))),
        }
    }
}

/// One input row: a channel's notification count for a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub period: NaiveDate,
    pub channel: String,
    pub notification_count: u64,
}

impl RawRecord {
    pub fn new(period: NaiveDate, channel: impl Into<String>, notification_count: u64) -> Self {
        Self {
            period,
            channel: channel.into(),
            notification_count,
        }
    }
}

/// Regular, gap-free series of notification counts
///
/// Periods are strictly increasing at the series frequency, with no gaps,
/// and the series is never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    frequency: Frequency,
    periods: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series of consecutive periods starting at `start`
    pub fn new(frequency: Frequency, start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(ForecastError::ValidationError(format!(
                "Notification counts must be finite and non-negative, got {}",
                bad
            )));
        }

        let first = frequency.period_start(start);
        let periods = (0..values.len())
            .map(|step| frequency.advance(first, step))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            frequency,
            periods,
            values,
        })
    }

    /// Aggregate per-period sums onto a regular grid
    ///
    /// Duplicate periods are summed and periods missing between the first
    /// and last observation take the previous period's value.
    pub fn from_period_sums(frequency: Frequency, sums: &BTreeMap<NaiveDate, f64>) -> Result<Self> {
        let (first, last) = match (sums.keys().next(), sums.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(ForecastError::InsufficientData { needed: 1, got: 0 }),
        };

        let periods = frequency.date_range(first, last)?;
        let mut values = Vec::with_capacity(periods.len());
        let mut previous = 0.0;
        for period in &periods {
            let value = sums.get(period).copied().unwrap_or(previous);
            values.push(value);
            previous = value;
        }

        Self::new(frequency, first, values)
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_period(&self) -> NaiveDate {
        self.periods[0]
    }

    pub fn last_period(&self) -> NaiveDate {
        self.periods[self.periods.len() - 1]
    }

    /// Value observed at `period`, if it falls on the grid
    pub fn value_at(&self, period: NaiveDate) -> Option<f64> {
        self.periods
            .binary_search(&period)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// The `horizon` periods following the last observation
    pub fn future_periods(&self, horizon: usize) -> Result<Vec<NaiveDate>> {
        self.frequency.future_periods(self.last_period(), horizon)
    }

    /// Last `k` values, or all of them if the series is shorter
    pub fn tail(&self, k: usize) -> &[f64] {
        &self.values[self.values.len().saturating_sub(k)..]
    }

    /// Series without its last `k` observations; `None` if nothing remains
    pub fn truncate_last(&self, k: usize) -> Option<TimeSeries> {
        let keep = self.len().checked_sub(k).filter(|&keep| keep > 0)?;
        Some(Self {
            frequency: self.frequency,
            periods: self.periods[..keep].to_vec(),
            values: self.values[..keep].to_vec(),
        })
    }

    /// `(period, value)` pairs in time order
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.periods.iter().copied().zip(self.values.iter().copied())
    }
}

/// A channel that was dropped during preparation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedChannel {
    pub channel: String,
    pub observations: usize,
}

/// Prepared series for every channel, plus the optional total
#[derive(Debug, Clone)]
pub struct ChannelDataset {
    frequency: Frequency,
    channels: BTreeMap<String, TimeSeries>,
    skipped: Vec<SkippedChannel>,
    /// Every channel's series, including ones too short to forecast
    all_series: Vec<TimeSeries>,
    total: Option<TimeSeries>,
}

impl ChannelDataset {
    /// Prepare one series per channel from raw records
    pub fn from_records(records: &[RawRecord], frequency: Frequency) -> Result<Self> {
        if records.is_empty() {
            return Err(ForecastError::DataError(
                "No notification records to prepare".to_string(),
            ));
        }

        let mut grouped: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        let mut reserved = 0usize;
        for record in records {
            // The total is always derived, never read from input
            if record.channel == TOTAL_CHANNEL {
                reserved += 1;
                continue;
            }
            let period = frequency.period_start(record.period);
            *grouped
                .entry(record.channel.as_str())
                .or_default()
                .entry(period)
                .or_insert(0.0) += record.notification_count as f64;
        }

        if reserved > 0 {
            warn!(
                rows = reserved,
                channel = TOTAL_CHANNEL,
                "Dropped input rows using the reserved channel name"
            );
        }
        if grouped.is_empty() {
            return Err(ForecastError::DataError(format!(
                "Every record uses the reserved channel name {:?}",
                TOTAL_CHANNEL
            )));
        }

        let mut channels = BTreeMap::new();
        let mut skipped = Vec::new();
        let mut all_series = Vec::with_capacity(grouped.len());
        for (channel, sums) in grouped {
            let series = TimeSeries::from_period_sums(frequency, &sums)?;
            if series.len() < MIN_OBSERVATIONS {
                warn!(
                    channel,
                    observations = series.len(),
                    "Skipping channel with too few observations"
                );
                skipped.push(SkippedChannel {
                    channel: channel.to_string(),
                    observations: series.len(),
                });
            } else {
                debug!(
                    channel,
                    observations = series.len(),
                    first = %series.first_period(),
                    last = %series.last_period(),
                    "Prepared channel series"
                );
                channels.insert(channel.to_string(), series.clone());
            }
            all_series.push(series);
        }

        info!(
            channels = channels.len(),
            skipped = skipped.len(),
            %frequency,
            "Prepared notification dataset"
        );

        Ok(Self {
            frequency,
            channels,
            skipped,
            all_series,
            total: None,
        })
    }

    /// Add the summed series across every channel
    ///
    /// A channel contributes nothing to periods outside its own span. The
    /// total is dropped like any other series if it is too short.
    pub fn with_total(mut self) -> Result<Self> {
        let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for series in &self.all_series {
            for (period, value) in series.iter() {
                *sums.entry(period).or_insert(0.0) += value;
            }
        }

        let total = TimeSeries::from_period_sums(self.frequency, &sums)?;
        if total.len() < MIN_OBSERVATIONS {
            warn!(
                observations = total.len(),
                "Skipping total series with too few observations"
            );
            self.skipped.push(SkippedChannel {
                channel: TOTAL_CHANNEL.to_string(),
                observations: total.len(),
            });
        } else {
            self.total = Some(total);
        }
        Ok(self)
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Names of forecastable channels, in lexical order
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Series of a channel, or the total for [`TOTAL_CHANNEL`]
    pub fn channel(&self, name: &str) -> Option<&TimeSeries> {
        if name == TOTAL_CHANNEL {
            return self.total.as_ref();
        }
        self.channels.get(name)
    }

    pub fn channels(&self) -> impl Iterator<Item = (&str, &TimeSeries)> {
        self.channels.iter().map(|(name, series)| (name.as_str(), series))
    }

    pub fn total(&self) -> Option<&TimeSeries> {
        self.total.as_ref()
    }

    pub fn skipped(&self) -> &[SkippedChannel] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Prepare the series of a single channel
///
/// Returns `None`, after logging a warning, when the channel has fewer
/// than [`MIN_OBSERVATIONS`] distinct periods.
pub fn prepare_series(
    records: &[RawRecord],
    channel: &str,
    frequency: Frequency,
) -> Result<Option<TimeSeries>> {
    let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records.iter().filter(|r| r.channel == channel) {
        *sums
            .entry(frequency.period_start(record.period))
            .or_insert(0.0) += record.notification_count as f64;
    }

    if sums.len() < MIN_OBSERVATIONS {
        warn!(
            channel,
            observations = sums.len(),
            "Channel has too few observations to forecast"
        );
        return Ok(None);
    }

    TimeSeries::from_period_sums(frequency, &sums).map(Some)
}

/// Data loader for notification count tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load notification records from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, frequency: Frequency) -> Result<Vec<RawRecord>> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(&df, frequency)
    }

    /// Extract notification records from an existing DataFrame
    ///
    /// Missing required columns yield an empty record list and a warning.
    /// Rows with a null or negative count or an unparseable period are
    /// dropped.
    pub fn from_dataframe(df: &DataFrame, frequency: Frequency) -> Result<Vec<RawRecord>> {
        let period_column = frequency.period_column();
        let Some(channel_column) = Self::detect_channel_column(df) else {
            warn!(columns = ?df.get_column_names(), "No channel column found in data");
            return Ok(Vec::new());
        };
        for required in [period_column, COUNT_COLUMN] {
            if !df.get_column_names().contains(&required) {
                warn!(column = required, "Required column missing from data");
                return Ok(Vec::new());
            }
        }

        let periods = df.column(period_column)?.cast(&DataType::Utf8)?;
        let channels = df.column(&channel_column)?.cast(&DataType::Utf8)?;
        let counts = df.column(COUNT_COLUMN)?.cast(&DataType::Float64)?;

        let mut records = Vec::with_capacity(df.height());
        let mut dropped = 0usize;
        for ((period, channel), count) in periods
            .utf8()?
            .into_iter()
            .zip(channels.utf8()?.into_iter())
            .zip(counts.f64()?.into_iter())
        {
            match (period, channel, count) {
                (Some(period), Some(channel), Some(count)) if count.is_finite() && count >= 0.0 => {
                    match parse_period(period) {
                        Ok(period) => records.push(RawRecord::new(
                            period,
                            channel.trim(),
                            count.round() as u64,
                        )),
                        Err(e) => {
                            debug!(error = %e, "Unparseable period");
                            dropped += 1;
                        }
                    }
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(dropped, "Dropped rows with missing, negative or unparseable values");
        }
        debug!(records = records.len(), "Loaded notification records");

        Ok(records)
    }

    /// Spread monthly counts evenly over the weeks of each month
    ///
    /// Each record becomes one record per Sunday from the first of its month
    /// to the first of the next month, both inclusive. Every week carries
    /// the monthly count divided by the number of weeks, rounded down.
    pub fn monthly_to_weekly(records: &[RawRecord]) -> Result<Vec<RawRecord>> {
        let mut weekly = Vec::with_capacity(records.len() * 5);
        for record in records {
            let start = Frequency::Monthly.period_start(record.period);
            let end = Frequency::Monthly.advance(start, 1)?;
            let to_sunday = (7 - start.weekday().num_days_from_sunday()) % 7;
            let first_sunday = start + Duration::days(i64::from(to_sunday));

            let sundays: Vec<NaiveDate> = std::iter::successors(Some(first_sunday), |day| {
                day.checked_add_signed(Duration::days(7))
            })
            .take_while(|day| *day <= end)
            .collect();
            let count = record.notification_count / sundays.len().max(1) as u64;

            weekly.extend(
                sundays
                    .into_iter()
                    .map(|week| RawRecord::new(week, record.channel.clone(), count)),
            );
        }

        debug!(
            monthly = records.len(),
            weekly = weekly.len(),
            "Converted monthly records to weekly"
        );
        Ok(weekly)
    }

    /// Write records as a CSV table keyed by the frequency's period column
    pub fn write_csv<W: Write>(records: &[RawRecord], frequency: Frequency, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record([frequency.period_column(), CHANNEL_COLUMN, COUNT_COLUMN])?;
        for record in records {
            writer.write_record([
                record.period.format("%Y-%m-%d").to_string(),
                record.channel.clone(),
                record.notification_count.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Detect the channel column in a DataFrame
    fn detect_channel_column(df: &DataFrame) -> Option<String> {
        let column_names = df.get_column_names();

        for candidate in [CHANNEL_COLUMN, "channel"] {
            if column_names.contains(&candidate) {
                return Some(candidate.to_string());
            }
        }

        None
    }
}
