//! Utility functions for period parsing

use crate::error::{ForecastError, Result};
use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parse a period label into a calendar date
///
/// Accepts plain dates, `YYYY-MM` month labels, date-times (the time part is dropped) and ISO
/// strings with a trailing offset, by falling back to the leading
/// `YYYY-MM-DD` prefix.
pub fn parse_period(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(datetime.date());
        }
    }

    // Month labels such as 2023-07
    if trimmed.len() == 7 {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d") {
            return Ok(date);
        }
    }

    if let Some(prefix) = trimmed.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Ok(date);
        }
    }

    Err(ForecastError::DataError(format!(
        "Unrecognised period value: {:?}",
        raw
    )))
}
