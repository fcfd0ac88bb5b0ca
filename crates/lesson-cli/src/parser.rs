use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc, Weekday};
use chrono_english::{parse_date_string, Dialect};
use lesson_core::recurrence::{RecurrencePattern, Termination};

use crate::cli::RepeatArgs;

/// Parses an RFC 3339 timestamp or an English phrase such as "next monday 10am".
pub fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(date.with_timezone(&Utc));
    }
    parse_date_string(date_str, Utc::now(), Dialect::Us)
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", date_str, e))
}

/// Parses a comma-separated weekday list, e.g. "mon,wed,fri".
pub fn parse_weekdays(days: &str) -> Result<Vec<Weekday>> {
    days.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.parse::<Weekday>().map_err(|_| anyhow!("Invalid weekday '{}'", d)))
        .collect()
}

/// Builds a pattern from `--every` and its modifiers; `None` when `--every` is absent.
pub fn build_pattern(repeat: &RepeatArgs) -> Result<Option<RecurrencePattern>> {
    let Some(frequency) = repeat.every else {
        return Ok(None);
    };

    let termination = match (&repeat.until, repeat.count) {
        (Some(until), _) => Termination::Until(parse_date(until)?),
        (None, Some(count)) => Termination::After(count),
        (None, None) => Termination::Never,
    };
    let days = repeat.on.as_deref().map(parse_weekdays).transpose()?.unwrap_or_default();

    let pattern = RecurrencePattern::new(frequency, repeat.interval.unwrap_or(1), days, termination)?;
    Ok(Some(pattern))
}
