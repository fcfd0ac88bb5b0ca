use chrono::{DateTime, Datelike, Days, Months, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::CoreError;

/// How often a pattern advances by one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Frequency::Daily),
            "weekly" | "week" => Ok(Frequency::Weekly),
            "monthly" | "month" => Ok(Frequency::Monthly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

/// When a series stops producing candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Termination {
    Never,
    /// Inclusive upper bound on candidate instants.
    Until(DateTime<Utc>),
    /// Total number of candidates, counted from the anchor.
    After(u32),
}

/// A candidate instant together with its 0-based sequence index from the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub index: u32,
    pub date: DateTime<Utc>,
}

/// Immutable recurrence rule embedded in a lesson.
///
/// Always constructed through [`RecurrencePattern::new`] (deserialization goes
/// through the same validation), so every instance has `interval >= 1`, an
/// `After` count of at least one, and weekdays only on weekly patterns, stored
/// Monday-first without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PatternFields")]
pub struct RecurrencePattern {
    frequency: Frequency,
    interval: u32,
    days_of_week: Vec<Weekday>,
    termination: Termination,
}

#[derive(Deserialize)]
struct PatternFields {
    frequency: Frequency,
    interval: u32,
    #[serde(default)]
    days_of_week: Vec<Weekday>,
    termination: Termination,
}

impl TryFrom<PatternFields> for RecurrencePattern {
    type Error = CoreError;

    fn try_from(fields: PatternFields) -> Result<Self, Self::Error> {
        Self::new(fields.frequency, fields.interval, fields.days_of_week, fields.termination)
    }
}

impl RecurrencePattern {
    /// Creates a validated pattern.
    ///
    /// # Behavior
    /// - Reject `interval == 0` and `After(0)`
    /// - Reject weekdays on daily and monthly patterns
    /// - Sort weekdays Monday-first and drop duplicates
    pub fn new(
        frequency: Frequency,
        interval: u32,
        mut days_of_week: Vec<Weekday>,
        termination: Termination,
    ) -> Result<Self, CoreError> {
        if interval == 0 {
            return Err(CoreError::InvalidInput(
                "Recurrence interval must be at least 1".to_string(),
            ));
        }
        if termination == Termination::After(0) {
            return Err(CoreError::InvalidInput(
                "Recurrence count must be at least 1".to_string(),
            ));
        }
        if frequency != Frequency::Weekly && !days_of_week.is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "Days of week are only valid for weekly recurrence, not {}",
                frequency
            )));
        }

        days_of_week.sort_by_key(|d| d.num_days_from_monday());
        days_of_week.dedup();

        Ok(Self {
            frequency,
            interval,
            days_of_week,
            termination,
        })
    }

    pub fn daily() -> Self {
        Self::simple(Frequency::Daily)
    }

    pub fn weekly() -> Self {
        Self::simple(Frequency::Weekly)
    }

    pub fn monthly() -> Self {
        Self::simple(Frequency::Monthly)
    }

    fn simple(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            days_of_week: Vec::new(),
            termination: Termination::Never,
        }
    }

    pub fn every(self, interval: u32) -> Result<Self, CoreError> {
        Self::new(self.frequency, interval, self.days_of_week, self.termination)
    }

    pub fn on_days(self, days: impl IntoIterator<Item = Weekday>) -> Result<Self, CoreError> {
        Self::new(self.frequency, self.interval, days.into_iter().collect(), self.termination)
    }

    pub fn ending(self, termination: Termination) -> Result<Self, CoreError> {
        Self::new(self.frequency, self.interval, self.days_of_week, termination)
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn days_of_week(&self) -> &[Weekday] {
        &self.days_of_week
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Lazily generates the candidates of this pattern that fall inside
    /// `[window_start, window_end]`.
    ///
    /// # Arguments
    /// * `anchor` - The lesson's start instant, sequence index 0
    /// * `window_start` - Inclusive lower bound of surfaced candidates
    /// * `window_end` - Inclusive upper bound of surfaced candidates
    ///
    /// # Behavior
    /// - Walk periods forward from the anchor, never from the window
    /// - Candidates before the window consume sequence indices but are not yielded
    /// - Stop at the first candidate past the window, past `Until`, or at the `After` count
    pub fn candidates(
        &self,
        anchor: DateTime<Utc>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Candidates<'_> {
        Candidates {
            pattern: self,
            anchor,
            week_start: start_of_week(anchor),
            window_start,
            window_end,
            period: 0,
            slot: 0,
            next_index: 0,
            done: window_end < window_start,
        }
    }

    /// Upper bound on the instants this series can produce from `anchor`.
    ///
    /// `None` means the series is open-ended. For `After(count)` this is the
    /// exact last candidate, computed without iterating.
    pub fn series_end(&self, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.termination {
            Termination::Never => None,
            Termination::Until(until) => Some(until),
            Termination::After(count) => {
                let last = u64::from(count - 1);
                if self.days_of_week.is_empty() {
                    return self.advance(anchor, last);
                }

                let per_week = self.days_of_week.len() as u64;
                let anchor_offset = anchor.weekday().num_days_from_monday();
                let skipped = self
                    .days_of_week
                    .iter()
                    .filter(|d| d.num_days_from_monday() < anchor_offset)
                    .count() as u64;
                let first_week = per_week - skipped;
                let week_start = start_of_week(anchor);

                if last < first_week {
                    let day = self.days_of_week[(skipped + last) as usize];
                    return week_start.checked_add_days(Days::new(u64::from(day.num_days_from_monday())));
                }

                let remaining = last - first_week;
                let period = remaining / per_week + 1;
                let day = self.days_of_week[(remaining % per_week) as usize];
                self.advance(week_start, period)?
                    .checked_add_days(Days::new(u64::from(day.num_days_from_monday())))
            }
        }
    }

    /// `base` moved forward by `periods * interval` units of the frequency.
    fn advance(&self, base: DateTime<Utc>, periods: u64) -> Option<DateTime<Utc>> {
        let steps = periods.checked_mul(u64::from(self.interval))?;
        match self.frequency {
            Frequency::Daily => base.checked_add_days(Days::new(steps)),
            Frequency::Weekly => base.checked_add_days(Days::new(steps.checked_mul(7)?)),
            Frequency::Monthly => base.checked_add_months(Months::new(u32::try_from(steps).ok()?)),
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.frequency {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
        };
        if self.interval == 1 {
            write!(f, "every {}", unit)?;
        } else {
            write!(f, "every {} {}s", self.interval, unit)?;
        }

        if !self.days_of_week.is_empty() {
            let days: Vec<String> = self.days_of_week.iter().map(|d| d.to_string()).collect();
            write!(f, " on {}", days.join(", "))?;
        }

        match self.termination {
            Termination::Never => Ok(()),
            Termination::Until(until) => write!(f, " until {}", until.format("%Y-%m-%d %H:%M")),
            Termination::After(1) => write!(f, ", once"),
            Termination::After(count) => write!(f, ", {} times", count),
        }
    }
}

/// Iterator returned by [`RecurrencePattern::candidates`]. A clone continues
/// from the current position; call `candidates` again to restart at the anchor.
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    pattern: &'a RecurrencePattern,
    anchor: DateTime<Utc>,
    week_start: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    period: u64,
    slot: usize,
    next_index: u32,
    done: bool,
}

impl Candidates<'_> {
    /// Next raw series instant, ignoring termination and window.
    fn next_instant(&mut self) -> Option<DateTime<Utc>> {
        let days = &self.pattern.days_of_week;
        if days.is_empty() {
            let date = self.pattern.advance(self.anchor, self.period)?;
            self.period += 1;
            return Some(date);
        }

        loop {
            let day = days[self.slot];
            let week = self.pattern.advance(self.week_start, self.period)?;
            self.slot += 1;
            if self.slot == days.len() {
                self.slot = 0;
                self.period += 1;
            }

            let date = week.checked_add_days(Days::new(u64::from(day.num_days_from_monday())))?;
            // Listed days earlier than the anchor in its own week are not part of the series.
            if date >= self.anchor {
                return Some(date);
            }
        }
    }
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        while !self.done {
            if let Termination::After(count) = self.pattern.termination {
                if self.next_index >= count {
                    break;
                }
            }

            let Some(date) = self.next_instant() else {
                break;
            };

            if let Termination::Until(until) = self.pattern.termination {
                if date > until {
                    break;
                }
            }
            if date > self.window_end {
                break;
            }

            let index = self.next_index;
            self.next_index = match index.checked_add(1) {
                Some(next) => next,
                None => {
                    self.done = true;
                    index
                }
            };

            if date >= self.window_start {
                return Some(Candidate { index, date });
            }
        }

        self.done = true;
        None
    }
}

fn start_of_week(instant: DateTime<Utc>) -> DateTime<Utc> {
    let back = u64::from(instant.weekday().num_days_from_monday());
    instant.checked_sub_days(Days::new(back)).unwrap_or(instant)
}
