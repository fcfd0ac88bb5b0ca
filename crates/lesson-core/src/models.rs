use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;
use crate::recurrence::RecurrencePattern;

// ============================================================================
// Lessons
// ============================================================================

/// Base definition of a lesson. For recurring lessons `start_date` is the
/// anchor of the pattern and `end_date - start_date` is the duration of every
/// occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub teacher_ids: Vec<Uuid>,
    pub pupil_ids: Vec<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pattern: Option<RecurrencePattern>,
    /// Soft-deletion flag; deleted lessons generate no occurrences
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    /// Builds a new lesson from creation data, validating dates.
    pub fn new(data: NewLessonData) -> Result<Self, CoreError> {
        let now = Utc::now();
        let lesson = Self {
            id: Uuid::now_v7(),
            title: data.title,
            description: data.description,
            teacher_ids: dedup_ordered(data.teacher_ids),
            pupil_ids: dedup_ordered(data.pupil_ids),
            start_date: data.start_date,
            end_date: data.end_date,
            pattern: data.pattern,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        lesson.validate()?;
        Ok(lesson)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("Lesson title cannot be empty".to_string()));
        }
        if self.end_date <= self.start_date {
            return Err(CoreError::InvalidInput(format!(
                "Lesson end {} must be after its start {}",
                self.end_date, self.start_date
            )));
        }
        Ok(())
    }

    pub fn is_recurring(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn duration(&self) -> Duration {
        self.end_date - self.start_date
    }

    /// Last instant at which any occurrence of this lesson can still be running,
    /// or `None` for open-ended series.
    pub fn active_until(&self) -> Option<DateTime<Utc>> {
        match &self.pattern {
            None => Some(self.end_date),
            Some(pattern) => pattern
                .series_end(self.start_date)
                .map(|last| last + self.duration()),
        }
    }

    /// Applies an update in place and reports whether prior exceptions became
    /// stale, i.e. the pattern was replaced or a recurring anchor moved.
    pub fn apply_update(&mut self, data: UpdateLessonData) -> Result<bool, CoreError> {
        let previous_pattern = self.pattern.clone();
        let previous_anchor = self.start_date;

        if let Some(title) = data.title {
            self.title = title;
        }
        if let Some(description) = data.description {
            self.description = description;
        }
        if let Some(teacher_ids) = data.teacher_ids {
            self.teacher_ids = dedup_ordered(teacher_ids);
        }
        if let Some(pupil_ids) = data.pupil_ids {
            self.pupil_ids = dedup_ordered(pupil_ids);
        }
        if let Some(start_date) = data.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = data.end_date {
            self.end_date = end_date;
        }
        if let Some(pattern) = data.pattern {
            self.pattern = pattern;
        }
        self.validate()?;
        self.updated_at = Utc::now();

        let pattern_replaced = self.pattern != previous_pattern;
        let anchor_moved = previous_pattern.is_some() && self.start_date != previous_anchor;
        Ok(pattern_replaced || anchor_moved)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewLessonData {
    pub title: String,
    pub description: Option<String>,
    pub teacher_ids: Vec<Uuid>,
    pub pupil_ids: Vec<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pattern: Option<RecurrencePattern>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateLessonData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub teacher_ids: Option<Vec<Uuid>>,
    pub pupil_ids: Option<Vec<Uuid>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// `Some(None)` turns the lesson into a one-off
    pub pattern: Option<Option<RecurrencePattern>>,
}

fn dedup_ordered(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

// ============================================================================
// Occurrence exceptions
// ============================================================================

/// Storage discriminant of an exception.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExceptionType {
    /// Occurrence is cancelled
    Skip,
    /// Occurrence moves to `new_date`, keeping its duration
    Reschedule,
    /// Occurrence keeps its slot but overrides lesson fields
    Modify,
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionType::Skip => write!(f, "skip"),
            ExceptionType::Reschedule => write!(f, "reschedule"),
            ExceptionType::Modify => write!(f, "modify"),
        }
    }
}

impl FromStr for ExceptionType {
    type Err = ParseExceptionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(ExceptionType::Skip),
            "reschedule" | "move" => Ok(ExceptionType::Reschedule),
            "modify" | "override" => Ok(ExceptionType::Modify),
            _ => Err(ParseExceptionTypeError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid exception type: {0}")]
pub struct ParseExceptionTypeError(String);

/// Field overrides carried by a MODIFY exception.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonModifications {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `Some(None)` clears the description for this occurrence
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_ids: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pupil_ids: Option<Vec<Uuid>>,
}

/// Keeps an explicit `null` distinct from a missing field.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl LessonModifications {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.teacher_ids.is_none()
            && self.pupil_ids.is_none()
    }
}

/// What an exception does to the occurrence it replaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExceptionAction {
    Skip,
    Reschedule { new_date: DateTime<Utc> },
    Modify { modifications: LessonModifications },
}

impl ExceptionAction {
    pub fn exception_type(&self) -> ExceptionType {
        match self {
            ExceptionAction::Skip => ExceptionType::Skip,
            ExceptionAction::Reschedule { .. } => ExceptionType::Reschedule,
            ExceptionAction::Modify { .. } => ExceptionType::Modify,
        }
    }
}

/// A stored deviation from a lesson's pattern for exactly one original
/// occurrence instant. Only constructible through the validating factories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccurrenceException {
    id: Uuid,
    lesson_id: Uuid,
    original_date: DateTime<Utc>,
    action: ExceptionAction,
    created_at: DateTime<Utc>,
}

impl OccurrenceException {
    pub fn skip(lesson_id: Uuid, original_date: DateTime<Utc>) -> Result<Self, CoreError> {
        Self::from_action(lesson_id, original_date, ExceptionAction::Skip)
    }

    pub fn reschedule(
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
        new_date: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        Self::from_action(lesson_id, original_date, ExceptionAction::Reschedule { new_date })
    }

    pub fn modify(
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
        modifications: LessonModifications,
    ) -> Result<Self, CoreError> {
        Self::from_action(lesson_id, original_date, ExceptionAction::Modify { modifications })
    }

    fn from_action(
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
        action: ExceptionAction,
    ) -> Result<Self, CoreError> {
        let exception = Self {
            id: Uuid::now_v7(),
            lesson_id,
            original_date,
            action,
            created_at: Utc::now(),
        };
        exception.validate()?;
        Ok(exception)
    }

    /// Rebuilds an exception from its flattened storage form.
    ///
    /// # Behavior
    /// - SKIP must carry neither a new date nor modifications
    /// - RESCHEDULE must carry only a new date, different from the original
    /// - MODIFY must carry only non-empty modifications
    pub fn from_parts(
        id: Uuid,
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
        exception_type: ExceptionType,
        new_date: Option<DateTime<Utc>>,
        modifications: Option<LessonModifications>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let action = match (exception_type, new_date, modifications) {
            (ExceptionType::Skip, None, None) => ExceptionAction::Skip,
            (ExceptionType::Skip, _, _) => {
                return Err(CoreError::InvalidException(
                    "Skip exceptions cannot carry a new date or modifications".to_string(),
                ))
            }
            (ExceptionType::Reschedule, Some(new_date), None) => ExceptionAction::Reschedule { new_date },
            (ExceptionType::Reschedule, None, _) => {
                return Err(CoreError::InvalidException(
                    "Reschedule exceptions require a new date".to_string(),
                ))
            }
            (ExceptionType::Reschedule, Some(_), Some(_)) => {
                return Err(CoreError::InvalidException(
                    "Reschedule exceptions cannot carry modifications".to_string(),
                ))
            }
            (ExceptionType::Modify, None, Some(modifications)) => ExceptionAction::Modify { modifications },
            (ExceptionType::Modify, Some(_), _) => {
                return Err(CoreError::InvalidException(
                    "Modify exceptions cannot carry a new date".to_string(),
                ))
            }
            (ExceptionType::Modify, None, None) => {
                return Err(CoreError::InvalidException(
                    "Modify exceptions require modifications".to_string(),
                ))
            }
        };

        let exception = Self {
            id,
            lesson_id,
            original_date,
            action,
            created_at,
        };
        exception.validate()?;
        Ok(exception)
    }

    fn validate(&self) -> Result<(), CoreError> {
        match &self.action {
            ExceptionAction::Skip => Ok(()),
            ExceptionAction::Reschedule { new_date } => {
                if *new_date == self.original_date {
                    return Err(CoreError::SameDateReschedule(self.original_date));
                }
                Ok(())
            }
            ExceptionAction::Modify { modifications } => {
                if modifications.is_empty() {
                    return Err(CoreError::InvalidException(
                        "Modify exceptions require at least one modified field".to_string(),
                    ));
                }
                if let Some(end) = modifications.end_date {
                    let start = modifications.start_date.unwrap_or(self.original_date);
                    if end <= start {
                        return Err(CoreError::InvalidException(format!(
                            "Modified end {} must be after occurrence start {}",
                            end, start
                        )));
                    }
                }
                if matches!(&modifications.title, Some(title) if title.trim().is_empty()) {
                    return Err(CoreError::InvalidException(
                        "Modified title cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn lesson_id(&self) -> Uuid {
        self.lesson_id
    }

    pub fn original_date(&self) -> DateTime<Utc> {
        self.original_date
    }

    pub fn action(&self) -> &ExceptionAction {
        &self.action
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn exception_type(&self) -> ExceptionType {
        self.action.exception_type()
    }

    pub fn new_date(&self) -> Option<DateTime<Utc>> {
        match self.action {
            ExceptionAction::Reschedule { new_date } => Some(new_date),
            _ => None,
        }
    }

    pub fn modifications(&self) -> Option<&LessonModifications> {
        match &self.action {
            ExceptionAction::Modify { modifications } => Some(modifications),
            _ => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self.action, ExceptionAction::Skip)
    }

    pub fn is_reschedule(&self) -> bool {
        matches!(self.action, ExceptionAction::Reschedule { .. })
    }

    pub fn is_modify(&self) -> bool {
        matches!(self.action, ExceptionAction::Modify { .. })
    }

    /// Exact-instant match against the original occurrence.
    pub fn applies_to(&self, date: DateTime<Utc>) -> bool {
        self.original_date == date
    }
}

// ============================================================================
// Occurrences
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceStatus {
    Scheduled,
    Rescheduled,
    Modified,
}

impl fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccurrenceStatus::Scheduled => write!(f, "scheduled"),
            OccurrenceStatus::Rescheduled => write!(f, "rescheduled"),
            OccurrenceStatus::Modified => write!(f, "modified"),
        }
    }
}

/// A concrete instance of a lesson, projected for a query window. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub lesson_id: Uuid,
    /// The candidate instant this occurrence was generated from; the key for
    /// skipping or moving it
    pub original_date: DateTime<Utc>,
    /// Position in the series counted from the anchor; `None` for one-off lessons
    pub sequence_index: Option<u32>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub teacher_ids: Vec<Uuid>,
    pub pupil_ids: Vec<Uuid>,
    pub status: OccurrenceStatus,
    pub exception_id: Option<Uuid>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Limits applied by the schedule service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Longest query window accepted, in days
    pub max_window_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_window_days: 366 }
    }
}
