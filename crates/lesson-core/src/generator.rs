//! Projection of a lesson and its exceptions onto a query window.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{
    ExceptionAction, Lesson, LessonModifications, Occurrence, OccurrenceException, OccurrenceStatus,
};

/// Expands one lesson into its concrete occurrences for `[window_start, window_end]`.
///
/// # Arguments
/// * `lesson` - The base lesson, recurring or not
/// * `exceptions` - Exceptions recorded for this lesson; others are ignored
/// * `window_start` - Inclusive start of the query window
/// * `window_end` - Inclusive end of the query window
///
/// # Behavior
/// - Deleted lessons produce nothing
/// - One-off lessons produce their base occurrence iff it overlaps the window
/// - Recurring lessons produce one occurrence per candidate, after overlaying:
///   - Skip: candidate omitted
///   - Reschedule: emitted at the new date with the base duration, even when
///     the new date lies outside the window
///   - Modify: emitted at the candidate with field overrides applied
/// - Occurrences come back in candidate order
pub fn generate_occurrences(
    lesson: &Lesson,
    exceptions: &[OccurrenceException],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<Occurrence> {
    if lesson.deleted || window_end < window_start {
        return Vec::new();
    }

    let Some(pattern) = &lesson.pattern else {
        if lesson.start_date <= window_end && lesson.end_date >= window_start {
            return vec![base_occurrence(lesson, lesson.start_date, None)];
        }
        return Vec::new();
    };

    // Exceptions keyed by original instant for O(1) lookup
    let mut by_date: HashMap<DateTime<Utc>, &OccurrenceException> =
        HashMap::with_capacity(exceptions.len());
    for exception in exceptions.iter().filter(|e| e.lesson_id() == lesson.id) {
        by_date.insert(exception.original_date(), exception);
    }

    let duration = lesson.duration();
    let mut occurrences = Vec::new();

    for candidate in pattern.candidates(lesson.start_date, window_start, window_end) {
        let Some(exception) = by_date.get(&candidate.date) else {
            occurrences.push(base_occurrence(lesson, candidate.date, Some(candidate.index)));
            continue;
        };

        match exception.action() {
            ExceptionAction::Skip => continue,
            ExceptionAction::Reschedule { new_date } => {
                let mut occurrence = base_occurrence(lesson, candidate.date, Some(candidate.index));
                occurrence.start_date = *new_date;
                occurrence.end_date = *new_date + duration;
                occurrence.status = OccurrenceStatus::Rescheduled;
                occurrence.exception_id = Some(exception.id());
                occurrences.push(occurrence);
            }
            ExceptionAction::Modify { modifications } => {
                let mut occurrence = base_occurrence(lesson, candidate.date, Some(candidate.index));
                apply_modifications(&mut occurrence, modifications, lesson);
                occurrence.exception_id = Some(exception.id());
                occurrences.push(occurrence);
            }
        }
    }

    tracing::trace!(
        lesson_id = %lesson.id,
        exceptions = by_date.len(),
        occurrences = occurrences.len(),
        "expanded recurring lesson"
    );

    occurrences
}

fn base_occurrence(lesson: &Lesson, start: DateTime<Utc>, sequence_index: Option<u32>) -> Occurrence {
    Occurrence {
        lesson_id: lesson.id,
        original_date: start,
        sequence_index,
        start_date: start,
        end_date: start + lesson.duration(),
        title: lesson.title.clone(),
        description: lesson.description.clone(),
        teacher_ids: lesson.teacher_ids.clone(),
        pupil_ids: lesson.pupil_ids.clone(),
        status: OccurrenceStatus::Scheduled,
        exception_id: None,
    }
}

fn apply_modifications(occurrence: &mut Occurrence, modifications: &LessonModifications, lesson: &Lesson) {
    if let Some(title) = &modifications.title {
        occurrence.title = title.clone();
    }
    if let Some(description) = &modifications.description {
        occurrence.description = description.clone();
    }
    if let Some(teacher_ids) = &modifications.teacher_ids {
        occurrence.teacher_ids = teacher_ids.clone();
    }
    if let Some(pupil_ids) = &modifications.pupil_ids {
        occurrence.pupil_ids = pupil_ids.clone();
    }

    if let Some(start) = modifications.start_date {
        occurrence.start_date = start;
    }
    occurrence.end_date = modifications
        .end_date
        .unwrap_or(occurrence.start_date + lesson.duration());
    occurrence.status = OccurrenceStatus::Modified;
}
