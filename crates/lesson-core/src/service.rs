use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::CoreError;
use crate::generator::generate_occurrences;
use crate::models::{
    Lesson, LessonModifications, NewLessonData, Occurrence, OccurrenceException, SchedulerConfig,
    UpdateLessonData,
};
use crate::repository::Repository;

const SECONDS_PER_DAY: i64 = 86_400;

/// ScheduleService: the exposed contract of the engine.
///
/// Responsibilities:
/// 1. Answer "which occurrences exist" for a teacher and window
/// 2. Record skip / reschedule / modify exceptions against recurring lessons
/// 3. Keep the exception overlay consistent when a lesson's pattern is replaced
pub struct ScheduleService<R> {
    repository: R,
    config: SchedulerConfig,
}

impl<R: Repository> ScheduleService<R> {
    pub fn new(repository: R, config: SchedulerConfig) -> Self {
        Self { repository, config }
    }

    pub fn with_defaults(repository: R) -> Self {
        Self::new(repository, SchedulerConfig::default())
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Returns every occurrence of the user's lessons in `[window_start, window_end]`.
    ///
    /// # Returns
    /// * `Result<Vec<Occurrence>, CoreError>` - Occurrences sorted by start, then lesson id
    ///
    /// # Behavior
    /// - Load the user's lessons for the window in one call
    /// - Load all of their exceptions for the window in one call
    /// - Expand each lesson independently and merge with a single sort
    /// - Repository failures propagate; nothing partial is returned
    pub async fn occurrences_for_period(
        &self,
        user_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, CoreError> {
        self.validate_window(window_start, window_end)?;

        let lessons = self
            .repository
            .find_lessons_for_teacher_in_window(user_id, window_start, window_end)
            .await?;
        if lessons.is_empty() {
            return Ok(Vec::new());
        }

        let lesson_ids: Vec<Uuid> = lessons.iter().map(|l| l.id).collect();
        let exceptions = self
            .repository
            .find_exceptions_by_lessons_and_range(&lesson_ids, window_start, window_end)
            .await?;

        let mut by_lesson: HashMap<Uuid, Vec<OccurrenceException>> = HashMap::with_capacity(lessons.len());
        for exception in exceptions {
            by_lesson.entry(exception.lesson_id()).or_default().push(exception);
        }

        let mut occurrences: Vec<Occurrence> = lessons
            .iter()
            .flat_map(|lesson| {
                let lesson_exceptions = by_lesson.get(&lesson.id).map(Vec::as_slice).unwrap_or(&[]);
                generate_occurrences(lesson, lesson_exceptions, window_start, window_end)
            })
            .collect();
        sort_occurrences(&mut occurrences);

        tracing::debug!(
            %user_id,
            lessons = lessons.len(),
            occurrences = occurrences.len(),
            "generated occurrences for period"
        );
        Ok(occurrences)
    }

    /// Cancels one occurrence of a recurring lesson.
    pub async fn skip_occurrence(
        &self,
        lesson_id: Uuid,
        occurrence_date: DateTime<Utc>,
    ) -> Result<OccurrenceException, CoreError> {
        self.ensure_exception_slot_free(lesson_id, occurrence_date).await?;
        let exception = OccurrenceException::skip(lesson_id, occurrence_date)?;
        self.persist(exception).await
    }

    /// Moves one occurrence of a recurring lesson to `new_date`, keeping its duration.
    pub async fn reschedule_occurrence(
        &self,
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
        new_date: DateTime<Utc>,
    ) -> Result<OccurrenceException, CoreError> {
        self.ensure_exception_slot_free(lesson_id, original_date).await?;
        let exception = OccurrenceException::reschedule(lesson_id, original_date, new_date)?;
        self.persist(exception).await
    }

    /// Overrides lesson fields for one occurrence of a recurring lesson.
    pub async fn modify_occurrence(
        &self,
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
        modifications: LessonModifications,
    ) -> Result<OccurrenceException, CoreError> {
        self.ensure_exception_slot_free(lesson_id, original_date).await?;
        let exception = OccurrenceException::modify(lesson_id, original_date, modifications)?;
        self.persist(exception).await
    }

    /// Removes an exception, restoring the occurrence it replaced.
    pub async fn remove_exception(&self, exception_id: Uuid) -> Result<(), CoreError> {
        self.repository.delete_exception(exception_id).await?;
        tracing::info!(%exception_id, "removed occurrence exception");
        Ok(())
    }

    pub async fn exceptions_for_lesson(&self, lesson_id: Uuid) -> Result<Vec<OccurrenceException>, CoreError> {
        self.require_lesson(lesson_id).await?;
        self.repository.find_exceptions_for_lesson(lesson_id).await
    }

    pub async fn create_lesson(&self, data: NewLessonData) -> Result<Lesson, CoreError> {
        let lesson = Lesson::new(data)?;
        self.repository.save_lesson(&lesson).await?;
        tracing::info!(lesson_id = %lesson.id, recurring = lesson.is_recurring(), "created lesson");
        Ok(lesson)
    }

    /// Edits a lesson. When the recurrence pattern is replaced or a recurring
    /// lesson's anchor moves, all of its exceptions are deleted in the same write.
    pub async fn update_lesson(&self, lesson_id: Uuid, data: UpdateLessonData) -> Result<Lesson, CoreError> {
        let mut lesson = self.require_lesson(lesson_id).await?;
        let exceptions_stale = lesson.apply_update(data)?;

        if exceptions_stale {
            let removed = self.repository.replace_lesson(&lesson).await?;
            tracing::info!(%lesson_id, removed, "pattern replaced, cleared exceptions");
        } else {
            self.repository.save_lesson(&lesson).await?;
            tracing::info!(%lesson_id, "updated lesson");
        }
        Ok(lesson)
    }

    /// Soft-deletes a lesson; its history stays in storage.
    pub async fn delete_lesson(&self, lesson_id: Uuid) -> Result<(), CoreError> {
        self.repository.delete_lesson(lesson_id).await?;
        tracing::info!(%lesson_id, "deleted lesson");
        Ok(())
    }

    fn validate_window(&self, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Result<(), CoreError> {
        if window_end < window_start {
            return Err(CoreError::InvalidInput(format!(
                "Window end {} is before window start {}",
                window_end, window_start
            )));
        }
        let span = window_end - window_start;
        let max = self.config.max_window_days;
        if span.num_seconds() > max.saturating_mul(SECONDS_PER_DAY) {
            // Partial days count as a whole day in the report
            let whole = span.num_days();
            let days = if span.num_seconds() % SECONDS_PER_DAY == 0 { whole } else { whole + 1 };
            return Err(CoreError::WindowTooLarge { days, max });
        }
        Ok(())
    }

    async fn require_lesson(&self, lesson_id: Uuid) -> Result<Lesson, CoreError> {
        match self.repository.find_lesson_by_id(lesson_id).await? {
            Some(lesson) if !lesson.deleted => Ok(lesson),
            _ => Err(CoreError::LessonNotFound(lesson_id)),
        }
    }

    /// Preconditions shared by every exception mutation.
    async fn ensure_exception_slot_free(
        &self,
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let lesson = self.require_lesson(lesson_id).await?;
        if !lesson.is_recurring() {
            tracing::warn!(%lesson_id, "rejected exception on non-recurring lesson");
            return Err(CoreError::LessonNotRecurring(lesson_id));
        }

        if self
            .repository
            .find_exception_by_lesson_and_date(lesson_id, original_date)
            .await?
            .is_some()
        {
            tracing::warn!(%lesson_id, %original_date, "exception already exists");
            return Err(CoreError::LessonExceptionAlreadyExists {
                lesson_id,
                original_date,
            });
        }
        Ok(())
    }

    async fn persist(&self, exception: OccurrenceException) -> Result<OccurrenceException, CoreError> {
        self.repository.create_exception(&exception).await?;
        tracing::info!(
            lesson_id = %exception.lesson_id(),
            original_date = %exception.original_date(),
            exception_type = %exception.exception_type(),
            "recorded occurrence exception"
        );
        Ok(exception)
    }
}

/// Orders occurrences by start, breaking ties by lesson id and then by the
/// original slot, so the result never depends on load order.
pub fn sort_occurrences(occurrences: &mut [Occurrence]) {
    occurrences.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.lesson_id.cmp(&b.lesson_id))
            .then_with(|| a.original_date.cmp(&b.original_date))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OccurrenceStatus;
    use crate::recurrence::{RecurrencePattern, Termination};
    use crate::repository::{ExceptionReader, ExceptionWriter, LessonReader, LessonWriter};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Weekday};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that counts read round trips.
    #[derive(Default)]
    struct MemoryStore {
        lessons: Mutex<Vec<Lesson>>,
        exceptions: Mutex<Vec<OccurrenceException>>,
        lesson_reads: AtomicUsize,
        exception_reads: AtomicUsize,
        fail_exception_reads: bool,
    }

    #[async_trait]
    impl LessonReader for MemoryStore {
        async fn find_lessons_for_teacher_in_window(
            &self,
            user_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Lesson>, CoreError> {
            self.lesson_reads.fetch_add(1, Ordering::SeqCst);
            let lessons = self.lessons.lock().unwrap();
            Ok(lessons
                .iter()
                .filter(|l| !l.deleted && l.teacher_ids.contains(&user_id))
                .filter(|l| l.start_date <= end && l.active_until().map_or(true, |u| u >= start))
                .cloned()
                .collect())
        }

        async fn find_lesson_by_id(&self, id: Uuid) -> Result<Option<Lesson>, CoreError> {
            Ok(self.lessons.lock().unwrap().iter().find(|l| l.id == id).cloned())
        }
    }

    #[async_trait]
    impl LessonWriter for MemoryStore {
        async fn save_lesson(&self, lesson: &Lesson) -> Result<(), CoreError> {
            let mut lessons = self.lessons.lock().unwrap();
            lessons.retain(|l| l.id != lesson.id);
            lessons.push(lesson.clone());
            Ok(())
        }

        async fn replace_lesson(&self, lesson: &Lesson) -> Result<u64, CoreError> {
            self.save_lesson(lesson).await?;
            self.delete_exceptions_for_lesson(lesson.id).await
        }

        async fn delete_lesson(&self, id: Uuid) -> Result<(), CoreError> {
            let mut lessons = self.lessons.lock().unwrap();
            match lessons.iter_mut().find(|l| l.id == id && !l.deleted) {
                Some(lesson) => {
                    lesson.deleted = true;
                    Ok(())
                }
                None => Err(CoreError::LessonNotFound(id)),
            }
        }
    }

    #[async_trait]
    impl ExceptionReader for MemoryStore {
        async fn find_exceptions_by_lessons_and_range(
            &self,
            lesson_ids: &[Uuid],
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<OccurrenceException>, CoreError> {
            self.exception_reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_exception_reads {
                return Err(CoreError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self
                .exceptions
                .lock()
                .unwrap()
                .iter()
                .filter(|e| lesson_ids.contains(&e.lesson_id()))
                .filter(|e| e.original_date() >= start && e.original_date() <= end)
                .cloned()
                .collect())
        }

        async fn find_exception_by_lesson_and_date(
            &self,
            lesson_id: Uuid,
            original_date: DateTime<Utc>,
        ) -> Result<Option<OccurrenceException>, CoreError> {
            Ok(self
                .exceptions
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.lesson_id() == lesson_id && e.applies_to(original_date))
                .cloned())
        }

        async fn find_exceptions_for_lesson(&self, lesson_id: Uuid) -> Result<Vec<OccurrenceException>, CoreError> {
            Ok(self
                .exceptions
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.lesson_id() == lesson_id)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl ExceptionWriter for MemoryStore {
        async fn create_exception(&self, exception: &OccurrenceException) -> Result<(), CoreError> {
            self.exceptions.lock().unwrap().push(exception.clone());
            Ok(())
        }

        async fn delete_exception(&self, id: Uuid) -> Result<(), CoreError> {
            let mut exceptions = self.exceptions.lock().unwrap();
            let before = exceptions.len();
            exceptions.retain(|e| e.id() != id);
            if exceptions.len() == before {
                return Err(CoreError::ExceptionNotFound(id));
            }
            Ok(())
        }

        async fn delete_exceptions_for_lesson(&self, lesson_id: Uuid) -> Result<u64, CoreError> {
            let mut exceptions = self.exceptions.lock().unwrap();
            let before = exceptions.len();
            exceptions.retain(|e| e.lesson_id() != lesson_id);
            Ok((before - exceptions.len()) as u64)
        }
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()
    }

    fn weekly_lesson(teacher: Uuid, title: &str, start: DateTime<Utc>) -> NewLessonData {
        NewLessonData {
            title: title.to_string(),
            teacher_ids: vec![teacher],
            start_date: start,
            end_date: start + Duration::minutes(45),
            pattern: Some(RecurrencePattern::weekly()),
            ..Default::default()
        }
    }

    fn service() -> ScheduleService<MemoryStore> {
        ScheduleService::with_defaults(MemoryStore::default())
    }

    mod query_tests {
        use super::*;

        #[tokio::test]
        async fn test_no_lessons_skips_exception_read() {
            let service = service();
            let result = service.occurrences_for_period(Uuid::now_v7(), at(1, 0), at(31, 0)).await.unwrap();

            assert!(result.is_empty());
            assert_eq!(service.repository().lesson_reads.load(Ordering::SeqCst), 1);
            assert_eq!(service.repository().exception_reads.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_many_lessons_use_two_reads_and_sorted_output() {
            let service = service();
            let teacher = Uuid::now_v7();
            for (i, title) in ["Cello", "Flute", "Oboe", "Harp"].iter().enumerate() {
                service
                    .create_lesson(weekly_lesson(teacher, title, at(3 + i as u32, 10)))
                    .await
                    .unwrap();
            }

            let result = service.occurrences_for_period(teacher, at(1, 0), at(31, 23)).await.unwrap();

            assert_eq!(service.repository().lesson_reads.load(Ordering::SeqCst), 1);
            assert_eq!(service.repository().exception_reads.load(Ordering::SeqCst), 1);
            assert_eq!(result.len(), 17);
            assert!(result.windows(2).all(|w| w[0].start_date <= w[1].start_date));
        }

        #[tokio::test]
        async fn test_ties_broken_by_lesson_id() {
            let service = service();
            let teacher = Uuid::now_v7();
            let first = service.create_lesson(weekly_lesson(teacher, "A", at(3, 10))).await.unwrap();
            let second = service.create_lesson(weekly_lesson(teacher, "B", at(3, 10))).await.unwrap();

            // Reverse storage order so arrival order disagrees with id order
            service.repository().lessons.lock().unwrap().reverse();

            let result = service.occurrences_for_period(teacher, at(3, 0), at(3, 23)).await.unwrap();
            let mut expected = vec![first.id, second.id];
            expected.sort();
            assert_eq!(result.iter().map(|o| o.lesson_id).collect::<Vec<_>>(), expected);
        }

        #[tokio::test]
        async fn test_exception_overlay_applied() {
            let service = service();
            let teacher = Uuid::now_v7();
            let lesson = service.create_lesson(weekly_lesson(teacher, "Cello", at(3, 10))).await.unwrap();

            service.skip_occurrence(lesson.id, at(10, 10)).await.unwrap();
            service.reschedule_occurrence(lesson.id, at(17, 10), at(18, 12)).await.unwrap();

            let result = service.occurrences_for_period(teacher, at(1, 0), at(31, 23)).await.unwrap();
            let starts: Vec<_> = result.iter().map(|o| o.start_date).collect();
            assert_eq!(starts, vec![at(3, 10), at(18, 12), at(24, 10), at(31, 10)]);
            assert_eq!(result[1].status, OccurrenceStatus::Rescheduled);
        }

        #[tokio::test]
        async fn test_only_teachers_lessons_returned() {
            let service = service();
            let teacher = Uuid::now_v7();
            service.create_lesson(weekly_lesson(Uuid::now_v7(), "Other", at(3, 10))).await.unwrap();

            let result = service.occurrences_for_period(teacher, at(1, 0), at(31, 23)).await.unwrap();
            assert!(result.is_empty());
        }

        #[tokio::test]
        async fn test_repository_failure_propagates() {
            let store = MemoryStore {
                fail_exception_reads: true,
                ..Default::default()
            };
            let service = ScheduleService::with_defaults(store);
            let teacher = Uuid::now_v7();
            service.create_lesson(weekly_lesson(teacher, "Cello", at(3, 10))).await.unwrap();

            let result = service.occurrences_for_period(teacher, at(1, 0), at(31, 23)).await;
            assert!(matches!(result, Err(CoreError::Database(sqlx::Error::PoolTimedOut))));
        }

        #[tokio::test]
        async fn test_window_validation() {
            let service = ScheduleService::new(MemoryStore::default(), SchedulerConfig { max_window_days: 30 });
            let user = Uuid::now_v7();

            let inverted = service.occurrences_for_period(user, at(10, 0), at(1, 0)).await;
            assert!(matches!(inverted, Err(CoreError::InvalidInput(_))));

            let too_large = service
                .occurrences_for_period(user, at(1, 0), at(1, 0) + Duration::days(45))
                .await;
            assert!(matches!(too_large, Err(CoreError::WindowTooLarge { days: 45, max: 30 })));

            let partial_day_over = service
                .occurrences_for_period(user, at(1, 0), at(1, 0) + Duration::days(30) + Duration::hours(23))
                .await;
            assert!(matches!(partial_day_over, Err(CoreError::WindowTooLarge { days: 31, max: 30 })));

            let exactly_max = service
                .occurrences_for_period(user, at(1, 0), at(1, 0) + Duration::days(30))
                .await;
            assert!(exactly_max.is_ok());
        }
    }

    mod mutation_tests {
        use super::*;

        #[tokio::test]
        async fn test_skip_unknown_lesson() {
            let service = service();
            let result = service.skip_occurrence(Uuid::now_v7(), at(3, 10)).await;
            assert!(matches!(result, Err(CoreError::LessonNotFound(_))));
        }

        #[tokio::test]
        async fn test_skip_non_recurring_lesson() {
            let service = service();
            let data = NewLessonData {
                pattern: None,
                ..weekly_lesson(Uuid::now_v7(), "Trial lesson", at(3, 10))
            };
            let lesson = service.create_lesson(data).await.unwrap();

            let result = service.skip_occurrence(lesson.id, at(3, 10)).await;
            assert!(matches!(result, Err(CoreError::LessonNotRecurring(id)) if id == lesson.id));
        }

        #[tokio::test]
        async fn test_skip_deleted_lesson() {
            let service = service();
            let lesson = service
                .create_lesson(weekly_lesson(Uuid::now_v7(), "Cello", at(3, 10)))
                .await
                .unwrap();
            service.delete_lesson(lesson.id).await.unwrap();

            let result = service.skip_occurrence(lesson.id, at(3, 10)).await;
            assert!(matches!(result, Err(CoreError::LessonNotFound(_))));
        }

        #[tokio::test]
        async fn test_duplicate_skip_does_not_mutate() {
            let service = service();
            let lesson = service
                .create_lesson(weekly_lesson(Uuid::now_v7(), "Cello", at(3, 10)))
                .await
                .unwrap();
            let first = service.skip_occurrence(lesson.id, at(10, 10)).await.unwrap();

            let second = service.skip_occurrence(lesson.id, at(10, 10)).await;
            assert!(matches!(
                second,
                Err(CoreError::LessonExceptionAlreadyExists { original_date, .. }) if original_date == at(10, 10)
            ));

            let stored = service.repository().exceptions.lock().unwrap().clone();
            assert_eq!(stored, vec![first]);
        }

        #[tokio::test]
        async fn test_reschedule_existing_slot_rejected() {
            let service = service();
            let lesson = service
                .create_lesson(weekly_lesson(Uuid::now_v7(), "Cello", at(3, 10)))
                .await
                .unwrap();
            service.skip_occurrence(lesson.id, at(10, 10)).await.unwrap();

            let result = service.reschedule_occurrence(lesson.id, at(10, 10), at(11, 10)).await;
            assert!(matches!(result, Err(CoreError::LessonExceptionAlreadyExists { .. })));
        }

        #[tokio::test]
        async fn test_reschedule_same_date_writes_nothing() {
            let service = service();
            let lesson = service
                .create_lesson(weekly_lesson(Uuid::now_v7(), "Cello", at(3, 10)))
                .await
                .unwrap();

            let result = service.reschedule_occurrence(lesson.id, at(10, 10), at(10, 10)).await;
            assert!(matches!(result, Err(CoreError::SameDateReschedule(_))));
            assert!(service.repository().exceptions.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_modify_empty_rejected() {
            let service = service();
            let lesson = service
                .create_lesson(weekly_lesson(Uuid::now_v7(), "Cello", at(3, 10)))
                .await
                .unwrap();

            let result = service
                .modify_occurrence(lesson.id, at(10, 10), LessonModifications::default())
                .await;
            assert!(matches!(result, Err(CoreError::InvalidException(_))));
        }

        #[tokio::test]
        async fn test_modify_end_before_occurrence_rejected() {
            let service = service();
            let lesson = service
                .create_lesson(weekly_lesson(Uuid::now_v7(), "Cello", at(3, 10)))
                .await
                .unwrap();

            let modifications = LessonModifications {
                end_date: Some(at(10, 8)),
                ..Default::default()
            };
            let result = service.modify_occurrence(lesson.id, at(10, 10), modifications).await;

            assert!(matches!(result, Err(CoreError::InvalidException(_))));
            assert!(service.repository().exceptions.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_modify_end_extends_occurrence() {
            let service = service();
            let teacher = Uuid::now_v7();
            let lesson = service.create_lesson(weekly_lesson(teacher, "Cello", at(3, 10))).await.unwrap();

            let modifications = LessonModifications {
                end_date: Some(at(10, 12)),
                ..Default::default()
            };
            service.modify_occurrence(lesson.id, at(10, 10), modifications).await.unwrap();

            let result = service.occurrences_for_period(teacher, at(10, 0), at(10, 23)).await.unwrap();
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].start_date, at(10, 10));
            assert_eq!(result[0].end_date, at(10, 12));
            assert_eq!(result[0].status, OccurrenceStatus::Modified);
        }

        #[tokio::test]
        async fn test_remove_exception_restores_occurrence() {
            let service = service();
            let teacher = Uuid::now_v7();
            let lesson = service.create_lesson(weekly_lesson(teacher, "Cello", at(3, 10))).await.unwrap();
            let skip = service.skip_occurrence(lesson.id, at(10, 10)).await.unwrap();

            service.remove_exception(skip.id()).await.unwrap();

            let result = service.occurrences_for_period(teacher, at(10, 0), at(10, 23)).await.unwrap();
            assert_eq!(result.len(), 1);
            assert!(matches!(
                service.remove_exception(skip.id()).await,
                Err(CoreError::ExceptionNotFound(_))
            ));
        }

        #[tokio::test]
        async fn test_pattern_replacement_clears_exceptions() {
            let service = service();
            let lesson = service
                .create_lesson(weekly_lesson(Uuid::now_v7(), "Cello", at(3, 10)))
                .await
                .unwrap();
            service.skip_occurrence(lesson.id, at(10, 10)).await.unwrap();
            service.reschedule_occurrence(lesson.id, at(17, 10), at(18, 10)).await.unwrap();

            let update = UpdateLessonData {
                pattern: Some(Some(RecurrencePattern::daily().ending(Termination::After(10)).unwrap())),
                ..Default::default()
            };
            service.update_lesson(lesson.id, update).await.unwrap();

            assert!(service.exceptions_for_lesson(lesson.id).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_unrelated_edit_keeps_exceptions() {
            let service = service();
            let lesson = service
                .create_lesson(weekly_lesson(Uuid::now_v7(), "Cello", at(3, 10)))
                .await
                .unwrap();
            service.skip_occurrence(lesson.id, at(10, 10)).await.unwrap();

            let update = UpdateLessonData {
                title: Some("Cello ensemble".to_string()),
                pupil_ids: Some(vec![Uuid::now_v7()]),
                ..Default::default()
            };
            let updated = service.update_lesson(lesson.id, update).await.unwrap();

            assert_eq!(updated.title, "Cello ensemble");
            assert_eq!(service.exceptions_for_lesson(lesson.id).await.unwrap().len(), 1);
        }
    }

    fn occurrence_strategy() -> impl Strategy<Value = Occurrence> {
        (0i64..48, 0u8..4, 0i64..48).prop_map(|(start_hours, lesson, original_hours)| {
            let start = at(1, 0) + Duration::hours(start_hours);
            Occurrence {
                lesson_id: Uuid::from_u128(u128::from(lesson)),
                original_date: at(1, 0) + Duration::hours(original_hours),
                sequence_index: None,
                start_date: start,
                end_date: start + Duration::hours(1),
                title: String::new(),
                description: None,
                teacher_ids: Vec::new(),
                pupil_ids: Vec::new(),
                status: OccurrenceStatus::Scheduled,
                exception_id: None,
            }
        })
    }

    proptest! {
        #[test]
        fn prop_sort_is_independent_of_arrival_order(
            mut occurrences in proptest::collection::vec(occurrence_strategy(), 0..30),
        ) {
            let mut reversed: Vec<_> = occurrences.iter().rev().cloned().collect();
            sort_occurrences(&mut occurrences);
            sort_occurrences(&mut reversed);

            prop_assert_eq!(&occurrences, &reversed);
            for pair in occurrences.windows(2) {
                prop_assert!(pair[0].start_date <= pair[1].start_date);
                if pair[0].start_date == pair[1].start_date {
                    prop_assert!(pair[0].lesson_id <= pair[1].lesson_id);
                }
            }
        }
    }

    #[test]
    fn test_weekly_pair_count_through_service() {
        tokio_test::block_on(async {
            let service = service();
            let teacher = Uuid::now_v7();
            let data = NewLessonData {
                pattern: Some(RecurrencePattern::weekly().on_days([Weekday::Mon, Weekday::Wed]).unwrap()),
                ..weekly_lesson(teacher, "Theory", at(3, 9))
            };
            service.create_lesson(data).await.unwrap();

            let result = service.occurrences_for_period(teacher, at(3, 0), at(16, 23)).await.unwrap();
            assert_eq!(result.len(), 4);
        });
    }
}
