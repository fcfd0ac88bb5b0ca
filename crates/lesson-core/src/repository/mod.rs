use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{Lesson, OccurrenceException};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod exceptions;
pub mod lessons;

// Contracts consumed by the schedule service. Implemented for SQLite in the
// domain modules above; tests provide their own in-memory implementations.

/// Read access to base lessons.
#[async_trait]
pub trait LessonReader: Send + Sync {
    /// Non-deleted lessons taught by `user_id` whose active interval
    /// intersects `[start, end]`, recurring or not, in one call.
    async fn find_lessons_for_teacher_in_window(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Lesson>, CoreError>;
    async fn find_lesson_by_id(&self, id: Uuid) -> Result<Option<Lesson>, CoreError>;
}

/// Write access to base lessons.
#[async_trait]
pub trait LessonWriter: Send + Sync {
    /// Inserts or updates a lesson, leaving its exceptions untouched.
    async fn save_lesson(&self, lesson: &Lesson) -> Result<(), CoreError>;
    /// Updates a lesson and deletes all of its exceptions atomically.
    /// Returns the number of exceptions removed.
    async fn replace_lesson(&self, lesson: &Lesson) -> Result<u64, CoreError>;
    /// Soft delete.
    async fn delete_lesson(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Read access to the exception overlay.
#[async_trait]
pub trait ExceptionReader: Send + Sync {
    /// Exceptions of any of `lesson_ids` whose original date lies in `[start, end]`.
    async fn find_exceptions_by_lessons_and_range(
        &self,
        lesson_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceException>, CoreError>;
    async fn find_exception_by_lesson_and_date(
        &self,
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
    ) -> Result<Option<OccurrenceException>, CoreError>;
    async fn find_exceptions_for_lesson(&self, lesson_id: Uuid) -> Result<Vec<OccurrenceException>, CoreError>;
}

/// Write access to the exception overlay.
#[async_trait]
pub trait ExceptionWriter: Send + Sync {
    /// Persists a new exception. A second exception for the same
    /// `(lesson_id, original_date)` fails with `LessonExceptionAlreadyExists`.
    async fn create_exception(&self, exception: &OccurrenceException) -> Result<(), CoreError>;
    async fn delete_exception(&self, id: Uuid) -> Result<(), CoreError>;
    async fn delete_exceptions_for_lesson(&self, lesson_id: Uuid) -> Result<u64, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository: LessonReader + LessonWriter + ExceptionReader + ExceptionWriter {}

impl<T> Repository for T where T: LessonReader + LessonWriter + ExceptionReader + ExceptionWriter {}

/// SQLite implementation of the repository pattern
#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}
