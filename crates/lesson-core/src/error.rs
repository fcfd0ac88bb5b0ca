use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid exception: {0}")]
    InvalidException(String),

    #[error("Cannot reschedule an occurrence to its own date ({0})")]
    SameDateReschedule(DateTime<Utc>),

    #[error("Query window of {days} days exceeds the maximum of {max} days")]
    WindowTooLarge { days: i64, max: i64 },

    #[error("Lesson not found: {0}")]
    LessonNotFound(Uuid),

    #[error("Lesson {0} is not recurring")]
    LessonNotRecurring(Uuid),

    #[error("Lesson {lesson_id} already has an exception for {original_date}")]
    LessonExceptionAlreadyExists {
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
    },

    #[error("Exception not found: {0}")]
    ExceptionNotFound(Uuid),
}

impl CoreError {
    /// True for errors the caller can fix by changing the request, as opposed
    /// to storage failures.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            CoreError::Database(_)
                | CoreError::Migration(_)
                | CoreError::Io(_)
                | CoreError::Serialization(_)
        )
    }
}
