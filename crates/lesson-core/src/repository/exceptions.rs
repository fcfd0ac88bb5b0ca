use crate::error::CoreError;
use crate::models::{ExceptionType, LessonModifications, OccurrenceException};
use crate::repository::lessons::MAX_BIND_IDS;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use uuid::Uuid;

const EXCEPTION_COLUMNS: &str =
    "id, lesson_id, original_date, exception_type, new_date, modifications, created_at";

/// Flattened storage form of an [`OccurrenceException`].
#[derive(Debug, FromRow)]
struct ExceptionRow {
    id: Uuid,
    lesson_id: Uuid,
    original_date: DateTime<Utc>,
    exception_type: ExceptionType,
    new_date: Option<DateTime<Utc>>,
    modifications: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ExceptionRow> for OccurrenceException {
    type Error = CoreError;

    fn try_from(row: ExceptionRow) -> Result<Self, Self::Error> {
        let modifications: Option<LessonModifications> =
            row.modifications.as_deref().map(serde_json::from_str).transpose()?;
        OccurrenceException::from_parts(
            row.id,
            row.lesson_id,
            row.original_date,
            row.exception_type,
            row.new_date,
            modifications,
            row.created_at,
        )
    }
}

fn into_exceptions(rows: Vec<ExceptionRow>) -> Result<Vec<OccurrenceException>, CoreError> {
    rows.into_iter().map(OccurrenceException::try_from).collect()
}

#[async_trait]
impl super::ExceptionReader for SqliteRepository {
    async fn find_exceptions_by_lessons_and_range(
        &self,
        lesson_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceException>, CoreError> {
        let mut exceptions = Vec::new();

        for chunk in lesson_ids.chunks(MAX_BIND_IDS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {EXCEPTION_COLUMNS} FROM occurrence_exceptions WHERE lesson_id IN ("
            ));
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") AND original_date >= ");
            qb.push_bind(start);
            qb.push(" AND original_date <= ");
            qb.push_bind(end);
            qb.push(" ORDER BY lesson_id, original_date");

            let rows: Vec<ExceptionRow> = qb.build_query_as().fetch_all(self.pool()).await?;
            exceptions.extend(into_exceptions(rows)?);
        }

        tracing::debug!(
            lessons = lesson_ids.len(),
            exceptions = exceptions.len(),
            "loaded exceptions for window"
        );
        Ok(exceptions)
    }

    async fn find_exception_by_lesson_and_date(
        &self,
        lesson_id: Uuid,
        original_date: DateTime<Utc>,
    ) -> Result<Option<OccurrenceException>, CoreError> {
        let row: Option<ExceptionRow> = sqlx::query_as(&format!(
            "SELECT {EXCEPTION_COLUMNS} FROM occurrence_exceptions WHERE lesson_id = $1 AND original_date = $2"
        ))
        .bind(lesson_id)
        .bind(original_date)
        .fetch_optional(self.pool())
        .await?;

        row.map(OccurrenceException::try_from).transpose()
    }

    async fn find_exceptions_for_lesson(&self, lesson_id: Uuid) -> Result<Vec<OccurrenceException>, CoreError> {
        let rows: Vec<ExceptionRow> = sqlx::query_as(&format!(
            "SELECT {EXCEPTION_COLUMNS} FROM occurrence_exceptions WHERE lesson_id = $1 ORDER BY original_date"
        ))
        .bind(lesson_id)
        .fetch_all(self.pool())
        .await?;

        into_exceptions(rows)
    }
}

#[async_trait]
impl super::ExceptionWriter for SqliteRepository {
    async fn create_exception(&self, exception: &OccurrenceException) -> Result<(), CoreError> {
        let modifications = exception.modifications().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"INSERT INTO occurrence_exceptions (id, lesson_id, original_date, exception_type, new_date, modifications, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(exception.id())
        .bind(exception.lesson_id())
        .bind(exception.original_date())
        .bind(exception.exception_type())
        .bind(exception.new_date())
        .bind(modifications)
        .bind(exception.created_at())
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(()),
            // The existence check in the service can race; the unique key decides.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(CoreError::LessonExceptionAlreadyExists {
                    lesson_id: exception.lesson_id(),
                    original_date: exception.original_date(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_exception(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM occurrence_exceptions WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ExceptionNotFound(id));
        }
        Ok(())
    }

    async fn delete_exceptions_for_lesson(&self, lesson_id: Uuid) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM occurrence_exceptions WHERE lesson_id = $1")
            .bind(lesson_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
