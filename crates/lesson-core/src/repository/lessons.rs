use crate::error::CoreError;
use crate::models::Lesson;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// Upper bound on ids bound into a single `IN (...)` list.
pub(crate) const MAX_BIND_IDS: usize = 500;

const LESSON_COLUMNS: &str =
    "id, title, description, start_date, end_date, pattern, deleted, created_at, updated_at";

#[derive(Debug, FromRow)]
struct LessonRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    pattern: Option<String>,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
enum ParticipantRole {
    Teacher,
    Pupil,
}

#[derive(Debug, FromRow)]
struct ParticipantRow {
    lesson_id: Uuid,
    user_id: Uuid,
    role: ParticipantRole,
}

#[async_trait]
impl super::LessonReader for SqliteRepository {
    async fn find_lessons_for_teacher_in_window(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Lesson>, CoreError> {
        let rows: Vec<LessonRow> = sqlx::query_as(&format!(
            r#"SELECT {LESSON_COLUMNS} FROM lessons l
            WHERE l.deleted = 0
            AND l.start_date <= $1
            AND (l.active_until IS NULL OR l.active_until >= $2)
            AND EXISTS (
                SELECT 1 FROM lesson_participants p
                WHERE p.lesson_id = l.id AND p.role = 'teacher' AND p.user_id = $3
            )
            ORDER BY l.start_date, l.id"#
        ))
        .bind(end)
        .bind(start)
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        tracing::debug!(%user_id, lessons = rows.len(), "loaded lessons for window");
        self.attach_participants(rows).await
    }

    async fn find_lesson_by_id(&self, id: Uuid) -> Result<Option<Lesson>, CoreError> {
        let row: Option<LessonRow> =
            sqlx::query_as(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;

        match row {
            Some(row) => Ok(self.attach_participants(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl super::LessonWriter for SqliteRepository {
    async fn save_lesson(&self, lesson: &Lesson) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        Self::write_lesson_in_transaction(&mut tx, lesson).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_lesson(&self, lesson: &Lesson) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;
        Self::write_lesson_in_transaction(&mut tx, lesson).await?;

        let removed = sqlx::query("DELETE FROM occurrence_exceptions WHERE lesson_id = $1")
            .bind(lesson.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed)
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE lessons SET deleted = 1, updated_at = $1 WHERE id = $2 AND deleted = 0",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::LessonNotFound(id));
        }
        Ok(())
    }
}

impl SqliteRepository {
    /// Loads teachers and pupils for all rows in bulk and assembles lessons,
    /// preserving row order.
    async fn attach_participants(&self, rows: Vec<LessonRow>) -> Result<Vec<Lesson>, CoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut participants: HashMap<Uuid, (Vec<Uuid>, Vec<Uuid>)> = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_BIND_IDS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT lesson_id, user_id, role FROM lesson_participants WHERE lesson_id IN (",
            );
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY lesson_id, role, position");

            let found: Vec<ParticipantRow> = qb.build_query_as().fetch_all(self.pool()).await?;
            for row in found {
                let entry = participants.entry(row.lesson_id).or_default();
                match row.role {
                    ParticipantRole::Teacher => entry.0.push(row.user_id),
                    ParticipantRole::Pupil => entry.1.push(row.user_id),
                }
            }
        }

        rows.into_iter()
            .map(|row| -> Result<Lesson, CoreError> {
                let (teacher_ids, pupil_ids) = participants.remove(&row.id).unwrap_or_default();
                let pattern = row.pattern.as_deref().map(serde_json::from_str).transpose()?;
                Ok(Lesson {
                    id: row.id,
                    title: row.title,
                    description: row.description,
                    teacher_ids,
                    pupil_ids,
                    start_date: row.start_date,
                    end_date: row.end_date,
                    pattern,
                    deleted: row.deleted,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                })
            })
            .collect()
    }

    /// Upserts a lesson row and rewrites its participant lists within an
    /// existing transaction
    pub(crate) async fn write_lesson_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        lesson: &Lesson,
    ) -> Result<(), CoreError> {
        lesson.validate()?;

        let pattern = lesson.pattern.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"INSERT INTO lessons (id, title, description, start_date, end_date, pattern, active_until, deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                pattern = excluded.pattern,
                active_until = excluded.active_until,
                deleted = excluded.deleted,
                updated_at = excluded.updated_at"#,
        )
        .bind(lesson.id)
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(lesson.start_date)
        .bind(lesson.end_date)
        .bind(pattern)
        .bind(lesson.active_until())
        .bind(lesson.deleted)
        .bind(lesson.created_at)
        .bind(lesson.updated_at)
        .execute(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM lesson_participants WHERE lesson_id = $1")
            .bind(lesson.id)
            .execute(&mut **tx)
            .await?;

        let participants: Vec<(Uuid, ParticipantRole, i64)> = lesson
            .teacher_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, ParticipantRole::Teacher, i as i64))
            .chain(
                lesson
                    .pupil_ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| (*id, ParticipantRole::Pupil, i as i64)),
            )
            .collect();

        if !participants.is_empty() {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO lesson_participants (lesson_id, user_id, role, position) ");
            qb.push_values(participants.iter(), |mut b, (user_id, role, position)| {
                b.push_bind(lesson.id)
                    .push_bind(*user_id)
                    .push_bind(*role)
                    .push_bind(*position);
            });
            qb.build().execute(&mut **tx).await?;
        }

        Ok(())
    }
}
