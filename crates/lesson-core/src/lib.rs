//! # Lesson Core Library
//!
//! Recurrence and exception-overlay engine for recurring lessons. A lesson is
//! stored once, together with an optional recurrence pattern; individual
//! occurrences are never persisted. They are generated on demand for a query
//! window and then adjusted by per-occurrence exceptions (skip, reschedule,
//! modify).
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Lessons, exceptions and generated occurrences
//! - [`recurrence`]: Recurrence patterns and lazy candidate expansion
//! - [`generator`]: Pure occurrence generation for a single lesson
//! - [`repository`]: Data access layer with Repository pattern
//! - [`service`]: Period queries and exception mutations
//! - [`error`]: Error types shared by every layer
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chrono::{Duration, Utc};
//! use lesson_core::{
//!     db, models::NewLessonData, recurrence::RecurrencePattern,
//!     repository::SqliteRepository, service::ScheduleService,
//! };
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lesson_core::error::CoreError> {
//!     let pool = db::establish_connection("lessons.db").await?;
//!     let service = ScheduleService::with_defaults(SqliteRepository::new(pool));
//!
//!     let teacher = Uuid::now_v7();
//!     let start = Utc::now();
//!     let lesson = service
//!         .create_lesson(NewLessonData {
//!             title: "Piano".to_string(),
//!             teacher_ids: vec![teacher],
//!             start_date: start,
//!             end_date: start + Duration::minutes(45),
//!             pattern: Some(RecurrencePattern::weekly()),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     service.skip_occurrence(lesson.id, start + Duration::weeks(1)).await?;
//!
//!     let week_view = service
//!         .occurrences_for_period(teacher, start, start + Duration::weeks(4))
//!         .await?;
//!     println!("{} lessons in the next four weeks", week_view.len());
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod generator;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod service;
