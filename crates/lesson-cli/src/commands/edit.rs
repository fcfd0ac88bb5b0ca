use anyhow::Result;
use dialoguer::Confirm;
use lesson_core::error::CoreError;
use lesson_core::models::UpdateLessonData;
use lesson_core::repository::Repository;
use lesson_core::service::ScheduleService;
use owo_colors::OwoColorize;

use crate::cli::EditCommand;
use crate::parser::{build_pattern, parse_date};
use crate::util::{parse_id, parse_ids};

pub async fn edit_lesson<R: Repository>(service: &ScheduleService<R>, command: EditCommand) -> Result<()> {
    let lesson_id = parse_id(&command.id)?;

    let description = if command.description_clear {
        Some(None)
    } else {
        command.description.map(Some)
    };

    let pattern = if command.no_repeat {
        Some(None)
    } else {
        build_pattern(&command.repeat)?.map(Some)
    };

    let data = UpdateLessonData {
        title: command.title,
        description,
        teacher_ids: (!command.teachers.is_empty())
            .then(|| parse_ids(&command.teachers))
            .transpose()?,
        pupil_ids: (!command.pupils.is_empty())
            .then(|| parse_ids(&command.pupils))
            .transpose()?,
        start_date: command.start.as_deref().map(parse_date).transpose()?,
        end_date: command.end.as_deref().map(parse_date).transpose()?,
        pattern,
    };

    let lesson = service
        .repository()
        .find_lesson_by_id(lesson_id)
        .await?
        .filter(|l| !l.deleted)
        .ok_or(CoreError::LessonNotFound(lesson_id))?;

    // Dry run on a copy to learn whether the edit invalidates exceptions
    let clears_exceptions = lesson.clone().apply_update(data.clone())?;
    if clears_exceptions && !command.force {
        let existing = service.exceptions_for_lesson(lesson_id).await?;
        if !existing.is_empty() {
            println!(
                "{}",
                format!(
                    "This change alters the repetition of '{}' and discards its {} exception(s).",
                    lesson.title,
                    existing.len()
                )
                .yellow()
            );
            let confirmation = Confirm::new()
                .with_prompt("Continue?")
                .default(false)
                .interact()
                .unwrap_or(false);
            if !confirmation {
                println!("Edit cancelled.");
                return Ok(());
            }
        }
    }

    let updated = service.update_lesson(lesson_id, data).await?;
    println!("{} Updated lesson '{}'", "Success:".green().bold(), updated.title);

    Ok(())
}
