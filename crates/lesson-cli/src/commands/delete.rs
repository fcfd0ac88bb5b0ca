use anyhow::Result;
use dialoguer::Confirm;
use lesson_core::error::CoreError;
use lesson_core::repository::Repository;
use lesson_core::service::ScheduleService;
use owo_colors::OwoColorize;

use crate::cli::DeleteCommand;
use crate::util::parse_id;

pub async fn delete_lesson<R: Repository>(service: &ScheduleService<R>, command: DeleteCommand) -> Result<()> {
    let lesson_id = parse_id(&command.id)?;
    let lesson = service
        .repository()
        .find_lesson_by_id(lesson_id)
        .await?
        .filter(|l| !l.deleted)
        .ok_or(CoreError::LessonNotFound(lesson_id))?;

    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Are you sure you want to delete lesson '{}' and all of its occurrences?",
                lesson.title
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    service.delete_lesson(lesson_id).await?;
    println!("{} Deleted lesson '{}'", "Success:".green().bold(), lesson.title);
    Ok(())
}
