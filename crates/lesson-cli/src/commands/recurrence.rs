use anyhow::Result;
use lesson_core::repository::Repository;
use lesson_core::service::ScheduleService;
use owo_colors::OwoColorize;

use crate::cli::{ExceptionsCommand, MoveCommand, SkipCommand, UnskipCommand};
use crate::parser::parse_date;
use crate::util::parse_id;
use crate::views::table::display_exceptions;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub async fn skip_command<R: Repository>(service: &ScheduleService<R>, command: SkipCommand) -> Result<()> {
    let lesson_id = parse_id(&command.id)?;
    let skip_date = parse_date(&command.on)?;

    let exception = service.skip_occurrence(lesson_id, skip_date).await?;

    println!(
        "{} Occurrence on {} has been skipped (exception {})",
        "Success:".green().bold(),
        skip_date.format(DATE_FORMAT),
        exception.id().yellow()
    );
    Ok(())
}

pub async fn move_command<R: Repository>(service: &ScheduleService<R>, command: MoveCommand) -> Result<()> {
    let lesson_id = parse_id(&command.id)?;
    let from_date = parse_date(&command.from)?;
    let to_date = parse_date(&command.to)?;

    let exception = service.reschedule_occurrence(lesson_id, from_date, to_date).await?;

    println!(
        "{} Occurrence moved from {} to {} (exception {})",
        "Success:".green().bold(),
        from_date.format(DATE_FORMAT),
        to_date.format(DATE_FORMAT),
        exception.id().yellow()
    );
    Ok(())
}

pub async fn exceptions_command<R: Repository>(
    service: &ScheduleService<R>,
    command: ExceptionsCommand,
) -> Result<()> {
    let lesson_id = parse_id(&command.id)?;
    let exceptions = service.exceptions_for_lesson(lesson_id).await?;
    display_exceptions(&exceptions);
    Ok(())
}

pub async fn unskip_command<R: Repository>(service: &ScheduleService<R>, command: UnskipCommand) -> Result<()> {
    let exception_id = parse_id(&command.id)?;
    service.remove_exception(exception_id).await?;

    println!("{} Exception {} removed", "Success:".green().bold(), exception_id.yellow());
    Ok(())
}
