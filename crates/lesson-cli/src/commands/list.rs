use anyhow::Result;
use chrono::Duration;
use lesson_core::repository::Repository;
use lesson_core::service::ScheduleService;

use crate::cli::ListCommand;
use crate::config::Config;
use crate::parser::parse_date;
use crate::util::resolve_user;
use crate::views::table::display_occurrences;

pub async fn list_occurrences<R: Repository>(
    service: &ScheduleService<R>,
    command: ListCommand,
    config: &Config,
) -> Result<()> {
    let user_id = resolve_user(command.user.as_deref(), config)?;
    let from = parse_date(&command.from)?;
    let to = match command.to {
        Some(to) => parse_date(&to)?,
        None => from + Duration::weeks(1),
    };

    let occurrences = service.occurrences_for_period(user_id, from, to).await?;
    display_occurrences(&occurrences);

    Ok(())
}
