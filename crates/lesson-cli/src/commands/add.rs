use anyhow::Result;
use lesson_core::models::NewLessonData;
use lesson_core::repository::Repository;
use lesson_core::service::ScheduleService;
use owo_colors::{OwoColorize, Style};

use crate::cli::AddCommand;
use crate::config::Config;
use crate::parser::{build_pattern, parse_date};
use crate::util::{parse_ids, resolve_user};

pub async fn add_lesson<R: Repository>(
    service: &ScheduleService<R>,
    command: AddCommand,
    config: &Config,
) -> Result<()> {
    let start_date = parse_date(&command.start)?;
    let end_date = parse_date(&command.end)?;
    let pattern = build_pattern(&command.repeat)?;

    let teacher_ids = if command.teachers.is_empty() {
        vec![resolve_user(None, config)?]
    } else {
        parse_ids(&command.teachers)?
    };

    let data = NewLessonData {
        title: command.title,
        description: command.description,
        teacher_ids,
        pupil_ids: parse_ids(&command.pupils)?,
        start_date,
        end_date,
        pattern,
    };

    let lesson = service.create_lesson(data).await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();

    match &lesson.pattern {
        Some(pattern) => println!(
            "{} Created recurring lesson: {} ({})",
            "✓".style(success_style),
            lesson.title.bright_white().bold(),
            pattern
        ),
        None => println!(
            "{} Created lesson: {}",
            "✓".style(success_style),
            lesson.title.bright_white().bold()
        ),
    }
    println!("  {} Lesson ID: {}", "→".style(info_style), lesson.id.to_string().yellow());
    println!(
        "  {} First: {} - {}",
        "→".style(info_style),
        lesson.start_date.format("%Y-%m-%d %H:%M").to_string().cyan(),
        lesson.end_date.format("%H:%M")
    );

    Ok(())
}
