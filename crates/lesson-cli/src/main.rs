use clap::Parser;
use lesson_core::db;
use lesson_core::error::CoreError;
use lesson_core::repository::SqliteRepository;
use lesson_core::service::ScheduleService;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.log_level);

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let service = ScheduleService::new(SqliteRepository::new(db_pool), config.scheduler.clone());

    let result = match cli.command {
        cli::Commands::Add(command) => commands::add::add_lesson(&service, command, &config).await,
        cli::Commands::List(command) => {
            commands::list::list_occurrences(&service, command, &config).await
        }
        cli::Commands::Skip(command) => commands::recurrence::skip_command(&service, command).await,
        cli::Commands::Move(command) => commands::recurrence::move_command(&service, command).await,
        cli::Commands::Exceptions(command) => {
            commands::recurrence::exceptions_command(&service, command).await
        }
        cli::Commands::Unskip(command) => {
            commands::recurrence::unskip_command(&service, command).await
        }
        cli::Commands::Edit(command) => commands::edit::edit_lesson(&service, command).await,
        cli::Commands::Delete(command) => commands::delete::delete_lesson(&service, command).await,
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over the configured level; logs go to stderr so tables stay pipeable.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::LessonNotFound(id) => {
                eprintln!("{} Lesson '{}' not found.", "Error:".style(error_style), id.yellow());
            }
            CoreError::LessonNotRecurring(id) => {
                eprintln!(
                    "{} Lesson '{}' does not repeat; edit it directly instead.",
                    "Error:".style(error_style),
                    id.yellow()
                );
            }
            CoreError::LessonExceptionAlreadyExists { original_date, .. } => {
                eprintln!(
                    "{} The occurrence on {} already has an exception.",
                    "Error:".style(error_style),
                    original_date.format("%Y-%m-%d %H:%M").yellow()
                );
                eprintln!("Remove it first with `lessons unskip <exception-id>`.");
            }
            CoreError::WindowTooLarge { days, max } => {
                eprintln!(
                    "{} A {}-day period is too long; the limit is {} days.",
                    "Error:".style(error_style),
                    days,
                    max
                );
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            e if !e.is_user_error() => {
                tracing::error!(error = ?e, "storage failure");
                eprintln!("{} {}", "Error:".style(error_style), e);
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), core_error),
        }
    } else {
        eprintln!("{} {}", "Error:".style(error_style), err);
    }
}
