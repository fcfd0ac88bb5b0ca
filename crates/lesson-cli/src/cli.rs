use clap::{Args, Parser, Subcommand};
use lesson_core::recurrence::Frequency;

/// Schedule recurring lessons and manage one-off changes to single occurrences
#[derive(Parser, Debug)]
#[command(name = "lessons", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new lesson, optionally recurring
    Add(AddCommand),
    /// List occurrences in a period
    List(ListCommand),
    /// Cancel a single occurrence of a recurring lesson
    Skip(SkipCommand),
    /// Move a single occurrence of a recurring lesson
    Move(MoveCommand),
    /// List the exceptions recorded for a lesson
    Exceptions(ExceptionsCommand),
    /// Remove an exception, restoring the original occurrence
    Unskip(UnskipCommand),
    /// Edit a lesson
    Edit(EditCommand),
    /// Delete a lesson
    Delete(DeleteCommand),
}

/// Recurrence options shared by `add` and `edit`
#[derive(Args, Debug, Clone, Default)]
pub struct RepeatArgs {
    /// Repeat frequency (daily, weekly, monthly)
    #[arg(long)]
    pub every: Option<Frequency>,
    /// Number of periods between repetitions
    #[arg(long, requires = "every")]
    pub interval: Option<u32>,
    /// Days of week for weekly repetition (e.g. "mon,wed")
    #[arg(long, requires = "every")]
    pub on: Option<String>,
    /// Last instant a repetition may start at
    #[arg(long, requires = "every", conflicts_with = "count")]
    pub until: Option<String>,
    /// Total number of occurrences
    #[arg(long, requires = "every")]
    pub count: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the lesson
    pub title: String,
    /// Start of the first occurrence (e.g. '2025-03-03T10:00:00Z', 'next monday 10am')
    #[arg(long)]
    pub start: String,
    /// End of the first occurrence
    #[arg(long)]
    pub end: String,
    /// The description of the lesson
    #[arg(short, long)]
    pub description: Option<String>,
    /// Teacher ids; defaults to the configured user
    #[arg(long = "teacher", num_args = 1..)]
    pub teachers: Vec<String>,
    /// Pupil ids
    #[arg(long = "pupil", num_args = 1..)]
    pub pupils: Vec<String>,
    #[command(flatten)]
    pub repeat: RepeatArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Start of the period
    #[arg(long, default_value = "today")]
    pub from: String,
    /// End of the period; defaults to one week after the start
    #[arg(long)]
    pub to: Option<String>,
    /// Teacher to list for; defaults to the configured user
    #[arg(long)]
    pub user: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SkipCommand {
    /// The lesson id
    pub id: String,
    /// The occurrence to skip
    #[arg(long)]
    pub on: String,
}

#[derive(Parser, Debug, Clone)]
pub struct MoveCommand {
    /// The lesson id
    pub id: String,
    /// The original start of the occurrence
    #[arg(long)]
    pub from: String,
    /// The new start
    #[arg(long)]
    pub to: String,
}

#[derive(Parser, Debug, Clone)]
pub struct ExceptionsCommand {
    /// The lesson id
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct UnskipCommand {
    /// The exception id, as shown by `exceptions`
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// The lesson id
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, conflicts_with = "description")]
    pub description_clear: bool,

    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,

    /// Replace the teachers
    #[arg(long = "teacher", num_args = 1..)]
    pub teachers: Vec<String>,
    /// Replace the pupils
    #[arg(long = "pupil", num_args = 1..)]
    pub pupils: Vec<String>,

    #[command(flatten)]
    pub repeat: RepeatArgs,
    /// Make the lesson a one-off
    #[arg(long, conflicts_with = "every")]
    pub no_repeat: bool,

    /// Apply pattern changes without confirmation
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The lesson id
    pub id: String,
    /// Force deletion without confirmation
    #[arg(short, long)]
    pub force: bool,
}
