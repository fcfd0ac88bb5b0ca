use chrono::{DateTime, Utc};
use comfy_table::{presets, Attribute, Cell, Color, Row, Table};
use lesson_core::models::{ExceptionAction, Occurrence, OccurrenceException, OccurrenceStatus};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

fn format_date(date: DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn display_occurrences(occurrences: &[Occurrence]) {
    if occurrences.is_empty() {
        println!("No lessons found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Lesson", "Start", "End", "Title", "Pupils", "Status"]);

    for occurrence in occurrences {
        let mut row = Row::new();
        row.add_cell(Cell::new(occurrence.lesson_id));
        row.add_cell(Cell::new(format_date(occurrence.start_date)));
        row.add_cell(Cell::new(occurrence.end_date.format("%H:%M")));

        let mut title = occurrence.title.clone();
        if occurrence.sequence_index.is_some() {
            title.insert_str(0, "↻ ");
        }
        row.add_cell(Cell::new(title));
        row.add_cell(Cell::new(occurrence.pupil_ids.len()));

        let status_cell = match occurrence.status {
            OccurrenceStatus::Scheduled => Cell::new("scheduled"),
            OccurrenceStatus::Rescheduled => Cell::new(format!(
                "moved from {}",
                format_date(occurrence.original_date)
            ))
            .fg(Color::Yellow),
            OccurrenceStatus::Modified => Cell::new("modified")
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
        };
        row.add_cell(status_cell);
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_exceptions(exceptions: &[OccurrenceException]) {
    if exceptions.is_empty() {
        println!("No exceptions found for this lesson.");
        return;
    }

    let mut table = Table::new();
    table
        .set_header(vec!["ID", "Type", "Occurrence", "Details", "Created"])
        .load_preset(presets::UTF8_FULL);

    for exception in exceptions {
        let details = match exception.action() {
            ExceptionAction::Skip => "cancelled".to_string(),
            ExceptionAction::Reschedule { new_date } => format!("moved to {}", format_date(*new_date)),
            ExceptionAction::Modify { modifications } => {
                let mut changed = Vec::new();
                if let Some(title) = &modifications.title {
                    changed.push(format!("title: {title}"));
                }
                if modifications.description.is_some() {
                    changed.push("description".to_string());
                }
                if let Some(start) = modifications.start_date {
                    changed.push(format!("start: {}", format_date(start)));
                }
                if let Some(end) = modifications.end_date {
                    changed.push(format!("end: {}", format_date(end)));
                }
                if modifications.teacher_ids.is_some() {
                    changed.push("teachers".to_string());
                }
                if modifications.pupil_ids.is_some() {
                    changed.push("pupils".to_string());
                }
                changed.join(", ")
            }
        };

        table.add_row(vec![
            exception.id().to_string(),
            exception.exception_type().to_string(),
            format_date(exception.original_date()),
            details,
            exception.created_at().format("%Y-%m-%d").to_string(),
        ]);
    }

    println!("{table}");
}
