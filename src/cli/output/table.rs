//! Table output for session summaries and task listings using comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use super::truncate;
use crate::domain::models::{SessionSummary, Task, TaskOutcome};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    fn header(names: &[&str]) -> Vec<Cell> {
        names
            .iter()
            .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
            .collect()
    }

    /// One row per task result plus a totals line.
    pub fn format_summary(&self, summary: &SessionSummary) -> String {
        let mut table = self.create_base_table();
        table.set_header(Self::header(&[
            "Task", "Outcome", "Steps", "Trials", "Best score", "Tokens", "Detail",
        ]));

        for task in &summary.tasks {
            let label = task.outcome.label();
            let outcome = if self.use_colors {
                Cell::new(label).fg(outcome_color(&task.outcome))
            } else {
                Cell::new(format!("{} {label}", outcome_icon(&task.outcome)))
            };
            let detail = match &task.outcome {
                TaskOutcome::Solved { step } => format!("step {step}"),
                TaskOutcome::Exhausted { iterations } => format!("{iterations} iteration(s)"),
                TaskOutcome::Failed(failure) => {
                    truncate(&format!("{}: {}", failure.kind, failure.message), 60)
                }
                TaskOutcome::Skipped => String::new(),
            };
            table.add_row(vec![
                Cell::new(truncate(&task.task_id, 24)),
                outcome,
                Cell::new(task.steps),
                Cell::new(task.trials),
                Cell::new(task.best_score.map_or_else(|| "-".to_string(), |s| format!("{s:.3}"))),
                Cell::new(task.usage.total()),
                Cell::new(detail),
            ]);
        }

        format!(
            "{table}\n\nsession {}: {} task(s), {} solved, {} exhausted, {} failed, {} skipped, {} tokens",
            summary.session_id,
            summary.total,
            summary.solved,
            summary.exhausted,
            summary.failed,
            summary.skipped,
            summary.usage.total()
        )
    }

    pub fn format_tasks(&self, tasks: &[Task]) -> String {
        let mut table = self.create_base_table();
        table.set_header(Self::header(&["Task", "Train", "Test", "Test answers"]));
        for task in tasks {
            table.add_row(vec![
                Cell::new(&task.id),
                Cell::new(task.train.len()),
                Cell::new(task.test.len()),
                Cell::new(if task.has_test_answers() { "yes" } else { "no" }),
            ]);
        }
        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Respects `NO_COLOR` and dumb terminals.
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

const fn outcome_color(outcome: &TaskOutcome) -> Color {
    match outcome {
        TaskOutcome::Solved { .. } => Color::Green,
        TaskOutcome::Exhausted { .. } => Color::Yellow,
        TaskOutcome::Failed(_) => Color::Red,
        TaskOutcome::Skipped => Color::DarkGrey,
    }
}

const fn outcome_icon(outcome: &TaskOutcome) -> &'static str {
    match outcome {
        TaskOutcome::Solved { .. } => "✓",
        TaskOutcome::Exhausted { .. } => "○",
        TaskOutcome::Failed(_) => "✗",
        TaskOutcome::Skipped => "⊘",
    }
}
