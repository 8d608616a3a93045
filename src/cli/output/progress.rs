//! Progress bar for task completion using indicatif.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::domain::models::{TaskOutcome, TaskResult};

const PROGRESS_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg} (ETA: {eta})";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Progress bar counting finished tasks; hidden when `hidden` is set.
pub fn task_progress_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden());
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(PROGRESS_CHARS);
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Advance the bar for one finished task.
pub fn record_result(pb: &ProgressBar, result: &TaskResult) {
    let marker = match &result.outcome {
        TaskOutcome::Solved { .. } => console::style("solved").green(),
        TaskOutcome::Exhausted { .. } => console::style("exhausted").yellow(),
        TaskOutcome::Failed(_) => console::style("failed").red(),
        TaskOutcome::Skipped => console::style("skipped").dim(),
    };
    pb.set_message(format!("{} {marker}", result.task_id));
    pb.inc(1);
}
