//! Consolidated answer file built from task results.

use crate::domain::models::{Submission, SubmissionEntry, TaskResult};

/// One entry per test input from each task's best passing trial.
///
/// Tasks without a passing trial that produced test outputs are omitted.
pub fn build_submission<'a>(results: impl IntoIterator<Item = &'a TaskResult>) -> Submission {
    let mut submission = Submission::default();
    for result in results {
        if let Some(answers) = result.answers() {
            let entries = answers
                .into_iter()
                .map(|attempt_1| SubmissionEntry {
                    attempt_1,
                    attempt_2: None,
                })
                .collect();
            submission.0.insert(result.task_id.clone(), entries);
        }
    }
    submission
}
