//! Text rendering for step content: example pairs and trial reports.

use std::fmt::Write;

use crate::domain::models::{CodeCandidate, ExampleResult, Grid, SetOutcome, Task, Trial};

fn fenced(grid: &Grid) -> String {
    format!("```\n{grid}\n```")
}

fn flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "n/a",
    }
}

/// Render one training pair under a `## train_N` heading.
pub fn render_pair(task: &Task, index: usize) -> Option<String> {
    let pair = task.train.get(index)?;
    let mut out = format!("## train_{}\n\ninput:\n{}\n", index + 1, fenced(&pair.input));
    if let Some(output) = &pair.output {
        let _ = write!(out, "\noutput:\n{}\n", fenced(output));
    }
    Some(out)
}

/// Every training pair followed by the test inputs.
pub fn render_task(task: &Task) -> String {
    let mut sections: Vec<String> = (0..task.train.len())
        .filter_map(|i| render_pair(task, i))
        .collect();
    for (i, pair) in task.test.iter().enumerate() {
        sections.push(format!("## test_{}\n\ninput:\n{}\n", i + 1, fenced(&pair.input)));
    }
    sections.join("\n")
}

fn render_example(out: &mut String, label: &str, result: &ExampleResult) {
    let _ = writeln!(out, "## {label}_{}\n", result.index + 1);
    let _ = writeln!(out, "input:\n{}\n", fenced(&result.input));
    if let Some(expected) = &result.expected {
        let _ = writeln!(out, "expected:\n{}\n", fenced(expected));
    }
    match (&result.output, &result.error) {
        (_, Some(error)) => {
            let _ = writeln!(out, "error: {error}\n");
        }
        (Some(output), None) => {
            let _ = writeln!(out, "transformed:\n{}\n", fenced(output));
            if result.expected.is_some() {
                let _ = writeln!(out, "match: {}", result.exact_match);
                if let Some(off) = result.pixels_off {
                    let _ = writeln!(out, "pixels off: {off}");
                }
                if let Some(percent) = result.percent_correct {
                    let _ = writeln!(out, "percent correct: {percent:.1}");
                }
                let _ = writeln!(out, "size correct: {}", flag(result.size_correct));
                let _ = writeln!(out, "color palette correct: {}", flag(result.color_palette_correct));
                let _ = writeln!(out, "color count correct: {}", flag(result.color_count_correct));
                let _ = writeln!(out, "score: {:.3}\n", result.similarity);
            }
        }
        (None, None) => {
            let _ = writeln!(out, "no output\n");
        }
    }
    if !result.stdout.trim().is_empty() {
        let _ = writeln!(out, "stdout:\n```\n{}\n```\n", result.stdout.trim_end());
    }
}

fn render_set(out: &mut String, label: &str, set: &SetOutcome) {
    match set {
        SetOutcome::Completed { results } => {
            for result in results {
                render_example(out, label, result);
            }
        }
        SetOutcome::NotAttempted => {
            let _ = writeln!(out, "## {label}\n\nnot evaluated\n");
        }
        SetOutcome::Failed { kind, message } => {
            let _ = writeln!(out, "## {label}\n\nexecution failed ({kind:?}): {message}\n");
        }
    }
}

/// Per-example report of a trial.
pub fn render_trial_report(trial: &Trial) -> String {
    let mut out = String::from("# Trial report\n\n");
    render_set(&mut out, "train", &trial.train);
    if trial.test.is_attempted() {
        render_set(&mut out, "test", &trial.test);
    }
    let _ = writeln!(
        out,
        "all training passed: {}\ntotal distance: {:.3}",
        trial.all_training_passed(),
        trial.score()
    );
    out
}

/// Content for a refine-dreamer step: the previous code and its report.
pub fn render_refine_content(candidate: &CodeCandidate, trial: &Trial) -> Vec<String> {
    vec![
        format!("Previous Code:\n```python\n{}\n```", candidate.source),
        render_trial_report(trial),
    ]
}
