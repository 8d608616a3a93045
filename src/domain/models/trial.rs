//! Trial records: the evaluation of one code candidate.

use serde::{Deserialize, Serialize};

use super::grid::Grid;
use super::task::ExamplePair;
use crate::domain::errors::SandboxError;

/// When test pairs are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestGating {
    /// Only after every training example matched exactly.
    #[default]
    Gated,
    /// Regardless of training results.
    Always,
}

/// Execution outcome for one example pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleResult {
    /// Zero-based position within its example set.
    pub index: usize,
    pub input: Grid,
    pub expected: Option<Grid>,
    pub output: Option<Grid>,
    pub exact_match: bool,
    pub size_correct: Option<bool>,
    pub color_palette_correct: Option<bool>,
    pub color_count_correct: Option<bool>,
    pub pixels_off: Option<usize>,
    pub percent_correct: Option<f64>,
    pub similarity: f64,
    /// Text the entry point printed while handling this example.
    #[serde(default)]
    pub stdout: String,
    pub error: Option<String>,
}

impl ExampleResult {
    /// Build the result for an entry point that returned `output`.
    pub fn evaluated(index: usize, pair: &ExamplePair, output: Grid, stdout: String) -> Self {
        let mut result = Self::blank(index, pair, stdout);
        if let Some(expected) = &pair.output {
            let cmp = output.compare(expected);
            result.exact_match = cmp.exact_match;
            result.size_correct = Some(cmp.size_correct);
            result.color_palette_correct = Some(cmp.color_palette_correct);
            result.color_count_correct = Some(cmp.color_count_correct);
            result.pixels_off = cmp.pixels_off;
            result.percent_correct = cmp.percent_correct;
            result.similarity = cmp.similarity;
        }
        result.output = Some(output);
        result
    }

    /// Build the result for an example whose execution raised.
    pub fn errored(index: usize, pair: &ExamplePair, error: impl Into<String>, stdout: String) -> Self {
        let mut result = Self::blank(index, pair, stdout);
        result.error = Some(error.into());
        result
    }

    fn blank(index: usize, pair: &ExamplePair, stdout: String) -> Self {
        Self {
            index,
            input: pair.input.clone(),
            expected: pair.output.clone(),
            output: None,
            exact_match: false,
            size_correct: None,
            color_palette_correct: None,
            color_count_correct: None,
            pixels_off: None,
            percent_correct: None,
            similarity: 0.0,
            stdout,
            error: None,
        }
    }

    /// Distance contribution: `1 - similarity`, 1 for errored examples.
    pub fn distance(&self) -> f64 {
        if self.error.is_some() {
            1.0
        } else {
            1.0 - self.similarity
        }
    }
}

/// Why an example set produced no per-example results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunFailureKind {
    Parse,
    Timeout,
    Spawn,
    Harness,
}

impl From<&SandboxError> for RunFailureKind {
    fn from(err: &SandboxError) -> Self {
        match err {
            SandboxError::Parse(_) => Self::Parse,
            SandboxError::Timeout { .. } => Self::Timeout,
            SandboxError::Spawn(_) => Self::Spawn,
            SandboxError::Harness(_) => Self::Harness,
        }
    }
}

/// Evaluation state of one example set (training or test).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SetOutcome {
    Completed { results: Vec<ExampleResult> },
    NotAttempted,
    Failed { kind: RunFailureKind, message: String },
}

impl SetOutcome {
    /// Fold a sandbox result into set data.
    pub fn from_run(run: Result<Vec<ExampleResult>, SandboxError>) -> Self {
        match run {
            Ok(results) => Self::Completed { results },
            Err(err) => Self::Failed {
                kind: RunFailureKind::from(&err),
                message: err.to_string(),
            },
        }
    }

    /// Per-example results, empty unless completed.
    pub fn results(&self) -> &[ExampleResult] {
        match self {
            Self::Completed { results } => results,
            _ => &[],
        }
    }

    /// Completed, non-empty and every example matched.
    pub fn all_passed(&self) -> bool {
        match self {
            Self::Completed { results } => {
                !results.is_empty()
                    && results.iter().all(|r| r.expected.is_some() && r.exact_match)
            }
            _ => false,
        }
    }

    pub const fn is_attempted(&self) -> bool {
        !matches!(self, Self::NotAttempted)
    }
}

/// Evaluation of one code candidate against a task. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Position of the candidate within its step.
    pub candidate_index: usize,
    pub train_count: usize,
    pub train: SetOutcome,
    pub test: SetOutcome,
}

impl Trial {
    pub fn all_training_passed(&self) -> bool {
        self.train.all_passed()
    }

    /// False when test pairs were not run or carry no expected outputs.
    pub fn all_test_passed(&self) -> bool {
        self.test.all_passed()
    }

    /// Lower is better. Sum of per-example distances over the training set;
    /// a set that produced no results counts 1 per training example.
    pub fn score(&self) -> f64 {
        match &self.train {
            SetOutcome::Completed { results } => results.iter().map(ExampleResult::distance).sum(),
            _ => self.train_count as f64,
        }
    }

    /// Produced test outputs in test-pair order, `None` where unavailable.
    pub fn test_outputs(&self) -> Vec<Option<Grid>> {
        self.test.results().iter().map(|r| r.output.clone()).collect()
    }

    /// True when the trial satisfies the cycle's success predicate.
    pub fn solves(&self, require_test_pass: bool) -> bool {
        self.all_training_passed() && (!require_test_pass || self.all_test_passed())
    }
}

/// Lowest score wins, earliest on ties.
pub fn best_trial<'a>(trials: impl IntoIterator<Item = &'a Trial>) -> Option<&'a Trial> {
    trials.into_iter().fold(None, |best: Option<&Trial>, trial| match best {
        Some(b) if b.score() <= trial.score() => Some(b),
        _ => Some(trial),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(input: i64, output: i64) -> ExamplePair {
        ExamplePair::new(Grid(vec![vec![input]]), Grid(vec![vec![output]]))
    }

    fn trial(train: Vec<ExampleResult>) -> Trial {
        Trial {
            candidate_index: 0,
            train_count: train.len(),
            train: SetOutcome::Completed { results: train },
            test: SetOutcome::NotAttempted,
        }
    }

    #[test]
    fn test_exact_matches_score_zero() {
        let p = pair(0, 1);
        let t = trial(vec![ExampleResult::evaluated(0, &p, Grid(vec![vec![1]]), String::new())]);
        assert!(t.all_training_passed());
        assert!(t.score().abs() < f64::EPSILON);
    }

    #[test]
    fn test_errored_example_contributes_one() {
        let p = pair(0, 1);
        let t = trial(vec![
            ExampleResult::evaluated(0, &p, Grid(vec![vec![1]]), String::new()),
            ExampleResult::errored(1, &p, "boom", String::new()),
        ]);
        assert!(!t.all_training_passed());
        assert!((t.score() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_run_scores_per_example() {
        let t = Trial {
            candidate_index: 0,
            train_count: 3,
            train: SetOutcome::from_run(Err(SandboxError::Timeout { secs: 1 })),
            test: SetOutcome::NotAttempted,
        };
        assert!(!t.all_training_passed());
        assert!((t.score() - 3.0).abs() < f64::EPSILON);
        assert!(matches!(t.train, SetOutcome::Failed { kind: RunFailureKind::Timeout, .. }));
    }

    #[test]
    fn test_unlabeled_test_set_never_passes() {
        let p = ExamplePair::unlabeled(Grid(vec![vec![0]]));
        let mut t = trial(vec![]);
        t.test = SetOutcome::Completed {
            results: vec![ExampleResult::evaluated(0, &p, Grid(vec![vec![1]]), String::new())],
        };
        assert!(!t.all_test_passed());
        assert_eq!(t.test_outputs(), vec![Some(Grid(vec![vec![1]]))]);
    }

    #[test]
    fn test_best_trial_prefers_earliest_on_tie() {
        let p = pair(0, 1);
        let a = trial(vec![ExampleResult::errored(0, &p, "x", String::new())]);
        let mut b = a.clone();
        b.candidate_index = 1;
        let c = trial(vec![ExampleResult::evaluated(0, &p, Grid(vec![vec![1]]), String::new())]);

        assert_eq!(best_trial([&a, &b]).map(|t| t.candidate_index), Some(0));
        assert!(best_trial([&a, &b, &c]).is_some_and(Trial::all_training_passed));
        assert!(best_trial(std::iter::empty()).is_none());
    }
}
