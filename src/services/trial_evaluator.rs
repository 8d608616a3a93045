//! Trial evaluation: run one candidate against a task's example sets.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::domain::models::{CodeCandidate, SandboxConfig, SetOutcome, Task, TestGating, Trial};
use crate::domain::ports::CodeSandbox;

/// Builds immutable [`Trial`]s from sandbox runs.
#[derive(Clone)]
pub struct TrialEvaluator {
    sandbox: Arc<dyn CodeSandbox>,
    timeout: Duration,
    gating: TestGating,
}

impl TrialEvaluator {
    pub fn new(sandbox: Arc<dyn CodeSandbox>, timeout: Duration, gating: TestGating) -> Self {
        Self {
            sandbox,
            timeout,
            gating,
        }
    }

    pub fn from_config(sandbox: Arc<dyn CodeSandbox>, config: &SandboxConfig) -> Self {
        Self::new(sandbox, Duration::from_secs(config.timeout_secs), config.test_gating)
    }

    /// Training pairs first; test pairs per the gating policy.
    ///
    /// Non-executable candidates are not run and yield `None`.
    #[instrument(skip(self, candidate, task), fields(task_id = %task.id, candidate = candidate.index))]
    pub async fn evaluate(&self, candidate: &CodeCandidate, task: &Task) -> Option<Trial> {
        if !candidate.language.is_executable() {
            debug!(language = ?candidate.language, "skipping non-executable block");
            return None;
        }

        let train = SetOutcome::from_run(
            self.sandbox
                .run(&candidate.source, &task.train, self.timeout)
                .await,
        );

        let run_test = !task.test.is_empty()
            && match self.gating {
                TestGating::Always => true,
                TestGating::Gated => train.all_passed(),
            };
        let test = if run_test {
            SetOutcome::from_run(
                self.sandbox
                    .run(&candidate.source, &task.test, self.timeout)
                    .await,
            )
        } else {
            SetOutcome::NotAttempted
        };

        let trial = Trial {
            candidate_index: candidate.index,
            train_count: task.train.len(),
            train,
            test,
        };
        debug!(
            all_training_passed = trial.all_training_passed(),
            test_attempted = trial.test.is_attempted(),
            score = trial.score(),
            "trial evaluated"
        );
        Some(trial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::SandboxError;
    use crate::domain::models::{CodeLanguage, ExamplePair, ExampleResult, Grid};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the input grid unchanged for every pair.
    struct EchoSandbox {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl CodeSandbox for EchoSandbox {
        async fn run(
            &self,
            _code: &str,
            pairs: &[ExamplePair],
            _timeout: Duration,
        ) -> Result<Vec<ExampleResult>, SandboxError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(pairs
                .iter()
                .enumerate()
                .map(|(i, p)| ExampleResult::evaluated(i, p, p.input.clone(), String::new()))
                .collect())
        }
    }

    fn candidate(language: CodeLanguage) -> CodeCandidate {
        CodeCandidate {
            index: 0,
            language,
            source: "def transform(g):\n    return g".into(),
        }
    }

    fn task(identity: bool) -> Task {
        let out = if identity { vec![vec![0]] } else { vec![vec![9]] };
        Task::new(
            "t",
            vec![ExamplePair::new(Grid(vec![vec![0]]), Grid(out))],
            vec![ExamplePair::unlabeled(Grid(vec![vec![3]]))],
        )
    }

    fn evaluator(gating: TestGating) -> (TrialEvaluator, Arc<EchoSandbox>) {
        let sandbox = Arc::new(EchoSandbox {
            runs: AtomicUsize::new(0),
        });
        (
            TrialEvaluator::new(sandbox.clone(), Duration::from_secs(1), gating),
            sandbox,
        )
    }

    #[tokio::test]
    async fn test_gated_skips_test_set_when_training_fails() {
        let (evaluator, sandbox) = evaluator(TestGating::Gated);
        let trial = evaluator
            .evaluate(&candidate(CodeLanguage::Python), &task(false))
            .await
            .unwrap();
        assert!(!trial.all_training_passed());
        assert_eq!(trial.test, SetOutcome::NotAttempted);
        assert_eq!(sandbox.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gated_runs_test_set_after_training_passes() {
        let (evaluator, _) = evaluator(TestGating::Gated);
        let trial = evaluator
            .evaluate(&candidate(CodeLanguage::Python), &task(true))
            .await
            .unwrap();
        assert!(trial.all_training_passed());
        assert_eq!(trial.test_outputs(), vec![Some(Grid(vec![vec![3]]))]);
        // No expected outputs for the test pair.
        assert!(!trial.all_test_passed());
    }

    #[tokio::test]
    async fn test_always_runs_test_set() {
        let (evaluator, sandbox) = evaluator(TestGating::Always);
        let trial = evaluator
            .evaluate(&candidate(CodeLanguage::Python), &task(false))
            .await
            .unwrap();
        assert!(trial.test.is_attempted());
        assert_eq!(sandbox.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_text_blocks_are_not_run() {
        let (evaluator, sandbox) = evaluator(TestGating::Always);
        assert!(evaluator
            .evaluate(&candidate(CodeLanguage::Text), &task(true))
            .await
            .is_none());
        assert_eq!(sandbox.runs.load(Ordering::SeqCst), 0);
    }
}
