//! Refinement cycle state machine and the workflow variants driving it.
//!
//! ```text
//! InvestigateDreamer -> InvestigateCoder -> (Solved | RefineDreamer)
//! RefineDreamer -> (Solved | RefineCoder)
//! RefineCoder -> (Solved | RefineDreamer | Exhausted)
//! any step error -> Failed
//! ```
//!
//! The success predicate is checked after every step. Steps of one task
//! run strictly one after another.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::generation::{StepExecutor, StepRequest};
use super::prompt::{render_pair, render_refine_content, render_task};
use crate::domain::errors::CycleError;
use crate::domain::models::{
    CycleState, GenerationStep, InstructionsConfig, StepPhase, Task, WorkflowKind, CODER, DREAMER,
};

/// Result of driving one task's cycle to a terminal state.
#[derive(Debug)]
pub struct CycleReport {
    pub state: CycleState,
    pub steps: Vec<GenerationStep>,
    /// Set when `state` is `Failed`.
    pub error: Option<CycleError>,
    /// Index of the step whose trial solved the task.
    pub solved_step: Option<usize>,
    /// Refine iterations started.
    pub iterations: u32,
}

/// Shared settings and executor for every cycle of a session.
pub struct RefinementCycle {
    executor: Arc<StepExecutor>,
    instructions: InstructionsConfig,
    max_iterations: u32,
    require_test_pass: bool,
}

impl RefinementCycle {
    pub fn new(
        executor: Arc<StepExecutor>,
        instructions: InstructionsConfig,
        max_iterations: u32,
        require_test_pass: bool,
    ) -> Self {
        Self {
            executor,
            instructions,
            max_iterations,
            require_test_pass,
        }
    }
}

/// Mutable state of one cycle.
struct CycleRun<'a> {
    cycle: &'a RefinementCycle,
    task: &'a Task,
    state: CycleState,
    history: Vec<String>,
    steps: Vec<GenerationStep>,
    solved_step: Option<usize>,
    iterations: u32,
}

impl<'a> CycleRun<'a> {
    const fn new(cycle: &'a RefinementCycle, task: &'a Task) -> Self {
        Self {
            cycle,
            task,
            state: CycleState::InvestigateDreamer,
            history: Vec::new(),
            steps: Vec::new(),
            solved_step: None,
            iterations: 0,
        }
    }

    fn enter(&mut self, state: CycleState) {
        debug!(task_id = %self.task.id, from = ?self.state, to = ?state, "cycle transition");
        self.state = state;
    }

    /// Run one step; returns true when it solved the task.
    async fn step(
        &mut self,
        phase: StepPhase,
        role: &str,
        content: Vec<String>,
        instructions: &str,
    ) -> Result<bool, CycleError> {
        let index = self.steps.len();
        let request = StepRequest {
            task: self.task,
            index,
            phase,
            role,
            history: self.history.clone(),
            content,
            instructions: vec![instructions.to_string()],
        };
        let step = self
            .cycle
            .executor
            .execute(request)
            .await
            .map_err(|source| CycleError::Generation { step: index, source })?;

        self.history.extend(step.content.iter().cloned());
        self.history.push(step.response_text.clone());

        let solved = step.solving_trial(self.cycle.require_test_pass).is_some();
        self.steps.push(step);
        if solved {
            self.solved_step = Some(index);
            self.enter(CycleState::Solved);
        }
        Ok(solved)
    }

    /// Source and trial of the best candidate of the latest step with trials.
    fn refine_seed(&self) -> Option<Vec<String>> {
        self.steps.iter().rev().find_map(|step| {
            let trial = step.best_trial()?;
            let candidate = step.candidate(trial.candidate_index)?;
            Some(render_refine_content(candidate, trial))
        })
    }

    async fn investigate_coder(&mut self) -> Result<bool, CycleError> {
        self.enter(CycleState::InvestigateCoder);
        let instructions = self.cycle.instructions.investigate_coder.clone();
        self.step(StepPhase::InvestigateCoder, CODER, Vec::new(), &instructions)
            .await
    }

    async fn refine(&mut self) -> Result<(), CycleError> {
        for iteration in 0..self.cycle.max_iterations {
            self.iterations = iteration + 1;
            let content = self
                .refine_seed()
                .ok_or(CycleError::NoCandidate { iteration })?;

            self.enter(CycleState::RefineDreamer { iteration });
            let instructions = self.cycle.instructions.refine_dreamer.clone();
            if self
                .step(StepPhase::RefineDreamer { iteration }, DREAMER, content, &instructions)
                .await?
            {
                return Ok(());
            }

            self.enter(CycleState::RefineCoder { iteration });
            let instructions = self.cycle.instructions.refine_coder.clone();
            if self
                .step(StepPhase::RefineCoder { iteration }, CODER, Vec::new(), &instructions)
                .await?
            {
                return Ok(());
            }
        }
        self.enter(CycleState::Exhausted);
        Ok(())
    }

    fn finish(mut self, result: Result<(), CycleError>) -> CycleReport {
        let error = match result {
            Ok(()) => None,
            Err(err) => {
                warn!(task_id = %self.task.id, state = ?self.state, error = %err, "cycle failed");
                self.enter(CycleState::Failed);
                Some(err)
            }
        };
        info!(
            task_id = %self.task.id,
            state = ?self.state,
            steps = self.steps.len(),
            iterations = self.iterations,
            "cycle finished"
        );
        CycleReport {
            state: self.state,
            steps: self.steps,
            error,
            solved_step: self.solved_step,
            iterations: self.iterations,
        }
    }
}

/// Closed set of refinement strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    /// Dreamer investigates every training pair at once.
    Default,
    /// Dreamer investigates one training pair per step, building history.
    Incremental,
}

impl From<WorkflowKind> for Workflow {
    fn from(kind: WorkflowKind) -> Self {
        match kind {
            WorkflowKind::Default => Self::Default,
            WorkflowKind::Incremental => Self::Incremental,
        }
    }
}

impl Workflow {
    /// Drive `task` through the cycle to a terminal state.
    pub async fn execute(self, cycle: &RefinementCycle, task: &Task) -> CycleReport {
        let mut run = CycleRun::new(cycle, task);
        let result = self.drive(&mut run).await;
        run.finish(result)
    }

    async fn drive(self, run: &mut CycleRun<'_>) -> Result<(), CycleError> {
        let instructions = run.cycle.instructions.investigate_dreamer.clone();
        match self {
            Self::Default => {
                let content = vec![render_task(run.task)];
                if run
                    .step(StepPhase::InvestigateDreamer { pair: None }, DREAMER, content, &instructions)
                    .await?
                {
                    return Ok(());
                }
            }
            Self::Incremental => {
                for pair in 0..run.task.train.len() {
                    let content = render_pair(run.task, pair).into_iter().collect();
                    if run
                        .step(StepPhase::InvestigateDreamer { pair: Some(pair) }, DREAMER, content, &instructions)
                        .await?
                    {
                        return Ok(());
                    }
                }
            }
        }

        if run.investigate_coder().await? {
            return Ok(());
        }
        run.refine().await
    }
}
