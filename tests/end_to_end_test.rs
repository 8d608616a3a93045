//! Full pipeline: task files on disk, scripted model, sandbox, recorder,
//! scheduler and submission.

mod common;

use std::sync::Arc;

use common::*;
use seer::adapters::llm::MockLlmClient;
use seer::adapters::recorder::FsRecorder;
use seer::adapters::sandbox::PythonSandbox;
use seer::application::{Scheduler, TaskRunner};
use seer::domain::models::{Submission, TaskOutcome};
use seer::domain::ports::{CodeSandbox, NullRecorder, Recorder};
use seer::infrastructure::tasks::load_tasks;

const TASK_JSON: &str = r#"{
  "train": [
    {"input": [[0, 0], [0, 0]], "output": [[1, 1], [1, 1]]},
    {"input": [[3]], "output": [[4]]}
  ],
  "test": [
    {"input": [[7, 8]]}
  ]
}"#;

fn sandbox() -> Arc<dyn CodeSandbox> {
    if python_available() {
        Arc::new(PythonSandbox::new("python3", "transform").unwrap())
    } else {
        Arc::new(RuleSandbox::new())
    }
}

#[tokio::test]
async fn test_add_one_task_solved_and_recorded() {
    setup_test_logging();
    let tasks_dir = temp_dir();
    std::fs::write(tasks_dir.path().join("add_one.json"), TASK_JSON).unwrap();
    let tasks = load_tasks(tasks_dir.path()).unwrap();
    assert_eq!(tasks.len(), 1);

    let client = Arc::new(MockLlmClient::scripted([
        prose_reply("Every cell value increases by one."),
        code_reply("add_one"),
    ]));

    let out_dir = temp_dir();
    let config = fast_config();
    let recorder = Arc::new(FsRecorder::create(out_dir.path(), &config).await.unwrap());
    let root = recorder.root().to_path_buf();
    let session_id = recorder.session_id().to_string();
    let recorder: Arc<dyn Recorder> = recorder;

    let runner =
        TaskRunner::from_config(&config, client.clone(), sandbox(), recorder.clone()).unwrap();
    let scheduler = Scheduler::new(Arc::new(runner), config.worker_count, session_id, recorder);
    let (summary, submission) = scheduler.run(tasks).await;

    assert_eq!(client.call_count().await, 2);
    assert_eq!(summary.total, 1);
    assert_eq!(summary.solved, 1);
    let result = &summary.tasks[0];
    assert_eq!(result.task_id, "add_one");
    assert_eq!(result.outcome, TaskOutcome::Solved { step: 1 });
    assert_eq!(result.steps, 2);

    let answers = &submission.0["add_one"];
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].attempt_1, Some(grid(&[&[8, 9]])));
    assert_eq!(answers[0].attempt_2, None);

    // Session layout
    assert!(root.join("config.json").exists());
    let task_dir = root.join("add_one");
    assert!(task_dir.join("task.json").exists());
    assert!(task_dir.join("task_summary.json").exists());
    let coder_dir = task_dir.join("001");
    assert!(coder_dir.join("response.md").exists());
    assert!(coder_dir.join("code_00.py").exists());
    assert!(coder_dir.join("code_00.trial.json").exists());
    assert!(!task_dir.join("002").exists());

    let written: Submission =
        serde_json::from_str(&std::fs::read_to_string(root.join("submission.json")).unwrap())
            .unwrap();
    assert_eq!(written, submission);

    let summary_json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(root.join("session_summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summary_json["solved"], 1);
}

#[tokio::test]
async fn test_single_pair_solved_in_two_steps() {
    let task = seer::domain::models::Task::new(
        "ones",
        vec![seer::domain::models::ExamplePair::new(
            grid(&[&[0, 0], &[0, 0]]),
            grid(&[&[1, 1], &[1, 1]]),
        )],
        vec![],
    );
    let client = Arc::new(MockLlmClient::scripted([
        prose_reply("Set every cell to 1."),
        code_reply("ones"),
    ]));
    let config = fast_config();
    let runner = common::runner(&config, client, sandbox());
    let result = runner.run(Arc::new(task)).await;

    assert_eq!(result.outcome, TaskOutcome::Solved { step: 1 });
    assert_eq!(result.steps, 2);
    let trial = result.best_passing_trial.expect("passing trial");
    assert!(trial.train.results()[0].exact_match);
    assert_eq!(trial.score(), 0.0);
}

#[tokio::test]
async fn test_dry_run_client_solves_identity_task() {
    if !python_available() {
        return;
    }
    let tasks_dir = temp_dir();
    std::fs::write(
        tasks_dir.path().join("same.json"),
        r#"{"train": [{"input": [[1, 2]], "output": [[1, 2]]}], "test": [{"input": [[3]]}]}"#,
    )
    .unwrap();
    let tasks = load_tasks(tasks_dir.path()).unwrap();

    let config = fast_config();
    let client = Arc::new(MockLlmClient::dry_run(&config.sandbox.entry_point));
    let runner = common::runner(&config, client, sandbox());
    let scheduler = Scheduler::new(runner, 1, "dry", Arc::new(NullRecorder));
    let (summary, submission) = scheduler.run(tasks).await;

    assert_eq!(summary.solved, 1);
    assert_eq!(submission.0["same"][0].attempt_1, Some(grid(&[&[3]])));
}
