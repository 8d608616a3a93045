//! Python sandbox against a real interpreter. Skipped when `python3` is
//! not installed.

mod common;

use std::time::{Duration, Instant};

use common::*;
use seer::adapters::sandbox::PythonSandbox;
use seer::domain::errors::SandboxError;
use seer::domain::models::ExamplePair;
use seer::domain::ports::CodeSandbox;

fn sandbox() -> PythonSandbox {
    PythonSandbox::new("python3", "transform").expect("valid entry point")
}

fn pairs() -> Vec<ExamplePair> {
    vec![
        ExamplePair::new(grid(&[&[0, 0], &[0, 0]]), grid(&[&[1, 1], &[1, 1]])),
        ExamplePair::new(grid(&[&[2]]), grid(&[&[3]])),
        ExamplePair::new(grid(&[&[4, 5]]), grid(&[&[5, 6]])),
    ]
}

#[tokio::test]
async fn test_runs_every_example() {
    if !python_available() {
        eprintln!("python3 not available, skipping");
        return;
    }
    let results = sandbox()
        .run(&code_for("add_one"), &pairs(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.exact_match));
    assert_eq!(results[2].output, Some(grid(&[&[5, 6]])));
}

#[tokio::test]
async fn test_exception_is_recorded_per_example() {
    if !python_available() {
        return;
    }
    let code = "def transform(grid):\n    if len(grid[0]) == 1:\n        raise ValueError('second example')\n    print('seen', len(grid))\n    return [[c + 1 for c in row] for row in grid]\n";
    let results = sandbox()
        .run(code, &pairs(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].exact_match);
    assert!(results[0].stdout.contains("seen 2"));
    let error = results[1].error.as_deref().expect("second example errored");
    assert!(error.contains("second example"));
    assert!(results[1].output.is_none());
    assert!(results[2].exact_match);
}

#[tokio::test]
async fn test_infinite_loop_is_killed_at_timeout() {
    if !python_available() {
        return;
    }
    let start = Instant::now();
    let err = sandbox()
        .run(&code_for("hang"), &pairs(), Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::Timeout { secs: 1 }));
    assert!(
        start.elapsed() < Duration::from_secs(3),
        "timeout took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_syntax_error_is_parse_error() {
    if !python_available() {
        return;
    }
    let err = sandbox()
        .run("def transform(grid)\n    return grid\n", &pairs(), Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::Parse(_)), "got {err:?}");
}

#[tokio::test]
async fn test_non_grid_return_is_example_error() {
    if !python_available() {
        return;
    }
    let results = sandbox()
        .run("def transform(grid):\n    return 'nope'\n", &pairs()[..1], Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].error.is_some());
    assert!(!results[0].exact_match);
}

#[tokio::test]
async fn test_fractional_cells_never_match() {
    if !python_available() {
        return;
    }
    let code = "def transform(grid):\n    return [[c + 1.7 for c in row] for row in grid]\n";
    let results = sandbox()
        .run(code, &pairs()[1..2], Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].output.is_none());
    assert!(!results[0].exact_match);
    let error = results[0].error.as_deref().expect("fractional cell rejected");
    assert!(error.contains("non-integral"), "got {error}");
}

#[tokio::test]
async fn test_integral_floats_and_bools() {
    if !python_available() {
        return;
    }
    let code = "def transform(grid):\n    if len(grid[0]) == 1:\n        return [[True]]\n    return [[float(c + 1) for c in row] for row in grid]\n";
    let results = sandbox()
        .run(code, &pairs(), Duration::from_secs(10))
        .await
        .unwrap();
    assert!(results[0].exact_match);
    assert!(results[1].error.as_deref().unwrap_or_default().contains("boolean"));
    assert!(results[2].exact_match);
}

#[tokio::test]
async fn test_oversized_cell_fails_only_its_example() {
    if !python_available() {
        return;
    }
    let code = "def transform(grid):\n    if len(grid[0]) == 1:\n        return [[2 ** 70]]\n    return [[int(c) + 1 for c in row] for row in grid]\n";
    let results = sandbox()
        .run(code, &pairs(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].exact_match);
    let error = results[1].error.as_deref().expect("overflow recorded");
    assert!(error.contains("64 bits"), "got {error}");
    assert!(results[2].exact_match);
}
