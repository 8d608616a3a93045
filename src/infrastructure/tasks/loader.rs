use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::models::{ExamplePair, Grid, Task};

/// Task loading errors
#[derive(Error, Debug)]
pub enum TaskLoadError {
    #[error("Task source not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Task '{id}' is invalid: {reason}")]
    Invalid { id: String, reason: String },

    #[error("No tasks found in {0}")]
    Empty(PathBuf),

    #[error("Task '{id}' is defined in both {first} and {second}")]
    Duplicate {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct RawPair {
    input: Grid,
    #[serde(default)]
    output: Option<Grid>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    train: Vec<RawPair>,
    #[serde(default)]
    test: Vec<RawPair>,
}

/// One task per file, or a map of task id to task.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaskFile {
    Single(RawTask),
    Collection(BTreeMap<String, RawTask>),
}

/// Load tasks from a directory of `<id>.json` files or from one file.
///
/// A file holding a single task uses its stem as the id; a file holding a
/// map uses the map keys. Results are sorted by id.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>, TaskLoadError> {
    if !path.exists() {
        return Err(TaskLoadError::NotFound(path.to_path_buf()));
    }

    let mut tasks = if path.is_dir() {
        let entries = std::fs::read_dir(path).map_err(|source| TaskLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TaskLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let file = entry.path();
            if file.extension().is_some_and(|ext| ext == "json") {
                files.push(file);
            }
        }

        files.sort();
        let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut tasks = Vec::new();
        for file in files {
            for task in load_file(&file)? {
                if let Some(first) = seen.insert(task.id.clone(), file.clone()) {
                    return Err(TaskLoadError::Duplicate {
                        id: task.id,
                        first,
                        second: file,
                    });
                }
                tasks.push(task);
            }
        }
        tasks
    } else {
        load_file(path)?
    };

    if tasks.is_empty() {
        return Err(TaskLoadError::Empty(path.to_path_buf()));
    }

    tasks.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(count = tasks.len(), source = %path.display(), "tasks loaded");
    Ok(tasks)
}

fn load_file(path: &Path) -> Result<Vec<Task>, TaskLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| TaskLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: TaskFile = serde_json::from_str(&text).map_err(|source| TaskLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match parsed {
        TaskFile::Single(raw) => {
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(vec![build_task(id, raw)?])
        }
        TaskFile::Collection(map) => map
            .into_iter()
            .map(|(id, raw)| build_task(id, raw))
            .collect(),
    }
}

fn build_task(id: String, raw: RawTask) -> Result<Task, TaskLoadError> {
    if raw.train.is_empty() {
        return Err(TaskLoadError::Invalid {
            id,
            reason: "no training pairs".to_string(),
        });
    }

    let mut train = Vec::with_capacity(raw.train.len());
    for (i, pair) in raw.train.into_iter().enumerate() {
        let Some(output) = pair.output else {
            return Err(TaskLoadError::Invalid {
                id,
                reason: format!("training pair {} has no output", i + 1),
            });
        };
        train.push(ExamplePair::new(pair.input, output));
    }

    let test = raw
        .test
        .into_iter()
        .map(|pair| ExamplePair {
            input: pair.input,
            output: pair.output,
        })
        .collect();

    Ok(Task::new(id, train, test))
}
