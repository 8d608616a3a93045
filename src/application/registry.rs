//! Session registry: finalised task results shared between workers.

use std::collections::BTreeMap;

use tokio::sync::Mutex;

use crate::domain::models::TaskResult;

/// Concurrent-safe map of task id to result.
///
/// Writers call [`insert`](Self::insert) as tasks complete; readers take a
/// consistent [`snapshot`](Self::snapshot) under the same lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    results: Mutex<BTreeMap<String, TaskResult>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result, replacing any previous one for the same task.
    pub async fn insert(&self, result: TaskResult) {
        self.results
            .lock()
            .await
            .insert(result.task_id.clone(), result);
    }

    /// Copy of every result, ordered by task id.
    pub async fn snapshot(&self) -> Vec<TaskResult> {
        self.results.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.results.lock().await.len()
    }

    pub async fn contains(&self, task_id: &str) -> bool {
        self.results.lock().await.contains_key(task_id)
    }
}
