use serde::{Deserialize, Serialize};

use super::grid::Grid;

/// One input grid and, when known, its expected output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePair {
    pub input: Grid,
    /// Withheld for hidden test pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Grid>,
}

impl ExamplePair {
    /// Pair with a known expected output.
    pub const fn new(input: Grid, output: Grid) -> Self {
        Self {
            input,
            output: Some(output),
        }
    }

    /// Pair whose expected output is withheld.
    pub const fn unlabeled(input: Grid) -> Self {
        Self {
            input,
            output: None,
        }
    }
}

/// A puzzle instance: training pairs plus test pairs.
///
/// Immutable once loaded; shared read-only between the cycle and the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub train: Vec<ExamplePair>,
    #[serde(default)]
    pub test: Vec<ExamplePair>,
}

impl Task {
    pub fn new(id: impl Into<String>, train: Vec<ExamplePair>, test: Vec<ExamplePair>) -> Self {
        Self {
            id: id.into(),
            train,
            test,
        }
    }

    /// True when every test pair carries an expected output.
    pub fn has_test_answers(&self) -> bool {
        !self.test.is_empty() && self.test.iter().all(|p| p.output.is_some())
    }
}
