//! Grid values and the per-example comparison metrics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A rectangular matrix of cell values.
///
/// The core treats cell values as opaque integers; no color semantics are
/// attached to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid(pub Vec<Vec<i64>>);

impl Grid {
    /// Wrap raw rows.
    pub const fn new(rows: Vec<Vec<i64>>) -> Self {
        Self(rows)
    }

    /// Rows of the grid.
    pub fn rows(&self) -> &[Vec<i64>] {
        &self.0
    }

    /// `(rows, columns)`; columns are taken from the first row.
    pub fn dims(&self) -> (usize, usize) {
        let rows = self.0.len();
        let cols = self.0.first().map_or(0, Vec::len);
        (rows, cols)
    }

    /// Number of cells across all rows.
    pub fn cell_count(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }

    /// True when every row has the same length.
    pub fn is_rectangular(&self) -> bool {
        let (_, cols) = self.dims();
        self.0.iter().all(|row| row.len() == cols)
    }

    /// Distinct cell values.
    pub fn palette(&self) -> BTreeSet<i64> {
        self.cells().collect()
    }

    /// Occurrence count per distinct cell value.
    pub fn value_counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for value in self.cells() {
            *counts.entry(value).or_insert(0) += 1;
        }
        counts
    }

    fn cells(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().flatten().copied()
    }

    /// Compare a produced grid (`self`) against the expected one.
    pub fn compare(&self, expected: &Self) -> GridComparison {
        let exact_match = self == expected;
        let size_correct = self.is_rectangular()
            && expected.is_rectangular()
            && self.dims() == expected.dims();
        let color_palette_correct = self.palette().is_subset(&expected.palette());
        let color_count_correct = self.value_counts() == expected.value_counts();

        let (pixels_off, percent_correct, similarity) = if size_correct {
            let total = expected.cell_count();
            let off = self
                .cells()
                .zip(expected.cells())
                .filter(|(got, want)| got != want)
                .count();
            if total == 0 {
                (Some(0), None, 1.0)
            } else {
                let fraction = (total - off) as f64 / total as f64;
                (Some(off), Some(fraction * 100.0), fraction)
            }
        } else {
            (None, None, 0.0)
        };

        GridComparison {
            exact_match,
            size_correct,
            color_palette_correct,
            color_count_correct,
            pixels_off,
            percent_correct,
            similarity,
        }
    }
}

impl From<Vec<Vec<i64>>> for Grid {
    fn from(rows: Vec<Vec<i64>>) -> Self {
        Self(rows)
    }
}

/// Space separated cells, one row per line.
impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let line = row
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Outcome of comparing a produced grid with the expected grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridComparison {
    pub exact_match: bool,
    /// Same dimensions
    pub size_correct: bool,
    /// Produced values are a subset of the expected values
    pub color_palette_correct: bool,
    /// Same count for every distinct value
    pub color_count_correct: bool,
    /// Differing cells, only when dimensions match
    pub pixels_off: Option<usize>,
    pub percent_correct: Option<f64>,
    /// Fraction of matching cells in `[0, 1]`, 0 when dimensions differ
    pub similarity: f64,
}
