//! Python harness executed in the sandbox process.
//!
//! Protocol: one JSON request on stdin
//! (`{"code", "entry_point", "inputs"}`), one marker-prefixed JSON line on
//! the host stdout. Anything the candidate prints is captured per example
//! and never reaches the host stdout.

use serde::{Deserialize, Serialize};

use crate::domain::models::Grid;

/// Prefix of the result line written by the harness.
pub const RESULT_MARKER: &str = "@@SEER_RESULT@@";

pub const HARNESS: &str = r#"
import ast
import contextlib
import io
import json
import sys

_HOST_STDOUT = sys.stdout
MARKER = "@@SEER_RESULT@@"


def emit(result):
    _HOST_STDOUT.write(MARKER + json.dumps(result) + "\n")
    _HOST_STDOUT.flush()


I64_MIN = -(2 ** 63)
I64_MAX = 2 ** 63 - 1


def to_cell(cell):
    if hasattr(cell, "item"):
        cell = cell.item()
    if isinstance(cell, bool):
        raise ValueError("boolean cell %r" % cell)
    if isinstance(cell, float):
        if not cell.is_integer():
            raise ValueError("non-integral cell %r" % cell)
        cell = int(cell)
    if not isinstance(cell, int):
        raise ValueError("cell %r of type %s is not an integer" % (cell, type(cell).__name__))
    if cell < I64_MIN or cell > I64_MAX:
        raise ValueError("cell %d does not fit in 64 bits" % cell)
    return cell


def to_grid(value):
    if hasattr(value, "tolist"):
        value = value.tolist()
    return [[to_cell(cell) for cell in row] for row in value]


def main():
    request = json.loads(sys.stdin.read())
    code = request["code"]
    entry = request["entry_point"]

    try:
        tree = ast.parse(code)
    except (SyntaxError, ValueError, RecursionError) as exc:
        emit({"status": "parse_error", "message": "syntax error: %s" % exc})
        return

    defined = any(
        isinstance(node, (ast.FunctionDef, ast.AsyncFunctionDef)) and node.name == entry
        for node in ast.walk(tree)
    )
    if not defined:
        emit({"status": "parse_error", "message": "%s function not found" % entry})
        return

    try:
        import numpy as np
    except ImportError:
        np = None

    namespace = {"__name__": "__candidate__"}
    capture = io.StringIO()
    try:
        with contextlib.redirect_stdout(capture):
            exec(compile(tree, "<candidate>", "exec"), namespace)
    except BaseException as exc:
        emit({
            "status": "load_error",
            "message": "%s: %s" % (type(exc).__name__, exc),
            "stdout": capture.getvalue(),
        })
        return

    fn = namespace.get(entry)
    if not callable(fn):
        emit({"status": "parse_error", "message": "%s is not a module-level function" % entry})
        return

    examples = []
    for grid in request["inputs"]:
        capture = io.StringIO()
        result = {"output": None, "error": None, "stdout": ""}
        try:
            arg = np.array(grid) if np is not None else [list(row) for row in grid]
            with contextlib.redirect_stdout(capture):
                out = fn(arg)
            if out is None:
                result["error"] = "%s returned None" % entry
            else:
                try:
                    result["output"] = to_grid(out)
                except Exception as exc:
                    result["error"] = "could not convert output to grid: %s" % exc
        except BaseException as exc:
            result["error"] = "error calling %s: %s: %s" % (entry, type(exc).__name__, exc)
        result["stdout"] = capture.getvalue()
        examples.append(result)

    emit({"status": "ok", "examples": examples})


main()
"#;

/// Request written to the harness stdin.
#[derive(Debug, Serialize)]
pub struct HarnessRequest<'a> {
    pub code: &'a str,
    pub entry_point: &'a str,
    pub inputs: Vec<&'a Grid>,
}

/// Result line emitted by the harness.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HarnessResponse {
    Ok {
        examples: Vec<HarnessExample>,
    },
    ParseError {
        message: String,
    },
    /// The module body raised before the entry point could be called.
    LoadError {
        message: String,
        #[serde(default)]
        stdout: String,
    },
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct HarnessExample {
    pub output: Option<Grid>,
    pub error: Option<String>,
    #[serde(default)]
    pub stdout: String,
}

/// Find and decode the last result line in the harness stdout.
pub fn parse_response(stdout: &str) -> Option<Result<HarnessResponse, serde_json::Error>> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(RESULT_MARKER))
        .map(serde_json::from_str)
}
