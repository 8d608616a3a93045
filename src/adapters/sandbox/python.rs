//! Python subprocess sandbox.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::entry_point::EntryPointLocator;
use super::harness::{parse_response, HarnessRequest, HarnessResponse, HARNESS};
use crate::domain::errors::SandboxError;
use crate::domain::models::{ExamplePair, ExampleResult, SandboxConfig};
use crate::domain::ports::CodeSandbox;

/// Longest stderr excerpt kept in harness errors.
const STDERR_TAIL: usize = 2000;

/// Runs candidates in a fresh `python -I -u -c HARNESS` process per run.
///
/// The process is placed in its own process group so that a timeout kills
/// anything the candidate spawned along with the interpreter.
#[derive(Debug, Clone)]
pub struct PythonSandbox {
    python: String,
    locator: EntryPointLocator,
}

impl PythonSandbox {
    pub fn new(python: impl Into<String>, entry_point: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            python: python.into(),
            locator: EntryPointLocator::new(entry_point)?,
        })
    }

    pub fn from_config(config: &SandboxConfig) -> Result<Self, regex::Error> {
        Self::new(config.python.clone(), &config.entry_point)
    }

    /// Spawn the harness, feed it `payload` and collect stdout/stderr.
    async fn execute(
        &self,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<(ExitStatus, String, String), SandboxError> {
        let mut cmd = Command::new(&self.python);
        cmd.arg("-I")
            .arg("-u")
            .arg("-c")
            .arg(HARNESS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| SandboxError::Spawn(format!("{}: {e}", self.python)))?;
        let pid = child.id();

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SandboxError::Spawn("failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandboxError::Spawn("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SandboxError::Spawn("failed to capture stderr".to_string()))?;

        let write = async move {
            // The harness may exit before reading everything; a broken pipe
            // surfaces through its result line instead.
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(error = %e, "sandbox stdin write failed");
            }
            drop(stdin);
            Ok::<_, std::io::Error>(())
        };
        let exchange = async {
            tokio::try_join!(write, read_all(stdout), read_all(stderr), child.wait())
        };

        let outcome = tokio::time::timeout(timeout, exchange).await;
        match outcome {
            Ok(Ok(((), out, err, status))) => Ok((
                status,
                String::from_utf8_lossy(&out).into_owned(),
                String::from_utf8_lossy(&err).into_owned(),
            )),
            Ok(Err(e)) => {
                kill_process_group(pid);
                let _ = child.kill().await;
                Err(SandboxError::Harness(format!("I/O error talking to sandbox: {e}")))
            }
            Err(_) => {
                kill_process_group(pid);
                let _ = child.kill().await;
                warn!(
                    pid,
                    timeout_secs = timeout.as_secs_f64(),
                    "sandbox timed out, process group killed"
                );
                Err(SandboxError::Timeout {
                    secs: timeout.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl CodeSandbox for PythonSandbox {
    async fn run(
        &self,
        code: &str,
        pairs: &[ExamplePair],
        timeout: Duration,
    ) -> Result<Vec<ExampleResult>, SandboxError> {
        if !self.locator.is_defined(code) {
            return Err(SandboxError::Parse(format!(
                "no `{}` function defined",
                self.locator.name()
            )));
        }
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let request = HarnessRequest {
            code,
            entry_point: self.locator.name(),
            inputs: pairs.iter().map(|p| &p.input).collect(),
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|e| SandboxError::Harness(format!("failed to encode request: {e}")))?;

        let (status, stdout, stderr) = self.execute(payload, timeout).await?;

        let response = match parse_response(&stdout) {
            Some(Ok(response)) => response,
            Some(Err(e)) => {
                return Err(SandboxError::Harness(format!("unreadable result line: {e}")));
            }
            None => {
                return Err(SandboxError::Harness(format!(
                    "no result ({status}); stderr: {}",
                    tail(&stderr, STDERR_TAIL)
                )));
            }
        };

        match response {
            HarnessResponse::Ok { examples } => {
                if examples.len() != pairs.len() {
                    return Err(SandboxError::Harness(format!(
                        "expected {} results, got {}",
                        pairs.len(),
                        examples.len()
                    )));
                }
                Ok(pairs
                    .iter()
                    .zip(examples)
                    .enumerate()
                    .map(|(index, (pair, example))| match (example.output, example.error) {
                        (_, Some(error)) => ExampleResult::errored(index, pair, error, example.stdout),
                        (Some(output), None) => {
                            ExampleResult::evaluated(index, pair, output, example.stdout)
                        }
                        (None, None) => ExampleResult::errored(
                            index,
                            pair,
                            "no output produced",
                            example.stdout,
                        ),
                    })
                    .collect())
            }
            HarnessResponse::ParseError { message } => Err(SandboxError::Parse(message)),
            HarnessResponse::LoadError { message, stdout } => {
                debug!(%message, "candidate module raised while loading");
                Ok(pairs
                    .iter()
                    .enumerate()
                    .map(|(index, pair)| {
                        let captured = if index == 0 { stdout.clone() } else { String::new() };
                        ExampleResult::errored(index, pair, format!("module load failed: {message}"), captured)
                    })
                    .collect())
            }
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

fn tail(text: &str, max: usize) -> &str {
    let trimmed = text.trim_end();
    if trimmed.len() <= max {
        return trimmed;
    }
    let mut start = trimmed.len() - max;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            debug!(pid, error = %e, "killpg failed");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
