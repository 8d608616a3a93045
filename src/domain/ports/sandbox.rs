//! Code sandbox port.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::SandboxError;
use crate::domain::models::{ExamplePair, ExampleResult};

/// Executes untrusted code against example pairs in an isolated context.
///
/// Implementations must enforce `timeout` as a hard wall-clock limit and
/// must record exceptions raised for a single example in that example's
/// result rather than failing the whole run.
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    /// Run `code` against every pair, returning one result per pair in order.
    async fn run(
        &self,
        code: &str,
        pairs: &[ExamplePair],
        timeout: Duration,
    ) -> Result<Vec<ExampleResult>, SandboxError>;
}
