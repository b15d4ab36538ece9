//! Per-invocation limits and cancellation.

use crate::error::{AgentOpsError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Limits and signals threaded through one graph run.
///
/// Cloning shares the cancellation token, so cancelling any clone stops
/// the whole invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    max_steps: Option<usize>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of `agent` steps. `None` means unbounded.
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn max_steps(&self) -> Option<usize> {
        self.max_steps
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(AgentOpsError::Cancelled);
        }
        Ok(())
    }

    /// Fail if the invocation was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<()> {
        self.ensure_not_cancelled()?;
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AgentOpsError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Run `fut` until it completes, the token is cancelled or the deadline passes.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentOpsError::Cancelled),
            _ = deadline => Err(AgentOpsError::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}
