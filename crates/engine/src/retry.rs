//! Fixed-delay retry budget shared by every network call of one reconciliation.

use crate::error::{ReconcileError, ReconcileResult};
use indexer_client::ClientResult;
use indexer_core::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Counts failed attempts and remembers the last identity seen, so an
/// exhausted budget can be reported with enough context to diagnose.
#[derive(Debug)]
pub struct RetryBudget {
    max_attempts: u32,
    delay: Duration,
    failures: u32,
    did: Option<String>,
    rev: Option<String>,
}

impl RetryBudget {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.delay(),
            failures: 0,
            did: None,
            rev: None,
        }
    }

    /// Failed attempts so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record the identity currently being worked on.
    pub fn track(&mut self, did: &str, rev: Option<&str>) {
        self.did = Some(did.to_string());
        self.rev = rev.map(str::to_string);
    }

    /// Spend one attempt on a failure.
    ///
    /// Sleeps the fixed delay and returns Ok while budget remains; the attempt
    /// that spends the last unit returns `RetryExhausted` immediately.
    pub async fn fail(&mut self, detail: String) -> ReconcileResult<()> {
        self.failures += 1;
        tracing::warn!(
            attempt = self.failures,
            max_attempts = self.max_attempts,
            did = self.did.as_deref().unwrap_or("-"),
            rev = self.rev.as_deref().unwrap_or("-"),
            %detail,
            "Attempt failed"
        );

        if self.failures >= self.max_attempts {
            return Err(ReconcileError::RetryExhausted {
                did: self.did.clone(),
                rev: self.rev.clone(),
                attempts: self.failures,
                detail,
            });
        }

        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    /// Run an index call until it succeeds, fails fatally, or the budget runs out.
    pub async fn run<T, F, Fut>(&mut self, what: &str, mut call: F) -> ReconcileResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => self.fail(format!("{what}: {err}")).await?,
                Err(err) => return Err(ReconcileError::Index(err)),
            }
        }
    }
}
