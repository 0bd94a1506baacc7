//! Pipeline runner: executes one run to a terminal outcome.

use std::sync::Arc;

use stockflow_core::{Result, RunConfig, RunOutcome, RunReport, RunState};
use stockflow_stores::{KeyValueStore, RecordStore};

use crate::cancel::CancelToken;
use crate::retry::RetryPolicy;
use crate::stages::{extract, load, transform};

/// Composes the three stages into one executable unit and applies the
/// retry envelope around the whole sequence.
///
/// Store handles are injected per run by the caller; the runner owns no
/// clients of its own.
pub struct Runner {
    policy: RetryPolicy,
    cancel: CancelToken,
}

impl Runner {
    pub fn new(policy: RetryPolicy, cancel: CancelToken) -> Self {
        Self { policy, cancel }
    }

    /// Execute extract -> transform -> load for one run, re-running the
    /// whole sequence on transient store failures until it succeeds or the
    /// attempt budget is spent. Always returns a terminal report.
    pub async fn run(
        &self,
        run_key: &str,
        config: &RunConfig,
        records: Arc<dyn RecordStore>,
        kv: Arc<dyn KeyValueStore>,
    ) -> RunReport {
        let mut state = RunState::Pending;
        let mut attempt = 0u32;

        tracing::info!(
            run_key,
            partition = config.partition_key.as_deref(),
            object_key = %config.object_key,
            "run starting"
        );

        loop {
            attempt += 1;
            transition(run_key, &mut state, RunState::Running);

            match self
                .attempt(run_key, config, records.as_ref(), kv.as_ref())
                .await
            {
                Ok(()) => {
                    transition(run_key, &mut state, RunState::Succeeded);
                    tracing::info!(
                        run_key,
                        partition = config.partition_key.as_deref(),
                        attempts = attempt,
                        "run succeeded"
                    );
                    return self.report(run_key, config, attempt, RunOutcome::Succeeded);
                }
                Err(error) if error.is_retryable() && self.policy.allows_another(attempt) => {
                    tracing::warn!(
                        run_key,
                        attempt,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        %error,
                        "attempt failed, retrying"
                    );
                    transition(run_key, &mut state, RunState::Pending);
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(error) => {
                    transition(run_key, &mut state, RunState::Failed);
                    tracing::error!(
                        run_key,
                        partition = config.partition_key.as_deref(),
                        attempts = attempt,
                        stage = error.stage().unwrap_or("run"),
                        %error,
                        "run failed"
                    );
                    return self.report(run_key, config, attempt, RunOutcome::Failed(error));
                }
            }
        }
    }

    /// One pass through the three stages, with cancellation observed at
    /// every stage boundary.
    async fn attempt(
        &self,
        run_key: &str,
        config: &RunConfig,
        records: &dyn RecordStore,
        kv: &dyn KeyValueStore,
    ) -> Result<()> {
        self.cancel.check(run_key)?;
        let samples = extract(config, records).await?;

        self.cancel.check(run_key)?;
        let aggregation = transform(&samples)?;

        self.cancel.check(run_key)?;
        load(&aggregation, kv).await?;
        Ok(())
    }

    fn report(
        &self,
        run_key: &str,
        config: &RunConfig,
        attempts: u32,
        outcome: RunOutcome,
    ) -> RunReport {
        RunReport {
            run_key: run_key.to_string(),
            partition_key: config.partition_key.clone(),
            attempts,
            outcome,
        }
    }
}

fn transition(run_key: &str, state: &mut RunState, next: RunState) {
    tracing::debug!(run_key, from = ?*state, to = ?next, "run state");
    *state = next;
}
