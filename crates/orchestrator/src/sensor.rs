//! Object-store polling sensor with idempotent run emission.

use std::sync::Arc;
use std::time::Duration;

use stockflow_core::{Profile, ResourceConfig, Result, RunRequest};
use stockflow_pipeline::{CancelToken, Runner};
use stockflow_stores::RecordStore;

use crate::execute_run;
use crate::ledger::SeenLedger;

/// Skip message reported when a poll finds nothing new.
pub const SKIP_NO_NEW_FILES: &str = "No new s3 files found in bucket.";

/// Outcome of one sensor poll tick.
#[derive(Debug)]
pub enum SensorOutcome {
    /// One request per newly discovered key, in listing order.
    Emitted(Vec<RunRequest>),
    /// Nothing new under the prefix.
    Skipped { reason: String },
}

/// Discovers new work by listing the object store and diffing against the
/// seen-key ledger.
pub struct Sensor {
    prefix: String,
    resources: ResourceConfig,
    store: Arc<dyn RecordStore>,
    ledger: Arc<dyn SeenLedger>,
}

impl Sensor {
    pub fn new(
        prefix: impl Into<String>,
        resources: ResourceConfig,
        store: Arc<dyn RecordStore>,
        ledger: Arc<dyn SeenLedger>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            resources,
            store,
            ledger,
        }
    }

    /// One poll tick.
    ///
    /// Every listed key the ledger has not seen becomes one request, in
    /// lexicographic listing order. A key enters the ledger at emission
    /// time, so a downstream run failing and retrying never causes the
    /// sensor to emit it again. A failed listing is the tick's error; the
    /// sensor reports it and waits for the next natural tick. A ledger
    /// write failure stops the scan: keys recorded before it still emit,
    /// the rest stay unrecorded and surface on a later tick.
    pub async fn poll(&self) -> Result<SensorOutcome> {
        let keys = self.store.list_keys(&self.prefix).await?;
        tracing::debug!(prefix = %self.prefix, listed = keys.len(), "sensor poll");

        let mut requests = Vec::new();
        for key in keys {
            match self.ledger.mark_new(&key) {
                Ok(true) => {
                    tracing::info!(run_key = %key, "sensor discovered new key");
                    requests.push(RunRequest::for_new_key(key, self.resources.clone()));
                }
                Ok(false) => {}
                Err(error) if requests.is_empty() => return Err(error),
                Err(error) => {
                    tracing::warn!(run_key = %key, %error, "ledger write failed, deferring remaining keys");
                    break;
                }
            }
        }

        if requests.is_empty() {
            Ok(SensorOutcome::Skipped {
                reason: SKIP_NO_NEW_FILES.to_string(),
            })
        } else {
            Ok(SensorOutcome::Emitted(requests))
        }
    }

    /// Poll, dispatch emitted runs, sleep, repeat until cancelled.
    ///
    /// Runs from one tick execute concurrently and are awaited before the
    /// next sleep, so `interval` is the minimum spacing between ticks.
    pub async fn run_loop(
        &self,
        interval: Duration,
        profile: Profile,
        runner: Arc<Runner>,
        cancel: CancelToken,
    ) {
        tracing::info!(prefix = %self.prefix, interval_secs = interval.as_secs(), "sensor started");
        loop {
            if cancel.is_cancelled() {
                tracing::info!("sensor stopping");
                return;
            }

            match self.poll().await {
                Ok(SensorOutcome::Emitted(requests)) => {
                    let handles: Vec<_> = requests
                        .into_iter()
                        .map(|request| {
                            let runner = runner.clone();
                            let run_key = request.run_key.clone();
                            let handle = tokio::spawn(async move {
                                execute_run(profile, &runner, request.config).await
                            });
                            (run_key, handle)
                        })
                        .collect();
                    for (run_key, handle) in handles {
                        match handle.await {
                            Ok(Ok(report)) => tracing::info!(%report, "sensor run finished"),
                            Ok(Err(error)) => {
                                tracing::error!(%run_key, %error, "sensor run could not start")
                            }
                            Err(error) => {
                                tracing::error!(%run_key, %error, "sensor run task failed")
                            }
                        }
                    }
                }
                Ok(SensorOutcome::Skipped { reason }) => {
                    tracing::debug!(%reason, "sensor tick skipped");
                }
                Err(error) => {
                    tracing::warn!(%error, "sensor poll failed, retrying next tick");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => {
                    tracing::info!("sensor stopping");
                    return;
                }
            }
        }
    }
}
