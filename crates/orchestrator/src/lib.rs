//! Run orchestration for the stockflow pipeline.
//!
//! - `partitions`: the static partition set and key resolution
//! - `schedule`: cron cadences and the scheduler loop
//! - `sensor`: object-store polling with idempotent run emission
//! - `ledger`: the sensor's seen-key ledgers, in-memory and SQLite

pub mod ledger;
pub mod partitions;
pub mod schedule;
pub mod sensor;

pub use ledger::{MemoryLedger, SeenLedger, SqliteLedger};
pub use partitions::{PartitionSet, PARTITION_KEYS};
pub use schedule::{CronSchedule, Scheduler, TickMode};
pub use sensor::{Sensor, SensorOutcome, SKIP_NO_NEW_FILES};

use stockflow_core::{Profile, Result, RunConfig, RunReport};
use stockflow_pipeline::Runner;
use stockflow_stores::{create_kv_store, create_record_store};

/// Execute one run with freshly bound capabilities.
///
/// The run key is the partition key when the config was partition
/// resolved, the object key otherwise. Returns `Err` only when the
/// capabilities cannot be built from the run's resource settings; every
/// later failure is reported through the [`RunReport`].
pub async fn execute_run(
    profile: Profile,
    runner: &Runner,
    config: RunConfig,
) -> Result<RunReport> {
    let run_key = config.label().to_string();
    let records = create_record_store(profile, &config)?;
    let kv = create_kv_store(profile, &config.resources)?;
    Ok(runner.run(&run_key, &config, records, kv).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_core::ResourceConfig;
    use stockflow_pipeline::{CancelToken, RetryPolicy};

    #[tokio::test]
    async fn test_execute_run_against_local_profile() {
        let runner = Runner::new(RetryPolicy::default(), CancelToken::new());
        let config = PartitionSet::new("prefix")
            .resolve("3", ResourceConfig::default())
            .unwrap();

        let report = execute_run(Profile::Local, &runner, config).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.run_key, "3");
        assert_eq!(report.partition_key.as_deref(), Some("3"));
        assert_eq!(report.attempts, 1);
    }
}
