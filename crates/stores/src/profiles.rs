//! Profile-driven capability construction.
//!
//! Every run receives freshly bound store handles resolved from its own
//! `RunConfig` at run start. The `local` profile hands out in-memory
//! fakes seeded with a fixed fixture batch; `production` builds real
//! S3 and Redis clients from the run's resource settings.

use std::sync::Arc;

use crate::kv_store::{KeyValueStore, MemoryKeyValueStore};
use crate::record_store::{MemoryRecordStore, RecordStore};
use crate::redis_kv::RedisKeyValueStore;
use crate::s3::S3RecordStore;
use stockflow_core::{Profile, RawRecord, ResourceConfig, Result, RunConfig};

/// The fixture batch served by local-profile record stores, in source
/// field order (date, close, volume, open, high, low).
pub fn fixture_records() -> Vec<RawRecord> {
    [
        ["2020/01/02", "321.5", "21000000.0", "320.0", "326.75", "319.2"],
        ["2020/01/03", "325.1", "18700000.0", "321.0", "329.5", "320.4"],
        ["2020/01/06", "332.8", "24100000.0", "326.0", "335.2", "325.5"],
        ["2020/01/07", "331.0", "19500000.0", "333.0", "334.1", "329.9"],
    ]
    .iter()
    .map(|row| row.iter().map(|s| s.to_string()).collect())
    .collect()
}

/// Record store for one run.
///
/// Local stores answer every key with the fixture batch; each call hands
/// out a fresh fake.
pub fn create_record_store(profile: Profile, run: &RunConfig) -> Result<Arc<dyn RecordStore>> {
    match profile {
        Profile::Local => Ok(Arc::new(MemoryRecordStore::with_default_records(
            fixture_records(),
        ))),
        Profile::Production => Ok(Arc::new(S3RecordStore::new(&run.resources.store)?)),
    }
}

/// Key-value store for one run.
pub fn create_kv_store(
    profile: Profile,
    resources: &ResourceConfig,
) -> Result<Arc<dyn KeyValueStore>> {
    match profile {
        Profile::Local => Ok(Arc::new(MemoryKeyValueStore::new())),
        Profile::Production => Ok(Arc::new(RedisKeyValueStore::new(&resources.kv)?)),
    }
}

/// Record store the sensor polls for new keys.
///
/// The local store is seeded with one fixture object under the prefix, so
/// a local sensor discovers work on its first poll and deduplicates it
/// afterwards.
pub fn create_sensor_store(
    profile: Profile,
    resources: &ResourceConfig,
    prefix: &str,
) -> Result<Arc<dyn RecordStore>> {
    match profile {
        Profile::Local => {
            let store = MemoryRecordStore::new();
            store.insert(format!("{prefix}/stock_9.csv"), fixture_records());
            Ok(Arc::new(store))
        }
        Profile::Production => Ok(Arc::new(S3RecordStore::new(&resources.store)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_shape() {
        let records = fixture_records();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.len() == 6));
    }

    #[tokio::test]
    async fn test_local_record_store_serves_any_key() {
        let run = RunConfig::for_object_key("prefix/stock_3.csv", ResourceConfig::default());
        let store = create_record_store(Profile::Local, &run).unwrap();

        let records = store.get_records("prefix/stock_3.csv").await.unwrap();
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_local_sensor_store_lists_seeded_key() {
        let store =
            create_sensor_store(Profile::Local, &ResourceConfig::default(), "prefix").unwrap();
        let keys = store.list_keys("prefix").await.unwrap();
        assert_eq!(keys, vec!["prefix/stock_9.csv"]);
    }

    #[test]
    fn test_production_stores_build() {
        let run = RunConfig::for_object_key("prefix/stock_1.csv", ResourceConfig::default());
        assert!(create_record_store(Profile::Production, &run).is_ok());
        assert!(create_kv_store(Profile::Production, &ResourceConfig::default()).is_ok());
    }
}
