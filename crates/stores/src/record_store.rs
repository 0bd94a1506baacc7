//! Object-store reader capability.
//!
//! Read-only view of the bucket holding source files: key listing and
//! record fetch. The bucket and endpoint are bound at construction, so a
//! handle is complete in itself and can be injected into a run.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use stockflow_core::{Error, RawRecord, Result};

/// Read-only object store capability bound to one bucket.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List all keys under the prefix, in ascending lexicographic order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Fetch one object and return its raw delimited records in source
    /// order.
    async fn get_records(&self, key: &str) -> Result<Vec<RawRecord>>;
}

/// In-memory record store for local runs and tests.
///
/// Objects are seeded with [`insert`](MemoryRecordStore::insert). A store
/// built with [`with_default_records`](MemoryRecordStore::with_default_records)
/// answers any unseeded key with the default batch, mirroring a mock that
/// serves one fixture regardless of key. [`set_offline`](MemoryRecordStore::set_offline)
/// makes every call fail as unavailable.
pub struct MemoryRecordStore {
    objects: RwLock<BTreeMap<String, Vec<RawRecord>>>,
    default_records: Option<Vec<RawRecord>>,
    offline: AtomicBool,
}

impl MemoryRecordStore {
    /// Empty store; unknown keys fail as unavailable.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            default_records: None,
            offline: AtomicBool::new(false),
        }
    }

    /// Store that answers any unseeded key with `records`.
    pub fn with_default_records(records: Vec<RawRecord>) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            default_records: Some(records),
            offline: AtomicBool::new(false),
        }
    }

    /// Seed one object.
    pub fn insert(&self, key: impl Into<String>, records: Vec<RawRecord>) {
        self.objects
            .write()
            .expect("record store lock poisoned")
            .insert(key.into(), records);
    }

    /// Toggle simulated unavailability.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::source_unavailable("memory store is offline"))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_online()?;
        let objects = self.objects.read().expect("record store lock poisoned");
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get_records(&self, key: &str) -> Result<Vec<RawRecord>> {
        self.check_online()?;
        let objects = self.objects.read().expect("record store lock poisoned");
        if let Some(records) = objects.get(key) {
            return Ok(records.clone());
        }
        match &self.default_records {
            Some(records) => Ok(records.clone()),
            None => Err(Error::source_unavailable(format!("no such key: {key}"))),
        }
    }
}
