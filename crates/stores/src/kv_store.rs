//! Key-value writer capability.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use stockflow_core::{Error, Result};

/// Write-only key-value capability.
///
/// Writes are at-least-once under retry; putting the same key twice is
/// safe because the value is a pure function of the run's input batch.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write one key/value pair.
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory key-value store for local runs and tests.
///
/// Contents are inspectable, and the next `n` puts can be made to fail
/// for exercising the retry path.
pub struct MemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, String>>,
    fail_puts: AtomicU32,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            fail_puts: AtomicU32::new(0),
        }
    }

    /// Make the next `n` puts fail as sink-unavailable.
    pub fn fail_next_puts(&self, n: u32) {
        self.fail_puts.store(n, Ordering::SeqCst);
    }

    /// Read back a written value.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .expect("kv store lock poisoned")
            .get(key)
            .cloned()
    }

    /// All entries, in key order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .expect("kv store lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("kv store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let remaining = self.fail_puts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_puts.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::sink_unavailable("memory kv store is offline"));
        }
        self.entries
            .write()
            .expect("kv store lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryKeyValueStore::new();
        store.put("2020-01-02 00:00:00", "15").await.unwrap();

        assert_eq!(store.get("2020-01-02 00:00:00").as_deref(), Some("15"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryKeyValueStore::new();
        store.put("k", "1").await.unwrap();
        store.put("k", "2").await.unwrap();

        assert_eq!(store.get("k").as_deref(), Some("2"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_puts_then_recover() {
        let store = MemoryKeyValueStore::new();
        store.fail_next_puts(2);

        let err = store.put("k", "v").await.unwrap_err();
        assert!(matches!(err, Error::SinkUnavailable(_)));
        assert!(store.put("k", "v").await.is_err());

        store.put("k", "v").await.unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }
}
