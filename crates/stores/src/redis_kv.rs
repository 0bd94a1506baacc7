//! Redis-backed key-value writer.

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::kv_store::KeyValueStore;
use stockflow_core::config::KvConfig;
use stockflow_core::{Error, Result};

/// Key-value writer backed by Redis.
///
/// A connection is established per put; any connection or command failure
/// surfaces as sink-unavailable so the retry envelope can take over.
pub struct RedisKeyValueStore {
    client: redis::Client,
    addr: String,
}

impl RedisKeyValueStore {
    /// Build a client for the configured host and port.
    pub fn new(config: &KvConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let client = redis::Client::open(format!("redis://{addr}/"))
            .map_err(|e| Error::config(format!("redis client for {addr}: {e}")))?;
        Ok(Self { client, addr })
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        tracing::debug!(addr = %self.addr, key, "writing key");

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::sink_unavailable(format!("redis connect {}: {e}", self.addr)))?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| Error::sink_unavailable(format!("redis set {key}: {e}")))?;
        Ok(())
    }
}
