//! Static partition set and key-to-config resolution.

use stockflow_core::{Error, ResourceConfig, Result, RunConfig};

/// The declared partition keys. Each one selects a distinct source file.
pub const PARTITION_KEYS: [&str; 10] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"];

/// Maps partition keys to run configurations.
///
/// Resolution is pure and total over [`PARTITION_KEYS`]; anything else is
/// a caller defect.
#[derive(Debug, Clone)]
pub struct PartitionSet {
    prefix: String,
}

impl PartitionSet {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn keys(&self) -> &'static [&'static str] {
        &PARTITION_KEYS
    }

    /// Resolve one partition key to its run configuration.
    pub fn resolve(&self, key: &str, resources: ResourceConfig) -> Result<RunConfig> {
        if !PARTITION_KEYS.contains(&key) {
            return Err(Error::unknown_partition(format!(
                "{key:?} is not in the declared set 1..10"
            )));
        }
        Ok(RunConfig {
            partition_key: Some(key.to_string()),
            object_key: self.object_key(key),
            resources,
        })
    }

    /// One run configuration per declared partition, in declaration order.
    pub fn resolve_all(&self, resources: &ResourceConfig) -> Vec<RunConfig> {
        PARTITION_KEYS
            .iter()
            .map(|key| RunConfig {
                partition_key: Some((*key).to_string()),
                object_key: self.object_key(key),
                resources: resources.clone(),
            })
            .collect()
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}/stock_{key}.csv", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_partition() {
        let partitions = PartitionSet::new("prefix");
        let config = partitions
            .resolve("5", ResourceConfig::default())
            .unwrap();

        assert_eq!(config.object_key, "prefix/stock_5.csv");
        assert_eq!(config.partition_key.as_deref(), Some("5"));
    }

    #[test]
    fn test_resolve_rejects_unknown_partition() {
        let partitions = PartitionSet::new("prefix");

        let err = partitions
            .resolve("11", ResourceConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPartition(_)));

        assert!(partitions.resolve("0", ResourceConfig::default()).is_err());
        assert!(partitions.resolve("", ResourceConfig::default()).is_err());
    }

    #[test]
    fn test_resolve_all_covers_declared_set() {
        let partitions = PartitionSet::new("data");
        let configs = partitions.resolve_all(&ResourceConfig::default());

        assert_eq!(configs.len(), 10);
        assert_eq!(configs[0].object_key, "data/stock_1.csv");
        assert_eq!(configs[9].object_key, "data/stock_10.csv");
        assert!(configs
            .iter()
            .zip(PARTITION_KEYS.iter())
            .all(|(c, k)| c.partition_key.as_deref() == Some(*k)));
    }
}
