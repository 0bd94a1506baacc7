//! Seen-key ledgers backing sensor deduplication.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use stockflow_core::{Error, Result};

/// Set of run keys the sensor has already emitted.
///
/// `mark_new` is an atomic check-then-insert: under concurrent callers,
/// exactly one caller observes `true` for a given key.
pub trait SeenLedger: Send + Sync {
    /// Record `key`; returns true exactly when it was not present before.
    /// A failed call records nothing.
    fn mark_new(&self, key: &str) -> Result<bool>;

    fn contains(&self, key: &str) -> Result<bool>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Process-lifetime ledger. Dedup state is lost on restart.
pub struct MemoryLedger {
    keys: Mutex<HashSet<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashSet::new()),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SeenLedger for MemoryLedger {
    fn mark_new(&self, key: &str) -> Result<bool> {
        let mut keys = self.keys.lock().expect("ledger lock poisoned");
        Ok(keys.insert(key.to_string()))
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let keys = self.keys.lock().expect("ledger lock poisoned");
        Ok(keys.contains(key))
    }

    fn len(&self) -> Result<usize> {
        let keys = self.keys.lock().expect("ledger lock poisoned");
        Ok(keys.len())
    }
}

/// Durable ledger on SQLite. Dedup state survives restart, so a crashed
/// process does not re-emit runs for keys it already handled.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| Error::ledger(format!("open {}: {e}", path.display())))?;
        conn.execute_batch("CREATE TABLE IF NOT EXISTS seen_keys (key TEXT PRIMARY KEY)")
            .map_err(|e| Error::ledger(format!("init {}: {e}", path.display())))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SeenLedger for SqliteLedger {
    fn mark_new(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        // The primary key makes insert-or-ignore the atomic novelty check.
        let inserted = conn
            .execute("INSERT OR IGNORE INTO seen_keys (key) VALUES (?1)", [key])
            .map_err(|e| Error::ledger(format!("mark {key:?}: {e}")))?;
        Ok(inserted == 1)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM seen_keys WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .map_err(|e| Error::ledger(format!("lookup {key:?}: {e}")))?;
        Ok(count > 0)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM seen_keys", [], |row| row.get(0))
            .map_err(|e| Error::ledger(format!("count: {e}")))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_db(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("stockflow-ledger-{}-{name}.db", std::process::id()))
    }

    #[test]
    fn test_memory_ledger_marks_once() {
        let ledger = MemoryLedger::new();

        assert!(ledger.mark_new("prefix/stock_1.csv").unwrap());
        assert!(!ledger.mark_new("prefix/stock_1.csv").unwrap());

        assert!(ledger.contains("prefix/stock_1.csv").unwrap());
        assert!(!ledger.contains("prefix/stock_2.csv").unwrap());
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn test_memory_ledger_concurrent_marks_yield_one_novel() {
        let ledger = Arc::new(MemoryLedger::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.mark_new("prefix/stock_1.csv").unwrap())
            })
            .collect();

        let novel = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&fresh| fresh)
            .count();
        assert_eq!(novel, 1);
    }

    #[test]
    fn test_sqlite_ledger_marks_once() {
        let path = temp_db("marks-once");
        let _ = std::fs::remove_file(&path);

        let ledger = SqliteLedger::open(&path).unwrap();
        assert!(ledger.mark_new("prefix/stock_1.csv").unwrap());
        assert!(!ledger.mark_new("prefix/stock_1.csv").unwrap());
        assert_eq!(ledger.len().unwrap(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_sqlite_ledger_survives_reopen() {
        let path = temp_db("reopen");
        let _ = std::fs::remove_file(&path);

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            assert!(ledger.mark_new("prefix/stock_1.csv").unwrap());
        }

        let reopened = SqliteLedger::open(&path).unwrap();
        assert!(!reopened.mark_new("prefix/stock_1.csv").unwrap());
        assert!(reopened.contains("prefix/stock_1.csv").unwrap());

        let _ = std::fs::remove_file(&path);
    }
}
