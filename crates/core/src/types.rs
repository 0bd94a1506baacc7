//! Core data types for the stockflow system.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::ResourceConfig;
use crate::error::{Error, Result};

/// One raw delimited record as listed/fetched from the object store.
pub type RawRecord = Vec<String>;

/// Date format used by source files (`2020/01/02`).
pub const SOURCE_DATE_FORMAT: &str = "%Y/%m/%d";

/// A single stock sample parsed from one source record.
///
/// Source files carry the fields in the order
/// `date, close, volume, open, high, low`; parsing is positional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSample {
    /// Sample date (midnight, no timezone).
    pub date: NaiveDateTime,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume. Source files may carry a float literal; the
    /// fractional part is dropped.
    pub volume: i64,
}

impl StockSample {
    /// Parse one raw record into a sample.
    ///
    /// All six fields must parse or the record is rejected as a whole.
    pub fn from_record(fields: &[String]) -> Result<Self> {
        if fields.len() != 6 {
            return Err(Error::parse(format!(
                "expected 6 fields, got {}",
                fields.len()
            )));
        }

        let date = NaiveDate::parse_from_str(fields[0].trim(), SOURCE_DATE_FORMAT)
            .map_err(|e| Error::parse(format!("field 0 (date) {:?}: {e}", fields[0])))?
            .and_time(NaiveTime::MIN);
        let close = parse_float(&fields[1], 1, "close")?;
        let volume = parse_float(&fields[2], 2, "volume")?;
        // A non-finite volume would otherwise saturate in the cast below.
        if !volume.is_finite() {
            return Err(Error::parse(format!(
                "field 2 (volume) {:?}: not a finite number",
                fields[2]
            )));
        }
        let volume = volume as i64;
        let open = parse_float(&fields[3], 3, "open")?;
        let high = parse_float(&fields[4], 4, "high")?;
        let low = parse_float(&fields[5], 5, "low")?;

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

fn parse_float(raw: &str, index: usize, name: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| Error::parse(format!("field {index} ({name}) {raw:?}: {e}")))
}

/// Reduction of a batch of samples: the single highest-`high` sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregation {
    /// Date of the sample that achieved the maximum.
    pub date: NaiveDateTime,
    /// The maximum `high` across the batch.
    pub high: f64,
}

impl Aggregation {
    /// The `(key, value)` pair written to the key-value store.
    ///
    /// Both sides use Display formatting, which is stable:
    /// `("2020-01-02 00:00:00", "15")`.
    #[inline]
    pub fn kv_pair(&self) -> (String, String) {
        (self.date.to_string(), self.high.to_string())
    }
}

/// Everything one run needs: which object to process and how to reach
/// the external stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Partition key, when the run was produced by the partition resolver.
    pub partition_key: Option<String>,
    /// Object key to extract from.
    pub object_key: String,
    /// Store/kv connection settings for this run.
    pub resources: ResourceConfig,
}

impl RunConfig {
    /// Config for a single unpartitioned run against one object key.
    pub fn for_object_key(object_key: impl Into<String>, resources: ResourceConfig) -> Self {
        Self {
            partition_key: None,
            object_key: object_key.into(),
            resources,
        }
    }

    /// Label used in logs and reports: the partition key when present,
    /// the object key otherwise.
    pub fn label(&self) -> &str {
        self.partition_key.as_deref().unwrap_or(&self.object_key)
    }
}

/// A sensor-originated request for one run.
///
/// `run_key` doubles as the idempotency token: a request whose key was
/// already seen must never be emitted again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Stable dedup key, equal to the object key that triggered it.
    pub run_key: String,
    /// The run's resolved configuration.
    pub config: RunConfig,
}

impl RunRequest {
    /// Build a request for a newly discovered object key.
    pub fn for_new_key(key: impl Into<String>, resources: ResourceConfig) -> Self {
        let key = key.into();
        Self {
            config: RunConfig::for_object_key(key.clone(), resources),
            run_key: key,
        }
    }
}

/// Per-run execution state.
///
/// `Pending -> Running -> Succeeded`, or `Running -> Pending` again after
/// a retryable failure, or `Running -> Failed` on a terminal one (which
/// includes exhausting the attempt budget).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Waiting for an attempt to start.
    Pending,
    /// An attempt is executing.
    Running,
    /// The run completed.
    Succeeded,
    /// The run failed and will not be re-attempted.
    Failed,
}

impl RunState {
    /// Terminal states end the run.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// Terminal result of one run.
#[derive(Debug)]
pub enum RunOutcome {
    /// All three stages completed.
    Succeeded,
    /// Terminal failure, carrying the last error observed.
    Failed(Error),
}

impl RunOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }
}

/// Summary of a finished run, as handed back to whoever requested it.
#[derive(Debug)]
pub struct RunReport {
    /// The run's dedup key or object key.
    pub run_key: String,
    /// Partition key, when partition-resolved.
    pub partition_key: Option<String>,
    /// Number of attempts actually made (>= 1).
    pub attempts: u32,
    /// Terminal outcome.
    pub outcome: RunOutcome,
}

impl RunReport {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.partition_key {
            Some(p) => write!(f, "run {} (partition {})", self.run_key, p)?,
            None => write!(f, "run {}", self.run_key)?,
        }
        match &self.outcome {
            RunOutcome::Succeeded => write!(f, ": succeeded after {} attempt(s)", self.attempts),
            RunOutcome::Failed(e) => {
                write!(f, ": failed after {} attempt(s): {e}", self.attempts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sample_from_record() {
        let rec = record(&[
            "2020/01/02",
            "321.5",
            "21000000.0",
            "320.0",
            "326.75",
            "319.2",
        ]);
        let sample = StockSample::from_record(&rec).unwrap();

        assert_eq!(sample.date.to_string(), "2020-01-02 00:00:00");
        assert_relative_eq!(sample.close, 321.5);
        assert_eq!(sample.volume, 21_000_000);
        assert_relative_eq!(sample.open, 320.0);
        assert_relative_eq!(sample.high, 326.75);
        assert_relative_eq!(sample.low, 319.2);
    }

    #[test]
    fn test_sample_volume_truncates_float_literal() {
        let rec = record(&["2020/01/02", "1.0", "4514562.9", "1.0", "1.0", "1.0"]);
        let sample = StockSample::from_record(&rec).unwrap();
        assert_eq!(sample.volume, 4_514_562);
    }

    #[test]
    fn test_sample_non_finite_volume_rejected() {
        for raw in ["nan", "inf", "-inf"] {
            let rec = record(&["2020/01/02", "1.0", raw, "1.0", "1.0", "1.0"]);
            let err = StockSample::from_record(&rec).unwrap_err();
            assert!(matches!(err, Error::Parse(_)), "volume {raw:?} must be rejected");
        }
    }

    #[test]
    fn test_sample_bad_date_rejected() {
        let rec = record(&["01/02/2020", "1.0", "10", "1.0", "1.0", "1.0"]);
        let err = StockSample::from_record(&rec).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_sample_bad_numeric_rejected() {
        let rec = record(&["2020/01/02", "abc", "10", "1.0", "1.0", "1.0"]);
        assert!(StockSample::from_record(&rec).is_err());
    }

    #[test]
    fn test_sample_short_record_rejected() {
        let rec = record(&["2020/01/02", "1.0", "10"]);
        let err = StockSample::from_record(&rec).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_aggregation_kv_pair() {
        let agg = Aggregation {
            date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_time(NaiveTime::MIN),
            high: 15.0,
        };
        let (key, value) = agg.kv_pair();
        assert_eq!(key, "2020-01-02 00:00:00");
        assert_eq!(value, "15");
    }

    #[test]
    fn test_run_state_terminal() {
        assert!(!RunState::Pending.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
    }

    #[test]
    fn test_run_request_for_new_key() {
        let req = RunRequest::for_new_key("prefix/stock_3.csv", ResourceConfig::default());
        assert_eq!(req.run_key, "prefix/stock_3.csv");
        assert_eq!(req.config.object_key, "prefix/stock_3.csv");
        assert!(req.config.partition_key.is_none());
    }

    #[test]
    fn test_run_report_display() {
        let report = RunReport {
            run_key: "prefix/stock_5.csv".to_string(),
            partition_key: Some("5".to_string()),
            attempts: 2,
            outcome: RunOutcome::Succeeded,
        };
        let text = report.to_string();
        assert!(text.contains("partition 5"));
        assert!(text.contains("succeeded after 2 attempt(s)"));
    }
}
