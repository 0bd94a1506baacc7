//! The three pipeline stages.
//!
//! The pipeline shape is fixed and linear: `extract` reads and parses the
//! run's object, `transform` reduces the batch to its highest-high sample,
//! `load` writes the stringified pair. Each stage takes the capability it
//! needs as an argument; nothing reaches for ambient state.

use stockflow_core::{Aggregation, Error, Result, RunConfig, StockSample};
use stockflow_stores::{KeyValueStore, RecordStore};

/// Fetch the run's object and parse every record into a sample.
///
/// Samples come back in source record order. All-or-nothing: one bad
/// record rejects the whole batch.
pub async fn extract(run: &RunConfig, store: &dyn RecordStore) -> Result<Vec<StockSample>> {
    let records = store.get_records(&run.object_key).await?;

    let mut samples = Vec::with_capacity(records.len());
    for record in &records {
        samples.push(StockSample::from_record(record)?);
    }

    tracing::debug!(
        object_key = %run.object_key,
        samples = samples.len(),
        "extracted batch"
    );
    Ok(samples)
}

/// Reduce a batch to the single highest-`high` sample.
///
/// Pure and deterministic. Ties keep the first sample achieving the
/// maximum.
pub fn transform(samples: &[StockSample]) -> Result<Aggregation> {
    let first = match samples.first() {
        Some(sample) => sample,
        None => return Err(Error::empty_input("no samples in batch")),
    };

    let mut best = first;
    for sample in &samples[1..] {
        if sample.high > best.high {
            best = sample;
        }
    }

    Ok(Aggregation {
        date: best.date,
        high: best.high,
    })
}

/// Write the aggregation's `(date, high)` pair to the key-value store.
pub async fn load(aggregation: &Aggregation, store: &dyn KeyValueStore) -> Result<()> {
    let (key, value) = aggregation.kv_pair();
    store.put(&key, &value).await?;
    tracing::debug!(%key, %value, "loaded aggregation");
    Ok(())
}
