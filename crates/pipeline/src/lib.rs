//! Stage execution for stockflow runs.
//!
//! The pipeline crate turns one [`RunConfig`](stockflow_core::RunConfig)
//! into a terminal [`RunReport`](stockflow_core::RunReport):
//!
//! - `stages`: the extract, transform and load steps
//! - `runner`: drives the stages and applies the retry envelope
//! - `retry`: the attempt budget and inter-attempt delay
//! - `cancel`: cooperative shutdown token observed at stage boundaries

pub mod cancel;
pub mod retry;
pub mod runner;
pub mod stages;

pub use cancel::CancelToken;
pub use retry::RetryPolicy;
pub use runner::Runner;
pub use stages::{extract, load, transform};
