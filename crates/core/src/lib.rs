//! Core types and configuration for the stockflow system.
//!
//! This crate provides shared types used across all other crates:
//! - Stock sample and aggregation records
//! - Run configuration, requests, state and reports
//! - Configuration structures and profiles
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, Profile, ResourceConfig};
pub use error::{Error, Result};
pub use types::*;
