//! Resource clients for the stockflow system.
//!
//! This crate handles:
//! - Object-store reader and key-value writer capabilities
//! - S3-compatible and Redis-backed implementations
//! - In-memory fakes for local runs and tests
//! - Profile-driven capability construction

pub mod record_store;
pub mod kv_store;
pub mod s3;
pub mod redis_kv;
pub mod profiles;

pub use record_store::{MemoryRecordStore, RecordStore};
pub use kv_store::{KeyValueStore, MemoryKeyValueStore};
pub use s3::S3RecordStore;
pub use redis_kv::RedisKeyValueStore;
pub use profiles::{create_kv_store, create_record_store, create_sensor_store, fixture_records};
