//! Object storage abstraction with a bucket registry.
//!
//! [`storage`] holds the provider contract and backends, [`registry`] the
//! persisted bucket records. [`config`] and [`telemetry`] wire up a process.

pub mod config;
pub mod registry;
pub mod storage;
pub mod telemetry;
