//! Shared plumbing for the smart-money ranker: configuration, SQLite
//! access, tracing/metrics bootstrap, and the core row types exchanged
//! between the collector's store and the scoring pipeline.

pub mod config;
pub mod db;
pub mod observability;
pub mod types;
