//! DDLab Core: drawdown analyzer, domain types, price providers and cache.
//!
//! This crate contains:
//! - Domain types (daily price points)
//! - The drawdown analyzer: daily drawdown series, annual worst drawdowns,
//!   current reading and its historical percentile rank
//! - Alert classification of the current reading
//! - Price provider trait with a Yahoo Finance implementation and circuit breaker
//! - Parquet price cache and the index universe configuration

pub mod analysis;
pub mod data;
pub mod domain;

pub use analysis::{AlertLevel, AlertThresholds, DrawdownReport, InvalidInput};
pub use domain::PricePoint;
