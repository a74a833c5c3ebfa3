//! # System Module
//!
//! Store-wide metrics.

mod metrics;

pub use metrics::StoreMetrics;
