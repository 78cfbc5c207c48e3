//! Statistics and metrics

pub mod metrics;

pub use metrics::{ConnectionStats, HubMetrics, HubStats};
