//! Statistics for the event hub and its connections

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one connection
///
/// Shared between the intake path (drops) and the connection's writer task
/// (sends).
#[derive(Debug)]
pub struct ConnectionStats {
    connected_at: Instant,
    events_sent: AtomicU64,
    events_dropped: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self {
            connected_at: Instant::now(),
            events_sent: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
        }
    }

    /// Record an event written to the wire
    pub fn record_sent(&self) {
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event dropped under backpressure
    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Events written to the wire
    pub fn events_sent(&self) -> u64 {
        self.events_sent.load(Ordering::Relaxed)
    }

    /// Events dropped for this connection
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    /// Time since the subscription was created
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Live hub-wide counters
#[derive(Debug)]
pub struct HubMetrics {
    started_at: Instant,
    total_connections: AtomicU64,
    events_accepted: AtomicU64,
    events_rejected: AtomicU64,
    deliveries: AtomicU64,
    drops: AtomicU64,
}

impl HubMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            events_accepted: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            drops: AtomicU64::new(0),
        }
    }

    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.events_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fanout(&self, delivered: usize, dropped: usize) {
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.drops.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters
    pub fn snapshot(&self, active_connections: usize) -> HubStats {
        HubStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: active_connections as u64,
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for HubMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub-wide statistics
#[derive(Debug, Clone, Default)]
pub struct HubStats {
    /// Connections accepted since start
    pub total_connections: u64,
    /// Currently registered connections
    pub active_connections: u64,
    /// Events accepted from the producer
    pub events_accepted: u64,
    /// Events refused at intake (unset variant)
    pub events_rejected: u64,
    /// Event copies placed on connection queues
    pub deliveries: u64,
    /// Event copies dropped under backpressure
    pub drops: u64,
    /// Uptime
    pub uptime: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_stats_new() {
        let stats = ConnectionStats::new();
        assert_eq!(stats.events_sent(), 0);
        assert_eq!(stats.events_dropped(), 0);
    }

    #[test]
    fn test_connection_stats_counts() {
        let stats = ConnectionStats::new();
        stats.record_sent();
        stats.record_sent();
        stats.record_dropped();

        assert_eq!(stats.events_sent(), 2);
        assert_eq!(stats.events_dropped(), 1);
    }

    #[test]
    fn test_hub_metrics_snapshot() {
        let metrics = HubMetrics::new();
        metrics.record_connection();
        metrics.record_accepted();
        metrics.record_accepted();
        metrics.record_rejected();
        metrics.record_fanout(3, 1);

        let stats = metrics.snapshot(1);
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.events_accepted, 2);
        assert_eq!(stats.events_rejected, 1);
        assert_eq!(stats.deliveries, 3);
        assert_eq!(stats.drops, 1);
    }

    #[test]
    fn test_hub_stats_default() {
        let stats = HubStats::default();
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.deliveries, 0);
    }
}
