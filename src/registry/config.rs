//! Delivery queue configuration

use std::time::Duration;

/// Default number of events buffered per connection
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default time intake waits on a full queue before dropping
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(10);

/// Capacity and full-queue policy applied to every connection's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Events buffered per connection (0 = rendezvous handoff)
    pub capacity: usize,

    /// How long intake waits on a full queue (zero = wait indefinitely)
    pub timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

impl QueueConfig {
    /// Create a queue config
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self { capacity, timeout }
    }

    /// Set capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set full-queue timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if intake waits indefinitely on a full queue
    pub fn is_blocking(&self) -> bool {
        self.timeout.is_zero()
    }
}
