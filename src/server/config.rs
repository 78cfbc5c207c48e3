//! Hub configuration

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::protocol::constants::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT};
use crate::registry::config::{DEFAULT_DELIVERY_TIMEOUT, DEFAULT_QUEUE_CAPACITY};
use crate::registry::QueueConfig;

/// What `EventHub::accept` reports when an event reached nobody
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptPolicy {
    /// Log and return success regardless of per-connection failures
    #[default]
    LogAndContinue,

    /// Return an error when the event matched at least one connection but
    /// none of them received it
    FailWhenUndelivered,
}

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Events buffered per connection (0 = rendezvous handoff)
    pub queue_capacity: usize,

    /// How long intake waits on a full connection queue before dropping the
    /// event for that connection (zero = wait indefinitely)
    pub delivery_timeout: Duration,

    /// Register must arrive within this time after the stream opens
    pub registration_timeout: Duration,

    /// Largest accepted frame body
    pub max_frame_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Outcome reported to the producer for undelivered events
    pub accept_policy: AcceptPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            registration_timeout: Duration::from_secs(5),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tcp_nodelay: true,
            accept_policy: AcceptPolicy::LogAndContinue,
        }
    }
}

impl HubConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set per-connection queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the full-queue timeout (zero = block)
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Set registration timeout
    pub fn registration_timeout(mut self, timeout: Duration) -> Self {
        self.registration_timeout = timeout;
        self
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the accept policy
    pub fn accept_policy(mut self, policy: AcceptPolicy) -> Self {
        self.accept_policy = policy;
        self
    }

    /// Queue settings applied to every connection
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new(self.queue_capacity, self.delivery_timeout)
    }
}
