//! Subscriber configuration

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::protocol::constants::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT};

/// Subscriber configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hub address
    pub addr: SocketAddr,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// How long `start` waits for the hub to acknowledge registration
    pub registration_timeout: Duration,

    /// Largest accepted frame body
    pub max_frame_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            connect_timeout: Duration::from_secs(3),
            registration_timeout: Duration::from_secs(5),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tcp_nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Create a config for the hub at `addr`
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
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

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.addr.port(), 7053);
        assert!(config.addr.ip().is_loopback());
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.registration_timeout, Duration::from_secs(5));
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "10.0.0.2:9000".parse().unwrap();
        let config = ClientConfig::new(addr)
            .connect_timeout(Duration::from_millis(500))
            .registration_timeout(Duration::from_secs(1))
            .max_frame_size(64 * 1024)
            .tcp_nodelay(false);

        assert_eq!(config.addr, addr);
        assert_eq!(config.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.registration_timeout, Duration::from_secs(1));
        assert_eq!(config.max_frame_size, 64 * 1024);
        assert!(!config.tcp_nodelay);
    }
}
