//! Connection state machine
//!
//! Tracks one hub-side connection from accept to teardown:
//!
//! ```text
//! Connecting ──Register──► Registered ──ack sent──► Streaming ──► Closed
//!      │                                                            ▲
//!      └──────── anything else / bad interests / timeout ───────────┘
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use crate::registry::ConnectionId;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Stream open, waiting for the Register message
    Connecting,
    /// Interests stored, acknowledgement pending
    Registered,
    /// Receiving matched events
    Streaming,
    /// Subscription and queue released
    Closed,
}

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed the stream
    PeerClosed,
    /// Peer sent Unregister
    Unregistered,
    /// Hub is shutting down
    Shutdown,
    /// Protocol violation
    Protocol(String),
    /// Interest set refused
    Registration(String),
    /// Read or write failed
    Transport(String),
    /// No Register within the registration timeout
    RegistrationTimeout,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::Unregistered => write!(f, "unregistered"),
            CloseReason::Shutdown => write!(f, "hub shutdown"),
            CloseReason::Protocol(e) => write!(f, "protocol error: {}", e),
            CloseReason::Registration(e) => write!(f, "registration error: {}", e),
            CloseReason::Transport(e) => write!(f, "transport error: {}", e),
            CloseReason::RegistrationTimeout => write!(f, "registration timeout"),
        }
    }
}

/// Per-connection state
#[derive(Debug)]
pub struct SessionState {
    /// Connection id
    pub id: ConnectionId,

    /// Remote peer address, when the transport has one
    pub peer_addr: Option<SocketAddr>,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Time of the first successful registration
    pub registered_at: Option<Instant>,

    /// Number of Register messages accepted
    pub registrations: u32,

    /// Set once the connection is closed
    pub close_reason: Option<CloseReason>,
}

impl SessionState {
    /// Create a new connection state
    pub fn new(id: ConnectionId, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Connecting,
            connected_at: Instant::now(),
            registered_at: None,
            registrations: 0,
            close_reason: None,
        }
    }

    /// Interests stored in the registry
    pub fn on_registered(&mut self) {
        self.registrations += 1;
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Registered;
            self.registered_at = Some(Instant::now());
        }
    }

    /// Acknowledgement sent, events now flow
    pub fn start_streaming(&mut self) {
        if self.phase == SessionPhase::Registered {
            self.phase = SessionPhase::Streaming;
        }
    }

    /// Close the connection and return the effective reason
    ///
    /// The first reason wins; later calls get it back unchanged.
    pub fn close(&mut self, reason: CloseReason) -> CloseReason {
        self.phase = SessionPhase::Closed;
        self.close_reason.get_or_insert(reason).clone()
    }

    /// Check if events are flowing
    pub fn is_streaming(&self) -> bool {
        self.phase == SessionPhase::Streaming
    }

    /// Check if the connection is closed
    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Get connection duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_session_lifecycle() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7053);
        let mut state = SessionState::new(1, Some(addr));

        assert_eq!(state.phase, SessionPhase::Connecting);

        state.on_registered();
        assert_eq!(state.phase, SessionPhase::Registered);
        assert!(state.registered_at.is_some());

        state.start_streaming();
        assert!(state.is_streaming());

        // Re-registration while streaming keeps the phase
        state.on_registered();
        assert!(state.is_streaming());
        assert_eq!(state.registrations, 2);

        state.close(CloseReason::Unregistered);
        assert!(state.is_closed());
        assert_eq!(state.close_reason, Some(CloseReason::Unregistered));
    }

    #[test]
    fn test_streaming_requires_registration() {
        let mut state = SessionState::new(1, None);

        state.start_streaming();
        assert_eq!(state.phase, SessionPhase::Connecting);
    }

    #[test]
    fn test_first_close_reason_wins() {
        let mut state = SessionState::new(1, None);

        state.close(CloseReason::Protocol("first message was Event".into()));
        let effective = state.close(CloseReason::PeerClosed);

        assert_eq!(
            effective,
            CloseReason::Protocol("first message was Event".into())
        );

        assert_eq!(
            state.close_reason,
            Some(CloseReason::Protocol("first message was Event".into()))
        );
    }
}
