//! Error types
//!
//! Session-level errors surface through [`Error`]. Intake-side delivery
//! failures are per connection and live in [`crate::registry::DeliveryError`];
//! they never reach the producer unless the hub is configured to report them.

use std::time::Duration;

use thiserror::Error;

/// Convenience result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by consumer callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying transport failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer violated the wire protocol
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Interest set was malformed
    #[error("Registration error: {0}")]
    Registration(String),

    /// Hub refused the registration
    #[error("Registration rejected by hub: {0}")]
    Rejected(String),

    /// Operation did not complete in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Client has not been started
    #[error("Client is not running")]
    NotRunning,

    /// Client was already started
    #[error("Client is already running")]
    AlreadyRunning,

    /// No matching connection received the event
    #[error("Event matched {matched} connection(s) but none accepted it")]
    Undelivered {
        /// Number of connections the event matched
        matched: usize,
    },
}

/// Wire protocol violations
///
/// These are fatal to the connection they occur on and never affect other
/// connections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A message arrived that is not valid in the current phase
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    /// An event without a variant was observed
    #[error("Event not set")]
    UnsetEvent,

    /// Unknown message kind byte
    #[error("Unknown message kind: 0x{0:02x}")]
    UnknownMessageKind(u8),

    /// Unknown event kind byte
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(u8),

    /// Unknown interest event type byte
    #[error("Unknown event type: {0}")]
    UnknownEventType(u8),

    /// Frame body ended before all fields were read
    #[error("Truncated frame")]
    Truncated,

    /// Frame body has bytes left after the message was decoded
    #[error("{0} trailing byte(s) in frame")]
    TrailingBytes(usize),

    /// Frame exceeds the configured limit
    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Declared body size
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Interest set does not fit the u16 count field
    #[error("{0} interests exceed the limit of 65535 per message")]
    TooManyInterests(usize),

    /// String field is not valid UTF-8
    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    /// Stream closed in the middle of a frame
    #[error("Connection closed mid-frame")]
    UnexpectedEof,
}
