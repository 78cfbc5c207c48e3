//! Registry error types

use std::time::Duration;

use thiserror::Error;

use super::ConnectionId;
use crate::event::Interest;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Connection has no subscription
    #[error("Connection not registered: {0}")]
    NotFound(ConnectionId),

    /// Registration carried no interests
    #[error("Interest set is empty")]
    EmptyInterests,

    /// Interest carries a chaincode filter on a non-chaincode event type
    #[error("Malformed interest: {0}")]
    MalformedInterest(Interest),
}

/// Why an event did not reach one connection's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Queue is full (non-blocking attempt only)
    #[error("Delivery queue full")]
    Full,

    /// Queue stayed full past the configured timeout
    #[error("Delivery queue full for {0:?}, event dropped")]
    Timeout(Duration),

    /// Connection was torn down
    #[error("Connection closed")]
    Closed,
}
