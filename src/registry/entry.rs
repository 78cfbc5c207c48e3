//! Subscription entry
//!
//! This module defines the per-connection state stored in the registry.

use std::sync::Arc;

use super::queue::QueueSender;
use super::ConnectionId;
use crate::event::{matches_any, Event, Interest};
use crate::stats::ConnectionStats;

/// One connection's subscription: its interests and the producer end of its
/// delivery queue
///
/// Cloning is cheap; fan-out works on cloned snapshots so registry locks are
/// never held while waiting on a queue.
#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    /// Owning connection
    pub connection_id: ConnectionId,

    /// Registered interests (ORed)
    pub interests: Arc<Vec<Interest>>,

    /// Producer end of the connection's queue
    pub(super) queue: QueueSender,

    /// Counters shared with the connection's writer task
    pub stats: Arc<ConnectionStats>,
}

impl SubscriptionEntry {
    /// Check if any registered interest matches the event
    pub fn wants(&self, event: &Event) -> bool {
        matches_any(event, &self.interests)
    }

    /// Producer end of the connection's queue
    pub fn queue(&self) -> &QueueSender {
        &self.queue
    }
}
