//! Event hub: intake and fan-out
//!
//! Producers call [`EventHub::accept`]. Intake is serialized by a fair lock,
//! so the order in which `accept` calls acquire it is the acceptance order
//! every connection observes. Each accepted event is matched against a
//! registry snapshot and offered to every matching connection in two passes:
//! a non-blocking pass, then a policy-governed wait for connections whose
//! queues were full. A slow connection therefore delays nobody else's copy of
//! the current event.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, Mutex};

use super::config::{AcceptPolicy, HubConfig};
use super::connection::Connection;
use crate::error::{Error, ProtocolError, Result};
use crate::event::Event;
use crate::protocol::event_body_len;
use crate::registry::{DeliveryError, InterestRegistry, SubscriptionEntry};
use crate::session::CloseReason;
use crate::stats::{HubMetrics, HubStats};

/// Outcome of one `accept` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptReport {
    /// Connections whose interests matched
    pub matched: usize,
    /// Connections the event was queued for
    pub delivered: usize,
    /// Connections that dropped it under backpressure
    pub dropped: usize,
    /// Connections that went away before it could be queued
    pub closed: usize,
}

impl AcceptReport {
    /// Matched at least one connection but reached none
    pub fn is_undelivered(&self) -> bool {
        self.matched > 0 && self.delivered == 0
    }
}

/// The broker
///
/// Owns the interest registry and every connection's delivery queue. Share
/// it as `Arc<EventHub>` between producers and the transport accept loop.
pub struct EventHub {
    config: HubConfig,
    registry: InterestRegistry,
    intake: Mutex<()>,
    metrics: HubMetrics,
    next_connection_id: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
}

impl EventHub {
    /// Create a hub
    pub fn new(config: HubConfig) -> Self {
        let registry = InterestRegistry::with_config(config.queue_config());
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            registry,
            intake: Mutex::new(()),
            metrics: HubMetrics::new(),
            next_connection_id: AtomicU64::new(1),
            shutdown_tx,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Get the interest registry
    pub fn registry(&self) -> &InterestRegistry {
        &self.registry
    }

    /// Accept one event from the producer and fan it out
    ///
    /// Never fails because a subscriber is slow or gone, unless the hub is
    /// configured with [`AcceptPolicy::FailWhenUndelivered`]. An `Unset`
    /// event is always refused.
    pub async fn accept(&self, event: Event) -> Result<AcceptReport> {
        let Some(event_type) = event.event_type() else {
            self.metrics.record_rejected();
            tracing::warn!("Rejected event with no variant set");
            return Err(ProtocolError::UnsetEvent.into());
        };

        // Subscribers would refuse the frame and drop their session
        let size = event_body_len(&event);
        let max = self.config.max_frame_size;
        if size > max {
            self.metrics.record_rejected();
            tracing::warn!(
                event_type = %event_type,
                size,
                max,
                "Rejected event larger than the frame limit"
            );
            return Err(ProtocolError::FrameTooLarge { size, max }.into());
        }

        let _intake = self.intake.lock().await;
        let snapshot = self.registry.snapshot().await;

        let mut report = AcceptReport::default();
        let mut waiting: Vec<(&SubscriptionEntry, Event)> = Vec::new();

        for entry in snapshot.iter().filter(|entry| entry.wants(&event)) {
            report.matched += 1;
            match entry.queue().try_enqueue(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err((event, DeliveryError::Full)) => waiting.push((entry, event)),
                Err((_, err)) => self.record_failure(entry, err, &mut report),
            }
        }

        for (entry, event) in waiting {
            match entry.queue().enqueue(event).await {
                Ok(()) => report.delivered += 1,
                Err(err) => self.record_failure(entry, err, &mut report),
            }
        }

        self.metrics.record_accepted();
        self.metrics.record_fanout(report.delivered, report.dropped);

        tracing::debug!(
            event_type = %event_type,
            payload_bytes = event.payload().len(),
            matched = report.matched,
            delivered = report.delivered,
            dropped = report.dropped,
            "Event accepted"
        );

        if report.is_undelivered() {
            tracing::warn!(
                event_type = %event_type,
                matched = report.matched,
                dropped = report.dropped,
                closed = report.closed,
                "Event reached no matching connection"
            );
            if self.config.accept_policy == AcceptPolicy::FailWhenUndelivered {
                return Err(Error::Undelivered {
                    matched: report.matched,
                });
            }
        }

        Ok(report)
    }

    fn record_failure(&self, entry: &SubscriptionEntry, err: DeliveryError, report: &mut AcceptReport) {
        match err {
            DeliveryError::Closed => {
                report.closed += 1;
                tracing::debug!(
                    connection_id = entry.connection_id,
                    "Connection closed during fan-out"
                );
            }
            DeliveryError::Timeout(_) | DeliveryError::Full => {
                report.dropped += 1;
                entry.stats.record_dropped();
                tracing::warn!(
                    connection_id = entry.connection_id,
                    error = %err,
                    dropped_total = entry.stats.events_dropped(),
                    "Event dropped for slow connection"
                );
            }
        }
    }

    /// Run one connection's session over any byte stream
    ///
    /// Returns once the connection is closed and its subscription released.
    pub async fn serve_connection<S>(
        self: &Arc<Self>,
        stream: S,
        peer_addr: Option<SocketAddr>,
    ) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_connection();

        tracing::debug!(connection_id = id, peer = ?peer_addr, "New connection");

        Connection::new(id, stream, peer_addr, Arc::clone(self))
            .run()
            .await
    }

    /// Close every connection and drop all subscriptions
    ///
    /// Events accepted afterwards match nothing.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let removed = self.registry.clear().await;
        tracing::info!(connections = removed, "Event hub shut down");
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub(crate) fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Get hub statistics
    pub async fn stats(&self) -> HubStats {
        self.metrics.snapshot(self.registry.connection_count().await)
    }

    /// Number of registered connections
    pub async fn connection_count(&self) -> usize {
        self.registry.connection_count().await
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
