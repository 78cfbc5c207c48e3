//! Per-connection delivery queue
//!
//! A bounded FIFO between the hub's intake path (producer end) and one
//! connection's writer task (consumer end). What happens when the queue is
//! full depends on [`QueueConfig::timeout`]:
//!
//! - zero: the producer end waits until there is room or the connection goes
//!   away
//! - non-zero: the producer end waits at most that long, then the event is
//!   dropped for this connection only
//!
//! A capacity of zero is a rendezvous: a send completes only once the
//! consumer is waiting for it. It is built on a one-slot channel plus a
//! demand semaphore the consumer posts to before each receive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};

use super::config::QueueConfig;
use super::error::DeliveryError;
use crate::event::Event;

/// Create a delivery queue
pub fn channel(config: &QueueConfig) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::channel(config.capacity.max(1));
    let demand = (config.capacity == 0).then(|| Arc::new(Semaphore::new(0)));

    let sender = QueueSender {
        tx,
        demand: demand.clone(),
        timeout: config.timeout,
    };
    let receiver = QueueReceiver {
        rx,
        demand,
        demand_posted: false,
    };

    (sender, receiver)
}

/// Producer end of a delivery queue
///
/// Cheap to clone; the registry keeps one and fan-out works on snapshots.
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<Event>,
    /// Present for rendezvous queues
    demand: Option<Arc<Semaphore>>,
    timeout: Duration,
}

impl QueueSender {
    /// Enqueue without waiting
    ///
    /// On failure the event is handed back so the caller can retry with
    /// [`enqueue`](Self::enqueue).
    pub fn try_enqueue(&self, event: Event) -> Result<(), (Event, DeliveryError)> {
        if let Some(demand) = &self.demand {
            match demand.try_acquire() {
                Ok(permit) => permit.forget(),
                Err(tokio::sync::TryAcquireError::Closed) => {
                    return Err((event, DeliveryError::Closed))
                }
                Err(tokio::sync::TryAcquireError::NoPermits) => {
                    return Err((event, DeliveryError::Full))
                }
            }
        }

        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(event) => (event, DeliveryError::Full),
            mpsc::error::TrySendError::Closed(event) => (event, DeliveryError::Closed),
        })
    }

    /// Enqueue, waiting for room according to the configured timeout
    pub async fn enqueue(&self, event: Event) -> Result<(), DeliveryError> {
        if self.timeout.is_zero() {
            return self.enqueue_blocking(event).await;
        }

        match tokio::time::timeout(self.timeout, self.enqueue_blocking(event)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        }
    }

    async fn enqueue_blocking(&self, event: Event) -> Result<(), DeliveryError> {
        if let Some(demand) = &self.demand {
            demand
                .acquire()
                .await
                .map_err(|_| DeliveryError::Closed)?
                .forget();
        }

        let permit = self.tx.reserve().await.map_err(|_| DeliveryError::Closed)?;
        permit.send(event);
        Ok(())
    }

    /// Configured full-queue timeout (zero = wait indefinitely)
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if the consumer end is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer end of a delivery queue
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<Event>,
    demand: Option<Arc<Semaphore>>,
    /// A rendezvous permit is outstanding and not yet matched by an event
    demand_posted: bool,
}

impl QueueReceiver {
    /// Take the next event in enqueue order
    ///
    /// Returns `None` once every producer end is dropped and the queue is
    /// empty. Cancel safe.
    pub async fn dequeue(&mut self) -> Option<Event> {
        if let Some(demand) = &self.demand {
            if !self.demand_posted {
                demand.add_permits(1);
                self.demand_posted = true;
            }
        }

        let event = self.rx.recv().await;
        if event.is_some() {
            self.demand_posted = false;
        }
        event
    }

    /// Close the queue, waking any producer waiting on it
    ///
    /// Events already queued are discarded.
    pub fn close(&mut self) {
        if let Some(demand) = &self.demand {
            demand.close();
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for QueueReceiver {
    fn drop(&mut self) {
        if let Some(demand) = &self.demand {
            demand.close();
        }
    }
}
