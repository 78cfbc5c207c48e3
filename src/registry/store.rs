//! Interest registry implementation
//!
//! The central map of connection id to subscription. Registration, removal
//! and snapshotting all go through one `RwLock`; no lock is held while an
//! event waits on a queue.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::QueueConfig;
use super::entry::SubscriptionEntry;
use super::error::RegistryError;
use super::queue::{self, QueueReceiver};
use super::ConnectionId;
use crate::event::Interest;
use crate::stats::ConnectionStats;

/// Registry of live subscriptions
pub struct InterestRegistry {
    /// Map of connection id to subscription
    subscriptions: RwLock<HashMap<ConnectionId, SubscriptionEntry>>,

    /// Applied to every queue created by this registry
    queue_config: QueueConfig,
}

impl InterestRegistry {
    /// Create a registry with default queue configuration
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a registry with custom queue configuration
    pub fn with_config(queue_config: QueueConfig) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            queue_config,
        }
    }

    /// Get the queue configuration
    pub fn queue_config(&self) -> &QueueConfig {
        &self.queue_config
    }

    /// Check an interest set before it is stored
    ///
    /// Empty sets are refused, as are chaincode filters attached to a
    /// non-chaincode event type.
    pub fn validate(interests: &[Interest]) -> Result<(), RegistryError> {
        if interests.is_empty() {
            return Err(RegistryError::EmptyInterests);
        }
        if let Some(bad) = interests.iter().find(|i| !i.is_well_formed()) {
            return Err(RegistryError::MalformedInterest(bad.clone()));
        }
        Ok(())
    }

    /// Register or replace the interest set of a connection
    ///
    /// The first registration creates the subscription together with its
    /// delivery queue and returns the consumer end. Later registrations
    /// overwrite the interest set, keep the queue, and return `None`.
    pub async fn register(
        &self,
        id: ConnectionId,
        interests: Vec<Interest>,
    ) -> Result<Option<QueueReceiver>, RegistryError> {
        Self::validate(&interests)?;

        let interests = Arc::new(interests);
        let mut subscriptions = self.subscriptions.write().await;

        if let Some(entry) = subscriptions.get_mut(&id) {
            entry.interests = interests;

            tracing::info!(
                connection_id = id,
                interests = entry.interests.len(),
                "Interests replaced"
            );
            return Ok(None);
        }

        let (tx, rx) = queue::channel(&self.queue_config);
        let count = interests.len();
        subscriptions.insert(
            id,
            SubscriptionEntry {
                connection_id: id,
                interests,
                queue: tx,
                stats: Arc::new(ConnectionStats::new()),
            },
        );

        tracing::info!(
            connection_id = id,
            interests = count,
            active = subscriptions.len(),
            "Subscription registered"
        );

        Ok(Some(rx))
    }

    /// Replace the interest set of an existing subscription
    ///
    /// Unlike [`register`](Self::register) this never creates a
    /// subscription: a connection whose entry is gone gets `NotFound`.
    pub async fn update(
        &self,
        id: ConnectionId,
        interests: Vec<Interest>,
    ) -> Result<(), RegistryError> {
        Self::validate(&interests)?;

        let mut subscriptions = self.subscriptions.write().await;
        let entry = subscriptions
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;
        entry.interests = Arc::new(interests);

        tracing::info!(
            connection_id = id,
            interests = entry.interests.len(),
            "Interests replaced"
        );
        Ok(())
    }

    /// Remove a connection's subscription and its queue
    ///
    /// Returns `false` if the connection was not registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.subscriptions.write().await.remove(&id);

        match removed {
            Some(entry) => {
                tracing::info!(
                    connection_id = id,
                    sent = entry.stats.events_sent(),
                    dropped = entry.stats.events_dropped(),
                    duration_ms = entry.stats.duration().as_millis() as u64,
                    "Subscription removed"
                );
                true
            }
            None => false,
        }
    }

    /// Get the interests registered for a connection
    pub async fn interests_for(&self, id: ConnectionId) -> Result<Vec<Interest>, RegistryError> {
        self.subscriptions
            .read()
            .await
            .get(&id)
            .map(|entry| entry.interests.as_ref().clone())
            .ok_or(RegistryError::NotFound(id))
    }

    /// Get the live counters of a connection
    pub async fn stats_for(&self, id: ConnectionId) -> Option<Arc<ConnectionStats>> {
        self.subscriptions
            .read()
            .await
            .get(&id)
            .map(|entry| Arc::clone(&entry.stats))
    }

    /// Consistent copy of every subscription
    ///
    /// Ordered by connection id so fan-out order is deterministic.
    pub async fn snapshot(&self) -> Vec<SubscriptionEntry> {
        let subscriptions = self.subscriptions.read().await;
        let mut entries: Vec<SubscriptionEntry> = subscriptions.values().cloned().collect();
        entries.sort_by_key(|e| e.connection_id);
        entries
    }

    /// Check if a connection is registered
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.subscriptions.read().await.contains_key(&id)
    }

    /// Number of registered connections
    pub async fn connection_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Drop every subscription, returning how many were removed
    pub async fn clear(&self) -> usize {
        let mut subscriptions = self.subscriptions.write().await;
        let count = subscriptions.len();
        subscriptions.clear();
        count
    }
}

impl Default for InterestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::event::{ChaincodeReg, Event, EventType};

    #[tokio::test]
    async fn test_register_creates_queue_once() {
        let registry = InterestRegistry::new();

        let first = registry.register(1, vec![Interest::block()]).await.unwrap();
        assert!(first.is_some());

        let second = registry
            .register(1, vec![Interest::generic()])
            .await
            .unwrap();
        assert!(second.is_none());

        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_overwrites_interests() {
        let registry = InterestRegistry::new();

        registry
            .register(1, vec![Interest::block(), Interest::generic()])
            .await
            .unwrap();
        registry
            .register(1, vec![Interest::chaincode("cc", "")])
            .await
            .unwrap();

        let interests = registry.interests_for(1).await.unwrap();
        assert_eq!(interests, vec![Interest::chaincode("cc", "")]);
    }

    #[tokio::test]
    async fn test_update_never_creates_subscription() {
        let registry = InterestRegistry::new();
        let _rx = registry.register(1, vec![Interest::block()]).await.unwrap();

        registry.update(1, vec![Interest::generic()]).await.unwrap();
        assert_eq!(
            registry.interests_for(1).await.unwrap(),
            vec![Interest::generic()]
        );

        // Entry removed underneath the connection, e.g. by hub shutdown
        registry.clear().await;
        assert_eq!(
            registry.update(1, vec![Interest::block()]).await,
            Err(RegistryError::NotFound(1))
        );
        assert!(!registry.contains(1).await);
        assert_eq!(
            registry.update(1, vec![]).await,
            Err(RegistryError::EmptyInterests)
        );
    }

    #[tokio::test]
    async fn test_interests_for_unknown() {
        let registry = InterestRegistry::new();

        assert_eq!(
            registry.interests_for(42).await,
            Err(RegistryError::NotFound(42))
        );
    }

    #[tokio::test]
    async fn test_rejects_empty_and_malformed() {
        let registry = InterestRegistry::new();

        assert_eq!(
            registry.register(1, vec![]).await.unwrap_err(),
            RegistryError::EmptyInterests
        );

        let bad = Interest {
            event_type: EventType::Generic,
            chaincode: Some(ChaincodeReg::new("cc", "ev")),
        };
        assert_eq!(
            registry.register(1, vec![Interest::block(), bad.clone()]).await.unwrap_err(),
            RegistryError::MalformedInterest(bad)
        );

        assert!(!registry.contains(1).await);
    }

    #[tokio::test]
    async fn test_unregister_closes_queue() {
        let registry = InterestRegistry::new();
        let mut rx = registry
            .register(1, vec![Interest::block()])
            .await
            .unwrap()
            .unwrap();

        assert!(registry.unregister(1).await);
        assert!(!registry.unregister(1).await);
        assert!(!registry.contains(1).await);

        // Last producer end went with the entry
        let next = tokio::time::timeout(Duration::from_secs(1), rx.dequeue())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_sees_registration() {
        let registry = InterestRegistry::new();
        registry.register(2, vec![Interest::generic()]).await.unwrap();
        registry.register(1, vec![Interest::block()]).await.unwrap();

        let snapshot = registry.snapshot().await;
        let ids: Vec<ConnectionId> = snapshot.iter().map(|e| e.connection_id).collect();
        assert_eq!(ids, vec![1, 2]);

        let block = Event::block(1, "");
        assert!(snapshot[0].wants(&block));
        assert!(!snapshot[1].wants(&block));
    }

    #[tokio::test]
    async fn test_clear() {
        let registry = InterestRegistry::new();
        registry.register(1, vec![Interest::block()]).await.unwrap();
        registry.register(2, vec![Interest::block()]).await.unwrap();

        assert_eq!(registry.clear().await, 2);
        assert_eq!(registry.connection_count().await, 0);
    }
}
