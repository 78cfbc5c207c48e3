//! Interest registry and delivery queues
//!
//! The registry maps every registered connection to its interest set and
//! the producer end of its delivery queue. Both are created by the first
//! registration and dropped together on unregister.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<InterestRegistry>
//!                     ┌───────────────────────────┐
//!                     │ subscriptions: HashMap<   │
//!                     │   ConnectionId,           │
//!                     │   SubscriptionEntry {     │
//!                     │     interests,            │
//!                     │     queue: QueueSender,   │
//!                     │   }                       │
//!                     │ >                         │
//!                     └─────────────┬─────────────┘
//!                                   │ snapshot()
//!         ┌─────────────────────────┼─────────────────────────┐
//!         │                         │                         │
//!         ▼                         ▼                         ▼
//!     [EventHub]              [Connection 1]            [Connection 2]
//!     accept(e)               rx.dequeue()              rx.dequeue()
//!         │                         │                         │
//!         └──► matches_any() ──► queue.enqueue() ──► writer ──► TCP
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod queue;
pub mod store;

pub use config::QueueConfig;
pub use entry::SubscriptionEntry;
pub use error::{DeliveryError, RegistryError};
pub use queue::{QueueReceiver, QueueSender};
pub use store::InterestRegistry;

/// Identifier the hub assigns to each accepted connection
pub type ConnectionId = u64;
