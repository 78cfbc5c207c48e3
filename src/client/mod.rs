//! Subscriber implementation
//!
//! Provides the remote side of the event stream:
//! - Connecting to a hub and registering interests
//! - Handing every delivered event to an application [`EventAdapter`]

pub mod adapter;
pub mod config;
pub mod consumer;

pub use adapter::EventAdapter;
pub use config::ClientConfig;
pub use consumer::EventsClient;
