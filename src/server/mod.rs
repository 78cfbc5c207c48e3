//! Event hub server implementation
//!
//! [`EventHub`] is the broker itself and works over any byte stream.
//! [`EventServer`] binds it to a TCP listener.

pub mod config;
pub(crate) mod connection;
pub mod hub;
pub mod listener;

pub use config::{AcceptPolicy, HubConfig};
pub use hub::{AcceptReport, EventHub};
pub use listener::EventServer;
