//! Event hub
//!
//! A broker that accepts block, chaincode and generic events from a local
//! producer and fans them out to remote subscribers that registered interest
//! in them.
//!
//! ```text
//!   producer                      EventHub                        subscribers
//!  ──────────┐          ┌────────────────────────────┐
//!  accept(e) ├────────► │ InterestRegistry           │    ┌──► Connection ──► TCP ──► EventsClient
//!  ──────────┘          │   id → (interests, queue)  │────┤
//!                       │ matches_any(e, interests)  │    └──► Connection ──► TCP ──► EventsClient
//!                       └────────────────────────────┘
//! ```
//!
//! Each connection owns one bounded queue ([`registry::QueueSender`]). When a
//! queue is full the configured timeout decides whether intake waits
//! (timeout of zero) or drops the event for that connection only.

pub mod client;
pub mod error;
pub mod event;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use client::{ClientConfig, EventAdapter, EventsClient};
pub use error::{Error, Result};
pub use event::{ChaincodeReg, Event, EventType, Interest};
pub use server::{AcceptPolicy, EventHub, EventServer, HubConfig};
