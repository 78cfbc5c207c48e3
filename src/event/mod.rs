//! Event and interest types
//!
//! [`Event`] is what producers hand to the hub and what subscribers receive.
//! [`Interest`] is what a subscriber declares at registration time. The
//! matcher in [`matcher`] decides which events satisfy which interests.
//!
//! Payloads are `bytes::Bytes`, so fanning one event out to many connections
//! only bumps a reference count.

pub mod matcher;

use bytes::Bytes;

pub use matcher::{matches, matches_any};

/// Class of event a subscriber can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Block committed
    Block,
    /// Event emitted by a chaincode
    Chaincode,
    /// Free-form event
    Generic,
}

impl EventType {
    /// Wire code for this event type
    pub fn code(self) -> u8 {
        match self {
            EventType::Block => 1,
            EventType::Chaincode => 2,
            EventType::Generic => 3,
        }
    }

    /// Parse a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(EventType::Block),
            2 => Some(EventType::Chaincode),
            3 => Some(EventType::Generic),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Block => write!(f, "BLOCK"),
            EventType::Chaincode => write!(f, "CHAINCODE"),
            EventType::Generic => write!(f, "GENERIC"),
        }
    }
}

/// A committed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    /// Block height
    pub number: u64,
    /// Serialized block body
    pub payload: Bytes,
}

/// An event emitted by chaincode during a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodeEvent {
    /// Chaincode that emitted the event
    pub chaincode_id: String,
    /// Transaction that produced the event
    pub tx_id: String,
    /// Application-defined event name
    pub event_name: String,
    /// Application-defined payload
    pub payload: Bytes,
}

/// A free-form event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericEvent {
    /// Application-defined type tag
    pub event_type: String,
    /// Application-defined payload
    pub payload: Bytes,
}

/// An event flowing from producer to subscribers
///
/// `Unset` models an event whose variant was never filled in. It never
/// matches any interest and is rejected wherever it is accepted as input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Block committed
    Block(BlockEvent),
    /// Chaincode-emitted event
    Chaincode(ChaincodeEvent),
    /// Free-form event
    Generic(GenericEvent),
    /// No variant set
    Unset,
}

impl Event {
    /// Create a block event
    pub fn block(number: u64, payload: impl Into<Bytes>) -> Self {
        Event::Block(BlockEvent {
            number,
            payload: payload.into(),
        })
    }

    /// Create a chaincode event with an empty transaction id
    pub fn chaincode(
        chaincode_id: impl Into<String>,
        event_name: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Event::Chaincode(ChaincodeEvent {
            chaincode_id: chaincode_id.into(),
            tx_id: String::new(),
            event_name: event_name.into(),
            payload: payload.into(),
        })
    }

    /// Create a generic event
    pub fn generic(event_type: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Event::Generic(GenericEvent {
            event_type: event_type.into(),
            payload: payload.into(),
        })
    }

    /// Event type, or `None` for `Unset`
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Event::Block(_) => Some(EventType::Block),
            Event::Chaincode(_) => Some(EventType::Chaincode),
            Event::Generic(_) => Some(EventType::Generic),
            Event::Unset => None,
        }
    }

    /// Check if the variant is `Unset`
    pub fn is_unset(&self) -> bool {
        matches!(self, Event::Unset)
    }

    /// Payload carried by the event (empty for `Unset`)
    pub fn payload(&self) -> Bytes {
        match self {
            Event::Block(b) => b.payload.clone(),
            Event::Chaincode(c) => c.payload.clone(),
            Event::Generic(g) => g.payload.clone(),
            Event::Unset => Bytes::new(),
        }
    }
}

/// Chaincode filter attached to a CHAINCODE interest
///
/// An empty field is a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ChaincodeReg {
    /// Chaincode to match (empty = any chaincode)
    pub chaincode_id: String,
    /// Event name to match (empty = any event name)
    pub event_name: String,
}

impl ChaincodeReg {
    /// Create a chaincode filter
    pub fn new(chaincode_id: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            chaincode_id: chaincode_id.into(),
            event_name: event_name.into(),
        }
    }
}

/// What a subscriber wants to receive
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interest {
    /// Event class
    pub event_type: EventType,
    /// Optional filter, only meaningful for [`EventType::Chaincode`]
    pub chaincode: Option<ChaincodeReg>,
}

impl Interest {
    /// Interest in every block event
    pub fn block() -> Self {
        Self {
            event_type: EventType::Block,
            chaincode: None,
        }
    }

    /// Interest in every generic event
    pub fn generic() -> Self {
        Self {
            event_type: EventType::Generic,
            chaincode: None,
        }
    }

    /// Interest in chaincode events, filtered by chaincode id and event name
    pub fn chaincode(chaincode_id: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Chaincode,
            chaincode: Some(ChaincodeReg::new(chaincode_id, event_name)),
        }
    }

    /// Interest in every chaincode event
    pub fn any_chaincode() -> Self {
        Self {
            event_type: EventType::Chaincode,
            chaincode: None,
        }
    }

    /// Check that the filter fields are consistent with the event type
    pub fn is_well_formed(&self) -> bool {
        self.chaincode.is_none() || self.event_type == EventType::Chaincode
    }
}

impl std::fmt::Display for Interest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.chaincode {
            Some(reg) => write!(
                f,
                "{}({},{})",
                self.event_type, reg.chaincode_id, reg.event_name
            ),
            None => write!(f, "{}", self.event_type),
        }
    }
}
