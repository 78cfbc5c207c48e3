//! Messages exchanged between hub and subscriber

use crate::event::{Event, Interest};

/// A single message on the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Client → hub: interest set, must be the first message on a stream
    Register(Vec<Interest>),

    /// Hub → client: registration accepted, echoes the stored interests
    Registered(Vec<Interest>),

    /// Client → hub: drop the subscription and close the stream
    Unregister,

    /// Hub → client: request refused, stream is about to close
    Rejection(String),

    /// Hub → client: a matched event
    Event(Event),
}

impl Message {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Message::Register(_) => "Register",
            Message::Registered(_) => "Registered",
            Message::Unregister => "Unregister",
            Message::Rejection(_) => "Rejection",
            Message::Event(_) => "Event",
        }
    }
}
