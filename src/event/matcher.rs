//! Interest matching
//!
//! Pure functions deciding whether an event satisfies an interest. A
//! connection's interests are ORed: one match is enough, and the event is
//! still delivered only once.

use super::{Event, EventType, Interest};

/// Check whether `event` satisfies `interest`
pub fn matches(event: &Event, interest: &Interest) -> bool {
    let Some(event_type) = event.event_type() else {
        return false;
    };

    if event_type != interest.event_type {
        return false;
    }

    match (event, &interest.chaincode) {
        (Event::Chaincode(cc), Some(reg)) => {
            if !reg.chaincode_id.is_empty() && reg.chaincode_id != cc.chaincode_id {
                return false;
            }
            reg.event_name.is_empty() || reg.event_name == cc.event_name
        }
        // BLOCK and GENERIC carry no filter; an unfiltered CHAINCODE
        // interest takes every chaincode event.
        _ => interest.event_type != EventType::Chaincode || interest.chaincode.is_none(),
    }
}

/// Check whether `event` satisfies any of `interests`
pub fn matches_any(event: &Event, interests: &[Interest]) -> bool {
    interests.iter().any(|interest| matches(event, interest))
}
