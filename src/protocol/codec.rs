//! Frame encoder and decoder
//!
//! Frame layout:
//! ```text
//! +----------------+------+------------------------+
//! | body len (u32) | kind | kind-specific fields   |
//! +----------------+------+------------------------+
//! ```
//!
//! Strings and byte arrays are u32 length-prefixed. An interest is encoded as
//! `event type (u8) | has filter (u8) [| chaincode id | event name]`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use super::message::Message;
use crate::error::ProtocolError;
use crate::event::{
    BlockEvent, ChaincodeEvent, ChaincodeReg, Event, EventType, GenericEvent, Interest,
};

/// Append one framed message to `buf`
///
/// Fails for messages that cannot be represented on the wire: an `Unset`
/// event, or more interests than the count field holds. `buf` is left as it
/// was on failure.
pub fn encode_message(msg: &Message, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let start = buf.len();
    buf.put_u32(0); // patched below

    let body = match msg {
        Message::Register(interests) => {
            buf.put_u8(MSG_REGISTER);
            put_interests(buf, interests)
        }
        Message::Registered(interests) => {
            buf.put_u8(MSG_REGISTERED);
            put_interests(buf, interests)
        }
        Message::Unregister => {
            buf.put_u8(MSG_UNREGISTER);
            Ok(())
        }
        Message::Rejection(reason) => {
            buf.put_u8(MSG_REJECTION);
            put_string(buf, reason);
            Ok(())
        }
        Message::Event(event) => put_event(buf, event),
    };

    if let Err(e) = body {
        buf.truncate(start);
        return Err(e);
    }

    let body_len = (buf.len() - start - FRAME_HEADER_SIZE) as u32;
    buf[start..start + FRAME_HEADER_SIZE].copy_from_slice(&body_len.to_be_bytes());
    Ok(())
}

/// Body length of the `Event` frame carrying `event`, without encoding it
///
/// Compared against a peer's frame limit before an event is queued.
pub fn event_body_len(event: &Event) -> usize {
    // message kind + event kind
    let kinds = 2;
    let fields = match event {
        Event::Block(block) => 8 + 4 + block.payload.len(),
        Event::Chaincode(cc) => {
            4 * 4 + cc.chaincode_id.len() + cc.tx_id.len() + cc.event_name.len() + cc.payload.len()
        }
        Event::Generic(generic) => 4 * 2 + generic.event_type.len() + generic.payload.len(),
        Event::Unset => 0,
    };
    kinds + fields
}

/// Encode one message into a fresh buffer
pub fn encode(msg: &Message) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(64);
    encode_message(msg, &mut buf)?;
    Ok(buf.freeze())
}

/// Try to split one complete frame off the front of `buf` and decode it
///
/// Returns `Ok(None)` when more bytes are needed. The declared length is
/// checked against `max_frame_size` before the body is buffered.
pub fn decode_frame(
    buf: &mut BytesMut,
    max_frame_size: usize,
) -> Result<Option<Message>, ProtocolError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if body_len > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size: body_len,
            max: max_frame_size,
        });
    }

    if buf.len() < FRAME_HEADER_SIZE + body_len {
        buf.reserve(FRAME_HEADER_SIZE + body_len - buf.len());
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_SIZE);
    let body = buf.split_to(body_len).freeze();
    decode_body(body).map(Some)
}

/// Decode a frame body (without the length header)
pub fn decode_body(mut body: Bytes) -> Result<Message, ProtocolError> {
    if body.is_empty() {
        return Err(ProtocolError::Truncated);
    }

    let msg = match body.get_u8() {
        MSG_REGISTER => Message::Register(get_interests(&mut body)?),
        MSG_REGISTERED => Message::Registered(get_interests(&mut body)?),
        MSG_UNREGISTER => Message::Unregister,
        MSG_REJECTION => Message::Rejection(get_string(&mut body)?),
        MSG_EVENT => Message::Event(get_event(&mut body)?),
        other => return Err(ProtocolError::UnknownMessageKind(other)),
    };

    if body.has_remaining() {
        return Err(ProtocolError::TrailingBytes(body.remaining()));
    }

    Ok(msg)
}

fn put_interests(buf: &mut BytesMut, interests: &[Interest]) -> Result<(), ProtocolError> {
    let count = u16::try_from(interests.len())
        .map_err(|_| ProtocolError::TooManyInterests(interests.len()))?;
    buf.put_u16(count);

    for interest in interests {
        buf.put_u8(interest.event_type.code());
        match &interest.chaincode {
            Some(reg) => {
                buf.put_u8(1);
                put_string(buf, &reg.chaincode_id);
                put_string(buf, &reg.event_name);
            }
            None => buf.put_u8(0),
        }
    }
    Ok(())
}

fn get_interests(buf: &mut Bytes) -> Result<Vec<Interest>, ProtocolError> {
    need(buf, 2)?;
    let count = buf.get_u16() as usize;
    let mut interests = Vec::with_capacity(count.min(64));

    for _ in 0..count {
        need(buf, 2)?;
        let code = buf.get_u8();
        let event_type =
            EventType::from_code(code).ok_or(ProtocolError::UnknownEventType(code))?;

        let chaincode = if buf.get_u8() != 0 {
            let chaincode_id = get_string(buf)?;
            let event_name = get_string(buf)?;
            Some(ChaincodeReg {
                chaincode_id,
                event_name,
            })
        } else {
            None
        };

        interests.push(Interest {
            event_type,
            chaincode,
        });
    }

    Ok(interests)
}

fn put_event(buf: &mut BytesMut, event: &Event) -> Result<(), ProtocolError> {
    match event {
        Event::Block(block) => {
            buf.put_u8(MSG_EVENT);
            buf.put_u8(EVENT_BLOCK);
            buf.put_u64(block.number);
            put_bytes(buf, &block.payload);
        }
        Event::Chaincode(cc) => {
            buf.put_u8(MSG_EVENT);
            buf.put_u8(EVENT_CHAINCODE);
            put_string(buf, &cc.chaincode_id);
            put_string(buf, &cc.tx_id);
            put_string(buf, &cc.event_name);
            put_bytes(buf, &cc.payload);
        }
        Event::Generic(generic) => {
            buf.put_u8(MSG_EVENT);
            buf.put_u8(EVENT_GENERIC);
            put_string(buf, &generic.event_type);
            put_bytes(buf, &generic.payload);
        }
        Event::Unset => return Err(ProtocolError::UnsetEvent),
    }
    Ok(())
}

fn get_event(buf: &mut Bytes) -> Result<Event, ProtocolError> {
    need(buf, 1)?;
    match buf.get_u8() {
        EVENT_BLOCK => {
            need(buf, 8)?;
            let number = buf.get_u64();
            let payload = get_bytes(buf)?;
            Ok(Event::Block(BlockEvent { number, payload }))
        }
        EVENT_CHAINCODE => {
            let chaincode_id = get_string(buf)?;
            let tx_id = get_string(buf)?;
            let event_name = get_string(buf)?;
            let payload = get_bytes(buf)?;
            Ok(Event::Chaincode(ChaincodeEvent {
                chaincode_id,
                tx_id,
                event_name,
                payload,
            }))
        }
        EVENT_GENERIC => {
            let event_type = get_string(buf)?;
            let payload = get_bytes(buf)?;
            Ok(Event::Generic(GenericEvent {
                event_type,
                payload,
            }))
        }
        EVENT_UNSET => Err(ProtocolError::UnsetEvent),
        other => Err(ProtocolError::UnknownEventKind(other)),
    }
}

fn put_string(buf: &mut BytesMut, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn put_bytes(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

fn get_string(buf: &mut Bytes) -> Result<String, ProtocolError> {
    let bytes = get_bytes(buf)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

fn get_bytes(buf: &mut Bytes) -> Result<Bytes, ProtocolError> {
    need(buf, 4)?;
    let len = buf.get_u32() as usize;
    need(buf, len)?;
    Ok(buf.split_to(len))
}

#[inline]
fn need(buf: &Bytes, n: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < n {
        Err(ProtocolError::Truncated)
    } else {
        Ok(())
    }
}
