//! Event stream wire protocol
//!
//! A minimal length-prefixed framing carrying the five message kinds of the
//! event stream:
//!
//! ```text
//! Client                                    Hub
//!   |------- Register [interests] --------->|
//!   |<------ Registered [interests] --------|   (or Rejection + close)
//!   |<------ Event -------------------------|
//!   |<------ Event -------------------------|
//!   |------- Unregister ------------------->|   (hub closes the stream)
//! ```

pub mod codec;
pub mod constants;
pub mod framed;
pub mod message;

pub use codec::{decode_body, decode_frame, encode, encode_message, event_body_len};
pub use framed::{FrameReader, FrameWriter};
pub use message::Message;
