//! Wire protocol constants

/// Default TCP port of the event hub
pub const DEFAULT_PORT: u16 = 7053;

/// Length of the frame header (u32 body length, big-endian)
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default upper bound on a frame body
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

// Message kinds
pub const MSG_REGISTER: u8 = 0x01;
pub const MSG_REGISTERED: u8 = 0x02;
pub const MSG_UNREGISTER: u8 = 0x03;
pub const MSG_REJECTION: u8 = 0x04;
pub const MSG_EVENT: u8 = 0x10;

// Event kinds carried inside MSG_EVENT
pub const EVENT_UNSET: u8 = 0;
pub const EVENT_BLOCK: u8 = 1;
pub const EVENT_CHAINCODE: u8 = 2;
pub const EVENT_GENERIC: u8 = 3;
