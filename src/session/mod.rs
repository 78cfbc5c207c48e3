//! Hub-side connection state

pub mod state;

pub use state::{CloseReason, SessionPhase, SessionState};
