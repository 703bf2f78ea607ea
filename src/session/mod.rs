//! Helium Protocol - Session Layer
//!
//! The connection state machine and what it is built from:
//!
//! - [`SessionId`] / [`SessionIds`]: session identifiers and rotation
//! - [`ConnState`], [`Role`], [`Event`]: lifecycle and host-visible events
//! - [`Message`]: in-tunnel messages carried inside secure records
//! - [`Connection`]: the per-tunnel state machine

mod connection;
mod message;
mod session_id;
mod state;

pub use connection::*;
pub use message::*;
pub use session_id::*;
pub use state::*;
