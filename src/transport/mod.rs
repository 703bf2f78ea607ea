//! Helium Protocol - Transport Layer
//!
//! Everything between the secure-channel engine and the host's carrier:
//!
//! - **Wire framing**: [`WireHeader`], [`encode`], [`decode`]
//! - **Staging**: [`PacketBuffer`] and [`InboundStage`], including stream
//!   reassembly
//! - **I/O bridge**: [`Bridge`] and [`BridgeIo`], the engine's read and
//!   write hooks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Session (state machine)         │
//! ├─────────────────────────────────────────┤
//! │      Secure-channel engine (D/TLS)      │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   header, outside plugins, repeats      │
//! ├─────────────────────────────────────────┤
//! │        Host carrier (UDP / TCP)         │
//! └─────────────────────────────────────────┘
//! ```

mod bridge;
mod frame;
mod staging;

pub use bridge::*;
pub use frame::*;
pub use staging::*;
