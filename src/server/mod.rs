//! Helium Protocol - Server Support
//!
//! Helpers for hosts running many server connections over one socket.

mod table;

pub use table::*;
