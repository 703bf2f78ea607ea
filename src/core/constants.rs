//! Protocol constants for the Helium wire format.
//!
//! These values are fixed by the protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// WIRE HEADER
// =============================================================================

/// Magic bytes opening every wire record ("He").
pub const WIRE_MAGIC: [u8; 2] = [b'H', b'e'];

/// Size of the reserved block in the wire header.
pub const WIRE_RESERVED_SIZE: usize = 3;

/// Session ID size (64-bit).
pub const SESSION_ID_SIZE: usize = 8;

/// Wire header size (magic + major + minor + aggressive + reserved + session id).
pub const WIRE_HEADER_SIZE: usize = 2 + 1 + 1 + 1 + WIRE_RESERVED_SIZE + SESSION_ID_SIZE;

/// Current protocol major version.
pub const PROTOCOL_MAJOR_VERSION: u8 = 1;

/// Current protocol minor version.
pub const PROTOCOL_MINOR_VERSION: u8 = 1;

// =============================================================================
// SIZES
// =============================================================================

/// Maximum size of a record on the wire (transport MTU ceiling).
pub const MAX_WIRE_MTU: usize = 1500;

/// Maximum size of a tunnelled packet, leaving room for header and record overhead.
pub const MAX_MTU: usize = 1350;

/// Smallest MTU a connection may be configured with (IPv4 minimum datagram).
pub const MIN_MTU: usize = 576;

/// Padding target for [`PaddingPolicy::Pad450`](crate::config::PaddingPolicy::Pad450).
pub const PADDING_450: usize = 450;

/// Largest byte run accepted in one call on a stream carrier.
pub const MAX_STREAM_RUN: usize = 64 * 1024;

/// Maximum length of a text configuration field (username, password).
pub const CONFIG_TEXT_FIELD_LENGTH: usize = 50;

/// Maximum size of an opaque authentication buffer.
pub const MAX_AUTH_BUFFER_SIZE: usize = 1024;

/// Maximum size of an opaque server configuration blob.
pub const MAX_SERVER_CONFIG_SIZE: usize = 1024;

// =============================================================================
// TRANSMISSION
// =============================================================================

/// Extra copies of each record written in aggressive mode.
pub const AGGRESSIVE_REPEATS: usize = 2;

/// Back-off used during the handshake when the engine reports none.
pub const DEFAULT_NUDGE_TIME: Duration = Duration::from_millis(1000);

// =============================================================================
// IPv4
// =============================================================================

/// Minimum IPv4 header length.
pub const IPV4_HEADER_SIZE: usize = 20;

/// "More fragments" flag in the IPv4 flags/fragment-offset field.
pub const IPV4_FLAG_MORE_FRAGMENTS: u16 = 0x2000;

/// Fragment offset mask in the IPv4 flags/fragment-offset field.
pub const IPV4_FRAGMENT_OFFSET_MASK: u16 = 0x1FFF;
