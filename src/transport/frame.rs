//! Wire header encoding and decoding.
//!
//! Every record sent on a datagram carrier is prefixed with a fixed
//! 16-byte header identifying the protocol, its version and the session.

use thiserror::Error;

use crate::core::{
    PROTOCOL_MAJOR_VERSION, PROTOCOL_MINOR_VERSION, WIRE_HEADER_SIZE, WIRE_MAGIC,
    WIRE_RESERVED_SIZE,
};
use crate::session::SessionId;

/// Protocol version carried in the wire header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtocolVersion {
    /// Major version; must match exactly.
    pub major: u8,
    /// Minor version; drift is tolerated.
    pub minor: u8,
}

impl ProtocolVersion {
    /// The version implemented by this crate.
    pub const CURRENT: Self = Self {
        major: PROTOCOL_MAJOR_VERSION,
        minor: PROTOCOL_MINOR_VERSION,
    };

    /// Create a version.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Wire header.
///
/// Wire format (16 bytes):
/// ```text
/// +--------+-------+-------+------------+----------+-------------------+
/// | Magic  | Major | Minor | Aggressive | Reserved | Session ID        |
/// | "He"   | 1     | 1     | 1          | 3 (zero) | 8 bytes (BE64)    |
/// +--------+-------+-------+------------+----------+-------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    /// Protocol version of the sender.
    pub version: ProtocolVersion,
    /// Sender requests aggressive (redundant) transmission.
    pub aggressive: bool,
    /// Session identifier.
    pub session_id: SessionId,
}

impl WireHeader {
    /// Create a header for the current protocol version.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            version: ProtocolVersion::CURRENT,
            aggressive: false,
            session_id,
        }
    }

    /// Serialize header to bytes (16 bytes).
    pub fn to_bytes(&self) -> [u8; WIRE_HEADER_SIZE] {
        encode(
            self.session_id,
            self.version.major,
            self.version.minor,
            self.aggressive,
        )
    }

    /// Parse a header, requiring the given major version.
    pub fn from_bytes(bytes: &[u8], major: u8) -> Result<Self, WireError> {
        decode(bytes, major)
    }
}

/// Encode a wire header.
pub fn encode(session_id: SessionId, major: u8, minor: u8, aggressive: bool) -> [u8; WIRE_HEADER_SIZE] {
    let mut buf = [0u8; WIRE_HEADER_SIZE];
    buf[0..2].copy_from_slice(&WIRE_MAGIC);
    buf[2] = major;
    buf[3] = minor;
    buf[4] = u8::from(aggressive);
    // buf[5..8] reserved
    buf[5 + WIRE_RESERVED_SIZE..].copy_from_slice(&session_id.to_bytes());
    buf
}

/// Decode a wire header.
///
/// Rejects short input, a bad magic, and a major version other than `major`.
/// Minor version drift is accepted.
pub fn decode(bytes: &[u8], major: u8) -> Result<WireHeader, WireError> {
    if bytes.len() < WIRE_HEADER_SIZE {
        return Err(WireError::TooShort {
            expected: WIRE_HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    if bytes[0..2] != WIRE_MAGIC {
        return Err(WireError::BadMagic([bytes[0], bytes[1]]));
    }

    if bytes[2] != major {
        return Err(WireError::UnsupportedVersion {
            expected: major,
            actual: bytes[2],
        });
    }

    let mut id = [0u8; 8];
    id.copy_from_slice(&bytes[5 + WIRE_RESERVED_SIZE..WIRE_HEADER_SIZE]);

    Ok(WireHeader {
        version: ProtocolVersion::new(bytes[2], bytes[3]),
        aggressive: bytes[4] != 0,
        session_id: SessionId::from_bytes(id),
    })
}

/// Extract the session id from a datagram without touching any connection.
///
/// Used by servers to route inbound datagrams before a connection is known.
pub fn peek_session_id(datagram: &[u8]) -> Result<SessionId, WireError> {
    decode(datagram, PROTOCOL_MAJOR_VERSION).map(|header| header.session_id)
}

/// Errors that can occur during wire header parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Record is shorter than the header.
    #[error("record too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Magic bytes do not match.
    #[error("bad magic: {0:02x?}")]
    BadMagic([u8; 2]),

    /// Major version does not match.
    #[error("unsupported major version: expected {expected}, got {actual}")]
    UnsupportedVersion {
        /// Major version fixed at connection creation.
        expected: u8,
        /// Major version received.
        actual: u8,
    },
}
