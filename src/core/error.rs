//! Error types for Helium protocol.

use std::io;

use thiserror::Error;

use crate::plugins::PluginError;
use crate::session::{ConnState, MessageError, SessionId};
use crate::transport::WireError;

/// Errors raised while validating configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A text field was set to the empty string.
    #[error("{field} must not be empty")]
    EmptyString {
        /// Field name.
        field: &'static str,
    },

    /// A text field exceeds the maximum length.
    #[error("{field} is too long: {len} > {max} bytes")]
    StringTooLong {
        /// Field name.
        field: &'static str,
        /// Actual length.
        len: usize,
        /// Maximum length.
        max: usize,
    },

    /// A numeric field is outside its allowed range.
    #[error("{field} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Rejected value.
        value: usize,
        /// Inclusive lower bound.
        min: usize,
        /// Inclusive upper bound.
        max: usize,
    },

    /// A required field is missing for the connection role.
    #[error("missing {0}")]
    Missing(&'static str),

    /// A configuration document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors reported by the secure-channel engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine needs more inbound records before it can continue.
    #[error("engine wants to read")]
    WantRead,

    /// The engine could not flush its output.
    #[error("engine wants to write")]
    WantWrite,

    /// The peer closed the secure channel.
    #[error("secure channel closed")]
    Closed,

    /// Certificate or key material problem.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Allocation failure inside the engine.
    #[error("engine out of memory")]
    OutOfMemory,

    /// Recoverable engine failure (e.g. a corrupt record).
    #[error("non-fatal engine error: {0}")]
    NonFatal(String),

    /// Unrecoverable engine failure.
    #[error("fatal engine error: {0}")]
    Fatal(String),

    /// The transport bridge reported a hard I/O failure.
    #[error("bridge i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Failure reported by a host callback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("host callback failed: {reason}")]
pub struct HostError {
    reason: String,
}

impl HostError {
    /// Create a host error with a reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason given by the host.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Top-level Helium errors.
///
/// Every public operation returns one of these. Use [`Error::is_silent_drop`]
/// and [`Error::is_fatal`] to decide whether the connection survives.
#[derive(Debug, Error)]
pub enum Error {
    // ---- input validation ---------------------------------------------------
    /// An empty packet was supplied.
    #[error("empty packet")]
    EmptyPacket,

    /// Packet shorter than the minimum for its kind.
    #[error("packet too small: {len} < {min}")]
    PacketTooSmall {
        /// Packet length.
        len: usize,
        /// Minimum length.
        min: usize,
    },

    /// Packet longer than the configured limit.
    #[error("packet too large: {len} > {max}")]
    PacketTooLarge {
        /// Packet length.
        len: usize,
        /// Maximum length.
        max: usize,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    // ---- protocol -----------------------------------------------------------
    /// Wire header rejected.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Session id matches neither the active nor the pending session.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// In-tunnel message could not be decoded.
    #[error("message error: {0}")]
    Message(#[from] MessageError),

    /// Message is not valid in the current state.
    #[error("unexpected {message} message in state {state}")]
    UnexpectedMessage {
        /// Message kind.
        message: &'static str,
        /// State it arrived in.
        state: ConnState,
    },

    /// Inside packet is not an IPv4 packet.
    #[error("unsupported network-layer packet (version {0})")]
    UnsupportedPacketType(u8),

    /// Host submitted an IPv4 fragment.
    #[error("fragmented packets are not supported")]
    Fragmented,

    // ---- secure channel -----------------------------------------------------
    /// Certificate or key material problem in the engine.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// The engine ran out of memory.
    #[error("engine out of memory")]
    EngineOutOfMemory,

    /// Recoverable engine failure; the connection continues.
    #[error("non-fatal engine error: {0}")]
    EngineNonFatal(String),

    /// Unrecoverable engine failure.
    #[error("fatal engine error: {0}")]
    EngineFatal(String),

    /// The secure channel was closed by the peer.
    #[error("secure channel closed")]
    ChannelClosed,

    /// Hard I/O failure in the transport bridge.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    // ---- state --------------------------------------------------------------
    /// Operation not allowed in the current state.
    #[error("{operation} is invalid in state {state}")]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// Current state.
        state: ConnState,
    },

    /// Disconnect requested on a connection that never connected.
    ///
    /// Safe to drop the connection without a handshake.
    #[error("connection was never connected")]
    NeverConnected,

    /// Disconnect requested on a connection that is already closed.
    #[error("connection already closed")]
    AlreadyClosed,

    /// Operation reserved for the other role.
    #[error("{operation} is not available to the {role} role")]
    WrongRole {
        /// Operation attempted.
        operation: &'static str,
        /// Role of this connection.
        role: &'static str,
    },

    /// Session rotation requested on a connection with roaming disabled.
    #[error("roaming is disabled")]
    RoamingDisabled,

    /// Session rotation requested while the previous one is unacknowledged.
    #[error("pending session {0} not yet acknowledged")]
    PendingSessionExists(SessionId),

    /// Stream run supplied before the previous run was drained.
    #[error("previous stream run not drained: {remaining} bytes left")]
    StreamNotDrained {
        /// Bytes still unread.
        remaining: usize,
    },

    /// Authentication rejected.
    #[error("access denied")]
    AccessDenied,

    // ---- plugins ------------------------------------------------------------
    /// A plugin asked for the packet to be dropped.
    #[error("packet dropped by plugin")]
    PluginDrop,

    /// A plugin failed.
    #[error("plugin failed")]
    PluginFailed,

    /// A plugin grew the packet past its buffer.
    #[error("plugin overflowed buffer: {len} > {capacity}")]
    PluginOverflow {
        /// Length reported by the chain.
        len: usize,
        /// Buffer capacity.
        capacity: usize,
    },

    // ---- host ---------------------------------------------------------------
    /// A host callback reported failure.
    #[error("{callback} callback failed: {source}")]
    Callback {
        /// Callback name.
        callback: &'static str,
        /// Host-supplied reason.
        source: HostError,
    },
}

impl Error {
    /// Check if the packet was discarded and the connection continues.
    ///
    /// Errors caused by one bad or filtered inbound packet never tear the
    /// session down.
    pub fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            Error::EmptyPacket
                | Error::PacketTooSmall { .. }
                | Error::PacketTooLarge { .. }
                | Error::Wire(_)
                | Error::UnknownSession(_)
                | Error::Message(_)
                | Error::UnexpectedMessage { .. }
                | Error::UnsupportedPacketType(_)
                | Error::Fragmented
                | Error::EngineNonFatal(_)
                | Error::PluginDrop
        )
    }

    /// Check if this error is fatal to the connection.
    ///
    /// The host should disconnect after a fatal error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Certificate(_)
                | Error::EngineOutOfMemory
                | Error::EngineFatal(_)
                | Error::ChannelClosed
                | Error::Io(_)
                | Error::StreamNotDrained { .. }
                | Error::AccessDenied
                | Error::PluginFailed
                | Error::PluginOverflow { .. }
                | Error::Callback { .. }
        )
    }

    /// Check if this error is a state guard rejection.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidState { .. }
                | Error::NeverConnected
                | Error::AlreadyClosed
                | Error::WrongRole { .. }
                | Error::RoamingDisabled
                | Error::PendingSessionExists(_)
        )
    }

    pub(crate) fn callback(callback: &'static str, source: HostError) -> Self {
        Error::Callback { callback, source }
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::WantRead | EngineError::WantWrite => {
                Error::EngineNonFatal(err.to_string())
            }
            EngineError::Closed => Error::ChannelClosed,
            EngineError::Certificate(reason) => Error::Certificate(reason),
            EngineError::OutOfMemory => Error::EngineOutOfMemory,
            EngineError::NonFatal(reason) => Error::EngineNonFatal(reason),
            EngineError::Fatal(reason) => Error::EngineFatal(reason),
            EngineError::Io(e) => Error::from_bridge_io(e),
        }
    }
}

impl Error {
    /// Recover an error the bridge passed through the engine as `io::Error`.
    fn from_bridge_io(err: io::Error) -> Self {
        if err.get_ref().is_none() {
            return Error::Io(err);
        }
        let kind = err.kind();
        match err.into_inner() {
            Some(inner) => match inner.downcast::<Error>() {
                Ok(err) => *err,
                Err(inner) => Error::Io(io::Error::new(kind, inner)),
            },
            None => Error::Io(kind.into()),
        }
    }
}

impl From<PluginError> for Error {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::Drop => Error::PluginDrop,
            PluginError::Failed => Error::PluginFailed,
            PluginError::Overflow { len, capacity } => Error::PluginOverflow { len, capacity },
        }
    }
}

/// Result type for Helium operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_drop_errors() {
        assert!(Error::UnknownSession(SessionId::EMPTY).is_silent_drop());
        assert!(Error::PluginDrop.is_silent_drop());
        assert!(Error::EngineNonFatal("bad record".into()).is_silent_drop());
        assert!(Error::Wire(WireError::BadMagic([0, 0])).is_silent_drop());

        assert!(!Error::PluginFailed.is_silent_drop());
        assert!(!Error::EngineFatal("boom".into()).is_silent_drop());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::PluginFailed.is_fatal());
        assert!(Error::EngineFatal("boom".into()).is_fatal());
        assert!(Error::StreamNotDrained { remaining: 3 }.is_fatal());
        assert!(Error::callback("outside_write", HostError::new("socket gone")).is_fatal());

        assert!(!Error::PluginDrop.is_fatal());
        assert!(!Error::EngineNonFatal("bad record".into()).is_fatal());
        assert!(!Error::UnknownSession(SessionId::EMPTY).is_fatal());
    }

    #[test]
    fn test_never_connected_is_distinct() {
        let err = Error::NeverConnected;
        assert!(err.is_state_error());
        assert!(!err.is_fatal());
        assert!(!err.is_silent_drop());
    }

    #[test]
    fn test_pending_session_is_state_error() {
        let err = Error::PendingSessionExists(SessionId::new(9));
        assert!(err.is_state_error());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_engine_error_mapping() {
        assert!(matches!(
            Error::from(EngineError::NonFatal("x".into())),
            Error::EngineNonFatal(_)
        ));
        assert!(matches!(Error::from(EngineError::Fatal("x".into())), Error::EngineFatal(_)));
        assert!(matches!(Error::from(EngineError::Closed), Error::ChannelClosed));
        assert!(matches!(
            Error::from(EngineError::Io(io::Error::other("host"))),
            Error::Io(_)
        ));
    }

    #[test]
    fn test_bridge_error_survives_engine() {
        let bridged = io::Error::other(Error::callback("outside_write", HostError::new("gone")));
        let err = Error::from(EngineError::Io(bridged));
        assert!(matches!(err, Error::Callback { callback: "outside_write", .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_plugin_error_mapping() {
        assert!(matches!(Error::from(PluginError::Drop), Error::PluginDrop));
        assert!(matches!(Error::from(PluginError::Failed), Error::PluginFailed));
        assert!(matches!(
            Error::from(PluginError::Overflow { len: 10, capacity: 5 }),
            Error::PluginOverflow { len: 10, capacity: 5 }
        ));
    }
}
