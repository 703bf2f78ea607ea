//! Collaborator traits for the Helium core.
//!
//! The core owns no sockets, no threads and no timers. Everything it needs
//! from the outside world comes through two injected collaborators:
//!
//! - [`Host`]: the embedding application (state notifications, packet
//!   delivery, authentication, network configuration)
//! - [`SecureChannel`]: the D/TLS-style engine that performs the handshake
//!   and record protection
//!
//! The engine talks to the carrier only through [`RecordIo`], which the
//! transport bridge implements.

use std::io;
use std::time::Duration;

use super::error::{EngineError, HostError};
use crate::session::{ConnState, Event, NetworkConfig};

/// Result type for host callbacks.
pub type HostResult<T = ()> = Result<T, HostError>;

/// Host-side callbacks.
///
/// A non-success result from [`Host::state_changed`], [`Host::inside_write`]
/// or [`Host::outside_write`] is a hard failure of the operation that
/// triggered it. The optional callbacks default to success.
pub trait Host {
    /// The connection moved to a new state.
    fn state_changed(&mut self, state: ConnState) -> HostResult;

    /// Deliver a decrypted packet to the local network stack.
    fn inside_write(&mut self, packet: &[u8]) -> HostResult;

    /// Send framed bytes to the remote peer.
    fn outside_write(&mut self, packet: &[u8]) -> HostResult;

    /// Schedule a call to `nudge` after `timeout`.
    fn nudge_time(&mut self, timeout: Duration) -> HostResult {
        let _ = timeout;
        Ok(())
    }

    /// Apply the network configuration received from the server (client role).
    fn network_config(&mut self, config: &NetworkConfig) -> HostResult {
        let _ = config;
        Ok(())
    }

    /// Opaque server configuration received (client role).
    fn server_config(&mut self, data: &[u8]) -> HostResult {
        let _ = data;
        Ok(())
    }

    /// A protocol event occurred.
    fn event(&mut self, event: Event) -> HostResult {
        let _ = event;
        Ok(())
    }

    /// Verify a username and password (server role).
    fn authenticate_user_pass(&mut self, username: &str, password: &str) -> bool {
        let _ = (username, password);
        false
    }

    /// Verify an opaque authentication buffer (server role).
    fn authenticate_buffer(&mut self, auth_type: u8, buffer: &[u8]) -> bool {
        let _ = (auth_type, buffer);
        false
    }

    /// Produce the network configuration to hand to an authenticated client
    /// (server role).
    fn populate_network_config(&mut self) -> HostResult<NetworkConfig> {
        Err(HostError::new("no network configuration available"))
    }
}

/// Byte-stream view of the carrier handed to the engine.
///
/// Reads follow the non-blocking convention: `Err(WouldBlock)` means no data
/// is staged, `Ok(0)` means the staged packet was dropped. A write error is a
/// hard I/O failure.
pub trait RecordIo: io::Read + io::Write {}

impl<T: io::Read + io::Write + ?Sized> RecordIo for T {}

/// Progress of a handshake step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// More records are needed from the peer.
    InProgress,
    /// The secure channel is established.
    Complete,
}

/// Secure-channel engine (D/TLS-style).
///
/// The engine is constructed by the host for a fixed role and carrier. All
/// methods are non-blocking: [`EngineError::WantRead`] means "call me again
/// when more data has been staged".
pub trait SecureChannel {
    /// Advance the handshake.
    fn handshake(&mut self, io: &mut dyn RecordIo) -> Result<HandshakeStatus, EngineError>;

    /// Read one decrypted record into `buf`.
    fn read(&mut self, io: &mut dyn RecordIo, buf: &mut [u8]) -> Result<usize, EngineError>;

    /// Encrypt and send `data` as one record.
    fn write(&mut self, io: &mut dyn RecordIo, data: &[u8]) -> Result<usize, EngineError>;

    /// Start a secure renegotiation.
    fn renegotiate(&mut self, io: &mut dyn RecordIo) -> Result<(), EngineError>;

    /// Check if a renegotiation is still running.
    fn is_renegotiating(&self) -> bool;

    /// Send a close notification.
    fn shutdown(&mut self, io: &mut dyn RecordIo) -> Result<(), EngineError>;

    /// Current retransmission back-off, if a timer is pending.
    fn timeout(&self) -> Option<Duration>;

    /// The host-scheduled timer fired.
    fn handle_timeout(&mut self, io: &mut dyn RecordIo) -> Result<(), EngineError>;

    /// Drop all session state so the engine can be reused for a fresh connect.
    fn reset(&mut self);
}
