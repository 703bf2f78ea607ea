//! Connection states, roles and host-visible events.

use std::fmt;

/// Connection lifecycle state.
///
/// ```text
/// NONE ─► CONNECTING ─► AUTHENTICATING ─► LINK_UP ─► CONFIGURING ─► ONLINE
///              │               │              │            │            │
///              └───────────────┴──────────────┴────────────┴────────────┘
///                                      │
///                                      ▼
///                   DISCONNECTING ─► DISCONNECTED ─► (connect again)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnState {
    /// Created, never connected.
    None,
    /// Not connected. Resources released; may connect again.
    Disconnected,
    /// Secure-channel handshake in progress.
    Connecting,
    /// Clean shutdown in progress.
    Disconnecting,
    /// Secure channel up, authentication in progress.
    Authenticating,
    /// Authenticated, waiting for network configuration.
    LinkUp,
    /// Network configuration is being applied.
    Configuring,
    /// Tunnel established.
    Online,
}

impl ConnState {
    /// Check if a connect may start from this state.
    pub fn can_connect(self) -> bool {
        matches!(self, ConnState::None | ConnState::Disconnected)
    }

    /// Check if the secure channel is established.
    pub fn is_link_up(self) -> bool {
        matches!(
            self,
            ConnState::LinkUp | ConnState::Configuring | ConnState::Online
        )
    }

    /// Check if the handshake or later has started and not yet ended.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnState::Connecting
                | ConnState::Authenticating
                | ConnState::LinkUp
                | ConnState::Configuring
                | ConnState::Online
        )
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnState::None => "NONE",
            ConnState::Disconnected => "DISCONNECTED",
            ConnState::Connecting => "CONNECTING",
            ConnState::Disconnecting => "DISCONNECTING",
            ConnState::Authenticating => "AUTHENTICATING",
            ConnState::LinkUp => "LINK_UP",
            ConnState::Configuring => "CONFIGURING",
            ConnState::Online => "ONLINE",
        };
        f.write_str(name)
    }
}

/// Which end of the tunnel a connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiates the tunnel and authenticates.
    Client,
    /// Accepts the tunnel and assigns session ids.
    Server,
}

impl Role {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

/// Protocol events reported through [`Host::event`](crate::core::Host::event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// The first record from the peer was accepted.
    FirstMessageReceived,
    /// The server answered a keepalive.
    Pong,
    /// The host submitted an IPv4 fragment, which was rejected.
    RejectFragmentedPacketsSentByHost,
    /// A secure renegotiation started.
    SecureRenegotiationStarted,
    /// A secure renegotiation completed.
    SecureRenegotiationCompleted,
    /// The peer switched to the pending session id.
    PendingSessionAcknowledged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_guards() {
        assert!(ConnState::None.can_connect());
        assert!(ConnState::Disconnected.can_connect());
        assert!(!ConnState::Connecting.can_connect());
        assert!(!ConnState::Online.can_connect());

        assert!(ConnState::Online.is_link_up());
        assert!(!ConnState::Authenticating.is_link_up());

        assert!(ConnState::Connecting.is_active());
        assert!(!ConnState::Disconnecting.is_active());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnState::LinkUp.to_string(), "LINK_UP");
        assert_eq!(ConnState::Online.to_string(), "ONLINE");
    }
}
