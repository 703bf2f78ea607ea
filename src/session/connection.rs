//! Connection state machine.
//!
//! A [`Connection`] ties together the host, the secure-channel engine, the
//! transport bridge and both plugin chains. It never blocks and owns no
//! timers: every public method runs to completion and reports progress
//! through host callbacks.
//!
//! # Client flow
//!
//! ```text
//! connect ─► CONNECTING ─(handshake, send Auth)─► AUTHENTICATING
//!         ─(AuthResponse ok)─► LINK_UP ─(Config)─► CONFIGURING ─► ONLINE
//! ```
//!
//! # Server flow
//!
//! ```text
//! accept ─► CONNECTING ─(handshake)─► AUTHENTICATING ─(Auth verified)─► LINK_UP
//!        ─(send Config)─► CONFIGURING ─► ONLINE
//! ```

use std::time::Duration;

use zeroize::Zeroize;

use super::message::{AuthRequest, AuthStatus, Message, NetworkConfig};
use super::session_id::{SessionId, SessionIds};
use super::state::{ConnState, Event, Role};
use crate::config::{ConnectionConfig, PaddingPolicy};
use crate::core::{
    DEFAULT_NUDGE_TIME, EngineError, Error, HandshakeStatus, Host, IPV4_FLAG_MORE_FRAGMENTS,
    IPV4_FRAGMENT_OFFSET_MASK, IPV4_HEADER_SIZE, MAX_SERVER_CONFIG_SIZE, MAX_STREAM_RUN,
    MAX_WIRE_MTU, PADDING_450, Result, SecureChannel,
};
use crate::plugins::{Plugin, PluginChain};
use crate::transport::{Bridge, BridgeIo, Carrier, PacketBuffer, ProtocolVersion, WireHeader};

/// One tunnel session.
///
/// Generic over the secure-channel engine `E` and the host callbacks `H`.
/// Callers must not use one connection from several threads at once.
pub struct Connection<E, H> {
    role: Role,
    config: ConnectionConfig,
    state: ConnState,
    ids: SessionIds,
    /// Client only: the id the server used before the last rotation.
    retiring: Option<SessionId>,
    engine: E,
    host: H,
    bridge: Bridge,
    inside: PluginChain,
    record_buf: PacketBuffer,
    send_buf: PacketBuffer,
    packet_buf: PacketBuffer,
    first_message_received: bool,
    /// Set when the engine consumed an inbound record during the current call.
    progressed: bool,
    renegotiating: bool,
    ping_id: u32,
    peer_version: Option<ProtocolVersion>,
    network_config: Option<NetworkConfig>,
}

impl<E: SecureChannel, H: Host> Connection<E, H> {
    /// Create a connection in state NONE.
    ///
    /// The config is validated for the role; a client must carry credentials.
    pub fn new(role: Role, config: ConnectionConfig, engine: E, host: H) -> Result<Self> {
        config.validate_for(role)?;

        let mut bridge = Bridge::new(config.carrier(), config.protocol_version());
        bridge.set_aggressive(config.aggressive(), config.aggressive());

        Ok(Self {
            role,
            config,
            state: ConnState::None,
            ids: SessionIds::default(),
            retiring: None,
            engine,
            host,
            bridge,
            inside: PluginChain::new(),
            record_buf: PacketBuffer::new(MAX_WIRE_MTU),
            send_buf: PacketBuffer::new(MAX_WIRE_MTU),
            packet_buf: PacketBuffer::new(MAX_WIRE_MTU),
            first_message_received: false,
            progressed: false,
            renegotiating: false,
            ping_id: 0,
            peer_version: None,
            network_config: None,
        })
    }

    /// Create a client connection.
    pub fn client(config: ConnectionConfig, engine: E, host: H) -> Result<Self> {
        Self::new(Role::Client, config, engine, host)
    }

    /// Create a server connection.
    pub fn server(config: ConnectionConfig, engine: E, host: H) -> Result<Self> {
        Self::new(Role::Server, config, engine, host)
    }

    // ---- accessors ------------------------------------------------------------

    /// Which end of the tunnel this is.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current state.
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Active session id. [`SessionId::EMPTY`] on a client that has not yet
    /// heard from the server.
    pub fn session_id(&self) -> SessionId {
        self.ids.active()
    }

    /// Session id waiting for the client to acknowledge it (server role).
    pub fn pending_session_id(&self) -> Option<SessionId> {
        self.ids.pending()
    }

    /// The configuration the connection was created with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Protocol version of the peer, taken from the first accepted header.
    pub fn peer_version(&self) -> Option<ProtocolVersion> {
        self.peer_version
    }

    /// Network configuration sent (server) or received (client).
    pub fn network_config(&self) -> Option<&NetworkConfig> {
        self.network_config.as_ref()
    }

    /// Check if every outbound record is being repeated.
    pub fn is_aggressive(&self) -> bool {
        self.bridge.is_aggressive()
    }

    /// Check if a secure renegotiation is running.
    pub fn is_renegotiating(&self) -> bool {
        self.renegotiating
    }

    /// The host callbacks.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host callbacks, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The secure-channel engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The secure-channel engine, mutably.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    // ---- setup ----------------------------------------------------------------

    /// Append a plugin to the inside chain (tunnelled packets).
    pub fn register_inside_plugin(&mut self, plugin: impl Plugin + 'static) -> Result<()> {
        self.require("register_inside_plugin", self.state.can_connect())?;
        self.inside.register(plugin);
        Ok(())
    }

    /// Append a plugin to the outside chain (framed wire records).
    ///
    /// Only consulted on datagram carriers.
    pub fn register_outside_plugin(&mut self, plugin: impl Plugin + 'static) -> Result<()> {
        self.require("register_outside_plugin", self.state.can_connect())?;
        self.bridge.outside_chain().register(plugin);
        Ok(())
    }

    /// Start connecting to the server (client role).
    pub fn connect(&mut self) -> Result<()> {
        self.require_role(Role::Client, "connect")?;
        self.require("connect", self.state.can_connect())?;

        self.prepare(SessionId::EMPTY);
        self.set_state(ConnState::Connecting)?;
        self.advance_handshake()?;
        self.schedule_nudge()
    }

    /// Start accepting a client (server role). Returns the issued session id.
    pub fn accept(&mut self) -> Result<SessionId> {
        self.require_role(Role::Server, "accept")?;
        self.require("accept", self.state.can_connect())?;

        let id = SessionId::generate();
        self.prepare(id);
        tracing::debug!(session = %id, "accepting connection");
        self.set_state(ConnState::Connecting)?;
        Ok(id)
    }

    // ---- driving --------------------------------------------------------------

    /// Hand the connection bytes received from the peer.
    ///
    /// On datagram carriers `data` is one whole datagram. On stream carriers
    /// it is any run of bytes cut from the stream. Errors for which
    /// [`Error::is_silent_drop`] holds leave the connection usable.
    pub fn outside_data_received(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::EmptyPacket);
        }
        self.require("outside_data_received", self.state.is_active())?;

        let candidate = match self.bridge.carrier() {
            Carrier::Datagram => {
                let header = self.bridge.accept_datagram(data)?;
                let candidate = self.check_session(&header)?;
                self.adopt_header(&header);
                self.bridge.stage_record();
                candidate
            }
            Carrier::Stream => {
                if data.len() > MAX_STREAM_RUN {
                    return Err(Error::PacketTooLarge {
                        len: data.len(),
                        max: MAX_STREAM_RUN,
                    });
                }
                self.bridge.stage_run(data)?;
                None
            }
        };

        self.progressed = false;
        let result = self.process_inbound();
        self.bridge.discard_staged();

        if let Some(id) = candidate {
            if !self.progressed {
                tracing::warn!(session = %id, "record under unconfirmed session id rejected by engine");
                self.ids.reset(SessionId::EMPTY);
                self.bridge.set_session_id(SessionId::EMPTY);
                self.peer_version = None;
                return result.and(Err(Error::UnknownSession(id)));
            }
            tracing::debug!(session = %id, "adopted server-issued session id");
        }

        if !self.first_message_received {
            self.first_message_received = true;
            self.emit(Event::FirstMessageReceived)?;
        }
        result?;
        self.schedule_nudge()
    }

    /// Send a packet from the local network stack through the tunnel.
    pub fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.require("send_packet", self.state == ConnState::Online)?;
        if packet.is_empty() {
            return Err(Error::EmptyPacket);
        }
        let mtu = usize::from(self.config.mtu());
        if packet.len() > mtu {
            return Err(Error::PacketTooLarge {
                len: packet.len(),
                max: mtu,
            });
        }
        if is_ipv4_fragment(packet)? {
            tracing::debug!(len = packet.len(), "rejecting fragmented packet from host");
            self.emit(Event::RejectFragmentedPacketsSentByHost)?;
            return Err(Error::Fragmented);
        }

        self.packet_buf.fill(packet)?;
        let (storage, len) = self.packet_buf.parts_mut();
        self.inside.egress(storage, len)?;

        let len = Message::Data(self.packet_buf.as_slice()).encode(self.send_buf.storage_mut())?;
        let len = self.pad(len);
        self.write_record(len)
    }

    /// The host timer scheduled through [`Host::nudge_time`] fired.
    ///
    /// Late timers on an inactive connection are ignored.
    pub fn nudge(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Ok(());
        }
        let mut io = BridgeIo::new(&mut self.bridge, &mut self.host);
        self.engine.handle_timeout(&mut io)?;
        self.schedule_nudge()
    }

    /// The engine's current retransmission back-off.
    pub fn nudge_time(&self) -> Option<Duration> {
        if !self.state.is_active() {
            return None;
        }
        match self.engine.timeout() {
            None if self.state == ConnState::Connecting => Some(DEFAULT_NUDGE_TIME),
            timeout => timeout,
        }
    }

    /// Close the connection.
    ///
    /// Sends a goodbye if the link is up, shuts the engine down and releases
    /// the plugin chains. Returns [`Error::NeverConnected`] if the connection
    /// never left NONE, in which case it can simply be dropped.
    pub fn disconnect(&mut self) -> Result<()> {
        match self.state {
            ConnState::None => Err(Error::NeverConnected),
            ConnState::Disconnected => Err(Error::AlreadyClosed),
            ConnState::Disconnecting => Err(Error::InvalidState {
                operation: "disconnect",
                state: self.state,
            }),
            _ => self.teardown(),
        }
    }

    /// Send a keepalive ping (client role). The answer raises [`Event::Pong`].
    pub fn send_keepalive(&mut self) -> Result<()> {
        self.require_role(Role::Client, "send_keepalive")?;
        self.require("send_keepalive", self.state == ConnState::Online)?;
        self.ping_id = self.ping_id.wrapping_add(1);
        self.send_message(&Message::Ping { id: self.ping_id })
    }

    /// Send an opaque configuration blob to the client (server role).
    pub fn send_server_config(&mut self, data: &[u8]) -> Result<()> {
        self.require_role(Role::Server, "send_server_config")?;
        self.require("send_server_config", self.state.is_link_up())?;
        if data.len() > MAX_SERVER_CONFIG_SIZE {
            return Err(Error::PacketTooLarge {
                len: data.len(),
                max: MAX_SERVER_CONFIG_SIZE,
            });
        }
        self.send_message(&Message::ServerConfig(data))
    }

    /// Issue a new session id to the client (server role).
    ///
    /// Records carrying either id are accepted until the client uses the new
    /// one, which then becomes active. Only one rotation may be in flight.
    pub fn rotate_session_id(&mut self) -> Result<SessionId> {
        self.require_role(Role::Server, "rotate_session_id")?;
        if self.config.roaming_disabled() {
            return Err(Error::RoamingDisabled);
        }
        self.require("rotate_session_id", self.state == ConnState::Online)?;
        if let Some(pending) = self.ids.pending() {
            return Err(Error::PendingSessionExists(pending));
        }

        let pending = self.ids.rotate();
        tracing::debug!(
            session = %self.ids.active(),
            pending = %pending,
            "rotating session id"
        );
        self.send_message(&Message::SessionResponse(pending))?;
        Ok(pending)
    }

    /// Start a secure renegotiation. The host-visible state does not change.
    pub fn schedule_renegotiation(&mut self) -> Result<()> {
        self.require("schedule_renegotiation", self.state == ConnState::Online)?;
        if self.renegotiating {
            return Ok(());
        }
        let mut io = BridgeIo::new(&mut self.bridge, &mut self.host);
        self.engine.renegotiate(&mut io)?;
        self.renegotiating = true;
        self.emit(Event::SecureRenegotiationStarted)?;
        self.schedule_nudge()
    }

    // ---- internals ------------------------------------------------------------

    fn require(&self, operation: &'static str, allowed: bool) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn require_role(&self, role: Role, operation: &'static str) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(Error::WrongRole {
                operation,
                role: self.role.name(),
            })
        }
    }

    /// Reset per-attempt state before connect or accept.
    fn prepare(&mut self, id: SessionId) {
        self.engine.reset();
        self.ids.reset(id);
        self.bridge.set_session_id(id);
        self.bridge
            .set_aggressive(self.config.aggressive(), self.config.aggressive());
        self.retiring = None;
        self.first_message_received = false;
        self.renegotiating = false;
        self.peer_version = None;
        self.network_config = None;
    }

    /// Move to `state` and tell the host. A failing callback does not undo
    /// the transition.
    fn set_state(&mut self, state: ConnState) -> Result<()> {
        if self.state == state {
            return Ok(());
        }
        tracing::debug!(
            role = self.role.name(),
            from = ?self.state,
            to = ?state,
            session = %self.ids.active(),
            "state change"
        );
        self.state = state;
        self.bridge.set_online(state == ConnState::Online);
        self.host
            .state_changed(state)
            .map_err(|e| Error::callback("state_changed", e))
    }

    fn emit(&mut self, event: Event) -> Result<()> {
        tracing::trace!(?event, "event");
        self.host.event(event).map_err(|e| Error::callback("event", e))
    }

    fn schedule_nudge(&mut self) -> Result<()> {
        if self.bridge.carrier() != Carrier::Datagram {
            return Ok(());
        }
        if let Some(timeout) = self.nudge_time() {
            self.host
                .nudge_time(timeout)
                .map_err(|e| Error::callback("nudge_time", e))?;
        }
        Ok(())
    }

    /// Accept or reject the session id of an inbound header.
    ///
    /// A client without an id tries the server's id on trust and returns it;
    /// the caller keeps it only if the engine accepts the record.
    fn check_session(&mut self, header: &WireHeader) -> Result<Option<SessionId>> {
        let id = header.session_id;
        match self.role {
            Role::Client => {
                if self.ids.active().is_empty() && !id.is_empty() {
                    self.ids.reset(id);
                    self.bridge.set_session_id(id);
                    return Ok(Some(id));
                }
                if id == self.ids.active() {
                    self.retiring = None;
                    return Ok(None);
                }
                if self.retiring == Some(id) {
                    return Ok(None);
                }
            }
            Role::Server => {
                if id == self.ids.active() {
                    return Ok(None);
                }
                if self.ids.acknowledge(id) {
                    tracing::debug!(session = %id, "client acknowledged pending session id");
                    self.bridge.set_session_id(id);
                    self.emit(Event::PendingSessionAcknowledged)?;
                    return Ok(None);
                }
                // the client has no id until it hears from us
                if id.is_empty() && !self.state.is_link_up() {
                    return Ok(None);
                }
            }
        }

        tracing::warn!(
            session = %id,
            expected = %self.ids.active(),
            "dropping datagram for unknown session"
        );
        Err(Error::UnknownSession(id))
    }

    fn adopt_header(&mut self, header: &WireHeader) {
        if self.peer_version.is_none() {
            self.peer_version = Some(header.version);
        }
        if self.role == Role::Server && header.aggressive && !self.bridge.is_aggressive() {
            tracing::debug!(session = %self.ids.active(), "client requested aggressive mode");
            self.bridge.set_aggressive(true, self.config.aggressive());
        }
    }

    fn process_inbound(&mut self) -> Result<()> {
        if self.state == ConnState::Connecting {
            self.advance_handshake()?;
            if self.state == ConnState::Connecting {
                return Ok(());
            }
        }
        self.read_records()
    }

    fn advance_handshake(&mut self) -> Result<()> {
        let mut io = BridgeIo::new(&mut self.bridge, &mut self.host);
        match self.engine.handshake(&mut io) {
            Ok(HandshakeStatus::Complete) => self.progressed = true,
            Ok(HandshakeStatus::InProgress) => {
                self.progressed = true;
                return Ok(());
            }
            Err(EngineError::WantRead) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(role = self.role.name(), "secure channel established");
        self.set_state(ConnState::Authenticating)?;
        match self.role {
            Role::Client => self.send_auth(),
            Role::Server => Ok(()),
        }
    }

    fn read_records(&mut self) -> Result<()> {
        let mut dropped = None;
        while self.state.is_active() {
            let mut io = BridgeIo::new(&mut self.bridge, &mut self.host);
            let len = match self.engine.read(&mut io, self.record_buf.storage_mut()) {
                Ok(0) | Err(EngineError::WantRead) => break,
                Ok(len) => {
                    self.progressed = true;
                    len
                }
                Err(e) => {
                    let err = Error::from(e);
                    if !err.is_silent_drop() {
                        return Err(err);
                    }
                    tracing::warn!(error = %err, "engine rejected inbound record");
                    dropped.get_or_insert(err);
                    break;
                }
            };
            self.record_buf.set_len(len)?;

            if let Err(err) = self.handle_record() {
                if !err.is_silent_drop() {
                    return Err(err);
                }
                tracing::warn!(error = %err, "dropping inbound record");
                dropped.get_or_insert(err);
            }
        }

        if self.renegotiating && !self.engine.is_renegotiating() {
            self.renegotiating = false;
            self.emit(Event::SecureRenegotiationCompleted)?;
        }
        dropped.map_or(Ok(()), Err)
    }

    fn handle_record(&mut self) -> Result<()> {
        // moved out so the decoded message can borrow it across `&mut self` calls
        let record = std::mem::replace(&mut self.record_buf, PacketBuffer::new(0));
        let result = Message::decode(record.as_slice())
            .map_err(Error::from)
            .and_then(|msg| self.dispatch(msg));
        self.record_buf = record;
        result
    }

    fn dispatch(&mut self, msg: Message<'_>) -> Result<()> {
        let client = self.role == Role::Client;
        let link_up = self.state.is_link_up();

        match msg {
            Message::Noop => Ok(()),
            Message::Ping { id } if !client && link_up => self.send_message(&Message::Pong { id }),
            Message::Pong { .. } if client && link_up => self.emit(Event::Pong),
            Message::Auth(auth) if !client && self.state == ConnState::Authenticating => {
                self.on_auth(auth)
            }
            Message::AuthResponse(status) if client && self.state == ConnState::Authenticating => {
                self.on_auth_response(status)
            }
            Message::Config(config) if client && self.state == ConnState::LinkUp => {
                self.on_config(config)
            }
            Message::ServerConfig(data) if client && link_up => self
                .host
                .server_config(data)
                .map_err(|e| Error::callback("server_config", e)),
            Message::Data(packet) if link_up => self.on_data(packet),
            Message::Goodbye => {
                tracing::debug!(session = %self.ids.active(), "peer said goodbye");
                self.teardown()
            }
            Message::SessionResponse(id) if client && link_up => self.on_session_response(id),
            other => Err(Error::UnexpectedMessage {
                message: other.name(),
                state: self.state,
            }),
        }
    }

    fn on_auth(&mut self, auth: AuthRequest<'_>) -> Result<()> {
        let accepted = match auth {
            AuthRequest::UserPass { username, password } => {
                self.host.authenticate_user_pass(username, password)
            }
            AuthRequest::Buffer { auth_type, data } => self.host.authenticate_buffer(auth_type, data),
        };

        if !accepted {
            tracing::warn!(session = %self.ids.active(), "authentication rejected");
            self.send_message(&Message::AuthResponse(AuthStatus::Rejected))?;
            self.teardown()?;
            return Err(Error::AccessDenied);
        }

        self.send_message(&Message::AuthResponse(AuthStatus::Success))?;
        self.set_state(ConnState::LinkUp)?;

        let config = self
            .host
            .populate_network_config()
            .map_err(|e| Error::callback("populate_network_config", e))?;
        config.validate()?;
        self.send_message(&Message::Config(config))?;
        self.network_config = Some(config);

        self.set_state(ConnState::Configuring)?;
        self.set_state(ConnState::Online)
    }

    fn on_auth_response(&mut self, status: AuthStatus) -> Result<()> {
        match status {
            AuthStatus::Success => self.set_state(ConnState::LinkUp),
            AuthStatus::Rejected => {
                tracing::warn!("server rejected credentials");
                self.teardown()?;
                Err(Error::AccessDenied)
            }
        }
    }

    fn on_config(&mut self, config: NetworkConfig) -> Result<()> {
        self.set_state(ConnState::Configuring)?;
        self.network_config = Some(config);
        self.host
            .network_config(&config)
            .map_err(|e| Error::callback("network_config", e))?;
        self.set_state(ConnState::Online)
    }

    fn on_data(&mut self, packet: &[u8]) -> Result<()> {
        self.packet_buf.fill(packet)?;
        let (storage, len) = self.packet_buf.parts_mut();
        self.inside.ingress(storage, len)?;

        // checked after the chain: a plugin may have expanded the packet
        let mtu = usize::from(self.config.mtu());
        if self.packet_buf.len() > mtu {
            tracing::warn!(len = self.packet_buf.len(), mtu, "dropping inbound packet above tunnel mtu");
            return Err(Error::PacketTooLarge {
                len: self.packet_buf.len(),
                max: mtu,
            });
        }
        self.host
            .inside_write(self.packet_buf.as_slice())
            .map_err(|e| Error::callback("inside_write", e))
    }

    fn on_session_response(&mut self, id: SessionId) -> Result<()> {
        if self.config.roaming_disabled() {
            tracing::debug!(session = %id, "ignoring session rotation, roaming disabled");
            return Ok(());
        }
        let old = self.ids.active();
        self.ids.reset(id);
        self.retiring = Some(old);
        self.bridge.set_session_id(id);
        tracing::debug!(old = %old, session = %id, "adopted rotated session id");

        // the first record under the new id is the acknowledgement
        self.send_message(&Message::Noop)
    }

    fn send_auth(&mut self) -> Result<()> {
        let msg = match self.config.auth_buffer() {
            Some((auth_type, data)) => AuthRequest::Buffer { auth_type, data },
            None => AuthRequest::UserPass {
                username: self.config.username().unwrap_or_default(),
                password: self.config.password().unwrap_or_default(),
            },
        };
        let len = Message::Auth(msg).encode(self.send_buf.storage_mut())?;
        let result = self.write_record(len);
        self.send_buf.storage_mut()[..len].zeroize();
        result
    }

    fn send_message(&mut self, msg: &Message<'_>) -> Result<()> {
        let len = msg.encode(self.send_buf.storage_mut())?;
        self.write_record(len)
    }

    fn write_record(&mut self, len: usize) -> Result<()> {
        self.send_buf.set_len(len)?;
        let mut io = BridgeIo::new(&mut self.bridge, &mut self.host);
        self.engine.write(&mut io, self.send_buf.as_slice())?;
        Ok(())
    }

    /// Zero-fill the encoded data message in `send_buf` per the padding policy.
    fn pad(&mut self, len: usize) -> usize {
        let target = match self.config.padding() {
            PaddingPolicy::None => len,
            PaddingPolicy::Pad450 => len.max(PADDING_450),
            PaddingPolicy::Full => len.max(usize::from(self.config.mtu())),
        }
        .min(self.send_buf.capacity());
        self.send_buf.storage_mut()[len..target].fill(0);
        target
    }

    fn teardown(&mut self) -> Result<()> {
        let link_up = self.state.is_link_up();
        let notified = self.set_state(ConnState::Disconnecting);

        if link_up {
            if let Err(e) = self.send_message(&Message::Goodbye) {
                tracing::debug!(error = %e, "goodbye not sent");
            }
        }
        let mut io = BridgeIo::new(&mut self.bridge, &mut self.host);
        if let Err(e) = self.engine.shutdown(&mut io) {
            tracing::debug!(error = %e, "engine shutdown failed");
        }
        self.engine.reset();

        self.inside.clear();
        self.bridge.reset();
        self.record_buf.clear();
        self.send_buf.clear();
        self.packet_buf.clear();
        self.renegotiating = false;
        self.retiring = None;

        let closed = self.set_state(ConnState::Disconnected);
        notified.and(closed)
    }
}

impl<E, H> std::fmt::Debug for Connection<E, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("session", &self.ids)
            .field("carrier", &self.bridge.carrier())
            .finish_non_exhaustive()
    }
}

/// Check that `packet` is IPv4 and report whether it is a fragment.
fn is_ipv4_fragment(packet: &[u8]) -> Result<bool> {
    let version = packet[0] >> 4;
    if version != 4 {
        return Err(Error::UnsupportedPacketType(version));
    }
    if packet.len() < IPV4_HEADER_SIZE {
        return Err(Error::PacketTooSmall {
            len: packet.len(),
            min: IPV4_HEADER_SIZE,
        });
    }
    let flags = u16::from_be_bytes([packet[6], packet[7]]);
    Ok(flags & (IPV4_FLAG_MORE_FRAGMENTS | IPV4_FRAGMENT_OFFSET_MASK) != 0)
}
