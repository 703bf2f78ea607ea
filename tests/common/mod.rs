//! Shared fixtures: an unencrypted loopback secure channel and a host that
//! records every callback.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;

use helium_core::config::ConnectionConfig;
use helium_core::core::{
    EngineError, HandshakeStatus, Host, HostError, HostResult, RecordIo, SecureChannel,
};
use helium_core::session::{ConnState, Connection, Event, NetworkConfig, Role};
use helium_core::transport::Carrier;

// ---- loopback engine ---------------------------------------------------------

const HELLO: u8 = 1;
const HELLO_ACK: u8 = 2;
const APP: u8 = 3;
const RENEG: u8 = 4;
const RENEG_ACK: u8 = 5;
const CLOSE: u8 = 6;

/// Record layout: `[kind][seq u32][len u16][payload]`.
const RECORD_HEADER: usize = 1 + 4 + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    Idle,
    HelloSent,
    Done,
}

/// A secure channel that frames records but does not encrypt them.
///
/// Duplicate records (same sequence number) are discarded, so aggressive
/// repeats are harmless. On datagram carriers a record never spans two
/// datagrams, so unparseable leftovers are thrown away.
#[derive(Debug)]
pub struct LoopbackEngine {
    role: Role,
    carrier: Carrier,
    handshake: Handshake,
    inbound: Vec<u8>,
    seen: HashSet<u32>,
    next_seq: u32,
    hello: Option<Vec<u8>>,
    renegotiating: bool,
    /// Fail the next `read` as if the record were corrupt.
    pub reject_next_read: bool,
    pub retransmits: usize,
    pub resets: usize,
}

impl LoopbackEngine {
    pub fn new(role: Role, carrier: Carrier) -> Self {
        Self {
            role,
            carrier,
            handshake: Handshake::Idle,
            inbound: Vec::new(),
            seen: HashSet::new(),
            next_seq: 0,
            hello: None,
            renegotiating: false,
            reject_next_read: false,
            retransmits: 0,
            resets: 0,
        }
    }

    fn send(&mut self, io: &mut dyn RecordIo, kind: u8, payload: &[u8]) -> Result<Vec<u8>, EngineError> {
        self.next_seq += 1;
        let mut record = Vec::with_capacity(RECORD_HEADER + payload.len());
        record.push(kind);
        record.extend_from_slice(&self.next_seq.to_be_bytes());
        record.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        record.extend_from_slice(payload);
        io.write(&record)?;
        Ok(record)
    }

    fn pull(&mut self, io: &mut dyn RecordIo) -> Result<(), EngineError> {
        let mut buf = [0u8; 4096];
        loop {
            match io.read(&mut buf) {
                Ok(0) => continue,
                Ok(n) => self.inbound.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(EngineError::Io(e)),
            }
        }
    }

    fn next_record(&mut self, io: &mut dyn RecordIo) -> Result<Option<(u8, Vec<u8>)>, EngineError> {
        self.pull(io)?;
        loop {
            let complete = self.inbound.len() >= RECORD_HEADER
                && self.inbound.len()
                    >= RECORD_HEADER + usize::from(u16::from_be_bytes([self.inbound[5], self.inbound[6]]));
            if !complete {
                if self.carrier == Carrier::Datagram {
                    self.inbound.clear();
                }
                return Ok(None);
            }
            let len = usize::from(u16::from_be_bytes([self.inbound[5], self.inbound[6]]));
            let record: Vec<u8> = self.inbound.drain(..RECORD_HEADER + len).collect();
            let seq = u32::from_be_bytes([record[1], record[2], record[3], record[4]]);
            if !self.seen.insert(seq) {
                continue;
            }
            return Ok(Some((record[0], record[RECORD_HEADER..].to_vec())));
        }
    }
}

impl SecureChannel for LoopbackEngine {
    fn handshake(&mut self, io: &mut dyn RecordIo) -> Result<HandshakeStatus, EngineError> {
        match (self.role, self.handshake) {
            (_, Handshake::Done) => return Ok(HandshakeStatus::Complete),
            (Role::Client, Handshake::Idle) => {
                self.hello = Some(self.send(io, HELLO, b"client-hello")?);
                self.handshake = Handshake::HelloSent;
                return Ok(HandshakeStatus::InProgress);
            }
            _ => {}
        }

        while let Some((kind, _)) = self.next_record(io)? {
            match (self.role, kind) {
                (Role::Server, HELLO) => {
                    self.send(io, HELLO_ACK, b"server-hello")?;
                    self.handshake = Handshake::Done;
                    return Ok(HandshakeStatus::Complete);
                }
                (Role::Client, HELLO_ACK) => {
                    self.hello = None;
                    self.handshake = Handshake::Done;
                    return Ok(HandshakeStatus::Complete);
                }
                _ => {}
            }
        }
        Err(EngineError::WantRead)
    }

    fn read(&mut self, io: &mut dyn RecordIo, buf: &mut [u8]) -> Result<usize, EngineError> {
        if std::mem::take(&mut self.reject_next_read) {
            return Err(EngineError::NonFatal("bad record mac".into()));
        }
        while let Some((kind, payload)) = self.next_record(io)? {
            match kind {
                APP => {
                    buf[..payload.len()].copy_from_slice(&payload);
                    return Ok(payload.len());
                }
                RENEG => {
                    self.send(io, RENEG_ACK, &[])?;
                }
                RENEG_ACK => self.renegotiating = false,
                CLOSE => return Err(EngineError::Closed),
                _ => {}
            }
        }
        Err(EngineError::WantRead)
    }

    fn write(&mut self, io: &mut dyn RecordIo, data: &[u8]) -> Result<usize, EngineError> {
        self.send(io, APP, data)?;
        Ok(data.len())
    }

    fn renegotiate(&mut self, io: &mut dyn RecordIo) -> Result<(), EngineError> {
        self.send(io, RENEG, &[])?;
        self.renegotiating = true;
        Ok(())
    }

    fn is_renegotiating(&self) -> bool {
        self.renegotiating
    }

    fn shutdown(&mut self, io: &mut dyn RecordIo) -> Result<(), EngineError> {
        self.send(io, CLOSE, &[])?;
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        None
    }

    fn handle_timeout(&mut self, io: &mut dyn RecordIo) -> Result<(), EngineError> {
        if let Some(hello) = self.hello.clone() {
            io.write(&hello)?;
            self.retransmits += 1;
        }
        Ok(())
    }

    fn reset(&mut self) {
        let resets = self.resets + 1;
        let retransmits = self.retransmits;
        *self = Self::new(self.role, self.carrier);
        self.resets = resets;
        self.retransmits = retransmits;
    }
}

// ---- recording host ------------------------------------------------------------

/// Host that records every callback.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub states: Vec<ConnState>,
    pub outbox: Vec<Vec<u8>>,
    pub delivered: Vec<Vec<u8>>,
    pub events: Vec<Event>,
    pub nudges: Vec<Duration>,
    pub network_configs: Vec<NetworkConfig>,
    pub server_configs: Vec<Vec<u8>>,
    pub fail_state_changes: bool,
}

impl RecordingHost {
    pub fn take_outbox(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbox)
    }
}

pub fn tunnel_config() -> NetworkConfig {
    NetworkConfig {
        local_ip: Ipv4Addr::new(10, 125, 0, 2),
        peer_ip: Ipv4Addr::new(10, 125, 0, 1),
        dns_ip: Ipv4Addr::new(10, 125, 0, 1),
        mtu: 1350,
    }
}

impl Host for RecordingHost {
    fn state_changed(&mut self, state: ConnState) -> HostResult {
        self.states.push(state);
        if self.fail_state_changes {
            return Err(HostError::new("state handler failed"));
        }
        Ok(())
    }

    fn inside_write(&mut self, packet: &[u8]) -> HostResult {
        self.delivered.push(packet.to_vec());
        Ok(())
    }

    fn outside_write(&mut self, packet: &[u8]) -> HostResult {
        self.outbox.push(packet.to_vec());
        Ok(())
    }

    fn nudge_time(&mut self, timeout: Duration) -> HostResult {
        self.nudges.push(timeout);
        Ok(())
    }

    fn network_config(&mut self, config: &NetworkConfig) -> HostResult {
        self.network_configs.push(*config);
        Ok(())
    }

    fn server_config(&mut self, data: &[u8]) -> HostResult {
        self.server_configs.push(data.to_vec());
        Ok(())
    }

    fn event(&mut self, event: Event) -> HostResult {
        self.events.push(event);
        Ok(())
    }

    fn authenticate_user_pass(&mut self, username: &str, password: &str) -> bool {
        username == "alice" && password == "hunter2"
    }

    fn authenticate_buffer(&mut self, auth_type: u8, buffer: &[u8]) -> bool {
        auth_type == 7 && buffer == b"token"
    }

    fn populate_network_config(&mut self) -> HostResult<NetworkConfig> {
        Ok(tunnel_config())
    }
}

// ---- pairs ---------------------------------------------------------------------

pub type TestConnection = Connection<LoopbackEngine, RecordingHost>;

pub fn client_config(carrier: Carrier) -> ConnectionConfig {
    let mut config = ConnectionConfig::new();
    config.set_carrier(carrier);
    config.set_username("alice").unwrap();
    config.set_password("hunter2").unwrap();
    config
}

pub fn server_config(carrier: Carrier) -> ConnectionConfig {
    let mut config = ConnectionConfig::new();
    config.set_carrier(carrier);
    config
}

pub fn client_with(config: ConnectionConfig) -> TestConnection {
    let engine = LoopbackEngine::new(Role::Client, config.carrier());
    Connection::client(config, engine, RecordingHost::default()).unwrap()
}

pub fn server_with(config: ConnectionConfig) -> TestConnection {
    let engine = LoopbackEngine::new(Role::Server, config.carrier());
    Connection::server(config, engine, RecordingHost::default()).unwrap()
}

pub fn pair(carrier: Carrier) -> (TestConnection, TestConnection) {
    (
        client_with(client_config(carrier)),
        server_with(server_config(carrier)),
    )
}

/// Deliver everything `from` has written to `to`.
///
/// Datagrams are delivered one by one; stream writes are concatenated into
/// a single run.
pub fn pump(from: &mut TestConnection, to: &mut TestConnection) -> Vec<helium_core::Result<()>> {
    let writes = from.host_mut().take_outbox();
    if writes.is_empty() {
        return Vec::new();
    }
    match from.config().carrier() {
        Carrier::Datagram => writes.iter().map(|w| to.outside_data_received(w)).collect(),
        Carrier::Stream => vec![to.outside_data_received(&writes.concat())],
    }
}

/// Run the handshake until both ends are ONLINE.
pub fn establish(client: &mut TestConnection, server: &mut TestConnection) {
    server.accept().unwrap();
    client.connect().unwrap();
    finish_handshake(client, server);
}

/// Pump a handshake already started by `accept` and `connect` until both
/// ends are ONLINE.
pub fn finish_handshake(client: &mut TestConnection, server: &mut TestConnection) {
    for _ in 0..8 {
        for result in pump(client, server) {
            result.unwrap();
        }
        for result in pump(server, client) {
            result.unwrap();
        }
        if client.state() == ConnState::Online && server.state() == ConnState::Online {
            return;
        }
    }
    panic!(
        "handshake did not complete: client {}, server {}",
        client.state(),
        server.state()
    );
}

/// A minimal IPv4 packet of `len` bytes.
pub fn ipv4_packet(len: usize, fill: u8) -> Vec<u8> {
    let mut packet = vec![fill; len];
    packet[0] = 0x45;
    packet[6] = 0x40; // DF
    packet[7] = 0x00;
    packet
}
