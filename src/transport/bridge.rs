//! Transport I/O bridge.
//!
//! The secure-channel engine expects a byte stream it can read from and
//! write to. The host moves discrete datagrams (or cut runs of a stream).
//! [`Bridge`] holds the per-connection transport state and [`BridgeIo`]
//! lends it to the engine as a [`std::io::Read`] + [`std::io::Write`] pair
//! for the duration of one engine call.
//!
//! On datagram carriers every outbound record is framed with the wire
//! header and passed through the outside plugin chain. While the
//! connection is not online, or when aggressive mode is on, each record is
//! written three times.

use std::io;

use super::frame::{self, ProtocolVersion, WireHeader};
use super::staging::{Carrier, InboundStage, PacketBuffer};
use crate::core::{AGGRESSIVE_REPEATS, Error, Host, MAX_WIRE_MTU, Result, WIRE_HEADER_SIZE};
use crate::plugins::{PluginChain, PluginError};
use crate::session::SessionId;

/// Per-connection transport state.
#[derive(Debug)]
pub struct Bridge {
    stage: InboundStage,
    write_buf: PacketBuffer,
    outside: PluginChain,
    session_id: SessionId,
    version: ProtocolVersion,
    request_aggressive: bool,
    aggressive: bool,
    online: bool,
}

impl Bridge {
    /// Create a bridge for the carrier.
    pub fn new(carrier: Carrier, version: ProtocolVersion) -> Self {
        Self {
            stage: InboundStage::new(carrier, MAX_WIRE_MTU),
            write_buf: PacketBuffer::new(MAX_WIRE_MTU),
            outside: PluginChain::new(),
            session_id: SessionId::EMPTY,
            version,
            request_aggressive: false,
            aggressive: false,
            online: false,
        }
    }

    /// The carrier kind.
    pub fn carrier(&self) -> Carrier {
        self.stage.carrier()
    }

    /// Session id stamped on outbound headers.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Change the session id stamped on outbound headers.
    pub fn set_session_id(&mut self, id: SessionId) {
        self.session_id = id;
    }

    /// Check if every record is repeated.
    pub fn is_aggressive(&self) -> bool {
        self.aggressive
    }

    /// Enable or disable aggressive mode. `request` also asks the peer to do
    /// the same through the header flag.
    pub fn set_aggressive(&mut self, enabled: bool, request: bool) {
        self.aggressive = enabled;
        self.request_aggressive = request;
    }

    /// Tell the bridge whether the connection is online.
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// The outside plugin chain.
    pub fn outside_chain(&mut self) -> &mut PluginChain {
        &mut self.outside
    }

    /// Accept a raw datagram: outside ingress chain, then header decode.
    ///
    /// The record is held but not yet presented to the read hook; call
    /// [`Bridge::stage_record`] once the session id has been checked.
    pub fn accept_datagram(&mut self, datagram: &[u8]) -> Result<WireHeader> {
        let buf = self.stage.datagram_buffer();
        buf.fill(datagram)?;

        let (storage, len) = buf.parts_mut();
        self.outside.ingress(storage, len)?;

        let header = frame::decode(buf.as_slice(), self.version.major).inspect_err(|e| {
            tracing::warn!(error = %e, len = datagram.len(), "dropping datagram with bad header");
        })?;
        Ok(header)
    }

    /// Present the record accepted by [`Bridge::accept_datagram`] to the read hook.
    pub fn stage_record(&mut self) {
        let len = self.stage.datagram_buffer().len();
        self.stage
            .stage_packet(WIRE_HEADER_SIZE, len.saturating_sub(WIRE_HEADER_SIZE));
    }

    /// Stage a run of stream bytes.
    pub fn stage_run(&mut self, run: &[u8]) -> Result<()> {
        self.stage.stage_run(run)
    }

    /// Bytes of the current stream run not yet read by the engine.
    pub fn remaining(&self) -> usize {
        self.stage.remaining()
    }

    /// Forget whatever the engine did not consume.
    ///
    /// A stream run the engine stopped reading part way is dropped with it,
    /// so the next run can be staged.
    pub fn discard_staged(&mut self) {
        let remaining = self.stage.remaining();
        if remaining != 0 {
            tracing::warn!(remaining, "discarding undrained stream bytes");
        }
        self.stage.clear();
    }

    /// Release staged data, buffered output and outside plugins.
    pub fn reset(&mut self) {
        self.stage.clear();
        self.write_buf.clear();
        self.outside.clear();
        self.session_id = SessionId::EMPTY;
        self.online = false;
    }

    fn write_datagram(&mut self, host: &mut dyn Host, record: &[u8]) -> io::Result<usize> {
        let capacity = self.write_buf.capacity();
        if record.len() + WIRE_HEADER_SIZE > capacity {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                Error::PacketTooLarge {
                    len: record.len() + WIRE_HEADER_SIZE,
                    max: capacity,
                },
            ));
        }

        let header = frame::encode(
            self.session_id,
            self.version.major,
            self.version.minor,
            self.request_aggressive,
        );
        let storage = self.write_buf.storage_mut();
        storage[..WIRE_HEADER_SIZE].copy_from_slice(&header);
        storage[WIRE_HEADER_SIZE..WIRE_HEADER_SIZE + record.len()].copy_from_slice(record);
        let mut len = WIRE_HEADER_SIZE + record.len();

        let (storage, _) = self.write_buf.parts_mut();
        match self.outside.egress(storage, &mut len) {
            Ok(()) => {}
            // the engine must not see a failure, or it would retransmit
            Err(PluginError::Drop) => {
                tracing::trace!(len = record.len(), "outbound record dropped by plugin");
                return Ok(record.len());
            }
            Err(e) => return Err(io::Error::other(Error::from(e))),
        }
        self.write_buf.set_len(len).map_err(io::Error::other)?;

        let repeats = if !self.online || self.aggressive {
            AGGRESSIVE_REPEATS
        } else {
            0
        };
        for _ in 0..=repeats {
            host.outside_write(self.write_buf.as_slice())
                .map_err(|e| io::Error::other(Error::callback("outside_write", e)))?;
        }
        tracing::trace!(len, writes = repeats + 1, session = %self.session_id, "wrote record");
        Ok(record.len())
    }
}

/// The bridge lent to the engine for one call.
pub struct BridgeIo<'a> {
    bridge: &'a mut Bridge,
    host: &'a mut dyn Host,
}

impl<'a> BridgeIo<'a> {
    /// Pair the bridge with the host that receives outbound bytes.
    pub fn new(bridge: &'a mut Bridge, host: &'a mut dyn Host) -> Self {
        Self { bridge, host }
    }
}

impl io::Read for BridgeIo<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.bridge.stage.read(buf)
    }
}

impl io::Write for BridgeIo<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.bridge.carrier() {
            Carrier::Datagram => self.bridge.write_datagram(&mut *self.host, buf),
            Carrier::Stream => {
                self.host
                    .outside_write(buf)
                    .map_err(|e| io::Error::other(Error::callback("outside_write", e)))?;
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
