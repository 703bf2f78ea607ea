//! Packet buffers and inbound staging.
//!
//! The host hands the core one inbound unit per call: a whole datagram, or
//! an arbitrary run of bytes cut from a stream. The unit is staged here and
//! the engine pulls it back out through the bridge read hook.
//!
//! Datagrams are all-or-nothing: presented once, in full, or dropped if the
//! engine's buffer is too small. Stream runs are drained in engine-chosen
//! chunks until exhausted.

use std::io;

use crate::core::{Error, Result};

/// Carrier kind, fixed for the lifetime of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Carrier {
    /// Message-oriented carrier (UDP). One call, one record.
    #[default]
    Datagram,
    /// Byte-stream carrier (TCP). No inherent framing.
    Stream,
}

/// Fixed-capacity byte buffer reused across calls.
#[derive(Debug, Clone)]
pub struct PacketBuffer {
    data: Box<[u8]>,
    len: usize,
    has_data: bool,
}

impl PacketBuffer {
    /// Allocate a buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            has_data: false,
        }
    }

    /// Total capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Logical length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the logical length is zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the buffer holds a packet.
    pub fn has_data(&self) -> bool {
        self.has_data
    }

    /// The logical contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The full backing storage, for in-place transforms.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Split into the full backing storage and the logical length.
    pub fn parts_mut(&mut self) -> (&mut [u8], &mut usize) {
        (&mut self.data, &mut self.len)
    }

    /// Copy `packet` in, replacing the contents.
    pub fn fill(&mut self, packet: &[u8]) -> Result<()> {
        if packet.len() > self.capacity() {
            return Err(Error::PacketTooLarge {
                len: packet.len(),
                max: self.capacity(),
            });
        }
        self.data[..packet.len()].copy_from_slice(packet);
        self.len = packet.len();
        self.has_data = true;
        Ok(())
    }

    /// Set the logical length after writing into [`PacketBuffer::storage_mut`].
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(Error::PluginOverflow {
                len,
                capacity: self.capacity(),
            });
        }
        self.len = len;
        self.has_data = true;
        Ok(())
    }

    /// Forget the contents. The storage is kept.
    pub fn clear(&mut self) {
        self.len = 0;
        self.has_data = false;
    }
}

/// What the read hook will present next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staged {
    /// Nothing staged, or the staged unit was consumed.
    Empty,
    /// A whole datagram at `offset..offset + len` of the datagram buffer.
    Packet { offset: usize, len: usize },
    /// A stream run with `remaining` bytes left from `cursor`.
    Run { cursor: usize, remaining: usize },
}

/// Inbound staging area shared by the datagram and stream paths.
#[derive(Debug)]
pub struct InboundStage {
    carrier: Carrier,
    staged: Staged,
    datagram: PacketBuffer,
    stream: Vec<u8>,
}

impl InboundStage {
    /// Create a staging area for the carrier.
    pub fn new(carrier: Carrier, datagram_capacity: usize) -> Self {
        Self {
            carrier,
            staged: Staged::Empty,
            datagram: PacketBuffer::new(datagram_capacity),
            stream: Vec::new(),
        }
    }

    /// The carrier this stage serves.
    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    /// Buffer that receives raw datagrams before they are staged.
    pub fn datagram_buffer(&mut self) -> &mut PacketBuffer {
        &mut self.datagram
    }

    /// Present `len` bytes at `offset` of the datagram buffer to the read hook.
    pub fn stage_packet(&mut self, offset: usize, len: usize) {
        debug_assert!(offset + len <= self.datagram.len());
        self.staged = Staged::Packet { offset, len };
    }

    /// Stage a run of stream bytes.
    ///
    /// The previous run must have been fully drained.
    pub fn stage_run(&mut self, run: &[u8]) -> Result<()> {
        let remaining = self.remaining();
        if remaining != 0 {
            return Err(Error::StreamNotDrained { remaining });
        }
        self.stream.clear();
        self.stream.extend_from_slice(run);
        self.staged = if run.is_empty() {
            Staged::Empty
        } else {
            Staged::Run {
                cursor: 0,
                remaining: run.len(),
            }
        };
        Ok(())
    }

    /// Bytes of the current stream run not yet read.
    pub fn remaining(&self) -> usize {
        match self.staged {
            Staged::Run { remaining, .. } => remaining,
            _ => 0,
        }
    }

    /// Check if a unit is staged and unread.
    pub fn is_staged(&self) -> bool {
        self.staged != Staged::Empty
    }

    /// Drop whatever is staged.
    pub fn clear(&mut self) {
        self.staged = Staged::Empty;
        self.stream.clear();
        self.datagram.clear();
    }

    /// Read hook: move staged bytes into `dst`.
    pub fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        match self.staged {
            Staged::Empty => Err(io::ErrorKind::WouldBlock.into()),
            Staged::Packet { offset, len } => {
                self.staged = Staged::Empty;
                if len > dst.len() {
                    // message boundaries must be preserved, so never split
                    tracing::warn!(len, capacity = dst.len(), "dropping oversized staged packet");
                    return Ok(0);
                }
                dst[..len].copy_from_slice(&self.datagram.as_slice()[offset..offset + len]);
                Ok(len)
            }
            Staged::Run { cursor, remaining } => {
                let n = remaining.min(dst.len());
                dst[..n].copy_from_slice(&self.stream[cursor..cursor + n]);
                self.staged = if n == remaining {
                    Staged::Empty
                } else {
                    Staged::Run {
                        cursor: cursor + n,
                        remaining: remaining - n,
                    }
                };
                Ok(n)
            }
        }
    }
}
