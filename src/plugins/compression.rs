//! Compression plugin
//!
//! zstd compression of tunnelled packets. Register it on the inside chain of
//! both peers.

use super::chain::{Plugin, PluginVerdict};

/// Minimum packet size to attempt compression
pub const MIN_COMPRESS_SIZE: usize = 64;

/// Default zstd compression level (1-22, higher = smaller but slower)
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

const TAG_RAW: u8 = 0x00;
const TAG_ZSTD: u8 = 0x01;

/// Compression configuration
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Minimum size to attempt compression
    pub min_size: usize,
    /// Compression level (1-22)
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_size: MIN_COMPRESS_SIZE,
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Packet compressor.
///
/// Egress prefixes one tag byte and compresses the packet when that makes it
/// smaller. Ingress reverses it. Corrupt input is dropped.
#[derive(Debug, Clone, Default)]
pub struct CompressionPlugin {
    config: CompressionConfig,
    scratch: Vec<u8>,
}

impl CompressionPlugin {
    /// Create a compressor with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compressor with custom config
    pub fn with_config(config: CompressionConfig) -> Self {
        Self {
            config,
            scratch: Vec::new(),
        }
    }

    /// Set compression level
    pub fn set_level(&mut self, level: i32) {
        self.config.level = level.clamp(1, 22);
    }

    /// Get compression level
    pub fn level(&self) -> i32 {
        self.config.level
    }

    fn store_raw(packet: &mut [u8], len: &mut usize) -> PluginVerdict {
        if *len + 1 > packet.len() {
            return PluginVerdict::Fail;
        }
        packet.copy_within(0..*len, 1);
        packet[0] = TAG_RAW;
        *len += 1;
        PluginVerdict::Continue
    }
}

impl Plugin for CompressionPlugin {
    fn egress(&mut self, packet: &mut [u8], len: &mut usize) -> PluginVerdict {
        if *len < self.config.min_size {
            return Self::store_raw(packet, len);
        }

        self.scratch.resize(packet.len(), 0);
        let compressed =
            match zstd::bulk::compress_to_buffer(&packet[..*len], &mut self.scratch, self.config.level) {
                Ok(n) => n,
                // does not fit the buffer, so it cannot be smaller
                Err(_) => return Self::store_raw(packet, len),
            };

        // only use compression if it actually saves space
        if compressed + 1 >= *len {
            return Self::store_raw(packet, len);
        }

        packet[0] = TAG_ZSTD;
        packet[1..=compressed].copy_from_slice(&self.scratch[..compressed]);
        *len = compressed + 1;
        PluginVerdict::Continue
    }

    fn ingress(&mut self, packet: &mut [u8], len: &mut usize) -> PluginVerdict {
        if *len == 0 {
            return PluginVerdict::Drop;
        }

        match packet[0] {
            TAG_RAW => {
                packet.copy_within(1..*len, 0);
                *len -= 1;
                PluginVerdict::Continue
            }
            TAG_ZSTD => {
                self.scratch.resize(packet.len(), 0);
                match zstd::bulk::decompress_to_buffer(&packet[1..*len], &mut self.scratch) {
                    Ok(n) => {
                        packet[..n].copy_from_slice(&self.scratch[..n]);
                        *len = n;
                        PluginVerdict::Continue
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "dropping undecompressible packet");
                        PluginVerdict::Drop
                    }
                }
            }
            tag => {
                tracing::debug!(tag, "dropping packet with unknown compression tag");
                PluginVerdict::Drop
            }
        }
    }
}
