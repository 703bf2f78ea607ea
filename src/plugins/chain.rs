//! Ordered, reversible packet transforms.
//!
//! Registration order defines an onion: ingress walks the chain head to
//! tail, egress walks it tail to head, so the outermost plugin is the first
//! applied on the way in and the last applied on the way out.

use thiserror::Error;

/// Outcome of a single transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginVerdict {
    /// Continue with the next plugin.
    Continue,
    /// Discard the packet without error; skip the rest of the chain.
    Drop,
    /// Hard processing error; skip the rest of the chain.
    Fail,
}

/// Why a chain pass stopped early.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PluginError {
    /// A plugin dropped the packet.
    #[error("dropped by plugin")]
    Drop,
    /// A plugin failed.
    #[error("plugin failed")]
    Failed,
    /// A plugin reported a length beyond the buffer.
    #[error("plugin overflowed buffer: {len} > {capacity}")]
    Overflow {
        /// Reported length.
        len: usize,
        /// Buffer capacity.
        capacity: usize,
    },
}

/// A packet transform.
///
/// `packet` is the whole backing buffer (its length is the capacity);
/// the logical packet is `packet[..*len]`. Transforms may rewrite the
/// bytes in place and grow or shrink `len` up to the capacity.
/// Either direction may be left as the default pass-through.
pub trait Plugin {
    /// Transform a packet arriving from the network.
    fn ingress(&mut self, packet: &mut [u8], len: &mut usize) -> PluginVerdict {
        let _ = (packet, len);
        PluginVerdict::Continue
    }

    /// Transform a packet leaving for the network.
    fn egress(&mut self, packet: &mut [u8], len: &mut usize) -> PluginVerdict {
        let _ = (packet, len);
        PluginVerdict::Continue
    }
}

impl<P: Plugin + ?Sized> Plugin for Box<P> {
    fn ingress(&mut self, packet: &mut [u8], len: &mut usize) -> PluginVerdict {
        (**self).ingress(packet, len)
    }

    fn egress(&mut self, packet: &mut [u8], len: &mut usize) -> PluginVerdict {
        (**self).egress(packet, len)
    }
}

/// Append-only sequence of plugins.
#[derive(Default)]
pub struct PluginChain {
    plugins: Vec<Box<dyn Plugin>>,
}

impl std::fmt::Debug for PluginChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginChain")
            .field("len", &self.plugins.len())
            .finish()
    }
}

impl PluginChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin to the tail.
    pub fn register(&mut self, plugin: impl Plugin + 'static) {
        self.plugins.push(Box::new(plugin));
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if the chain has no plugins.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Remove every plugin.
    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    /// Run every ingress transform, head to tail.
    pub fn ingress(&mut self, packet: &mut [u8], len: &mut usize) -> Result<(), PluginError> {
        for plugin in self.plugins.iter_mut() {
            apply(plugin.ingress(packet, len), packet.len(), *len)?;
        }
        Ok(())
    }

    /// Run every egress transform, tail to head.
    pub fn egress(&mut self, packet: &mut [u8], len: &mut usize) -> Result<(), PluginError> {
        for plugin in self.plugins.iter_mut().rev() {
            apply(plugin.egress(packet, len), packet.len(), *len)?;
        }
        Ok(())
    }
}

fn apply(verdict: PluginVerdict, capacity: usize, len: usize) -> Result<(), PluginError> {
    match verdict {
        PluginVerdict::Continue if len > capacity => Err(PluginError::Overflow { len, capacity }),
        PluginVerdict::Continue => Ok(()),
        PluginVerdict::Drop => Err(PluginError::Drop),
        PluginVerdict::Fail => Err(PluginError::Failed),
    }
}
