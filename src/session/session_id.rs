//! Session identifiers.

use rand::{RngCore, rngs::OsRng};

use crate::core::SESSION_ID_SIZE;

/// Session ID - 64-bit random identifier, independent of carrier addressing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Placeholder carried by a client before the server has issued an id.
    pub const EMPTY: Self = Self(0);

    /// Generate a new random session ID. Never returns [`SessionId::EMPTY`].
    pub fn generate() -> Self {
        loop {
            let id = OsRng.next_u64();
            if id != 0 {
                return Self(id);
            }
        }
    }

    /// Create from a raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Create from big-endian bytes.
    pub fn from_bytes(bytes: [u8; SESSION_ID_SIZE]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Big-endian wire representation.
    pub fn to_bytes(self) -> [u8; SESSION_ID_SIZE] {
        self.0.to_be_bytes()
    }

    /// The raw value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Check if this is the placeholder id.
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Active and pending session ids of one connection.
///
/// The pending id exists only while a rotation is waiting for the peer to
/// acknowledge it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionIds {
    active: SessionId,
    pending: Option<SessionId>,
}

impl SessionIds {
    /// Start with the given active id.
    pub fn new(active: SessionId) -> Self {
        Self {
            active,
            pending: None,
        }
    }

    /// The active id.
    pub fn active(&self) -> SessionId {
        self.active
    }

    /// The pending id, if a rotation is in flight.
    pub fn pending(&self) -> Option<SessionId> {
        self.pending
    }

    /// Replace the active id and forget any pending one.
    pub fn reset(&mut self, active: SessionId) {
        self.active = active;
        self.pending = None;
    }

    /// Begin a rotation, returning the new pending id.
    pub fn rotate(&mut self) -> SessionId {
        let mut next = SessionId::generate();
        while next == self.active {
            next = SessionId::generate();
        }
        self.pending = Some(next);
        next
    }

    /// Check if `id` is the active or the pending id.
    pub fn matches(&self, id: SessionId) -> bool {
        id == self.active || self.pending == Some(id)
    }

    /// Promote the pending id if `id` is it. Returns true on promotion.
    pub fn acknowledge(&mut self, id: SessionId) -> bool {
        if self.pending == Some(id) {
            self.active = id;
            self.pending = None;
            true
        } else {
            false
        }
    }
}
