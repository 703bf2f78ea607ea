//! Session routing table.
//!
//! A server multiplexes many connections over one socket. [`SessionTable`]
//! maps the session id in each inbound header to the host's handle for the
//! owning connection, so a datagram can be routed without touching any
//! connection state.
//!
//! Clients send [`SessionId::EMPTY`] until they hear from the server. Such
//! datagrams are never routed here; the host matches them by carrier
//! address and calls [`Connection::accept`](crate::session::Connection::accept).

use std::collections::HashMap;
use std::hash::Hash;

use crate::core::{Error, Result};
use crate::session::SessionId;
use crate::transport::peek_session_id;

/// Session id to connection-handle map.
#[derive(Debug, Clone)]
pub struct SessionTable<K> {
    sessions: HashMap<SessionId, K>,
}

impl<K> Default for SessionTable<K> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> SessionTable<K> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of routed ids (active and pending).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Route `id` to `key`. Returns the key previously routed there.
    pub fn insert(&mut self, id: SessionId, key: K) -> Option<K> {
        tracing::trace!(session = %id, "routing session");
        self.sessions.insert(id, key)
    }

    /// Look up the handle for `id`.
    pub fn get(&self, id: SessionId) -> Option<&K> {
        self.sessions.get(&id)
    }

    /// Route a raw datagram by the session id in its header.
    ///
    /// Reads only the header; nothing else is validated.
    pub fn route(&self, datagram: &[u8]) -> Result<K> {
        let id = peek_session_id(datagram)?;
        self.sessions.get(&id).cloned().ok_or_else(|| {
            tracing::warn!(session = %id, "no connection for session");
            Error::UnknownSession(id)
        })
    }

    /// Replace `old` with `new` once a rotation is acknowledged.
    ///
    /// Any route already added for `new` is kept; the one for `old` is removed.
    pub fn promote(&mut self, old: SessionId, new: SessionId) {
        if let Some(key) = self.sessions.remove(&old) {
            self.sessions.entry(new).or_insert(key);
        }
    }

    /// Remove every id routed to `key`.
    pub fn remove(&mut self, key: &K) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, k| k != key);
        before - self.sessions.len()
    }
}
