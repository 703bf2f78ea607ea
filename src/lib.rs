//! # Helium Protocol Core
//!
//! The session layer of a VPN tunnel: a D/TLS-style secure channel carried
//! over datagrams or a byte stream, with a fixed wire header, session-id
//! roaming and reversible packet plugins.
//!
//! The core is sans-I/O. It owns no sockets, threads or timers:
//!
//! - the host hands it inbound bytes and outbound packets,
//! - it calls back into the host ([`Host`](crate::core::Host)) to emit bytes, deliver
//!   packets and report state,
//! - the cryptographic engine ([`SecureChannel`](crate::core::SecureChannel)) is supplied by the
//!   host and driven through the transport bridge.
//!
//! ## Feature Flags
//!
//! - `compression` (default): zstd [`plugins::CompressionPlugin`]
//! - `serde`: configuration (de)serialization and TOML loading
//!
//! ## Modules
//!
//! - [`core`]: constants, errors and collaborator traits
//! - [`config`]: validated per-connection configuration
//! - [`transport`]: wire header, staging and the engine I/O bridge
//! - [`plugins`]: packet plugin chains
//! - [`session`]: the connection state machine
//! - [`server`]: routing datagrams to server connections
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use helium_core::prelude::*;
//!
//! let mut config = ConnectionConfig::new();
//! config.set_username("alice")?.set_password("hunter2")?;
//!
//! let mut conn = Connection::client(config, my_engine, my_host)?;
//! conn.connect()?;
//!
//! // socket readable:
//! conn.outside_data_received(&datagram)?;
//! // tun readable, once ONLINE:
//! conn.send_packet(&ip_packet)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod core;
pub mod plugins;
pub mod server;
pub mod session;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ConnectionConfig, PaddingPolicy};
    pub use crate::core::{
        EngineError, Error, HandshakeStatus, Host, HostError, HostResult, RecordIo, Result,
        SecureChannel,
    };
    pub use crate::plugins::{Plugin, PluginChain, PluginVerdict};
    pub use crate::server::SessionTable;
    pub use crate::session::{ConnState, Connection, Event, NetworkConfig, Role, SessionId};
    pub use crate::transport::{Carrier, ProtocolVersion};

    #[cfg(feature = "compression")]
    pub use crate::plugins::CompressionPlugin;
}

pub use crate::config::ConnectionConfig;
pub use crate::core::{Error, Host, Result, SecureChannel};
pub use crate::session::{ConnState, Connection, Role, SessionId};
