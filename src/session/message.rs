//! In-tunnel messages.
//!
//! Every decrypted record carries exactly one message, opened by a one-byte
//! type. Integers are big-endian. Decoding borrows from the record buffer.
//!
//! ```text
//! +0   Type (1 byte)
//! +1   Body (type-specific)
//! ```

use std::net::Ipv4Addr;

use thiserror::Error;

use super::session_id::SessionId;
use crate::core::{MAX_MTU, MIN_MTU, SESSION_ID_SIZE};

/// Message type identifiers.
pub mod msg_type {
    /// No operation.
    pub const NOOP: u8 = 0x01;
    /// Keepalive request.
    pub const PING: u8 = 0x02;
    /// Keepalive reply.
    pub const PONG: u8 = 0x03;
    /// Client credentials.
    pub const AUTH: u8 = 0x04;
    /// Authentication verdict.
    pub const AUTH_RESPONSE: u8 = 0x05;
    /// Network configuration for the client.
    pub const CONFIG: u8 = 0x06;
    /// Opaque server configuration.
    pub const SERVER_CONFIG: u8 = 0x07;
    /// Tunnelled packet.
    pub const DATA: u8 = 0x08;
    /// Clean disconnect.
    pub const GOODBYE: u8 = 0x09;
    /// New session id issued by the server.
    pub const SESSION_RESPONSE: u8 = 0x0A;
}

const AUTH_USER_PASS: u8 = 0x01;
const AUTH_BUFFER: u8 = 0x02;

/// Errors from message decoding and encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Input is shorter than the message requires.
    #[error("message too short: expected {expected}, got {actual}")]
    TooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Unknown message type.
    #[error("unknown message type: 0x{0:02x}")]
    UnknownType(u8),

    /// Message body is malformed.
    #[error("invalid {0} message")]
    Invalid(&'static str),

    /// Output buffer is too small to hold the encoded message.
    #[error("buffer too small for encoding: need {needed}, have {available}")]
    BufferTooSmall {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        available: usize,
    },
}

/// Network configuration handed to an authenticated client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Address assigned to the client's tunnel interface.
    pub local_ip: Ipv4Addr,
    /// Address of the server end of the tunnel.
    pub peer_ip: Ipv4Addr,
    /// DNS server to use inside the tunnel.
    pub dns_ip: Ipv4Addr,
    /// Tunnel MTU.
    pub mtu: u16,
}

impl NetworkConfig {
    const WIRE_SIZE: usize = 4 + 4 + 4 + 2;

    pub(crate) fn validate(&self) -> Result<(), MessageError> {
        let mtu = usize::from(self.mtu);
        if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
            return Err(MessageError::Invalid("config"));
        }
        Ok(())
    }
}

/// Authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Credentials accepted.
    Success,
    /// Credentials rejected.
    Rejected,
}

/// Client credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthRequest<'a> {
    /// Username and password.
    UserPass {
        /// Username.
        username: &'a str,
        /// Password.
        password: &'a str,
    },
    /// Opaque token with an application-defined type.
    Buffer {
        /// Token type.
        auth_type: u8,
        /// Token bytes.
        data: &'a [u8],
    },
}

impl std::fmt::Debug for AuthRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthRequest::UserPass { username, .. } => f
                .debug_struct("UserPass")
                .field("username", username)
                .finish_non_exhaustive(),
            AuthRequest::Buffer { auth_type, data } => f
                .debug_struct("Buffer")
                .field("auth_type", auth_type)
                .field("len", &data.len())
                .finish(),
        }
    }
}

/// A decoded in-tunnel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a> {
    /// No operation.
    Noop,
    /// Keepalive request.
    Ping {
        /// Echoed in the reply.
        id: u32,
    },
    /// Keepalive reply.
    Pong {
        /// Id of the ping being answered.
        id: u32,
    },
    /// Client credentials.
    Auth(AuthRequest<'a>),
    /// Authentication verdict.
    AuthResponse(AuthStatus),
    /// Network configuration.
    Config(NetworkConfig),
    /// Opaque server configuration.
    ServerConfig(&'a [u8]),
    /// Tunnelled packet.
    Data(&'a [u8]),
    /// Clean disconnect.
    Goodbye,
    /// New session id.
    SessionResponse(SessionId),
}

impl<'a> Message<'a> {
    /// Short name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Noop => "noop",
            Message::Ping { .. } => "ping",
            Message::Pong { .. } => "pong",
            Message::Auth(_) => "auth",
            Message::AuthResponse(_) => "auth-response",
            Message::Config(_) => "config",
            Message::ServerConfig(_) => "server-config",
            Message::Data(_) => "data",
            Message::Goodbye => "goodbye",
            Message::SessionResponse(_) => "session-response",
        }
    }

    /// Encoded size in bytes.
    pub fn wire_size(&self) -> usize {
        1 + match self {
            Message::Noop | Message::Goodbye => 0,
            Message::Ping { .. } | Message::Pong { .. } => 4,
            Message::Auth(AuthRequest::UserPass { username, password }) => {
                1 + 1 + username.len() + 1 + password.len()
            }
            Message::Auth(AuthRequest::Buffer { data, .. }) => 1 + 1 + 2 + data.len(),
            Message::AuthResponse(_) => 1,
            Message::Config(_) => NetworkConfig::WIRE_SIZE,
            Message::ServerConfig(data) | Message::Data(data) => 2 + data.len(),
            Message::SessionResponse(_) => SESSION_ID_SIZE,
        }
    }

    /// Encode into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, MessageError> {
        let needed = self.wire_size();
        if buf.len() < needed {
            return Err(MessageError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }

        let mut w = Writer { buf, pos: 0 };
        match self {
            Message::Noop => w.u8(msg_type::NOOP),
            Message::Ping { id } => {
                w.u8(msg_type::PING);
                w.bytes(&id.to_be_bytes());
            }
            Message::Pong { id } => {
                w.u8(msg_type::PONG);
                w.bytes(&id.to_be_bytes());
            }
            Message::Auth(AuthRequest::UserPass { username, password }) => {
                let ulen = u8::try_from(username.len()).map_err(|_| MessageError::Invalid("auth"))?;
                let plen = u8::try_from(password.len()).map_err(|_| MessageError::Invalid("auth"))?;
                w.u8(msg_type::AUTH);
                w.u8(AUTH_USER_PASS);
                w.u8(ulen);
                w.bytes(username.as_bytes());
                w.u8(plen);
                w.bytes(password.as_bytes());
            }
            Message::Auth(AuthRequest::Buffer { auth_type, data }) => {
                let len = u16::try_from(data.len()).map_err(|_| MessageError::Invalid("auth"))?;
                w.u8(msg_type::AUTH);
                w.u8(AUTH_BUFFER);
                w.u8(*auth_type);
                w.bytes(&len.to_be_bytes());
                w.bytes(data);
            }
            Message::AuthResponse(status) => {
                w.u8(msg_type::AUTH_RESPONSE);
                w.u8(match status {
                    AuthStatus::Success => 0,
                    AuthStatus::Rejected => 1,
                });
            }
            Message::Config(config) => {
                w.u8(msg_type::CONFIG);
                w.bytes(&config.local_ip.octets());
                w.bytes(&config.peer_ip.octets());
                w.bytes(&config.dns_ip.octets());
                w.bytes(&config.mtu.to_be_bytes());
            }
            Message::ServerConfig(data) => {
                let len =
                    u16::try_from(data.len()).map_err(|_| MessageError::Invalid("server-config"))?;
                w.u8(msg_type::SERVER_CONFIG);
                w.bytes(&len.to_be_bytes());
                w.bytes(data);
            }
            Message::Data(packet) => {
                let len = u16::try_from(packet.len()).map_err(|_| MessageError::Invalid("data"))?;
                w.u8(msg_type::DATA);
                w.bytes(&len.to_be_bytes());
                w.bytes(packet);
            }
            Message::Goodbye => w.u8(msg_type::GOODBYE),
            Message::SessionResponse(id) => {
                w.u8(msg_type::SESSION_RESPONSE);
                w.bytes(&id.to_bytes());
            }
        }
        Ok(w.pos)
    }

    /// Decode one message. Trailing bytes (padding) are ignored.
    pub fn decode(data: &'a [u8]) -> Result<Self, MessageError> {
        let mut r = Reader { data, pos: 0 };
        let msg = match r.u8()? {
            msg_type::NOOP => Message::Noop,
            msg_type::PING => Message::Ping { id: r.u32()? },
            msg_type::PONG => Message::Pong { id: r.u32()? },
            msg_type::AUTH => Message::Auth(match r.u8()? {
                AUTH_USER_PASS => {
                    let ulen = usize::from(r.u8()?);
                    let username = r.str(ulen)?;
                    let plen = usize::from(r.u8()?);
                    let password = r.str(plen)?;
                    AuthRequest::UserPass { username, password }
                }
                AUTH_BUFFER => {
                    let auth_type = r.u8()?;
                    let len = usize::from(r.u16()?);
                    AuthRequest::Buffer {
                        auth_type,
                        data: r.take(len)?,
                    }
                }
                _ => return Err(MessageError::Invalid("auth")),
            }),
            msg_type::AUTH_RESPONSE => Message::AuthResponse(match r.u8()? {
                0 => AuthStatus::Success,
                1 => AuthStatus::Rejected,
                _ => return Err(MessageError::Invalid("auth-response")),
            }),
            msg_type::CONFIG => {
                let config = NetworkConfig {
                    local_ip: r.ipv4()?,
                    peer_ip: r.ipv4()?,
                    dns_ip: r.ipv4()?,
                    mtu: r.u16()?,
                };
                config.validate()?;
                Message::Config(config)
            }
            msg_type::SERVER_CONFIG => {
                let len = usize::from(r.u16()?);
                Message::ServerConfig(r.take(len)?)
            }
            msg_type::DATA => {
                let len = usize::from(r.u16()?);
                Message::Data(r.take(len)?)
            }
            msg_type::GOODBYE => Message::Goodbye,
            msg_type::SESSION_RESPONSE => {
                let mut id = [0u8; SESSION_ID_SIZE];
                id.copy_from_slice(r.take(SESSION_ID_SIZE)?);
                Message::SessionResponse(SessionId::from_bytes(id))
            }
            other => return Err(MessageError::UnknownType(other)),
        };
        Ok(msg)
    }
}

struct Writer<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf[self.pos..self.pos + v.len()].copy_from_slice(v);
        self.pos += v.len();
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], MessageError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(MessageError::TooShort {
                expected: end,
                actual: self.data.len(),
            });
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, MessageError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, MessageError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, MessageError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn ipv4(&mut self) -> Result<Ipv4Addr, MessageError> {
        let b = self.take(4)?;
        Ok(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
    }

    fn str(&mut self, n: usize) -> Result<&'a str, MessageError> {
        std::str::from_utf8(self.take(n)?).map_err(|_| MessageError::Invalid("auth"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_vec(msg: &Message<'_>) -> Vec<u8> {
        let mut buf = vec![0u8; msg.wire_size()];
        let n = msg.encode(&mut buf).unwrap();
        assert_eq!(n, buf.len());
        buf
    }

    #[test]
    fn test_ping_wire_format() {
        let bytes = encode_vec(&Message::Ping { id: 0x01020304 });
        assert_eq!(hex::encode(&bytes), "0201020304");
    }

    #[test]
    fn test_auth_user_pass() {
        let msg = Message::Auth(AuthRequest::UserPass {
            username: "alice",
            password: "hunter2",
        });
        let bytes = encode_vec(&msg);
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_auth_debug_hides_password() {
        let msg = AuthRequest::UserPass {
            username: "alice",
            password: "hunter2",
        };
        assert!(!format!("{msg:?}").contains("hunter2"));
    }

    #[test]
    fn test_data_ignores_padding() {
        let mut buf = vec![0u8; 64];
        let n = Message::Data(b"packet").encode(&mut buf).unwrap();
        assert_eq!(n, 9);
        // trailing zeros are padding
        assert_eq!(Message::decode(&buf).unwrap(), Message::Data(b"packet"));
    }

    #[test]
    fn test_config_rejects_bad_mtu() {
        let config = NetworkConfig {
            local_ip: Ipv4Addr::new(10, 0, 0, 2),
            peer_ip: Ipv4Addr::new(10, 0, 0, 1),
            dns_ip: Ipv4Addr::new(1, 1, 1, 1),
            mtu: 100,
        };
        let bytes = encode_vec(&Message::Config(config));
        assert_eq!(Message::decode(&bytes), Err(MessageError::Invalid("config")));
    }

    #[test]
    fn test_truncated_message() {
        let bytes = encode_vec(&Message::SessionResponse(SessionId::new(42)));
        assert!(matches!(
            Message::decode(&bytes[..5]),
            Err(MessageError::TooShort { .. })
        ));
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(Message::decode(&[0xEE]), Err(MessageError::UnknownType(0xEE)));
        assert!(matches!(Message::decode(&[]), Err(MessageError::TooShort { .. })));
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut buf = [0u8; 3];
        assert_eq!(
            Message::Ping { id: 1 }.encode(&mut buf),
            Err(MessageError::BufferTooSmall {
                needed: 5,
                available: 3,
            })
        );
    }
}
