//! Per-connection configuration.
//!
//! [`ConnectionConfig`] is built once, validated, and handed to
//! [`Connection`](crate::session::Connection) at creation. Setters validate
//! their input and leave the config unchanged on error.
//!
//! With the `serde` feature a config can also be loaded from TOML:
//!
//! ```toml
//! carrier = "datagram"
//! mtu = 1350
//! padding = "pad450"
//! aggressive = true
//!
//! [credentials]
//! username = "alice"
//! password = "hunter2"
//! ```

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::{
    CONFIG_TEXT_FIELD_LENGTH, ConfigError, MAX_AUTH_BUFFER_SIZE, MAX_MTU, MIN_MTU,
};
use crate::session::Role;
use crate::transport::{Carrier, ProtocolVersion};

/// Padding applied to outbound data messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PaddingPolicy {
    /// No padding.
    #[default]
    None,
    /// Pad short messages up to [`PADDING_450`](crate::core::PADDING_450) bytes.
    Pad450,
    /// Pad every message to the full MTU.
    Full,
}

/// Client credentials, wiped from memory on drop.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Credentials {
    #[cfg_attr(feature = "serde", serde(default))]
    username: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    auth_type: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    auth_buffer: Option<Vec<u8>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth_type", &self.auth_type)
            .field("auth_buffer", &self.auth_buffer.as_ref().map(Vec::len))
            .finish()
    }
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionConfig {
    carrier: Carrier,
    mtu: u16,
    padding: PaddingPolicy,
    aggressive: bool,
    roaming_disabled: bool,
    version: ProtocolVersion,
    credentials: Credentials,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            carrier: Carrier::Datagram,
            mtu: MAX_MTU as u16,
            padding: PaddingPolicy::None,
            aggressive: false,
            roaming_disabled: false,
            version: ProtocolVersion::CURRENT,
            credentials: Credentials::default(),
        }
    }
}

impl ConnectionConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Carrier kind.
    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    /// Set the carrier kind.
    pub fn set_carrier(&mut self, carrier: Carrier) -> &mut Self {
        self.carrier = carrier;
        self
    }

    /// Tunnel MTU.
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Set the tunnel MTU.
    pub fn set_mtu(&mut self, mtu: u16) -> Result<&mut Self, ConfigError> {
        check_mtu(mtu)?;
        self.mtu = mtu;
        Ok(self)
    }

    /// Outbound padding policy.
    pub fn padding(&self) -> PaddingPolicy {
        self.padding
    }

    /// Set the outbound padding policy.
    pub fn set_padding(&mut self, padding: PaddingPolicy) -> &mut Self {
        self.padding = padding;
        self
    }

    /// Check if aggressive mode is on.
    pub fn aggressive(&self) -> bool {
        self.aggressive
    }

    /// Repeat every outbound record, not only during setup.
    pub fn set_aggressive(&mut self, aggressive: bool) -> &mut Self {
        self.aggressive = aggressive;
        self
    }

    /// Check if session id rotation is disabled.
    pub fn roaming_disabled(&self) -> bool {
        self.roaming_disabled
    }

    /// Disable session id rotation.
    pub fn set_roaming_disabled(&mut self, disabled: bool) -> &mut Self {
        self.roaming_disabled = disabled;
        self
    }

    /// Protocol version sent in headers; the major must match on receive.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.version
    }

    /// Set the protocol version.
    pub fn set_protocol_version(&mut self, major: u8, minor: u8) -> Result<&mut Self, ConfigError> {
        check_major(major)?;
        self.version = ProtocolVersion::new(major, minor);
        Ok(self)
    }

    /// Username, if set.
    pub fn username(&self) -> Option<&str> {
        self.credentials.username.as_deref()
    }

    /// Set the username.
    pub fn set_username(&mut self, username: &str) -> Result<&mut Self, ConfigError> {
        check_text("username", username)?;
        replace(&mut self.credentials.username, username.to_owned());
        Ok(self)
    }

    /// Password, if set.
    pub fn password(&self) -> Option<&str> {
        self.credentials.password.as_deref()
    }

    /// Set the password.
    pub fn set_password(&mut self, password: &str) -> Result<&mut Self, ConfigError> {
        check_text("password", password)?;
        replace(&mut self.credentials.password, password.to_owned());
        Ok(self)
    }

    /// Opaque authentication buffer and its type, if set.
    pub fn auth_buffer(&self) -> Option<(u8, &[u8])> {
        self.credentials
            .auth_buffer
            .as_deref()
            .map(|data| (self.credentials.auth_type, data))
    }

    /// Authenticate with an opaque buffer instead of username and password.
    pub fn set_auth_buffer(&mut self, auth_type: u8, buffer: &[u8]) -> Result<&mut Self, ConfigError> {
        check_auth_buffer(buffer)?;
        replace(&mut self.credentials.auth_buffer, buffer.to_vec());
        self.credentials.auth_type = auth_type;
        Ok(self)
    }

    /// Check every field against its limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_mtu(self.mtu)?;
        check_major(self.version.major)?;
        if let Some(username) = &self.credentials.username {
            check_text("username", username)?;
        }
        if let Some(password) = &self.credentials.password {
            check_text("password", password)?;
        }
        if let Some(buffer) = &self.credentials.auth_buffer {
            check_auth_buffer(buffer)?;
        }
        Ok(())
    }

    /// Validate, then check the fields the role requires.
    ///
    /// A client needs either an auth buffer or both username and password.
    pub fn validate_for(&self, role: Role) -> Result<(), ConfigError> {
        self.validate()?;
        if role == Role::Client && self.credentials.auth_buffer.is_none() {
            if self.credentials.username.is_none() {
                return Err(ConfigError::Missing("username"));
            }
            if self.credentials.password.is_none() {
                return Err(ConfigError::Missing("password"));
            }
        }
        Ok(())
    }
}

fn replace<T: Zeroize>(slot: &mut Option<T>, value: T) {
    if let Some(old) = slot.as_mut() {
        old.zeroize();
    }
    *slot = Some(value);
}

fn check_text(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::EmptyString { field });
    }
    if value.len() > CONFIG_TEXT_FIELD_LENGTH {
        return Err(ConfigError::StringTooLong {
            field,
            len: value.len(),
            max: CONFIG_TEXT_FIELD_LENGTH,
        });
    }
    Ok(())
}

fn check_mtu(mtu: u16) -> Result<(), ConfigError> {
    let value = usize::from(mtu);
    if !(MIN_MTU..=MAX_MTU).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field: "mtu",
            value,
            min: MIN_MTU,
            max: MAX_MTU,
        });
    }
    Ok(())
}

fn check_major(major: u8) -> Result<(), ConfigError> {
    if major == 0 {
        return Err(ConfigError::OutOfRange {
            field: "protocol major version",
            value: 0,
            min: 1,
            max: usize::from(u8::MAX),
        });
    }
    Ok(())
}

fn check_auth_buffer(buffer: &[u8]) -> Result<(), ConfigError> {
    if buffer.is_empty() {
        return Err(ConfigError::EmptyString {
            field: "auth buffer",
        });
    }
    if buffer.len() > MAX_AUTH_BUFFER_SIZE {
        return Err(ConfigError::StringTooLong {
            field: "auth buffer",
            len: buffer.len(),
            max: MAX_AUTH_BUFFER_SIZE,
        });
    }
    Ok(())
}
