//! Device addressing and capability types.

use crate::constants::DEFAULT_PORT;
use std::fmt;

/// Whether the TV wraps remote control commands in an encrypted session.
///
/// Probed once from the service description; independent of pairing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    /// Older firmware: commands are sent in the clear.
    #[default]
    Plain,
    /// 2019+ firmware: remote control commands require a paired session.
    Encrypted,
}

impl Encryption {
    pub fn is_encrypted(self) -> bool {
        self == Encryption::Encrypted
    }
}

/// A TV reachable on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub host: String,
    pub port: u16,
}

impl Device {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
        }
    }

    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` as used for the HTTP `Host` header and TCP connect.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authority())
    }
}

/// Metadata from the device description document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub friendly_name: Option<String>,
    pub model_name: Option<String>,
    pub model_number: Option<String>,
    pub manufacturer: Option<String>,
    pub udn: Option<String>,
}
