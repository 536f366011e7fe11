//! Endpoint abstraction for transport-agnostic socket addressing.
//!
//! Provides unified addressing for the two byte-stream transports the
//! worker knows how to dial: Bluetooth RFCOMM and TCP. Both are "isomorphic"
//! per the worker's contract — the worker never inspects payloads and only
//! needs an endpoint to resolve and a raw fd to poll.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// A Bluetooth device address (6 octets), e.g. `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr(pub [u8; 6]);

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for BdAddr {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(EndpointError::InvalidBdAddr(s.to_string()));
        }
        for (i, part) in parts.iter().enumerate() {
            octets[i] =
                u8::from_str_radix(part, 16).map_err(|_| EndpointError::InvalidBdAddr(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

/// Remote endpoint a `Connection` dials during `Establish`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Bluetooth RFCOMM channel on a paired device.
    Rfcomm { address: BdAddr, channel: u8 },
    /// TCP transport: `tcp://host:port`.
    Tcp(SocketAddr),
}

impl Endpoint {
    /// Parse an endpoint from a string.
    ///
    /// Supported formats:
    /// - `rfcomm://AA:BB:CC:DD:EE:FF@5` (device address, RFCOMM channel)
    /// - `tcp://127.0.0.1:5555`
    /// - `tcp://[::1]:5555` (IPv6)
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }

    /// Returns true if this is an RFCOMM endpoint.
    #[must_use]
    pub const fn is_rfcomm(&self) -> bool {
        matches!(self, Self::Rfcomm { .. })
    }

    /// Returns true if this is a TCP endpoint.
    #[must_use]
    pub const fn is_tcp(&self) -> bool {
        matches!(self, Self::Tcp(_))
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(addr) = s.strip_prefix("tcp://") {
            let socket_addr = addr
                .parse::<SocketAddr>()
                .map_err(|_| EndpointError::InvalidTcpAddress(addr.to_string()))?;
            Ok(Self::Tcp(socket_addr))
        } else if let Some(rest) = s.strip_prefix("rfcomm://") {
            let (addr_part, channel_part) = rest
                .split_once('@')
                .ok_or_else(|| EndpointError::InvalidRfcomm(rest.to_string()))?;
            let address: BdAddr = addr_part.parse()?;
            let channel: u8 = channel_part
                .parse()
                .map_err(|_| EndpointError::InvalidRfcomm(rest.to_string()))?;
            Ok(Self::Rfcomm { address, channel })
        } else {
            Err(EndpointError::InvalidScheme(s.to_string()))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Rfcomm { address, channel } => write!(f, "rfcomm://{address}@{channel}"),
        }
    }
}

/// Errors that can occur when parsing or using endpoints.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid scheme in endpoint: {0} (expected tcp:// or rfcomm://)")]
    InvalidScheme(String),

    #[error("invalid TCP address: {0}")]
    InvalidTcpAddress(String),

    #[error("invalid RFCOMM endpoint: {0}")]
    InvalidRfcomm(String),

    #[error("invalid Bluetooth device address: {0}")]
    InvalidBdAddr(String),
}
