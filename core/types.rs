// Core types shared by the transport and connection layers
use crate::error::{Error, Result};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

/// Size of the buffer reserved for the textual host address, terminator included.
pub const MAX_IP_LENGTH: usize = 16;

/// Remote peer of a connection: an IPv4 host plus TCP port.
///
/// The textual address must fit in `MAX_IP_LENGTH - 1` characters. Longer
/// input is rejected rather than truncated, since a truncated dotted quad
/// can silently name a different host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: Ipv4Addr,
    port: u16,
}

impl Endpoint {
    pub fn new(address: &str, port: u16) -> Result<Self> {
        if address.is_empty() {
            return Err(Error::InvalidArgument("empty host address".into()));
        }
        if address.len() >= MAX_IP_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "host address `{}` exceeds {} characters",
                address,
                MAX_IP_LENGTH - 1
            )));
        }
        let address = Ipv4Addr::from_str(address).map_err(|_| {
            Error::InvalidArgument(format!("`{}` is not a dotted-quad IPv4 address", address))
        })?;
        Self::from_parts(address, port)
    }

    pub fn from_parts(address: Ipv4Addr, port: u16) -> Result<Self> {
        if port == 0 {
            return Err(Error::InvalidArgument("port 0 is not a connectable port".into()));
        }
        Ok(Endpoint { address, port })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    // Accepts "a.b.c.d:port"
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidArgument(format!("`{}` is missing a port", s)))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::InvalidArgument(format!("`{}` is not a valid port", port)))?;
        Endpoint::new(host, port)
    }
}

impl TryFrom<SocketAddr> for Endpoint {
    type Error = Error;

    fn try_from(addr: SocketAddr) -> Result<Self> {
        match addr {
            SocketAddr::V4(v4) => Endpoint::from_parts(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => Err(Error::InvalidArgument(format!(
                "IPv6 endpoint {} is not supported",
                v6
            ))),
        }
    }
}

// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Closing = 3,
}

impl ConnectionState {
    pub fn from_u8(val: u8) -> Self {
        match val {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
            ConnectionState::Closing => write!(f, "CLOSING"),
        }
    }
}
