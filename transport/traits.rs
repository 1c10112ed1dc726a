// Transport abstraction - allows pluggable stream backends
use std::io::Result;
use std::net::{Shutdown, SocketAddr};
use wilc_core::Endpoint;

/// A connected byte stream.
///
/// Each call maps to a single underlying operation: `send` may accept fewer
/// bytes than offered and `receive` returns 0 once the peer has closed its
/// write side (or the local read side was shut down).
pub trait Transport: Send {
    fn send(&mut self, data: &[u8]) -> Result<usize>;
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Half- or full-close the stream. Must unblock a `receive` pending on
    /// another handle of the same stream when the read side is shut.
    fn shutdown(&self, how: Shutdown) -> Result<()>;

    /// New handle to the same stream, usable from another thread.
    fn try_clone(&self) -> Result<Box<dyn Transport>>;

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Establishes transports. A single attempt per call, no retry.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> wilc_core::Result<Box<dyn Transport>>;
}

pub trait TransportListener: Send {
    type Connection: Transport;

    fn bind(&mut self) -> Result<()>;
    fn accept(&mut self) -> Result<Self::Connection>;
}
