// TCP transport implementation
use crate::traits::{Connector, Transport, TransportListener};
use nix::sys::socket::{self, setsockopt, sockopt, AddressFamily, SockFlag, SockType, SockaddrIn};
use std::io::{self, Read, Result, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, OwnedFd};
use tracing::debug;
use wilc_core::{Endpoint, Error};

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        TcpTransport { stream }
    }

    /// Disable Nagle's algorithm (TCP_NODELAY)
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        setsockopt(&self.stream, sockopt::TcpNoDelay, &nodelay).map_err(io::Error::from)
    }

    /// Set socket send buffer size (SO_SNDBUF)
    pub fn set_send_buffer_size(&self, size: usize) -> Result<()> {
        setsockopt(&self.stream, sockopt::SndBuf, &size).map_err(io::Error::from)
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.stream.write(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf)
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        match self.stream.shutdown(how) {
            // Peer already tore the stream down; nothing left to unblock
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(TcpTransport::new(self.stream.try_clone()?)))
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }
}

/// Socket options applied right after the connection is established.
#[derive(Debug, Clone, Default)]
pub struct TcpOptions {
    pub nodelay: bool,
    pub send_buffer_size: Option<usize>,
}

/// Opens blocking IPv4 TCP streams.
///
/// Socket allocation and connection establishment are separate syscalls so
/// the two failure modes surface as `SocketCreateFailed` and
/// `ConnectFailed` respectively.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    options: TcpOptions,
}

impl TcpConnector {
    pub fn new(options: TcpOptions) -> Self {
        TcpConnector { options }
    }

    fn open_socket() -> Result<OwnedFd> {
        socket::socket(
            AddressFamily::Inet,
            SockType::Stream,
            SockFlag::empty(),
            None,
        )
        .map_err(io::Error::from)
    }
}

impl Connector for TcpConnector {
    fn connect(&self, endpoint: &Endpoint) -> wilc_core::Result<Box<dyn Transport>> {
        let fd = Self::open_socket().map_err(Error::SocketCreateFailed)?;
        let addr = SockaddrIn::from(endpoint.socket_addr());
        socket::connect(fd.as_raw_fd(), &addr).map_err(|errno| Error::ConnectFailed {
            endpoint: *endpoint,
            source: io::Error::from(errno),
        })?;

        let transport = TcpTransport::new(TcpStream::from(fd));

        // Tuning failures leave a working stream behind, so they are not fatal
        if self.options.nodelay {
            if let Err(e) = transport.set_nodelay(true) {
                debug!(%endpoint, error = %e, "TCP_NODELAY not applied");
            }
        }
        if let Some(size) = self.options.send_buffer_size {
            if let Err(e) = transport.set_send_buffer_size(size) {
                debug!(%endpoint, size, error = %e, "SO_SNDBUF not applied");
            }
        }

        Ok(Box::new(transport))
    }
}

/// Listening side, used by the peer tool and loopback tests.
pub struct TcpTransportListener {
    address: String,
    listener: Option<TcpListener>,
}

impl TcpTransportListener {
    pub fn new(address: &str) -> Self {
        TcpTransportListener {
            address: address.to_string(),
            listener: None,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        match self.listener {
            Some(ref listener) => listener.local_addr(),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "Not bound")),
        }
    }
}

impl TransportListener for TcpTransportListener {
    type Connection = TcpTransport;

    fn bind(&mut self) -> Result<()> {
        self.listener = Some(TcpListener::bind(&self.address)?);
        Ok(())
    }

    fn accept(&mut self) -> Result<TcpTransport> {
        if let Some(ref listener) = self.listener {
            let (stream, _) = listener.accept()?;
            Ok(TcpTransport::new(stream))
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "Not bound"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use wilc_core::ErrorKind;

    fn bound_listener() -> (TcpTransportListener, Endpoint) {
        let mut listener = TcpTransportListener::new("127.0.0.1:0");
        listener.bind().unwrap();
        let endpoint = Endpoint::try_from(listener.local_addr().unwrap()).unwrap();
        (listener, endpoint)
    }

    #[test]
    fn connector_reaches_local_listener() {
        let (mut listener, endpoint) = bound_listener();
        let accept = thread::spawn(move || {
            let mut conn = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            let mut got = 0;
            while got < 4 {
                got += conn.receive(&mut buf[got..]).unwrap();
            }
            buf
        });

        let connector = TcpConnector::new(TcpOptions {
            nodelay: true,
            send_buffer_size: Some(8192),
        });
        let mut transport = connector.connect(&endpoint).unwrap();
        assert_eq!(transport.peer_addr().unwrap().port(), endpoint.port());
        let mut sent = 0;
        while sent < 4 {
            sent += transport.send(&b"wilc"[sent..]).unwrap();
        }
        assert_eq!(&accept.join().unwrap(), b"wilc");
    }

    #[test]
    fn refused_connection_is_connect_failed() {
        // Bind then drop to obtain a port nobody listens on
        let endpoint = {
            let (_listener, endpoint) = bound_listener();
            endpoint
        };
        let err = TcpConnector::default().connect(&endpoint).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
    }

    #[test]
    fn read_shutdown_unblocks_pending_receive() {
        let (mut listener, endpoint) = bound_listener();
        let _peer = thread::spawn(move || listener.accept().unwrap());

        let transport = TcpConnector::default().connect(&endpoint).unwrap();
        let mut reader = transport.try_clone().unwrap();
        let blocked = thread::spawn(move || {
            let mut buf = [0u8; 16];
            reader.receive(&mut buf)
        });

        thread::sleep(std::time::Duration::from_millis(20));
        transport.shutdown(Shutdown::Read).unwrap();
        assert_eq!(blocked.join().unwrap().unwrap(), 0);
    }

    #[test]
    fn accept_before_bind_fails() {
        let mut listener = TcpTransportListener::new("127.0.0.1:0");
        assert!(listener.accept().is_err());
        assert!(listener.local_addr().is_err());
    }
}
