// sink.rs - Loopback peers used as the far end of every benchmark
use std::thread::{self, JoinHandle};
use wilc_osal::{Endpoint, TcpTransport, TcpTransportListener, Transport, TransportListener};

pub enum PeerMode {
    /// Read and discard, return the byte count when the client goes away
    Discard,
    /// Write every received chunk straight back
    Echo,
}

pub struct LoopbackPeer {
    pub endpoint: Endpoint,
    handle: JoinHandle<u64>,
}

impl LoopbackPeer {
    /// Bind an ephemeral port and serve `connections` clients one after another.
    pub fn spawn(mode: PeerMode, connections: usize) -> std::io::Result<Self> {
        let mut listener = TcpTransportListener::new("127.0.0.1:0");
        listener.bind()?;
        let endpoint = Endpoint::try_from(listener.local_addr()?)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let handle = thread::Builder::new()
            .name("bench-peer".into())
            .spawn(move || {
                let mut total = 0;
                for _ in 0..connections {
                    match listener.accept() {
                        Ok(conn) => total += serve(conn, &mode),
                        Err(_) => break,
                    }
                }
                total
            })?;

        Ok(LoopbackPeer { endpoint, handle })
    }

    /// Bytes the peer received across all connections.
    pub fn finish(self) -> u64 {
        self.handle.join().unwrap_or(0)
    }
}

fn serve(mut conn: TcpTransport, mode: &PeerMode) -> u64 {
    let mut buf = vec![0u8; 65536];
    let mut total = 0u64;
    loop {
        match conn.receive(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                total += n as u64;
                if let PeerMode::Echo = mode {
                    let mut sent = 0;
                    while sent < n {
                        match conn.send(&buf[sent..n]) {
                            Ok(0) | Err(_) => return total,
                            Ok(m) => sent += m,
                        }
                    }
                }
            }
        }
    }
    total
}
