// In-memory transport pair for exercising connection logic without sockets.
//
// `MockTransport` is the local end handed to a connection, `MockPeer` the
// remote end driven by a test. Inbound bytes travel over a crossbeam
// channel so a pending `receive` blocks exactly like a socket read, and
// read-side shutdown wakes it by dropping a cancellation sender.
use crate::traits::{Connector, Transport};
use crossbeam::channel::{self, select, Receiver, Sender};
use std::io::{self, Result};
use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use wilc_core::{Endpoint, Error};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// What the peer pushes towards the local end's reads
enum Inbound {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Upper bound on bytes accepted by a single `send` (0 = unbounded).
    pub max_write: usize,
    /// Total bytes accepted before every further `send` fails.
    pub fail_after: Option<usize>,
}

impl MockConfig {
    pub fn chunked(max_write: usize) -> Self {
        MockConfig {
            max_write,
            fail_after: None,
        }
    }
}

struct MockShared {
    config: MockConfig,
    inbound: Receiver<Inbound>,
    cancel: Receiver<()>,
    cancel_tx: Mutex<Option<Sender<()>>>,
    pending: Mutex<Vec<u8>>,
    read_closed: AtomicBool,
    write_closed: AtomicBool,
    outbound: Mutex<Vec<u8>>,
    write_sizes: Mutex<Vec<usize>>,
    shutdowns: AtomicUsize,
}

pub struct MockTransport {
    shared: Arc<MockShared>,
}

pub struct MockPeer {
    inbound: Mutex<Option<Sender<Inbound>>>,
    shared: Arc<MockShared>,
}

/// Create a connected local/remote pair.
pub fn pair(config: MockConfig) -> (MockTransport, MockPeer) {
    let (inbound_tx, inbound) = channel::unbounded();
    let (cancel_tx, cancel) = channel::bounded(0);
    let shared = Arc::new(MockShared {
        config,
        inbound,
        cancel,
        cancel_tx: Mutex::new(Some(cancel_tx)),
        pending: Mutex::new(Vec::new()),
        read_closed: AtomicBool::new(false),
        write_closed: AtomicBool::new(false),
        outbound: Mutex::new(Vec::new()),
        write_sizes: Mutex::new(Vec::new()),
        shutdowns: AtomicUsize::new(0),
    });
    (
        MockTransport {
            shared: Arc::clone(&shared),
        },
        MockPeer {
            inbound: Mutex::new(Some(inbound_tx)),
            shared,
        },
    )
}

impl MockTransport {
    fn take_pending(&self, buf: &mut [u8]) -> Option<usize> {
        let mut pending = lock(&self.shared.pending);
        if pending.is_empty() {
            return None;
        }
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        pending.drain(..n);
        Some(n)
    }

    fn deliver(&self, chunk: Vec<u8>, buf: &mut [u8]) -> usize {
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            lock(&self.shared.pending).extend_from_slice(&chunk[n..]);
        }
        n
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        if self.shared.write_closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write side shut down"));
        }

        let n = {
            let mut outbound = lock(&self.shared.outbound);
            let budget = match self.shared.config.fail_after {
                Some(limit) if outbound.len() >= limit => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "injected write failure",
                    ));
                }
                Some(limit) => limit - outbound.len(),
                None => usize::MAX,
            };
            let max_write = match self.shared.config.max_write {
                0 => usize::MAX,
                max => max,
            };
            let n = data.len().min(max_write).min(budget);
            outbound.extend_from_slice(&data[..n]);
            lock(&self.shared.write_sizes).push(n);
            n
        };

        // Give competing writers a chance to run between chunks
        thread::yield_now();
        Ok(n)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.shared.read_closed.load(Ordering::Acquire) {
            return Ok(0);
        }
        if let Some(n) = self.take_pending(buf) {
            return Ok(n);
        }

        select! {
            recv(self.shared.inbound) -> msg => match msg {
                Ok(Inbound::Data(chunk)) => Ok(self.deliver(chunk, buf)),
                Ok(Inbound::Fail(kind)) => Err(io::Error::new(kind, "injected read failure")),
                Err(_) => Ok(0),
            },
            recv(self.shared.cancel) -> _ => Ok(0),
        }
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        self.shared.shutdowns.fetch_add(1, Ordering::Relaxed);
        if matches!(how, Shutdown::Read | Shutdown::Both) {
            self.shared.read_closed.store(true, Ordering::Release);
            lock(&self.shared.cancel_tx).take();
        }
        if matches!(how, Shutdown::Write | Shutdown::Both) {
            self.shared.write_closed.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(MockTransport {
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl MockPeer {
    /// Queue bytes for the local end to read. Returns false once closed.
    pub fn send(&self, data: &[u8]) -> bool {
        if data.is_empty() {
            return true;
        }
        match lock(&self.inbound).as_ref() {
            Some(tx) => tx.send(Inbound::Data(data.to_vec())).is_ok(),
            None => false,
        }
    }

    /// Make the local end's next read, after queued bytes, fail with `kind`.
    pub fn fail_reads(&self, kind: io::ErrorKind) -> bool {
        match lock(&self.inbound).as_ref() {
            Some(tx) => tx.send(Inbound::Fail(kind)).is_ok(),
            None => false,
        }
    }

    /// Close the peer's write side: the local end reads 0 once queued
    /// bytes are drained.
    pub fn close(&self) {
        lock(&self.inbound).take();
    }

    pub fn written(&self) -> Vec<u8> {
        lock(&self.shared.outbound).clone()
    }

    /// Size of every individual `send` the local end performed.
    pub fn write_sizes(&self) -> Vec<usize> {
        lock(&self.shared.write_sizes).clone()
    }

    pub fn read_closed(&self) -> bool {
        self.shared.read_closed.load(Ordering::Acquire)
    }

    pub fn write_closed(&self) -> bool {
        self.shared.write_closed.load(Ordering::Acquire)
    }

    /// Number of `shutdown` calls made on any handle of the local end.
    pub fn shutdowns(&self) -> usize {
        self.shared.shutdowns.load(Ordering::Relaxed)
    }

    /// Poll until at least `len` bytes were written or `timeout` elapses.
    pub fn wait_for_written(&self, len: usize, timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        loop {
            let written = self.written();
            if written.len() >= len || Instant::now() >= deadline {
                return written;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

enum ConnectorMode {
    Ready,
    Refuse,
    NoSocket,
}

/// Hands out one prepared `MockTransport`, or fails in a chosen way.
pub struct MockConnector {
    mode: ConnectorMode,
    transport: Mutex<Option<MockTransport>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        MockConnector {
            mode: ConnectorMode::Ready,
            transport: Mutex::new(Some(transport)),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Every attempt fails as if the peer refused the connection.
    pub fn refusing() -> Self {
        MockConnector {
            mode: ConnectorMode::Refuse,
            transport: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Every attempt fails before a socket could be allocated.
    pub fn without_sockets() -> Self {
        MockConnector {
            mode: ConnectorMode::NoSocket,
            transport: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl Connector for MockConnector {
    fn connect(&self, endpoint: &Endpoint) -> wilc_core::Result<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        match self.mode {
            ConnectorMode::NoSocket => Err(Error::SocketCreateFailed(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "no socket available",
            ))),
            ConnectorMode::Refuse => Err(Error::ConnectFailed {
                endpoint: *endpoint,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
            ConnectorMode::Ready => match lock(&self.transport).take() {
                Some(transport) => Ok(Box::new(transport)),
                None => Err(Error::ConnectFailed {
                    endpoint: *endpoint,
                    source: io::Error::new(
                        io::ErrorKind::ConnectionRefused,
                        "mock transport already handed out",
                    ),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wilc_core::ErrorKind;

    #[test]
    fn writes_are_capped_by_max_write() {
        let (mut local, peer) = pair(MockConfig::chunked(2));
        assert_eq!(local.send(b"hello").unwrap(), 2);
        assert_eq!(local.send(b"llo").unwrap(), 2);
        assert_eq!(peer.written(), b"hell");
        assert_eq!(peer.write_sizes(), vec![2, 2]);
    }

    #[test]
    fn injected_failure_after_budget() {
        let (mut local, peer) = pair(MockConfig {
            max_write: 0,
            fail_after: Some(3),
        });
        assert_eq!(local.send(b"abcdef").unwrap(), 3);
        let err = local.send(b"def").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(peer.written(), b"abc");
    }

    #[test]
    fn large_chunk_is_split_across_reads() {
        let (mut local, peer) = pair(MockConfig::default());
        peer.send(&[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(local.receive(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(local.receive(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
    }

    #[test]
    fn peer_close_yields_end_of_stream_after_queued_data() {
        let (mut local, peer) = pair(MockConfig::default());
        peer.send(b"x");
        peer.close();
        assert!(!peer.send(b"y"));
        let mut buf = [0u8; 8];
        assert_eq!(local.receive(&mut buf).unwrap(), 1);
        assert_eq!(local.receive(&mut buf).unwrap(), 0);
    }

    #[test]
    fn injected_read_failure_follows_queued_data() {
        let (mut local, peer) = pair(MockConfig::default());
        peer.send(b"ok");
        assert!(peer.fail_reads(io::ErrorKind::ConnectionReset));
        let mut buf = [0u8; 8];
        assert_eq!(local.receive(&mut buf).unwrap(), 2);
        let err = local.receive(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);

        peer.close();
        assert!(!peer.fail_reads(io::ErrorKind::ConnectionReset));
    }

    #[test]
    fn read_shutdown_wakes_blocked_receive() {
        let (local, peer) = pair(MockConfig::default());
        let mut reader = local.try_clone().unwrap();
        let blocked = thread::spawn(move || {
            let mut buf = [0u8; 8];
            reader.receive(&mut buf)
        });
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        local.shutdown(Shutdown::Read).unwrap();
        assert_eq!(blocked.join().unwrap().unwrap(), 0);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(peer.read_closed());
        assert!(!peer.write_closed());
        assert_eq!(peer.shutdowns(), 1);
    }

    #[test]
    fn write_shutdown_breaks_pipe() {
        let (mut local, peer) = pair(MockConfig::default());
        local.shutdown(Shutdown::Write).unwrap();
        assert_eq!(local.send(b"a").unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert!(peer.write_closed());
    }

    #[test]
    fn connector_modes() {
        let endpoint = Endpoint::new("127.0.0.1", 9000).unwrap();
        let (local, _peer) = pair(MockConfig::default());
        let connector = MockConnector::new(local);
        assert!(connector.connect(&endpoint).is_ok());
        assert_eq!(
            connector.connect(&endpoint).err().unwrap().kind(),
            ErrorKind::ConnectFailed
        );
        assert_eq!(connector.attempts(), 2);

        assert_eq!(
            MockConnector::refusing().connect(&endpoint).err().unwrap().kind(),
            ErrorKind::ConnectFailed
        );
        assert_eq!(
            MockConnector::without_sockets()
                .connect(&endpoint)
                .err()
                .unwrap()
                .kind(),
            ErrorKind::SocketCreateFailed
        );
    }
}
