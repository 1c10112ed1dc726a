// TCP connection with a dedicated receive task.
//
// A connection moves Disconnected -> Connecting -> Connected on connect.
// The receive task moves it Connected -> Closing when the peer closes or a
// read fails. Disconnect moves it to Closing, shuts the socket down to wake
// the receive task, joins it and finally lands in Disconnected.
use crate::config::ConnectionConfig;
use crate::receiver::Receiver;
use once_cell::sync::OnceCell;
use std::fmt;
use std::io;
use std::net::Shutdown;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, info, trace, warn};
use wilc_core::{ConnectionState, Endpoint, Error, Result};
use wilc_transport::{Connector, TcpConnector, Transport};

// Guarded data stays consistent across a panicking holder, so poisoning is ignored
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// State of one connect..disconnect cycle, shared with its receive task
struct Session {
    endpoint: Endpoint,
    state: AtomicU8,
    // Send lock: owns the write side of the socket
    writer: Mutex<Option<Box<dyn Transport>>>,
    receive_thread: OnceCell<ThreadId>,
}

impl Session {
    fn new(endpoint: Endpoint) -> Self {
        Session {
            endpoint,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            writer: Mutex::new(None),
            receive_thread: OnceCell::new(),
        }
    }

    fn on_receive_thread(&self) -> bool {
        self.receive_thread.get() == Some(&thread::current().id())
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Connected -> Closing. False when the session was not Connected,
    /// i.e. a disconnect already started the teardown.
    fn begin_closing(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connected as u8,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn send(&self, data: &[u8]) -> Result<usize> {
        let mut writer = lock(&self.writer);
        if self.state() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        let Some(transport) = writer.as_mut() else {
            return Err(Error::NotConnected);
        };

        let mut written = 0;
        while written < data.len() {
            match transport.send(&data[written..]) {
                Ok(0) => {
                    return Err(Error::SendFailed {
                        written,
                        source: io::Error::new(
                            io::ErrorKind::WriteZero,
                            "transport accepted no bytes",
                        ),
                    });
                }
                Ok(n) => {
                    written += n;
                    if written < data.len() {
                        trace!(endpoint = %self.endpoint, written, total = data.len(), "partial write");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(endpoint = %self.endpoint, written, error = %e, "send failed");
                    return Err(Error::SendFailed { written, source: e });
                }
            }
        }
        Ok(written)
    }
}

// Background loop: blocking reads, each chunk handed to the receiver
struct ReceiveTask {
    session: Arc<Session>,
    reader: Box<dyn Transport>,
    receiver: Box<dyn Receiver>,
    chunk_size: usize,
}

impl ReceiveTask {
    fn run(mut self) {
        // Registered before the first read so a callback that disconnects
        // is always recognised as running on this thread
        let _ = self.session.receive_thread.set(thread::current().id());
        let endpoint = self.session.endpoint;
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            match self.reader.receive(&mut buf) {
                Ok(0) => {
                    if self.session.begin_closing() {
                        debug!(%endpoint, "peer closed the stream");
                    }
                    break;
                }
                Ok(n) => {
                    // Bytes still in flight when disconnect began are dropped
                    if self.session.state() != ConnectionState::Connected {
                        break;
                    }
                    trace!(%endpoint, bytes = n, "received");
                    self.receiver.on_receive(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    if self.session.begin_closing() {
                        warn!(%endpoint, error = %e, "receive failed, closing connection");
                    }
                    break;
                }
            }
        }

        debug!(%endpoint, "receive task finished");
    }
}

impl Drop for ReceiveTask {
    // Also runs when the receiver panics, so the session never stays
    // Connected without a task reading from it
    fn drop(&mut self) {
        self.session.begin_closing();
    }
}

// Resources that exist only while a session is live
struct Live {
    session: Arc<Session>,
    control: Box<dyn Transport>,
    receive_task: JoinHandle<()>,
}

/// A TCP client connection whose incoming bytes are pushed to a
/// [`Receiver`] from a background task.
///
/// `send` and `disconnect` take `&self` and may be called from any number of
/// threads. Dropping the connection disconnects it.
pub struct Connection {
    endpoint: Endpoint,
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    // Current session, locked only briefly
    session: Mutex<Option<Arc<Session>>>,
    // Teardown guard: serializes connect and disconnect
    live: Mutex<Option<Live>>,
}

impl Connection {
    /// Disconnected connection configured from the environment.
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_config(endpoint, ConnectionConfig::from_env())
    }

    pub fn with_config(endpoint: Endpoint, config: ConnectionConfig) -> Self {
        let connector = Arc::new(TcpConnector::new(config.tcp_options()));
        Self::with_connector(endpoint, config, connector)
    }

    pub fn with_connector(
        endpoint: Endpoint,
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Connection {
            endpoint,
            config: config.normalized(),
            connector,
            session: Mutex::new(None),
            live: Mutex::new(None),
        }
    }

    /// Create and connect in one step.
    pub fn open(endpoint: Endpoint, receiver: impl Receiver) -> Result<Self> {
        let connection = Self::new(endpoint);
        connection.connect(receiver)?;
        Ok(connection)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.session)
            .as_ref()
            .map(|session| session.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Establish the connection (single attempt) and start the receive task.
    ///
    /// Fails with `AlreadyConnected` unless the connection is Disconnected; a
    /// connection closed by its peer must be disconnected first.
    pub fn connect(&self, receiver: impl Receiver) -> Result<()> {
        let mut live = lock(&self.live);
        if live.is_some() || self.state() != ConnectionState::Disconnected {
            return Err(Error::AlreadyConnected);
        }

        let session = Arc::new(Session::new(self.endpoint));
        *lock(&self.session) = Some(Arc::clone(&session));

        match self.establish(&session, Box::new(receiver)) {
            Ok(established) => {
                *live = Some(established);
                info!(endpoint = %self.endpoint, "connected");
                Ok(())
            }
            Err(e) => {
                session.set_state(ConnectionState::Disconnected);
                lock(&self.session).take();
                debug!(endpoint = %self.endpoint, error = %e, "connect failed");
                Err(e)
            }
        }
    }

    fn establish(&self, session: &Arc<Session>, receiver: Box<dyn Receiver>) -> Result<Live> {
        let transport = self.connector.connect(&self.endpoint)?;
        let reader = transport.try_clone().map_err(Error::SocketCreateFailed)?;
        let control = transport.try_clone().map_err(Error::SocketCreateFailed)?;

        *lock(&session.writer) = Some(transport);
        session.set_state(ConnectionState::Connected);

        let task = ReceiveTask {
            session: Arc::clone(session),
            reader,
            receiver,
            chunk_size: self.config.recv_chunk_size,
        };
        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || task.run());

        match spawned {
            Ok(receive_task) => Ok(Live {
                session: Arc::clone(session),
                control,
                receive_task,
            }),
            Err(e) => {
                lock(&session.writer).take();
                let _ = control.shutdown(Shutdown::Both);
                Err(Error::SocketCreateFailed(e))
            }
        }
    }

    /// Write all of `data`, looping over partial writes.
    ///
    /// Concurrent sends are serialized and never interleave on the wire. An
    /// empty payload is accepted without touching the transport. On failure
    /// the error carries the count of bytes already written.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        let session = lock(&self.session).clone().ok_or(Error::NotConnected)?;
        session.send(data)
    }

    /// Release every resource of the current session. Idempotent.
    ///
    /// When called from outside the receiver, on return the receive task has
    /// exited and the receiver has been dropped, so no further callback can
    /// run. Calling this from inside the receiver tears the session down
    /// without waiting for the calling task; the receiver is then dropped
    /// once the current callback returns and the task exits.
    pub fn disconnect(&self) {
        let current = lock(&self.session).clone();
        let mut live = match current {
            Some(ref session) if session.on_receive_thread() => {
                match self.lock_live_from_receive_task(session) {
                    Some(live) => live,
                    None => return,
                }
            }
            _ => lock(&self.live),
        };
        let Some(Live {
            session,
            control,
            receive_task,
        }) = live.take()
        else {
            return;
        };

        session.set_state(ConnectionState::Closing);

        // Shutting both halves wakes the pending read and fails a send
        // stalled on a full socket buffer, so neither can block teardown
        if let Err(e) = control.shutdown(Shutdown::Both) {
            debug!(endpoint = %self.endpoint, error = %e, "shutdown failed");
        }

        if receive_task.thread().id() == thread::current().id() {
            debug!(endpoint = %self.endpoint, "disconnect from receive task, not joining");
        } else if receive_task.join().is_err() {
            warn!(endpoint = %self.endpoint, "receive task panicked");
        }

        // Waits for an in-flight send to finish before the socket closes
        lock(&session.writer).take();
        drop(control);

        session.set_state(ConnectionState::Disconnected);
        lock(&self.session).take();
        info!(endpoint = %self.endpoint, "disconnected");
    }
}

impl Connection {
    // Blocking on the teardown guard from the receive task deadlocks against a
    // disconnect on another thread that holds the guard while joining us.
    // None means that other disconnect owns the teardown.
    fn lock_live_from_receive_task(&self, session: &Session) -> Option<MutexGuard<'_, Option<Live>>> {
        loop {
            match self.live.try_lock() {
                Ok(live) => return Some(live),
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    if session.state() != ConnectionState::Connected {
                        debug!(endpoint = %self.endpoint, "teardown already in progress");
                        return None;
                    }
                    thread::yield_now();
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wilc_core::ErrorKind;
    use wilc_transport::mock::{self, MockConfig, MockConnector};

    fn endpoint() -> Endpoint {
        Endpoint::new("127.0.0.1", 9000).unwrap()
    }

    #[test]
    fn failed_connect_leaves_connection_reusable() {
        let conn = Connection::with_connector(
            endpoint(),
            ConnectionConfig::default(),
            Arc::new(MockConnector::refusing()),
        );
        let err = conn.connect(|_: &[u8]| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.send(b"x").unwrap_err().kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn second_connect_is_rejected() {
        let (transport, _peer) = mock::pair(MockConfig::default());
        let connector = Arc::new(MockConnector::new(transport));
        let conn = Connection::with_connector(
            endpoint(),
            ConnectionConfig::default(),
            Arc::clone(&connector) as Arc<dyn Connector>,
        );
        conn.connect(|_: &[u8]| {}).unwrap();
        let err = conn.connect(|_: &[u8]| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyConnected);
        assert_eq!(connector.attempts(), 1);
        assert!(conn.is_connected());
    }

    #[test]
    fn debug_shows_endpoint_and_state() {
        let conn = Connection::with_connector(
            endpoint(),
            ConnectionConfig::default(),
            Arc::new(MockConnector::refusing()),
        );
        let shown = format!("{:?}", conn);
        assert!(shown.contains("Disconnected"));
        assert!(shown.contains("9000"));
    }
}
