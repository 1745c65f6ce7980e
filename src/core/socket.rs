//! Connection worker
//!
//! A [`SerialSocket`] owns one transport for one connection attempt. `connect`
//! starts a dedicated thread that opens the transport and then blocks in a
//! read loop, reporting everything through a [`SerialSink`]. Writes happen on
//! the caller's thread. `disconnect` may be called from anywhere, any number
//! of times; closing the transport is what wakes the read loop.

use crate::core::bridge::{Disconnect, SerialSink};
use crate::core::signal::{DisconnectSignal, HookId};
use crate::core::transport::{TransportError, TransportTrait};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

/// Default read chunk size
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Worker state; `Disconnected` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Created, not started
    Idle,
    /// Transport being opened
    Connecting,
    /// Read loop running
    Connected,
    /// Closed or failed
    Disconnected,
}

/// Socket tuning
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Maximum bytes per read
    pub read_chunk_size: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

/// One transport, one worker thread
pub struct SerialSocket {
    transport: Arc<dyn TransportTrait>,
    config: SocketConfig,
    state: RwLock<LinkState>,
    closed: AtomicBool,
    sink: Mutex<Option<Arc<dyn SerialSink>>>,
    signal: Option<DisconnectSignal>,
    hook: Mutex<Option<HookId>>,
}

impl SerialSocket {
    /// Wrap a transport with default settings
    pub fn new(transport: Box<dyn TransportTrait>) -> Self {
        Self::with_config(transport, SocketConfig::default())
    }

    /// Wrap a transport
    pub fn with_config(transport: Box<dyn TransportTrait>, config: SocketConfig) -> Self {
        Self {
            transport: Arc::from(transport),
            config,
            state: RwLock::new(LinkState::Idle),
            closed: AtomicBool::new(false),
            sink: Mutex::new(None),
            signal: None,
            hook: Mutex::new(None),
        }
    }

    /// Listen to an external disconnect trigger while connected
    #[must_use]
    pub fn with_signal(mut self, signal: DisconnectSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Peer name from the transport
    pub fn name(&self) -> String {
        self.transport.name()
    }

    /// Current state
    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    /// True while the read loop runs
    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Start the worker thread. Results arrive through `sink`.
    pub fn connect(self: &Arc<Self>, sink: Arc<dyn SerialSink>) -> Result<(), TransportError> {
        {
            let mut state = self.state.write();
            if *state != LinkState::Idle {
                return Err(TransportError::io(io::ErrorKind::AlreadyExists, "socket already used"));
            }
            *state = LinkState::Connecting;
        }
        *self.sink.lock() = Some(sink);

        if let Some(signal) = &self.signal {
            let weak: Weak<Self> = Arc::downgrade(self);
            let id = signal.register(move || {
                if let Some(socket) = weak.upgrade() {
                    socket.background_disconnect();
                }
            });
            *self.hook.lock() = Some(id);
        }

        let worker = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("sppterm-socket-{}", self.name()))
            .spawn(move || worker.run());

        if let Err(e) = spawned {
            self.disconnect();
            return Err(TransportError::from(e));
        }
        Ok(())
    }

    /// Blocking write on the caller's thread
    pub fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.transport.write_all(data)?;
        tracing::trace!("Wrote {} bytes to {}", data.len(), self.name());
        Ok(())
    }

    /// Close the transport and stop reporting. Idempotent.
    pub fn disconnect(&self) {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        self.sink.lock().take();
        let hook = self.hook.lock().take();
        if let (Some(signal), Some(id)) = (&self.signal, hook) {
            signal.unregister(id);
        }
        self.transport.close();
        *self.state.write() = LinkState::Disconnected;

        if first {
            tracing::info!("Disconnected from {}", self.name());
        }
    }

    fn sink(&self) -> Option<Arc<dyn SerialSink>> {
        self.sink.lock().clone()
    }

    fn background_disconnect(&self) {
        if let Some(sink) = self.sink() {
            sink.produce_io_error(TransportError::io(io::ErrorKind::Other, "background disconnect"));
        }
        self.disconnect();
    }

    fn run(&self) {
        tracing::info!("Connecting to {}", self.name());

        if let Err(e) = self.transport.connect() {
            tracing::warn!("Connection to {} failed: {}", self.name(), e);
            *self.state.write() = LinkState::Disconnected;
            if let Some(sink) = self.sink() {
                sink.produce_connection_error(TransportError::connect(e));
            }
            self.disconnect();
            return;
        }

        {
            let mut state = self.state.write();
            if self.closed.load(Ordering::SeqCst) {
                drop(state);
                self.transport.close();
                return;
            }
            *state = LinkState::Connected;
        }

        tracing::info!("Connected to {}", self.name());
        if let Some(sink) = self.sink() {
            sink.produce_connected();
        }
        self.read_loop();
    }

    fn read_loop(&self) {
        let mut buffer = vec![0u8; self.config.read_chunk_size.max(1)];
        loop {
            match self.transport.read(&mut buffer) {
                Ok(0) => {
                    self.fail(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer"));
                    return;
                }
                Ok(n) => {
                    tracing::trace!("Read {} bytes from {}", n, self.name());
                    if let Some(sink) = self.sink() {
                        sink.produce_data(Bytes::copy_from_slice(&buffer[..n]));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.fail(e);
                    return;
                }
            }
        }
    }

    fn fail(&self, err: io::Error) {
        *self.state.write() = LinkState::Disconnected;
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        tracing::warn!("Connection to {} lost: {}", self.name(), err);
        if let Some(sink) = self.sink() {
            sink.produce_io_error(TransportError::from(err));
        }
        self.disconnect();
    }
}

impl Disconnect for SerialSocket {
    fn disconnect(&self) {
        SerialSocket::disconnect(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::TransportType;
    use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
    use std::time::Duration;

    /// In-memory transport fed through a channel
    struct ChannelTransport {
        fail_connect: bool,
        incoming: Mutex<Receiver<Vec<u8>>>,
        written: Mutex<Vec<u8>>,
        closed: AtomicBool,
    }

    impl ChannelTransport {
        fn new(fail_connect: bool) -> (Self, Sender<Vec<u8>>) {
            let (tx, rx) = unbounded();
            let transport = Self {
                fail_connect,
                incoming: Mutex::new(rx),
                written: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            };
            (transport, tx)
        }
    }

    impl TransportTrait for ChannelTransport {
        fn connect(&self) -> io::Result<()> {
            if self.fail_connect {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            } else {
                Ok(())
            }
        }

        fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
            let rx = self.incoming.lock();
            loop {
                if self.closed.load(Ordering::SeqCst) {
                    return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "closed"));
                }
                match rx.recv_timeout(Duration::from_millis(10)) {
                    Ok(chunk) => {
                        buf[..chunk.len()].copy_from_slice(&chunk);
                        return Ok(chunk.len());
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return Ok(0),
                }
            }
        }

        fn write_all(&self, data: &[u8]) -> io::Result<()> {
            self.written.lock().extend_from_slice(data);
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn name(&self) -> String {
            "channel".to_string()
        }

        fn transport_type(&self) -> TransportType {
            TransportType::Tcp
        }
    }

    #[derive(Debug)]
    enum Seen {
        Connected,
        ConnectionError,
        Data(Vec<u8>),
        IoError(String),
    }

    struct ChannelSink(Sender<Seen>);

    impl SerialSink for ChannelSink {
        fn produce_connected(&self) {
            self.0.send(Seen::Connected).ok();
        }

        fn produce_connection_error(&self, _error: TransportError) {
            self.0.send(Seen::ConnectionError).ok();
        }

        fn produce_data(&self, data: Bytes) {
            self.0.send(Seen::Data(data.to_vec())).ok();
        }

        fn produce_io_error(&self, error: TransportError) {
            self.0.send(Seen::IoError(error.to_string())).ok();
        }
    }

    fn next(rx: &Receiver<Seen>) -> Seen {
        rx.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    fn wait_for(socket: &SerialSocket, state: LinkState) {
        for _ in 0..200 {
            if socket.state() == state {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("socket never reached {state:?}");
    }

    #[test]
    fn test_connect_read_and_eof() {
        let (transport, feed) = ChannelTransport::new(false);
        let socket = Arc::new(SerialSocket::new(Box::new(transport)));
        let (tx, rx) = unbounded();

        assert!(matches!(socket.write(b"early"), Err(TransportError::NotConnected)));
        socket.connect(Arc::new(ChannelSink(tx))).unwrap();
        assert!(matches!(next(&rx), Seen::Connected));

        feed.send(b"hello".to_vec()).unwrap();
        assert!(matches!(next(&rx), Seen::Data(d) if d == b"hello"));
        socket.write(b"ping").unwrap();

        drop(feed);
        assert!(matches!(next(&rx), Seen::IoError(msg) if msg == "connection closed by peer"));
        assert_eq!(socket.state(), LinkState::Disconnected);
        assert!(matches!(socket.write(b"late"), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_connect_failure_reports_connection_error() {
        let (transport, _feed) = ChannelTransport::new(true);
        let socket = Arc::new(SerialSocket::new(Box::new(transport)));
        let (tx, rx) = unbounded();

        socket.connect(Arc::new(ChannelSink(tx))).unwrap();
        assert!(matches!(next(&rx), Seen::ConnectionError));
        wait_for(&socket, LinkState::Disconnected);
    }

    #[test]
    fn test_disconnect_is_quiet_and_idempotent() {
        let (transport, _feed) = ChannelTransport::new(false);
        let socket = Arc::new(SerialSocket::new(Box::new(transport)));
        let (tx, rx) = unbounded();

        socket.connect(Arc::new(ChannelSink(tx))).unwrap();
        assert!(matches!(next(&rx), Seen::Connected));

        socket.disconnect();
        socket.disconnect();
        assert_eq!(socket.state(), LinkState::Disconnected);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_socket_is_single_use() {
        let (transport, _feed) = ChannelTransport::new(false);
        let socket = Arc::new(SerialSocket::new(Box::new(transport)));
        let (tx, _rx) = unbounded();
        socket.connect(Arc::new(ChannelSink(tx.clone()))).unwrap();
        assert!(socket.connect(Arc::new(ChannelSink(tx))).is_err());
        socket.disconnect();
    }

    #[test]
    fn test_signal_reports_background_disconnect() {
        let signal = DisconnectSignal::new();
        let (transport, _feed) = ChannelTransport::new(false);
        let socket = Arc::new(SerialSocket::new(Box::new(transport)).with_signal(signal.clone()));
        let (tx, rx) = unbounded();

        socket.connect(Arc::new(ChannelSink(tx))).unwrap();
        assert!(matches!(next(&rx), Seen::Connected));
        assert_eq!(signal.len(), 1);

        assert_eq!(signal.fire(), 1);
        assert!(matches!(next(&rx), Seen::IoError(msg) if msg == "background disconnect"));
        assert!(signal.is_empty());
        assert_eq!(socket.state(), LinkState::Disconnected);
    }
}
