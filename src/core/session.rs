//! Session management for handling connections
//!
//! A Session is the long-lived owner of the event bridge and of at most one
//! live [`SerialSocket`]. It is created once, together with the
//! [`DeliveryLoop`] that the terminal attaches to, and outlives any number of
//! connect/disconnect cycles.

use crate::core::bridge::{DeliveryLoop, Disconnect, EventBridge};
use crate::core::signal::DisconnectSignal;
use crate::core::socket::{SerialSocket, SocketConfig};
use crate::core::transport::{TransportError, TransportTrait};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Connection owner; cheap to clone
#[derive(Clone)]
pub struct Session {
    /// Unique session ID
    id: Uuid,
    bridge: EventBridge,
    socket: Arc<Mutex<Option<Arc<SerialSocket>>>>,
    signal: DisconnectSignal,
    config: SocketConfig,
}

impl Session {
    /// Create a session with default socket settings
    pub fn new() -> (Self, DeliveryLoop) {
        Self::with_config(SocketConfig::default())
    }

    /// Create a session
    pub fn with_config(config: SocketConfig) -> (Self, DeliveryLoop) {
        let (bridge, delivery) = EventBridge::new();
        let session = Self {
            id: Uuid::new_v4(),
            bridge,
            socket: Arc::new(Mutex::new(None)),
            signal: DisconnectSignal::new(),
            config,
        };
        (session, delivery)
    }

    /// Get session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Trigger that disconnects whatever is connected
    pub fn signal(&self) -> &DisconnectSignal {
        &self.signal
    }

    /// Start connecting over `transport`.
    ///
    /// Returns once the worker thread is running; the outcome arrives as a
    /// connected or connection error event. Any previous connection is
    /// closed first.
    pub fn connect(&self, transport: Box<dyn TransportTrait>) -> Result<(), TransportError> {
        self.disconnect();

        let socket = Arc::new(
            SerialSocket::with_config(transport, self.config.clone()).with_signal(self.signal.clone()),
        );
        tracing::info!("Session {}: connecting to {}", self.id, socket.name());

        let link: Arc<dyn Disconnect> = socket.clone();
        let producer = self.bridge.open(link);
        *self.socket.lock() = Some(Arc::clone(&socket));

        if let Err(e) = socket.connect(Arc::new(producer)) {
            self.bridge.close();
            return Err(e);
        }
        Ok(())
    }

    /// Close the connection. Idempotent; events still in flight are kept.
    pub fn disconnect(&self) {
        if self.bridge.close() {
            tracing::info!("Session {}: disconnected", self.id);
        }
        self.socket.lock().take();
    }

    /// Write to the live connection
    pub fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.bridge.is_open() {
            return Err(TransportError::NotConnected);
        }
        let socket = self.socket.lock().clone().ok_or(TransportError::NotConnected)?;
        socket.write(data)
    }

    /// True from `connect` until the connection is closed or torn down
    pub fn is_connected(&self) -> bool {
        self.bridge.is_open()
    }

    /// Name of the connected peer, `None` once the session is closed
    pub fn device_name(&self) -> Option<String> {
        let socket = self.socket.lock();
        socket.as_ref().filter(|_| self.bridge.is_open()).map(|s| s.name())
    }

    /// Events waiting for a listener
    pub fn queued_events(&self) -> usize {
        self.bridge.queued()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{TcpConfig, TcpTransport};
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    #[test]
    fn test_write_requires_connection() {
        let (session, _delivery) = Session::new();
        assert!(!session.is_connected());
        assert!(matches!(session.write(b"x"), Err(TransportError::NotConnected)));
        assert!(session.device_name().is_none());
        session.disconnect();
        session.disconnect();
    }

    #[test]
    fn test_connect_opens_session_until_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (session, _delivery) = Session::new();
        let transport = TcpTransport::new(TcpConfig::new("127.0.0.1", port).timeout(2));
        session.connect(Box::new(transport)).unwrap();
        assert!(session.is_connected());
        assert_eq!(session.device_name(), Some(format!("127.0.0.1:{port}")));

        session.disconnect();
        assert!(!session.is_connected());
        assert!(session.device_name().is_none());
    }

    #[test]
    fn test_forced_disconnect_clears_device_name() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        // no listener attached, so the connection error forces a disconnect
        let (session, _delivery) = Session::new();
        let transport = TcpTransport::new(TcpConfig::new("127.0.0.1", port).timeout(2));
        session.connect(Box::new(transport)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while session.is_connected() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!session.is_connected());
        assert!(session.device_name().is_none());
        assert_eq!(session.queued_events(), 1);
    }
}
