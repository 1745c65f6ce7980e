//! Transport layer for the stream the terminal talks over
//!
//! Supports:
//! - Bluetooth Classic RFCOMM (Serial Port Profile)
//! - Raw TCP (RFCOMM bridges, loopback testing)
//! - Local serial ports
//!
//! Transports are blocking and shared between threads: the connection worker
//! sits in [`TransportTrait::read`] while writers and `close` run elsewhere.

mod serial;
mod tcp;

pub use serial::{list_ports, SerialConfig, SerialFlowControl, SerialPortTransport};
pub use tcp::{TcpConfig, TcpTransport};

use crate::core::bluetooth::{RfcommConfig, RfcommTransport};
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Transport configuration
#[derive(Debug, Clone)]
pub enum Transport {
    /// Bluetooth RFCOMM/SPP connection
    Rfcomm(RfcommConfig),
    /// Raw TCP connection
    Tcp(TcpConfig),
    /// Serial port connection
    Serial(SerialConfig),
}

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Bluetooth RFCOMM
    Rfcomm,
    /// Raw TCP
    Tcp,
    /// Serial port
    Serial,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rfcomm => write!(f, "RFCOMM"),
            Self::Tcp => write!(f, "TCP"),
            Self::Serial => write!(f, "Serial"),
        }
    }
}

/// Transport error types
///
/// Cloneable so that an error can travel inside a queued event and be
/// replayed to a consumer later.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Connection attempt failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(Arc<io::Error>),

    /// Read or write failed on an established connection
    #[error("{0}")]
    Io(Arc<io::Error>),

    /// Operation needs a live connection
    #[error("Not connected")]
    NotConnected,

    /// Malformed device address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Transport not available on this platform
    #[error("Platform not supported for this transport")]
    PlatformNotSupported,
}

impl TransportError {
    /// Wrap a failed connection attempt
    pub fn connect(err: io::Error) -> Self {
        Self::ConnectionFailed(Arc::new(err))
    }

    /// I/O error built from a kind and message
    pub fn io(kind: io::ErrorKind, msg: &str) -> Self {
        Self::Io(Arc::new(io::Error::new(kind, msg.to_string())))
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Blocking duplex byte stream
pub trait TransportTrait: Send + Sync {
    /// Open the underlying link
    fn connect(&self) -> io::Result<()>;

    /// Block until bytes arrive. `Ok(0)` means end of stream.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data`
    fn write_all(&self, data: &[u8]) -> io::Result<()>;

    /// Close the link. Idempotent; a blocked `read` returns promptly.
    fn close(&self);

    /// Human readable peer name
    fn name(&self) -> String;

    /// Get transport type
    fn transport_type(&self) -> TransportType;
}

/// Create a transport instance from configuration
pub fn create_transport(config: Transport) -> Box<dyn TransportTrait> {
    match config {
        Transport::Rfcomm(cfg) => Box::new(RfcommTransport::new(cfg)),
        Transport::Tcp(cfg) => Box::new(TcpTransport::new(cfg)),
        Transport::Serial(cfg) => Box::new(SerialPortTransport::new(cfg)),
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "transport closed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::connect(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(err.to_string(), "Connection failed: refused");
        assert_eq!(TransportError::NotConnected.to_string(), "Not connected");
        let io_err = TransportError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert_eq!(io_err.to_string(), "eof");
    }

    #[test]
    fn test_create_transport_names() {
        let tcp = create_transport(Transport::Tcp(TcpConfig::new("localhost", 2000)));
        assert_eq!(tcp.transport_type(), TransportType::Tcp);
        assert_eq!(tcp.name(), "localhost:2000");

        let rfcomm = create_transport(Transport::Rfcomm(RfcommConfig::new("AA:BB:CC:DD:EE:FF")));
        assert_eq!(rfcomm.transport_type(), TransportType::Rfcomm);
        assert_eq!(rfcomm.name(), "AA:BB:CC:DD:EE:FF");
    }
}
