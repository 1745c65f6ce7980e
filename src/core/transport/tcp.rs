//! TCP transport implementation

use super::{closed_error, TransportTrait, TransportType};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// TCP connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Connection timeout in seconds
    pub timeout_secs: u64,
}

impl TcpConfig {
    /// Create a new TCP configuration
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout_secs: 10,
        }
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Parse `host:port`
    pub fn parse(target: &str) -> Option<Self> {
        let (host, port) = target.rsplit_once(':')?;
        let port = port.parse().ok()?;
        if host.is_empty() {
            return None;
        }
        Some(Self::new(host, port))
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self::new("localhost", 23)
    }
}

/// TCP transport
pub struct TcpTransport {
    config: TcpConfig,
    stream: RwLock<Option<Arc<TcpStream>>>,
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            stream: RwLock::new(None),
        }
    }

    fn stream(&self) -> io::Result<Arc<TcpStream>> {
        self.stream.read().clone().ok_or_else(closed_error)
    }
}

impl TransportTrait for TcpTransport {
    fn connect(&self) -> io::Result<()> {
        let timeout = Duration::from_secs(self.config.timeout_secs.max(1));
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host did not resolve");

        for addr in (self.config.host.as_str(), self.config.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    // Set TCP_NODELAY for lower latency
                    stream.set_nodelay(true)?;
                    *self.stream.write() = Some(Arc::new(stream));
                    return Ok(());
                }
                Err(e) => last_err = e,
            }
        }

        Err(last_err)
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let stream = self.stream()?;
        (&*stream).read(buf)
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let stream = self.stream()?;
        let mut writer = &*stream;
        writer.write_all(data)?;
        writer.flush()
    }

    fn close(&self) {
        if let Some(stream) = self.stream.write().take() {
            stream.shutdown(Shutdown::Both).ok();
        }
    }

    fn name(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_parse_target() {
        let cfg = TcpConfig::parse("127.0.0.1:4000").unwrap();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 4000);
        assert!(TcpConfig::parse("nohost").is_none());
        assert!(TcpConfig::parse(":80").is_none());
        assert!(TcpConfig::parse("host:notaport").is_none());
    }

    #[test]
    fn test_read_before_connect_fails() {
        let transport = TcpTransport::new(TcpConfig::default());
        let mut buf = [0u8; 8];
        assert!(transport.read(&mut buf).is_err());
        assert!(transport.write_all(b"x").is_err());
    }

    #[test]
    fn test_close_unblocks_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || listener.accept().map(|(s, _)| s));

        let transport = Arc::new(TcpTransport::new(TcpConfig::new("127.0.0.1", port)));
        transport.connect().unwrap();
        let _peer = server.join().unwrap().unwrap();

        let reader = Arc::clone(&transport);
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 16];
            reader.read(&mut buf)
        });

        thread::sleep(Duration::from_millis(50));
        transport.close();
        transport.close();

        // shutdown wakes the reader with EOF or an error
        let result = handle.join().unwrap();
        assert!(matches!(result, Ok(0) | Err(_)));
    }
}
