//! Serial port transport implementation
//!
//! Reads use a short port timeout and loop until data arrives or the
//! transport is closed, so `close` from another thread ends a blocked read
//! within one timeout period.

use super::{closed_error, TransportTrait, TransportType};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serialport::{FlowControl, SerialPort};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial port flow control type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialFlowControl {
    /// No flow control
    #[default]
    None,
    /// Hardware flow control (RTS/CTS)
    Hardware,
    /// Software flow control (XON/XOFF)
    Software,
}

impl From<SerialFlowControl> for FlowControl {
    fn from(flow: SerialFlowControl) -> Self {
        match flow {
            SerialFlowControl::Hardware => FlowControl::Hardware,
            SerialFlowControl::Software => FlowControl::Software,
            SerialFlowControl::None => FlowControl::None,
        }
    }
}

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., COM3, /dev/ttyUSB0, /dev/rfcomm0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Flow control
    pub flow_control: SerialFlowControl,
}

impl SerialConfig {
    /// Create a new serial configuration with 8N1 framing
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            flow_control: SerialFlowControl::None,
        }
    }

    /// Set flow control
    #[must_use]
    pub fn flow_control(mut self, flow: SerialFlowControl) -> Self {
        self.flow_control = flow;
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/rfcomm0", 115_200)
    }
}

/// Serial port transport
pub struct SerialPortTransport {
    config: SerialConfig,
    reader: Mutex<Option<Box<dyn SerialPort>>>,
    writer: Mutex<Option<Box<dyn SerialPort>>>,
    closed: AtomicBool,
}

impl SerialPortTransport {
    /// Create a new serial transport
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }
}

impl TransportTrait for SerialPortTransport {
    fn connect(&self) -> io::Result<()> {
        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .flow_control(self.config.flow_control.into())
            .timeout(POLL_TIMEOUT)
            .open()?;
        let writer = port.try_clone()?;

        *self.reader.lock() = Some(port);
        *self.writer.lock() = Some(writer);
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = self.reader.lock();
        loop {
            if self.closed.load(Ordering::Acquire) {
                guard.take();
                return Err(closed_error());
            }
            let port = guard.as_mut().ok_or_else(closed_error)?;
            match port.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                other => return other,
            }
        }
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut guard = self.writer.lock();
        let port = guard.as_mut().ok_or_else(closed_error)?;
        port.write_all(data)?;
        port.flush()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.writer.lock().take();
    }

    fn name(&self) -> String {
        format!("{} @ {} baud", self.config.port, self.config.baud_rate)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Serial
    }
}

/// List available serial ports
pub fn list_ports() -> io::Result<Vec<serialport::SerialPortInfo>> {
    Ok(serialport::available_ports()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_port_fails_to_connect() {
        let transport = SerialPortTransport::new(SerialConfig::new("/dev/does-not-exist-sppterm", 9600));
        assert!(transport.connect().is_err());
    }

    #[test]
    fn test_closed_transport_rejects_io() {
        let transport = SerialPortTransport::new(SerialConfig::default());
        transport.close();
        let mut buf = [0u8; 4];
        assert!(transport.read(&mut buf).is_err());
        assert!(transport.write_all(b"x").is_err());
    }

    #[test]
    fn test_name() {
        let transport = SerialPortTransport::new(SerialConfig::new("/dev/ttyUSB0", 9600));
        assert_eq!(transport.name(), "/dev/ttyUSB0 @ 9600 baud");
        assert_eq!(transport.transport_type(), TransportType::Serial);
    }
}
