//! RFCOMM/SPP Bluetooth Serial transport
//!
//! Provides serial port emulation over Bluetooth Classic. On Linux this is a
//! BlueZ `AF_BLUETOOTH` stream socket; other platforms report
//! `PlatformNotSupported` at connect time.

use super::parse_mac_address;
use crate::core::transport::{TransportTrait, TransportType};
use std::io;

#[cfg(target_os = "linux")]
use parking_lot::RwLock;
#[cfg(target_os = "linux")]
use std::fs::File;
#[cfg(target_os = "linux")]
use std::sync::Arc;

/// RFCOMM channel configuration
#[derive(Debug, Clone)]
pub struct RfcommConfig {
    /// Device address (MAC)
    pub address: String,
    /// RFCOMM channel number
    pub channel: u8,
}

impl RfcommConfig {
    /// Create a new RFCOMM configuration on channel 1
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            channel: 1,
        }
    }

    /// Set specific RFCOMM channel
    #[must_use]
    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }
}

impl Default for RfcommConfig {
    fn default() -> Self {
        Self::new("00:00:00:00:00:00")
    }
}

/// RFCOMM transport for Bluetooth Serial
pub struct RfcommTransport {
    config: RfcommConfig,
    #[cfg(target_os = "linux")]
    socket: RwLock<Option<Arc<File>>>,
}

impl RfcommTransport {
    /// Create a new RFCOMM transport
    pub fn new(config: RfcommConfig) -> Self {
        Self {
            config,
            #[cfg(target_os = "linux")]
            socket: RwLock::new(None),
        }
    }

    /// Configured channel
    pub fn channel(&self) -> u8 {
        self.config.channel
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    const BTPROTO_RFCOMM: libc::c_int = 3;

    #[repr(C)]
    struct SockaddrRc {
        rc_family: libc::sa_family_t,
        rc_bdaddr: [u8; 6],
        rc_channel: u8,
    }

    /// Open a connected RFCOMM stream socket
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(super) fn connect(address: [u8; 6], channel: u8) -> io::Result<File> {
        // SAFETY: plain socket(2) call; the result is checked before use
        let raw = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                BTPROTO_RFCOMM,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` is a fresh descriptor owned by nobody else
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // bdaddr_t is little-endian
        let mut bdaddr = address;
        bdaddr.reverse();
        let addr = SockaddrRc {
            rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: bdaddr,
            rc_channel: channel,
        };

        // SAFETY: `addr` outlives the call and the length matches its layout
        let rc = unsafe {
            libc::connect(
                fd.as_raw_fd(),
                std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                std::mem::size_of::<SockaddrRc>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(File::from(fd))
    }

    /// Wake any reader blocked on the socket
    pub(super) fn shutdown(file: &File) {
        // SAFETY: the descriptor stays open for the lifetime of `file`
        unsafe {
            libc::shutdown(file.as_raw_fd(), libc::SHUT_RDWR);
        }
    }
}

#[cfg(target_os = "linux")]
impl RfcommTransport {
    fn socket(&self) -> io::Result<Arc<File>> {
        self.socket
            .read()
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket not connected"))
    }
}

#[cfg(target_os = "linux")]
impl TransportTrait for RfcommTransport {
    fn connect(&self) -> io::Result<()> {
        let address = parse_mac_address(&self.config.address)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        tracing::info!(
            "Connecting to Bluetooth device {} on channel {}",
            self.config.address,
            self.config.channel
        );
        let file = sys::connect(address, self.config.channel)?;
        *self.socket.write() = Some(Arc::new(file));
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        use std::io::Read;
        let socket = self.socket()?;
        (&*socket).read(buf)
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        use std::io::Write;
        let socket = self.socket()?;
        (&*socket).write_all(data)
    }

    fn close(&self) {
        if let Some(socket) = self.socket.write().take() {
            tracing::debug!("Closing RFCOMM socket to {}", self.config.address);
            sys::shutdown(&socket);
        }
    }

    fn name(&self) -> String {
        self.config.address.clone()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Rfcomm
    }
}

#[cfg(not(target_os = "linux"))]
impl TransportTrait for RfcommTransport {
    fn connect(&self) -> io::Result<()> {
        parse_mac_address(&self.config.address)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            crate::core::transport::TransportError::PlatformNotSupported.to_string(),
        ))
    }

    fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::NotConnected, "socket not connected"))
    }

    fn write_all(&self, _data: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::NotConnected, "socket not connected"))
    }

    fn close(&self) {}

    fn name(&self) -> String {
        self.config.address.clone()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Rfcomm
    }
}
