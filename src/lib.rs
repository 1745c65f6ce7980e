//! # sppterm Core Library
//!
//! A serial terminal core for Bluetooth SPP devices, with support for:
//! - RFCOMM sockets (Linux)
//! - TCP/IP connections
//! - Serial ports, including bound `/dev/rfcomm*` devices
//!
//! ## Features
//!
//! - Hex and caret-notation codecs for terminal display
//! - Event delivery that survives the listener detaching and reattaching
//! - Read batching while the consumer is busy
//! - Forced disconnect when errors cannot be delivered
//! - TOML configuration and a CLI with exit codes
//!
//! ## Example
//!
//! ```rust,no_run
//! use sppterm_core::{create_transport, Session, TcpConfig, Transport};
//! use sppterm_core::core::bridge::{DataBatch, SerialListener};
//! use sppterm_core::core::transport::TransportError;
//! use std::time::Duration;
//!
//! struct Printer;
//!
//! impl SerialListener for Printer {
//!     fn on_serial_connected(&mut self) {
//!         println!("connected");
//!     }
//!     fn on_serial_connection_error(&mut self, error: TransportError) {
//!         println!("failed: {error}");
//!     }
//!     fn on_serial_read(&mut self, data: DataBatch) {
//!         for chunk in data {
//!             println!("{:?}", chunk);
//!         }
//!     }
//!     fn on_serial_io_error(&mut self, error: TransportError) {
//!         println!("lost: {error}");
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let (session, mut delivery) = Session::new();
//!     delivery.attach(Box::new(Printer));
//!
//!     let transport = create_transport(Transport::Tcp(TcpConfig::new("localhost", 2323)));
//!     session.connect(transport)?;
//!     session.write(b"AT\r\n")?;
//!
//!     while session.is_connected() {
//!         delivery.run_timeout(Duration::from_millis(100));
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::{AppConfig, LineEnding};
pub use crate::core::bluetooth::{BluetoothDevice, RfcommConfig, SPP_UUID};
pub use crate::core::bridge::{DeliveryLoop, EventBridge, SerialEvent, SerialListener};
pub use crate::core::codec::{decode_hex, encode_hex, to_caret_string, Codec, CodecType, HexCodec};
pub use crate::core::session::Session;
pub use crate::core::terminal::Terminal;
pub use crate::core::transport::{
    create_transport, SerialConfig, SerialFlowControl, TcpConfig, Transport, TransportType,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
