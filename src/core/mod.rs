//! Core module containing the main functionality of sppterm
//!
//! This module provides:
//! - Transport layer for the connection types (RFCOMM, TCP, serial)
//! - Bluetooth device records and the SPP service UUID
//! - Codecs for hex and caret-encoded text
//! - Event bridge from socket threads to the consumer thread
//! - Connection worker and session handling
//! - Headless terminal rendering

pub mod bluetooth;
pub mod bridge;
pub mod codec;
pub mod executor;
pub mod session;
pub mod signal;
pub mod socket;
pub mod terminal;
pub mod transport;
