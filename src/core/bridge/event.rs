//! Events flowing from a connection worker to the terminal, and the two
//! capability traits on either side of the bridge.

use crate::core::transport::TransportError;
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Reads coalesced into one delivery, oldest first
pub type DataBatch = VecDeque<Bytes>;

/// Connection lifecycle or data event
#[derive(Debug, Clone)]
pub enum SerialEvent {
    /// Link established
    Connected,
    /// Link could not be established
    ConnectionError(TransportError),
    /// One or more reads
    Data(DataBatch),
    /// Established link failed
    IoError(TransportError),
}

impl SerialEvent {
    /// Batch holding a single read
    pub fn data(bytes: Bytes) -> Self {
        Self::Data(DataBatch::from([bytes]))
    }

    /// Error events tear the session down when they cannot be delivered live
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::IoError(_))
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::ConnectionError(_) => "connection error",
            Self::Data(_) => "data",
            Self::IoError(_) => "io error",
        }
    }

    /// Hand the event to a listener
    pub fn dispatch(self, listener: &mut dyn SerialListener) {
        match self {
            Self::Connected => listener.on_serial_connected(),
            Self::ConnectionError(e) => listener.on_serial_connection_error(e),
            Self::Data(batch) => listener.on_serial_read(batch),
            Self::IoError(e) => listener.on_serial_io_error(e),
        }
    }
}

/// Consumer side: called only on the delivery thread
pub trait SerialListener {
    /// Link established
    fn on_serial_connected(&mut self);

    /// Connect attempt failed
    fn on_serial_connection_error(&mut self, error: TransportError);

    /// Batched reads, in arrival order
    fn on_serial_read(&mut self, data: DataBatch);

    /// Established link failed
    fn on_serial_io_error(&mut self, error: TransportError);
}

impl<T: SerialListener + ?Sized> SerialListener for Rc<RefCell<T>> {
    fn on_serial_connected(&mut self) {
        self.borrow_mut().on_serial_connected();
    }

    fn on_serial_connection_error(&mut self, error: TransportError) {
        self.borrow_mut().on_serial_connection_error(error);
    }

    fn on_serial_read(&mut self, data: DataBatch) {
        self.borrow_mut().on_serial_read(data);
    }

    fn on_serial_io_error(&mut self, error: TransportError) {
        self.borrow_mut().on_serial_io_error(error);
    }
}

/// Producer side: called from connection worker threads
pub trait SerialSink: Send + Sync {
    /// Link established
    fn produce_connected(&self);

    /// Connect attempt failed
    fn produce_connection_error(&self, error: TransportError);

    /// Bytes read from the link
    fn produce_data(&self, data: Bytes);

    /// Established link failed
    fn produce_io_error(&self, error: TransportError);
}
