//! Event bridge between connection workers and a detachable listener
//!
//! Workers call the [`SerialSink`] methods of a [`Producer`] from their own
//! threads. Every listener callback runs on the single thread that drives the
//! [`DeliveryLoop`]. The listener may come and go at any time:
//! - while attached, events are posted to the delivery thread
//! - a posted event that finds no listener is stranded for the next attach
//! - while detached, events are queued directly in the backlog
//! - `attach` replays stranded events, then the backlog
//!
//! Reads that arrive before the delivery thread catches up are coalesced into
//! one [`DataBatch`]. Error events that cannot be delivered live force a
//! disconnect. Once a session is closed its producer goes silent.

mod event;
mod mailbox;

pub use event::{DataBatch, SerialEvent, SerialListener, SerialSink};
pub use mailbox::{Attachment, Mailbox};

use crate::core::executor::{LocalExecutor, Spawner};
use crate::core::transport::TransportError;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Listener slot, owned by the delivery thread
pub type Slot = Option<Box<dyn SerialListener>>;

/// Tears down a live connection
#[cfg_attr(test, mockall::automock)]
pub trait Disconnect: Send + Sync {
    /// Close the connection. Must be idempotent.
    fn disconnect(&self);
}

/// Live session and its teardown hook
struct Link {
    epoch: u64,
    target: Option<Arc<dyn Disconnect>>,
}

struct Shared {
    /// Outer lock: attachment and both queues
    mailbox: Mutex<Mailbox>,
    /// Inner lock: reads waiting for the next batched delivery
    pending_read: Mutex<DataBatch>,
    /// Epoch of the open session, 0 when closed
    session: AtomicU64,
    next_session: AtomicU64,
    link: Mutex<Link>,
    spawner: Spawner<Slot>,
}

impl Shared {
    fn is_current(&self, epoch: u64) -> bool {
        self.session.load(Ordering::Acquire) == epoch
    }

    /// Close the session if it is still `epoch` (any session for `None`)
    fn shutdown(&self, epoch: Option<u64>) -> bool {
        let target = {
            let mut link = self.link.lock();
            if link.epoch == 0 || epoch.is_some_and(|e| e != link.epoch) {
                return false;
            }
            // producers check the session under this lock
            let _mailbox = self.mailbox.lock();
            self.session.store(0, Ordering::Release);
            link.epoch = 0;
            link.target.take()
        };

        if let Some(target) = target {
            target.disconnect();
        }
        true
    }

    fn force_disconnect(&self, epoch: u64, kind: &str) {
        if self.shutdown(Some(epoch)) {
            tracing::warn!("Undeliverable {} event, disconnecting session {}", kind, epoch);
        }
    }

    /// Runs on the delivery thread
    fn deliver(&self, slot: &mut Slot, event: SerialEvent, epoch: u64) {
        if let Some(listener) = slot.as_mut() {
            event.dispatch(listener.as_mut());
            return;
        }

        let kind = event.kind();
        let is_error = event.is_error();
        tracing::debug!("No listener for {} event, stranding it", kind);
        self.mailbox.lock().strand(event);
        if is_error {
            self.force_disconnect(epoch, kind);
        }
    }

    /// Runs on the delivery thread
    fn deliver_pending_read(&self, slot: &mut Slot, epoch: u64) {
        let batch = std::mem::take(&mut *self.pending_read.lock());
        if batch.is_empty() {
            return;
        }
        tracing::trace!("Delivering batch of {} reads", batch.len());
        self.deliver(slot, SerialEvent::Data(batch), epoch);
    }
}

/// Owner-side handle: opens and closes sessions
#[derive(Clone)]
pub struct EventBridge {
    shared: Arc<Shared>,
}

impl EventBridge {
    /// Create a bridge and the loop that delivers its events
    pub fn new() -> (Self, DeliveryLoop) {
        let executor = LocalExecutor::new();
        let shared = Arc::new(Shared {
            mailbox: Mutex::new(Mailbox::new()),
            pending_read: Mutex::new(DataBatch::new()),
            session: AtomicU64::new(0),
            next_session: AtomicU64::new(1),
            link: Mutex::new(Link {
                epoch: 0,
                target: None,
            }),
            spawner: executor.spawner(),
        });

        let delivery = DeliveryLoop {
            executor,
            slot: None,
            shared: Arc::clone(&shared),
        };
        (Self { shared }, delivery)
    }

    /// Start a session. `link` is disconnected when the session is closed.
    ///
    /// A session that is still open is closed first.
    pub fn open(&self, link: Arc<dyn Disconnect>) -> Producer {
        let epoch = self.shared.next_session.fetch_add(1, Ordering::Relaxed);
        let previous = {
            let mut guard = self.shared.link.lock();
            let _mailbox = self.shared.mailbox.lock();
            let previous = guard.target.replace(link);
            guard.epoch = epoch;
            self.shared.session.store(epoch, Ordering::Release);
            previous
        };

        if let Some(previous) = previous {
            tracing::debug!("Replacing open session");
            previous.disconnect();
        }
        tracing::debug!("Opened session {}", epoch);

        Producer {
            shared: Arc::clone(&self.shared),
            epoch,
        }
    }

    /// Close the open session. Returns false if none was open.
    pub fn close(&self) -> bool {
        self.shared.shutdown(None)
    }

    /// True while a session is open
    pub fn is_open(&self) -> bool {
        self.shared.session.load(Ordering::Acquire) != 0
    }

    /// Events waiting for an attach
    pub fn queued(&self) -> usize {
        self.shared.mailbox.lock().len()
    }
}

/// Worker-side handle bound to one session
#[derive(Clone)]
pub struct Producer {
    shared: Arc<Shared>,
    epoch: u64,
}

impl Producer {
    /// Session this producer feeds
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True until the session is closed or replaced
    pub fn is_current(&self) -> bool {
        self.shared.is_current(self.epoch)
    }

    fn post<F>(&self, task: F)
    where
        F: FnOnce(&Shared, &mut Slot) + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        if !self.shared.spawner.post(move |slot: &mut Slot| task(&shared, slot)) {
            tracing::debug!("Delivery loop is gone, dropping event");
        }
    }

    fn produce(&self, event: SerialEvent) {
        let kind = event.kind();
        let force = {
            let mut mailbox = self.shared.mailbox.lock();
            if !self.is_current() {
                tracing::debug!("Session {} closed, dropping {} event", self.epoch, kind);
                return;
            }
            if mailbox.is_attached() {
                let epoch = self.epoch;
                self.post(move |shared, slot| shared.deliver(slot, event, epoch));
                false
            } else {
                let is_error = event.is_error();
                mailbox.push_backlog(event);
                is_error
            }
        };

        if force {
            self.shared.force_disconnect(self.epoch, kind);
        }
    }
}

impl SerialSink for Producer {
    fn produce_connected(&self) {
        self.produce(SerialEvent::Connected);
    }

    fn produce_connection_error(&self, error: TransportError) {
        self.produce(SerialEvent::ConnectionError(error));
    }

    fn produce_data(&self, data: Bytes) {
        if data.is_empty() {
            return;
        }

        let mut mailbox = self.shared.mailbox.lock();
        if !self.is_current() {
            tracing::trace!("Session {} closed, dropping {} bytes", self.epoch, data.len());
            return;
        }
        if mailbox.is_attached() {
            let first = {
                let mut pending = self.shared.pending_read.lock();
                let first = pending.is_empty();
                pending.push_back(data);
                first
            };
            if first {
                let epoch = self.epoch;
                self.post(move |shared, slot| shared.deliver_pending_read(slot, epoch));
            }
        } else {
            mailbox.push_backlog_data(data);
        }
    }

    fn produce_io_error(&self, error: TransportError) {
        self.produce(SerialEvent::IoError(error));
    }
}

/// Delivery side: owns the listener slot. Drive it from one thread.
pub struct DeliveryLoop {
    executor: LocalExecutor<Slot>,
    slot: Slot,
    shared: Arc<Shared>,
}

impl DeliveryLoop {
    /// Register a listener and replay everything queued for it.
    ///
    /// Deliveries already in flight run first, so they reach the previous
    /// listener or are stranded ahead of the replay. Returns the listener
    /// that was attached before, if any.
    pub fn attach(&mut self, listener: Box<dyn SerialListener>) -> Option<Box<dyn SerialListener>> {
        self.executor.run_pending(&mut self.slot);

        let replay = self.shared.mailbox.lock().attach();
        let previous = self.slot.replace(listener);
        if !replay.is_empty() {
            tracing::debug!("Replaying {} queued events", replay.len());
        }
        if let Some(listener) = self.slot.as_mut() {
            for event in replay {
                event.dispatch(listener.as_mut());
            }
        }
        previous
    }

    /// Unregister the listener
    pub fn detach(&mut self) -> Option<Box<dyn SerialListener>> {
        let mut mailbox = self.shared.mailbox.lock();
        mailbox.detach();
        self.slot.take()
    }

    /// True while a listener is registered
    pub fn is_attached(&self) -> bool {
        self.slot.is_some()
    }

    /// Run deliveries posted so far
    pub fn run_pending(&mut self) -> usize {
        self.executor.run_pending(&mut self.slot)
    }

    /// Wait up to `timeout` for deliveries, then run them
    pub fn run_timeout(&mut self, timeout: Duration) -> usize {
        self.executor.run_timeout(&mut self.slot, timeout)
    }

    /// Deliveries posted but not yet run
    pub fn pending(&self) -> usize {
        self.executor.pending()
    }
}

/// Later events go to the backlog. Deliveries already posted are stranded,
/// so undeliverable errors still force a disconnect.
impl Drop for DeliveryLoop {
    fn drop(&mut self) {
        self.shared.mailbox.lock().detach();
        self.slot = None;
        let stranded = self.executor.run_pending(&mut self.slot);
        if stranded > 0 {
            tracing::debug!("Delivery loop dropped with {} deliveries in flight", stranded);
        }
    }
}
