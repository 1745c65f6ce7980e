//! Attachment state and the two undelivered-event queues

use super::event::{DataBatch, SerialEvent};
use bytes::Bytes;
use std::collections::VecDeque;

/// Whether a listener is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// A listener receives events live
    Attached,
    /// No listener; events wait for the next attach
    Detached,
}

/// Undelivered events, split at the last detach boundary.
///
/// `stranded` holds events that were already scheduled for live delivery but
/// found no listener when they ran. `backlog` holds events produced while
/// detached. Replay order is stranded first, then backlog.
#[derive(Debug)]
pub struct Mailbox {
    attachment: Attachment,
    stranded: VecDeque<SerialEvent>,
    backlog: VecDeque<SerialEvent>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// Empty, detached mailbox
    pub fn new() -> Self {
        Self {
            attachment: Attachment::Detached,
            stranded: VecDeque::new(),
            backlog: VecDeque::new(),
        }
    }

    /// Current attachment state
    pub fn attachment(&self) -> Attachment {
        self.attachment
    }

    /// True while a listener is registered
    pub fn is_attached(&self) -> bool {
        self.attachment == Attachment::Attached
    }

    /// Queue an event produced while detached
    pub fn push_backlog(&mut self, event: SerialEvent) {
        self.backlog.push_back(event);
    }

    /// Queue a read produced while detached, joining a trailing data batch
    pub fn push_backlog_data(&mut self, data: Bytes) {
        if let Some(SerialEvent::Data(batch)) = self.backlog.back_mut() {
            batch.push_back(data);
        } else {
            self.backlog.push_back(SerialEvent::Data(DataBatch::from([data])));
        }
    }

    /// Queue a scheduled delivery that found no listener
    pub fn strand(&mut self, event: SerialEvent) {
        self.stranded.push_back(event);
    }

    /// Mark attached and take every queued event in replay order
    pub fn attach(&mut self) -> Vec<SerialEvent> {
        self.attachment = Attachment::Attached;
        self.stranded.drain(..).chain(self.backlog.drain(..)).collect()
    }

    /// Mark detached
    pub fn detach(&mut self) {
        self.attachment = Attachment::Detached;
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.stranded.len() + self.backlog.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.stranded.is_empty() && self.backlog.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::TransportError;

    fn kinds(events: &[SerialEvent]) -> Vec<&'static str> {
        events.iter().map(SerialEvent::kind).collect()
    }

    #[test]
    fn test_starts_detached_and_empty() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.attachment(), Attachment::Detached);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_backlog_data_coalesces() {
        let mut mailbox = Mailbox::new();
        mailbox.push_backlog_data(Bytes::from_static(b"a"));
        mailbox.push_backlog_data(Bytes::from_static(b"b"));
        mailbox.push_backlog(SerialEvent::IoError(TransportError::NotConnected));
        mailbox.push_backlog_data(Bytes::from_static(b"c"));
        assert_eq!(mailbox.len(), 3);

        let events = mailbox.attach();
        assert_eq!(kinds(&events), vec!["data", "io error", "data"]);
        match &events[0] {
            SerialEvent::Data(batch) => assert_eq!(batch, &DataBatch::from([Bytes::from_static(b"a"), Bytes::from_static(b"b")])),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_stranded_replays_before_backlog() {
        let mut mailbox = Mailbox::new();
        mailbox.push_backlog(SerialEvent::ConnectionError(TransportError::NotConnected));
        mailbox.strand(SerialEvent::Connected);

        let events = mailbox.attach();
        assert_eq!(kinds(&events), vec!["connected", "connection error"]);
        assert!(mailbox.is_attached());
        assert!(mailbox.is_empty());

        mailbox.detach();
        assert!(!mailbox.is_attached());
        assert!(mailbox.attach().is_empty());
    }
}
