//! Unbounded FIFO transport between two jobs.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::record::{Record, RecordMessage};

/// A named, cloneable handle on an unbounded crossbeam channel of
/// [`RecordMessage`]s.
///
/// Every clone shares the same channel. Because the queue keeps both ends alive,
/// a receive never observes disconnection: a consumer whose producers die
/// before broadcasting poison blocks until its read timeout, if any.
pub struct RecordQueue<P> {
    name: Arc<str>,
    sender: Sender<RecordMessage<P>>,
    receiver: Receiver<RecordMessage<P>>,
}

impl<P> Clone for RecordQueue<P> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

impl<P> fmt::Debug for RecordQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

impl<P> RecordQueue<P> {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            name: Arc::from(name.into()),
            sender,
            receiver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&self, record: Record<P>) {
        self.send(RecordMessage::Record(record));
    }

    pub fn push_poison(&self) {
        self.send(RecordMessage::Poison);
    }

    fn send(&self, message: RecordMessage<P>) {
        // We own a receiver, so the channel is never disconnected here.
        if self.sender.send(message).is_err() {
            unreachable!("queue '{}' lost its receiver", self.name);
        }
    }

    /// Block until a message is available
    pub fn recv(&self) -> RecordMessage<P> {
        match self.receiver.recv() {
            Ok(message) => message,
            Err(_) => unreachable!("queue '{}' lost its sender", self.name),
        }
    }

    /// Block for at most `timeout`; `None` when nothing arrived in time
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RecordMessage<P>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                unreachable!("queue '{}' lost its sender", self.name)
            }
        }
    }

    /// Take everything currently buffered without blocking
    pub fn drain(&self) -> Vec<RecordMessage<P>> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
