//! Per-symbol bounded FIFO queues with strictly increasing per-key sequence
//! numbers. One queue per stream_key (typically a symbol); producers may be
//! many, each queue has exactly one consumer (its `SymbolWorker`).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::types::{now_ms, Event, EventPayload};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum EventBusError {
    UnknownStreamKey(String),
    Closed(String),
}

impl fmt::Display for EventBusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventBusError::UnknownStreamKey(k) => write!(f, "unknown stream key: {k}"),
            EventBusError::Closed(k) => write!(f, "queue closed for key: {k}"),
        }
    }
}

impl std::error::Error for EventBusError {}

struct Queue {
    tx: Option<mpsc::Sender<Event>>,
    rx: Mutex<Option<mpsc::Receiver<Event>>>,
    seq: AtomicU64,
}

/// A mapping from stream_key to a bounded FIFO of `Event`s.
pub struct EventBus {
    queues: HashMap<String, Queue>,
}

impl EventBus {
    /// Builds a bus with one registered (and empty) queue per key.
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        let mut queues = HashMap::new();
        for key in keys {
            let (tx, rx) = mpsc::channel(DEFAULT_CAPACITY);
            queues.insert(
                key,
                Queue {
                    tx: Some(tx),
                    rx: Mutex::new(Some(rx)),
                    seq: AtomicU64::new(0),
                },
            );
        }
        Self { queues }
    }

    pub fn keys(&self) -> Vec<String> {
        self.queues.keys().cloned().collect()
    }

    fn queue(&self, stream_key: &str) -> Result<&Queue, EventBusError> {
        self.queues
            .get(stream_key)
            .ok_or_else(|| EventBusError::UnknownStreamKey(stream_key.to_string()))
    }

    /// Assigns the next seq_id for `stream_key`, timestamps with the current
    /// ms, and enqueues. Suspends (via the bounded channel's backpressure)
    /// when the queue is full.
    pub async fn put(&self, stream_key: &str, payload: EventPayload) -> Result<u64, EventBusError> {
        let queue = self.queue(stream_key)?;
        let tx = queue
            .tx
            .as_ref()
            .ok_or_else(|| EventBusError::Closed(stream_key.to_string()))?;
        let seq_id = queue.seq.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            seq_id,
            ts_ms: now_ms(),
            payload,
        };
        tx.send(event)
            .await
            .map_err(|_| EventBusError::Closed(stream_key.to_string()))?;
        Ok(seq_id)
    }

    /// Dequeues FIFO for `stream_key`. Suspends until available. Returns
    /// `Closed` once the sender side has been dropped and the queue has
    /// drained.
    ///
    /// Must only ever be called by a single consumer per key — the queue's
    /// receiver half is moved out on first call and held for the lifetime of
    /// that consumer's loop.
    pub async fn get(&self, stream_key: &str) -> Result<Event, EventBusError> {
        let queue = self.queue(stream_key)?;
        let mut guard = queue.rx.lock().await;
        let rx = guard
            .as_mut()
            .ok_or_else(|| EventBusError::Closed(stream_key.to_string()))?;
        match rx.recv().await {
            Some(event) => Ok(event),
            None => Err(EventBusError::Closed(stream_key.to_string())),
        }
    }

    pub async fn empty(&self, stream_key: &str) -> Result<bool, EventBusError> {
        let queue = self.queue(stream_key)?;
        let guard = queue.rx.lock().await;
        Ok(guard.as_ref().map(|rx| rx.is_empty()).unwrap_or(true))
    }

    /// Closes the producer side for `stream_key`; a subsequent `get` returns
    /// `Closed` once already-queued events have drained.
    pub fn close(&mut self, stream_key: &str) -> Result<(), EventBusError> {
        let queue = self
            .queues
            .get_mut(stream_key)
            .ok_or_else(|| EventBusError::UnknownStreamKey(stream_key.to_string()))?;
        queue.tx = None;
        Ok(())
    }

    /// A cloneable producer handle for one stream_key, used by
    /// `StreamProvider` implementations that run on their own task.
    pub fn sender(&self, stream_key: &str) -> Result<mpsc::Sender<Event>, EventBusError> {
        self.queue(stream_key)?
            .tx
            .clone()
            .ok_or_else(|| EventBusError::Closed(stream_key.to_string()))
    }
}

/// Shared handle to an `EventBus`, for cases where the bus itself must be
/// cloned into multiple tasks (the `StreamProvider` driver and every
/// `SymbolWorker`).
pub type SharedEventBus = Arc<EventBus>;
