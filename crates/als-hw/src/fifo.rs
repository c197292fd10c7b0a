//! Event queue shared between sensor pollers and the consumer.

use crate::SensorEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::debug;

/// Default number of events held before the oldest is dropped.
pub const DEFAULT_FIFO_CAPACITY: usize = 256;

/// Accepts readings for downstream delivery.
///
/// Publishing never reports back to the producer.
pub trait EventSink: Send + Sync {
    /// Publishes a reading.
    fn put(&self, event: SensorEvent);
}

/// Bounded FIFO of sensor events.
///
/// When full, the oldest event is discarded to make room.
pub struct EventFifo {
    queue: Mutex<VecDeque<SensorEvent>>,
    available: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl EventFifo {
    /// Creates a FIFO holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Waits up to `timeout` for the next event.
    pub fn take(&self, timeout: Duration) -> Option<SensorEvent> {
        let queue = self.queue.lock().unwrap();
        let (mut queue, _) = self
            .available
            .wait_timeout_while(queue, timeout, |q| q.is_empty())
            .unwrap();
        queue.pop_front()
    }

    /// Removes and returns all queued events.
    pub fn drain(&self) -> Vec<SensorEvent> {
        self.queue.lock().unwrap().drain(..).collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Returns true if no events are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventFifo {
    fn default() -> Self {
        Self::new(DEFAULT_FIFO_CAPACITY)
    }
}

impl EventSink for EventFifo {
    fn put(&self, event: SensorEvent) {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= self.capacity {
            queue.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Event FIFO full, dropped oldest ({} total)", dropped);
        }
        queue.push_back(event);
        drop(queue);
        self.available.notify_one();
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn put(&self, event: SensorEvent) {
        (**self).put(event)
    }
}
