//! Bounded blocking queue
//!
//! Backs both the run queue (envelopes a worker can execute now) and the
//! pending-operation queue (envelopes the reactor still has to register).
//! Producers wait for space instead of dropping, consumers wait for items, and
//! `close` releases everyone once the runtime shuts down.

use crate::error::QueueError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;

/// An item handed back by [`BoundedQueue::try_push`].
pub struct Rejected<T> {
    /// The item that was not enqueued
    pub item: T,
    /// Why it was not enqueued
    pub reason: QueueError,
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// FIFO queue with a fixed capacity.
pub struct BoundedQueue<T> {
    name: &'static str,
    capacity: usize,
    state: Mutex<QueueState<T>>,
    /// Signalled when an item is pushed or the queue is closed
    not_empty: Condvar,
    /// Signalled when an item is popped or the queue is closed
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (at least one).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        debug_assert!(capacity > 0, "queue capacity must be positive");
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Append an item, waiting while the queue is full.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(QueueError::ShuttingDown);
            }
            if state.items.len() < self.capacity {
                break;
            }
            tracing::trace!(queue = self.name, "queue full, producer waiting");
            self.not_full.wait(&mut state);
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append an item without waiting; a full or closed queue hands it back.
    pub fn try_push(&self, item: T) -> Result<(), Rejected<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Rejected {
                item,
                reason: QueueError::ShuttingDown,
            });
        }
        if state.items.len() >= self.capacity {
            return Err(Rejected {
                item,
                reason: QueueError::CapacityExceeded,
            });
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, waiting until one exists or the queue closes.
    pub fn pop(&self) -> Result<T, QueueError> {
        self.pop_with(|item| item)
    }

    /// Remove the oldest item and run `f` on it before the queue lock is released.
    ///
    /// Items are therefore processed by `f` in exactly the order they were
    /// pushed, even with several consumers.
    pub fn pop_with<R>(&self, f: impl FnOnce(T) -> R) -> Result<R, QueueError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(QueueError::ShuttingDown);
            }
            if let Some(item) = state.items.pop_front() {
                let out = f(item);
                drop(state);
                self.not_full.notify_one();
                return Ok(out);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Remove the oldest item if there is one.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Take every queued item at once.
    pub fn drain(&self) -> VecDeque<T> {
        let items = std::mem::take(&mut self.state.lock().items);
        if !items.is_empty() {
            self.not_full.notify_all();
        }
        items
    }

    /// Refuse further pushes and wake every waiting producer and consumer.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the queue holds no items
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new("test", 8);
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.len(), 5);
        for i in 0..5 {
            assert_eq!(queue.pop().unwrap(), i);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_try_push_full() {
        let queue = BoundedQueue::new("test", 2);
        queue.try_push(1).unwrap();
        queue.try_push(2).unwrap();

        let rejected = queue.try_push(3).unwrap_err();
        assert_eq!(rejected.reason, QueueError::CapacityExceeded);
        // The item comes back, nothing is lost
        assert_eq!(rejected.item, 3);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_push_blocks_until_pop() {
        let queue = Arc::new(BoundedQueue::new("test", 2));
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        let pushed = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = queue.clone();
            let pushed = pushed.clone();
            thread::spawn(move || {
                queue.push(3).unwrap();
                pushed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!pushed.load(Ordering::SeqCst), "producer should be blocked");
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().unwrap(), 1);
        producer.join().unwrap();
        assert!(pushed.load(Ordering::SeqCst));

        assert_eq!(queue.pop().unwrap(), 2);
        assert_eq!(queue.pop().unwrap(), 3);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(BoundedQueue::new("test", 4));
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(42).unwrap();
        assert_eq!(consumer.join().unwrap(), Ok(42));
    }

    #[test]
    fn test_close_wakes_consumers() {
        let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new("test", 4));
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || queue.pop())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        queue.close();

        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), Err(QueueError::ShuttingDown));
        }
        assert!(queue.is_closed());
    }

    #[test]
    fn test_close_wakes_blocked_producer() {
        let queue = Arc::new(BoundedQueue::new("test", 1));
        queue.push(1).unwrap();

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(producer.join().unwrap(), Err(QueueError::ShuttingDown));
    }

    #[test]
    fn test_push_after_close() {
        let queue = BoundedQueue::new("test", 4);
        queue.close();
        assert_eq!(queue.push(1), Err(QueueError::ShuttingDown));
        let rejected = queue.try_push(2).unwrap_err();
        assert_eq!(rejected.reason, QueueError::ShuttingDown);
    }

    #[test]
    fn test_pop_with_sees_items_in_order() {
        let queue = Arc::new(BoundedQueue::new("test", 64));
        for i in 0..32 {
            queue.push(i).unwrap();
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let seen = seen.clone();
                thread::spawn(move || while queue.pop_with(|item| seen.lock().push(item)).is_ok() {})
            })
            .collect();

        while seen.lock().len() < 32 {
            thread::sleep(Duration::from_millis(1));
        }
        queue.close();
        for consumer in consumers {
            consumer.join().unwrap();
        }

        let seen = seen.lock();
        assert_eq!(*seen, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn test_try_pop_and_drain() {
        let queue = BoundedQueue::new("test", 8);
        assert_eq!(queue.try_pop(), None);

        queue.push("a").unwrap();
        queue.push("b").unwrap();
        queue.push("c").unwrap();

        assert_eq!(queue.try_pop(), Some("a"));
        let rest: Vec<_> = queue.drain().into_iter().collect();
        assert_eq!(rest, vec!["b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_releases_producers() {
        let queue = Arc::new(BoundedQueue::new("test", 1));
        queue.push(1).unwrap();

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(2))
        };
        thread::sleep(Duration::from_millis(20));

        assert_eq!(queue.drain().len(), 1);
        assert_eq!(producer.join().unwrap(), Ok(()));
        assert_eq!(queue.pop().unwrap(), 2);
    }
}
