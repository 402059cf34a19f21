//! Bounded single-producer/single-consumer hand-off queues.
//!
//! Neither side ever blocks. A full queue either evicts its oldest item
//! (`push`) or hands the new one back (`try_push`), and both sides can
//! see how many items were lost to eviction.

use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct Shared<T> {
    queue: ArrayQueue<T>,
    evicted: AtomicU64,
}

/// Sending half. Not `Clone`: there is exactly one producer.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

/// Receiving half. Not `Clone`: there is exactly one consumer.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

/// Creates a queue holding at most `capacity` items (minimum 1).
pub fn bounded<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let shared = Arc::new(Shared {
        queue: ArrayQueue::new(capacity.max(1)),
        evicted: AtomicU64::new(0),
    });
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

impl<T> Producer<T> {
    /// Enqueues `item`, evicting the oldest entry if full.
    ///
    /// Returns false if an entry was evicted.
    pub fn push(&self, item: T) -> bool {
        match self.shared.queue.force_push(item) {
            None => true,
            Some(_evicted) => {
                self.shared.evicted.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Enqueues `item` only if there is room, otherwise returns it.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.shared.queue.push(item)
    }

    /// Items evicted by `push` so far.
    pub fn evicted(&self) -> u64 {
        self.shared.evicted.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }
}

impl<T> Consumer<T> {
    /// Takes the oldest item, if any.
    pub fn pop(&self) -> Option<T> {
        self.shared.queue.pop()
    }

    /// Takes everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        std::iter::from_fn(|| self.shared.queue.pop()).collect()
    }

    /// Empties the queue and returns only the newest item.
    pub fn latest(&self) -> Option<T> {
        std::iter::from_fn(|| self.shared.queue.pop()).last()
    }

    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    /// Items evicted by the producer so far.
    pub fn evicted(&self) -> u64 {
        self.shared.evicted.load(Ordering::Relaxed)
    }
}
