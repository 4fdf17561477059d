//! The action queue engine.
//!
//! An [`ActionQueue`] owns a single FIFO of timestamped items that any number
//! of producers may append to concurrently. Items leave the queue either
//! through manual dequeue calls or through a streaming consumer loop started
//! with [`ActionQueue::consume`]; both removal paths draw from the same
//! storage, so FIFO order holds across their union.
//!
//! Internally the queue is organized in *generations*. A generation bundles
//! the storage with the cancellation controller of its streaming consumer.
//! [`ActionQueue::clear`] swaps in a fresh generation wholesale: the previous
//! storage is discarded, its controller is cancelled so that a still-running
//! consumer stops at its next removal attempt, and manual dequeuers parked on
//! the old generation migrate to the new one.

mod storage;

use std::{
    mem,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use self::storage::CountingQueue;
use crate::{cancellation::CancellationController, timestamped::Timestamped};

/// A FIFO work queue with concurrent producers and a single streaming consumer.
///
/// The queue never blocks producers and never fails. Construct one instance
/// per logical stream of work and share it by reference (or `Arc`) between
/// producers and consumers.
#[derive(Debug)]
pub struct ActionQueue<T> {
    /// The current queue generation, replaced wholesale by `clear`.
    generation: Mutex<Arc<Generation<T>>>,
}

/// A queue generation: storage plus the consumer control signals bound to it.
#[derive(Debug)]
struct Generation<T> {
    /// Pending items in admission order.
    storage: CountingQueue<Timestamped<T>>,

    /// Controller stopping this generation's streaming consumer.
    controller: CancellationController,

    /// Raised when this generation is replaced via `clear`.
    ///
    /// Kept separate from `controller` so that cancelling the consumer does
    /// not wake manual dequeuers, which are unaffected by consumer
    /// cancellation.
    detached: CancellationToken,
}

impl<T> Generation<T> {
    /// Creates a fresh, empty generation with an armed controller.
    fn new() -> Self {
        Generation {
            storage: CountingQueue::new(),
            controller: CancellationController::new(),
            detached: CancellationToken::new(),
        }
    }
}

impl<T> ActionQueue<T> {
    /// Creates a new, empty queue.
    pub fn new() -> Self {
        ActionQueue {
            generation: Mutex::new(Arc::new(Generation::new())),
        }
    }

    /// Returns the current generation.
    ///
    /// ## Panics
    ///
    /// Panics if the generation lock has been poisoned.
    fn generation(&self) -> Arc<Generation<T>> {
        self.generation
            .lock()
            .expect("generation lock poisoned")
            .clone()
    }

    /// Appends an item to the tail of the queue, stamping it with the current
    /// instant.
    ///
    /// Never blocks and never fails; safe to call from any number of producer
    /// threads without external locking. Items from a single producer are
    /// never reordered relative to that producer's call sequence.
    pub fn enqueue(&self, item: T) {
        self.generation().storage.push(Timestamped::new(item));
    }

    /// Removes and returns the head item, waiting until one is available.
    ///
    /// Cancelling the streaming consumer does not interrupt this call; only
    /// the arrival of an item completes it. A waiter parked across a `clear`
    /// moves on to the new generation and keeps waiting there.
    pub async fn dequeue(&self) -> T {
        loop {
            let generation = self.generation();
            if let Some(item) = generation.storage.pop() {
                return item.into_item();
            }

            // Either an item arrived or the generation was replaced; both
            // cases re-read the current generation and try again.
            tokio::select! {
                _ = generation.storage.wait() => {}
                _ = generation.detached.cancelled() => {}
            }
        }
    }

    /// Removes and returns the head item, waiting at most `timeout`.
    ///
    /// Returns `None` if no item became available within the timeout, which
    /// is distinguishable from dequeuing a genuinely default-valued item.
    pub async fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        time::timeout(timeout, self.dequeue()).await.ok()
    }

    /// Removes and returns the head item if one is immediately available.
    pub fn try_dequeue(&self) -> Option<T> {
        self.generation().storage.pop().map(Timestamped::into_item)
    }

    /// Returns the number of items currently pending.
    ///
    /// Producers and consumers run concurrently, so this is a point-in-time
    /// estimate rather than a transactionally consistent value.
    pub fn len(&self) -> usize {
        self.generation().storage.len()
    }

    /// Returns whether the queue currently has no pending items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards all pending items and installs a fresh generation.
    ///
    /// The replaced generation's consumer controller is cancelled, so a
    /// streaming consumer still bound to it stops at its next removal attempt
    /// instead of idling forever. Items enqueued afterwards land in the new
    /// generation and are never delivered to the old consumer.
    ///
    /// This is a reset primitive for test isolation and cold restarts, not a
    /// live-traffic operation.
    ///
    /// ## Panics
    ///
    /// Panics if the generation lock has been poisoned.
    pub fn clear(&self) {
        let old = {
            let mut generation = self.generation.lock().expect("generation lock poisoned");
            mem::replace(&mut *generation, Arc::new(Generation::new()))
        };

        debug!(dropped = old.storage.len(), "queue cleared");

        // Wake parked dequeuers so they migrate to the new generation, then
        // stop any consumer still bound to the old one.
        old.detached.cancel();
        old.controller.cancel();
    }

    /// Stops the current generation's streaming consumer.
    ///
    /// The signal is raised before this function returns; the consumer honors
    /// it before its next removal attempt, letting an in-flight callback
    /// finish. Idempotent. Does not affect `enqueue` or `dequeue`.
    pub fn cancel(&self) {
        self.generation().controller.cancel();
    }

    /// Stops the current generation's streaming consumer after `delay`.
    ///
    /// Scheduling returns immediately; the signal fires no earlier than
    /// `delay` on a background task. The returned handle resolves once the
    /// signal has been raised and may be aborted to cancel the timer while it
    /// is still pending. The signal targets the generation that was current
    /// when scheduling happened, so an intervening `clear` is not affected.
    pub fn cancel_after(&self, delay: Duration) -> JoinHandle<()> {
        self.generation().controller.cancel_after(delay)
    }

    /// Returns the age of the oldest pending item.
    ///
    /// This is a non-destructive peek at the head of storage. An empty queue
    /// reports [`Duration::ZERO`]. The value is the worst-case current wait,
    /// the natural backlog staleness indicator for a FIFO queue; it says
    /// nothing about items already processed.
    pub fn backlog_latency(&self) -> Duration {
        self.generation()
            .storage
            .peek(Timestamped::age)
            .unwrap_or(Duration::ZERO)
    }

    /// Returns the backlog latency in whole nanoseconds.
    pub fn backlog_latency_nanos(&self) -> u128 {
        self.backlog_latency().as_nanos()
    }

    /// Returns the backlog latency in whole milliseconds, truncated.
    pub fn backlog_latency_millis(&self) -> u128 {
        self.backlog_latency().as_millis()
    }

    /// Returns the backlog latency in whole seconds, truncated.
    pub fn backlog_latency_secs(&self) -> u64 {
        self.backlog_latency().as_secs()
    }
}

impl<T: Send + 'static> ActionQueue<T> {
    /// Starts a streaming consumer applying `action` to every item's payload.
    ///
    /// The consumer runs on a background task, removing items from the head
    /// of storage in strict FIFO order and invoking the callback one item at
    /// a time. It stops cleanly when [`cancel`](ActionQueue::cancel) (or a
    /// scheduled [`cancel_after`](ActionQueue::cancel_after)) signals the
    /// generation it is bound to; the returned handle resolves at that point.
    ///
    /// One streaming consumer per queue is the supported usage. A second
    /// consumer started before the first is cancelled competes with it for
    /// the head of storage with no ordering guarantee between the two.
    ///
    /// The callback must return; a callback that never does wedges the
    /// consumer loop indefinitely.
    pub fn consume<F>(&self, mut action: F) -> JoinHandle<()>
    where
        F: FnMut(T) + Send + 'static,
    {
        self.spawn_consumer(move |item: Timestamped<T>| action(item.into_item()))
    }

    /// Starts a streaming consumer that also receives each item's admission
    /// timestamp.
    ///
    /// Identical to [`consume`](ActionQueue::consume) otherwise.
    pub fn consume_timestamped<F>(&self, action: F) -> JoinHandle<()>
    where
        F: FnMut(Timestamped<T>) + Send + 'static,
    {
        self.spawn_consumer(action)
    }

    /// Spawns the consumer loop, bound to the generation current at call time.
    fn spawn_consumer<F>(&self, mut action: F) -> JoinHandle<()>
    where
        F: FnMut(Timestamped<T>) + Send + 'static,
    {
        let generation = self.generation();

        tokio::spawn(async move {
            loop {
                // Cancellation is honored before the next removal attempt; an
                // item already handed to the callback is allowed to finish.
                if generation.controller.is_cancelled() {
                    debug!("streaming consumer stopping");
                    return;
                }

                match generation.storage.pop() {
                    Some(item) => action(item),
                    None => {
                        tokio::select! {
                            _ = generation.storage.wait() => {}
                            _ = generation.controller.cancelled() => {}
                        }
                    }
                }
            }
        })
    }
}

impl<T> Default for ActionQueue<T> {
    fn default() -> Self {
        ActionQueue::new()
    }
}
