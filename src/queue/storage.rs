//! A counting FIFO queue.
//!
//! Counting queues track their item count in a non-locking manner to allow for
//! rough diagnostics without having to lock them in their entirety.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use tokio::sync::Notify;

/// State that wraps a queue and its item count.
///
/// The count is kept outside the lock so that readers can sample it without
/// contending with producers and consumers.
///
/// In general, `count` should only be modified when holding the `items` lock.
#[derive(Debug)]
pub(crate) struct CountingQueue<I> {
    /// Lock-protected item storage, in admission order.
    items: Mutex<VecDeque<I>>,

    /// The queue's item counter.
    ///
    /// Do not modify this unless you are holding the `items` lock.
    count: AtomicUsize,

    /// A notification for clients waiting to pop an item.
    notify: Notify,
}

impl<I> CountingQueue<I> {
    /// Creates a new, empty counting queue.
    pub(crate) fn new() -> Self {
        CountingQueue {
            items: Mutex::new(VecDeque::new()),
            count: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Pushes an item onto the tail of the queue and wakes one waiting client.
    ///
    /// ## Panics
    ///
    /// Panics if the storage lock has been poisoned.
    #[inline]
    pub(crate) fn push(&self, item: I) {
        // Add the item, then release the lock before notifying. The permit
        // stays stored if no client is currently waiting.
        {
            let mut items = self.items.lock().expect("storage lock poisoned");
            items.push_back(item);
            self.count.fetch_add(1, Ordering::SeqCst);
        }

        self.notify.notify_one();
    }

    /// Removes and returns the head item, if any.
    ///
    /// ## Panics
    ///
    /// Panics if the storage lock has been poisoned.
    pub(crate) fn pop(&self) -> Option<I> {
        let mut items = self.items.lock().expect("storage lock poisoned");
        let item = items.pop_front();
        if item.is_some() {
            self.count.fetch_sub(1, Ordering::SeqCst);
        }
        item
    }

    /// Maps a function over the head item without removing it.
    ///
    /// Both removal and peeking go through the same lock, so the observed head
    /// is always a value that was genuinely at the head at some point.
    ///
    /// ## Panics
    ///
    /// Panics if the storage lock has been poisoned.
    pub(crate) fn peek<R, F>(&self, func: F) -> Option<R>
    where
        F: FnOnce(&I) -> R,
    {
        let items = self.items.lock().expect("storage lock poisoned");
        items.front().map(func)
    }

    /// Returns the number of items currently in the queue.
    ///
    /// This value is sampled without taking the lock and may be slightly stale
    /// while producers or consumers are active.
    pub(crate) fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Waits until a push signals item arrival.
    ///
    /// Callers must re-check the queue after waking: another client may have
    /// popped the item first.
    pub(crate) async fn wait(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::CountingQueue;

    #[test]
    fn preserves_insertion_order() {
        let queue = CountingQueue::new();
        queue.push('a');
        queue.push('b');
        queue.push('c');

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some('a'));
        assert_eq!(queue.pop(), Some('b'));
        assert_eq!(queue.pop(), Some('c'));
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn peek_does_not_remove() {
        let queue = CountingQueue::new();
        queue.push(99u32);

        assert_eq!(queue.peek(|head| *head), Some(99));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(99));
        assert_eq!(queue.peek(|head| *head), None);
    }

    #[tokio::test]
    async fn wait_wakes_after_push() {
        let queue = CountingQueue::new();

        // The permit from a push with no waiter is stored, so waiting
        // afterwards completes immediately.
        queue.push(1u8);
        queue.wait().await;
        assert_eq!(queue.pop(), Some(1));
    }
}
