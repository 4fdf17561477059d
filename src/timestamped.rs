//! Timestamping of queue items.

use std::time::Duration;

use tokio::time::Instant;

/// An item paired with the instant it was admitted to the queue.
///
/// The timestamp is set once, when the queue accepts the item, and never
/// changes afterwards. It marks admission, not production: an item that sat in
/// a producer-side buffer before being enqueued is stamped with the later
/// instant.
#[derive(Clone, Copy, Debug)]
pub struct Timestamped<T> {
    /// The wrapped payload.
    item: T,
    /// Instant at which the queue accepted the item.
    timestamp: Instant,
}

impl<T> Timestamped<T> {
    /// Wraps an item, stamping it with the current instant.
    pub(crate) fn new(item: T) -> Self {
        Timestamped {
            item,
            timestamp: Instant::now(),
        }
    }

    /// Returns a reference to the payload.
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Unwraps the payload, discarding the timestamp.
    pub fn into_item(self) -> T {
        self.item
    }

    /// Returns the admission instant.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the time elapsed since admission.
    pub fn age(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Timestamped;

    #[tokio::test(start_paused = true)]
    async fn age_grows_with_time() {
        let wrapped = Timestamped::new("payload");
        assert_eq!(wrapped.age(), Duration::ZERO);

        tokio::time::advance(Duration::from_millis(250)).await;

        assert_eq!(wrapped.age(), Duration::from_millis(250));
        assert_eq!(*wrapped.item(), "payload");
    }

    #[tokio::test]
    async fn unwrapping_returns_the_payload() {
        let wrapped = Timestamped::new(vec![1, 2, 3]);
        assert_eq!(wrapped.into_item(), vec![1, 2, 3]);
    }
}
