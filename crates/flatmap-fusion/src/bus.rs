//! Bounded broadcast topics carrying shared messages.

use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast topic with bounded capacity.
///
/// Messages travel as `Arc<T>` so a large grid snapshot or point cloud is
/// shared, not copied, between subscribers. A subscriber that falls more than
/// `capacity` messages behind skips ahead to the newer ones, which gives the
/// latest-value-wins behavior the inputs need.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    /// Creates a topic buffering up to `capacity` messages per subscriber.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes `msg`, returning how many subscribers will see it.
    pub fn publish(&self, msg: T) -> usize {
        self.publish_shared(Arc::new(msg))
    }

    /// Publishes an already shared message.
    pub fn publish_shared(&self, msg: Arc<T>) -> usize {
        // No subscribers is not an error for a topic
        self.tx.send(msg).unwrap_or(0)
    }

    /// Opens a new subscription that sees messages published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_publish_without_subscribers() {
        let topic: Topic<u32> = Topic::new(4);
        assert_eq!(topic.publish(1), 0);
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn test_lagging_subscriber_skips_ahead() {
        let topic: Topic<u32> = Topic::new(2);
        let mut rx = topic.subscribe();
        for i in 0..5 {
            assert_eq!(topic.publish(i), 1);
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(3))));
        assert_eq!(*rx.try_recv().unwrap(), 3);
        assert_eq!(*rx.try_recv().unwrap(), 4);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
