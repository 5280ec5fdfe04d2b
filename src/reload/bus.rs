//! Message Bus
//!
//! Bounded broadcast queue between the change producers (ingest, css,
//! error surface) and the connected sessions.
//!
//! Delivery is head-only: a subscriber is notified when the newest message
//! changes and takes the new head, not the whole queue. Messages published
//! before a subscriber existed are never delivered to it, and a slow
//! subscriber coalesces to the latest head. Each publish waits out a short
//! settle window first so a burst of rapid publications lands as the newest
//! one without producers ever blocking on subscribers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::message::Envelope;

/// Maximum number of messages retained, newest first.
pub const MAX_RETAINED: usize = 30;

/// Head-change notification handed to subscribers.
pub type HeadReceiver = watch::Receiver<Option<Arc<Envelope>>>;

/// Bounded broadcast queue with settle-delay delivery.
#[derive(Debug)]
pub struct MessageBus {
    /// Retained history, newest at the front
    history: Mutex<VecDeque<Arc<Envelope>>>,
    /// Latest head, observed by all subscribers
    head_tx: watch::Sender<Option<Arc<Envelope>>>,
    /// Settle window between a publish and its delivery
    settle: Duration,
}

impl MessageBus {
    /// Create a bus with the given settle window.
    pub fn new(settle: Duration) -> Self {
        let (head_tx, _) = watch::channel(None);
        Self {
            history: Mutex::new(VecDeque::new()),
            head_tx,
            settle,
        }
    }

    /// Publish a message: retain it, wait out the settle window, then make
    /// the current head visible to subscribers. Never blocks on subscribers.
    pub async fn publish(&self, message: Envelope) {
        let message = Arc::new(message);
        {
            let mut history = self.history.lock();
            history.push_front(message);
            history.truncate(MAX_RETAINED);
        }

        tokio::time::sleep(self.settle).await;

        let head = self.history.lock().front().cloned();
        // No receivers is fine; send_replace never blocks.
        self.head_tx.send_replace(head);
    }

    /// Subscribe to head changes. The current head counts as already seen:
    /// only messages published from now on are observed.
    pub fn subscribe(&self) -> HeadReceiver {
        self.head_tx.subscribe()
    }

    /// Newest retained message, if any.
    pub fn latest(&self) -> Option<Arc<Envelope>> {
        self.history.lock().front().cloned()
    }

    /// Number of retained messages.
    pub fn retained(&self) -> usize {
        self.history.lock().len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::message::Payload;

    fn warning(text: &str) -> Envelope {
        Envelope::new(
            "test-project",
            Payload::CompileWarning {
                message: text.to_string(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_is_bounded() {
        let bus = MessageBus::new(Duration::from_millis(10));

        for i in 0..40 {
            bus.publish(warning(&format!("w{i}"))).await;
        }

        assert_eq!(bus.retained(), MAX_RETAINED);
        // Newest first.
        match &bus.latest().unwrap().payload {
            Payload::CompileWarning { message } => assert_eq!(message, "w39"),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_sees_only_future_heads() {
        let bus = MessageBus::new(Duration::from_millis(10));

        bus.publish(warning("before")).await;

        let mut rx = bus.subscribe();
        // The pre-subscription head counts as seen.
        assert!(!rx.has_changed().unwrap());

        bus.publish(warning("after")).await;
        rx.changed().await.unwrap();
        match &rx.borrow_and_update().as_ref().unwrap().payload {
            Payload::CompileWarning { message } => assert_eq!(message, "after"),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_subscriber_coalesces_to_latest() {
        let bus = MessageBus::new(Duration::from_millis(10));
        let mut rx = bus.subscribe();

        bus.publish(warning("first")).await;
        bus.publish(warning("second")).await;
        bus.publish(warning("third")).await;

        // A subscriber that never kept up takes only the newest head.
        rx.changed().await.unwrap();
        match &rx.borrow_and_update().as_ref().unwrap().payload {
            Payload::CompileWarning { message } => assert_eq!(message, "third"),
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_precedes_delivery() {
        let bus = Arc::new(MessageBus::new(Duration::from_millis(10)));
        let mut rx = bus.subscribe();

        let publisher = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.publish(warning("delayed")).await })
        };

        // Within the settle window nothing is visible yet.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!rx.has_changed().unwrap());

        publisher.await.unwrap();
        assert!(rx.has_changed().unwrap());
    }
}
