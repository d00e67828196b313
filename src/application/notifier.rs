//! Push-based change notification.
//!
//! Wraps a tokio broadcast channel carrying the latest ranked view.
//! Publishing is send-and-forget: with no subscribers, or with a
//! lagging one, the send result is simply ignored.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::TokenRecord;

#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<Arc<Vec<TokenRecord>>>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<TokenRecord>>> {
        self.tx.subscribe()
    }

    pub fn publish(&self, view: Arc<Vec<TokenRecord>>) {
        // Err here only means nobody is listening right now.
        let _ = self.tx.send(view);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_views() {
        let notifier = ChangeNotifier::new(4);
        let mut rx = notifier.subscribe();

        let mut rec = TokenRecord::bare("0xaaaa00000000000000000000000000000000f1a9", "listed");
        rec.name = "One".into();
        notifier.publish(Arc::new(vec![rec]));

        let view = rx.recv().await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].name, "One");
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let notifier = ChangeNotifier::new(4);
        assert_eq!(notifier.subscriber_count(), 0);
        notifier.publish(Arc::new(Vec::new()));
    }
}
