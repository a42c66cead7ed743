//! Cache invalidation bus.
//!
//! Fire-and-forget, at-least-once delivery to current subscribers only.
//! There is no persistence and no replay: a consumer that was not listening
//! re-derives state on its next read. The bus buys latency, not
//! correctness.

use tokio::sync::{broadcast, mpsc};

/// What got fresher remote state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationScope {
    pub service_id: String,
    pub entity_type: String,
    /// Set when the event concerns a single entity; `None` means the whole
    /// service/type scope should be considered stale.
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InvalidationBus {
    tx: broadcast::Sender<InvalidationScope>,
}

impl InvalidationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a scope to whoever is currently listening. Having no
    /// subscribers is not an error.
    pub fn publish(&self, scope: InvalidationScope) {
        let receivers = self.tx.receiver_count();
        if self.tx.send(scope).is_err() {
            tracing::trace!("invalidation published with no subscribers");
        } else {
            tracing::trace!(receivers, "invalidation published");
        }
    }

    /// Subscribe to every invalidation from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationScope> {
        self.tx.subscribe()
    }

    /// Subscribe with a predicate. A forwarding task drops non-matching
    /// scopes; the task ends when either side hangs up.
    pub fn subscribe_filtered<F>(&self, predicate: F) -> mpsc::UnboundedReceiver<InvalidationScope>
    where
        F: Fn(&InvalidationScope) -> bool + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(scope) => {
                        if predicate(&scope) && out_tx.send(scope).is_err() {
                            break;
                        }
                    }
                    // A lagged subscriber lost events; it re-derives on its
                    // next read, so just keep going.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "invalidation subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        out_rx
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(service: &str, ty: &str, id: Option<&str>) -> InvalidationScope {
        InvalidationScope {
            service_id: service.to_string(),
            entity_type: ty.to_string(),
            entity_id: id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_scopes() {
        let bus = InvalidationBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(scope("svc1", "room", Some("42")));
        let got = rx.recv().await.unwrap();
        assert_eq!(got, scope("svc1", "room", Some("42")));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let bus = InvalidationBus::new(16);
        bus.publish(scope("svc1", "room", None));
    }

    #[tokio::test]
    async fn test_filtered_subscription_drops_non_matching() {
        let bus = InvalidationBus::new(16);
        let mut rx = bus.subscribe_filtered(|s| s.entity_type == "visual");
        // Give the forwarding task a chance to subscribe before publishing.
        tokio::task::yield_now().await;
        bus.publish(scope("svc1", "room", None));
        bus.publish(scope("svc1", "visual", Some("7")));
        let got = rx.recv().await.unwrap();
        assert_eq!(got.entity_type, "visual");
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = InvalidationBus::new(16);
        bus.publish(scope("svc1", "room", None));
        let mut rx = bus.subscribe();
        bus.publish(scope("svc1", "visual", None));
        let got = rx.recv().await.unwrap();
        assert_eq!(got.entity_type, "visual");
    }
}
