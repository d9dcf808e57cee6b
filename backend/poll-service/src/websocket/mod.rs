use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;

pub mod events;

pub use events::{PollEvent, WsInboundEvent};

/// Unique identifier for an event observer
///
/// Each WebSocket connection gets one when it subscribes, and hands it back
/// on disconnect so exactly that queue is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    authenticated: bool,
    sender: UnboundedSender<String>,
}

/// Fan-out hub for poll events
///
/// One unbounded queue per observer. Publishing never awaits: a slow observer
/// only grows its own queue and a closed one is dropped on the next publish.
/// Created once at startup and injected through `AppState`.
#[derive(Default, Clone)]
pub struct PollEventHub {
    inner: Arc<RwLock<Vec<Subscriber>>>,
}

impl PollEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. `authenticated` comes from token validation at
    /// connect time and only gates observer-originated relays.
    pub fn subscribe(&self, authenticated: bool) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let id = SubscriberId::new();

        let mut guard = self.inner.write();
        guard.push(Subscriber {
            id,
            authenticated,
            sender: tx,
        });
        metrics::set_subscribers(guard.len());

        tracing::debug!(
            subscriber = ?id,
            authenticated,
            total = guard.len(),
            "observer subscribed"
        );

        (id, rx)
    }

    /// Must be called when an observer's connection closes.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut guard = self.inner.write();
        let before = guard.len();
        guard.retain(|s| s.id != id);
        metrics::set_subscribers(guard.len());

        if before != guard.len() {
            tracing::debug!(subscriber = ?id, remaining = guard.len(), "observer unsubscribed");
        }
    }

    /// Send an event to every current observer. Returns how many received it.
    pub fn publish(&self, event: &PollEvent) -> usize {
        let payload = event.to_json();
        let mut guard = self.inner.write();
        let before = guard.len();

        guard.retain(|s| s.sender.send(payload.clone()).is_ok());

        let delivered = guard.len();
        if before != delivered {
            tracing::debug!(
                event = event.kind(),
                dropped = before - delivered,
                active = delivered,
                "dead observers cleaned up during publish"
            );
        }
        metrics::set_subscribers(delivered);
        metrics::record_event(event.kind());

        delivered
    }

    /// Broadcast an event sent by an observer, if that observer authenticated.
    pub fn relay(&self, from: SubscriberId, event: &PollEvent) -> AppResult<usize> {
        let authenticated = self
            .inner
            .read()
            .iter()
            .any(|s| s.id == from && s.authenticated);

        if !authenticated {
            return Err(AppError::Unauthorized);
        }
        Ok(self.publish(event))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.read().len()
    }

    /// Drop every observer, closing their queues.
    pub fn shutdown(&self) {
        let mut guard = self.inner.write();
        let closed = guard.len();
        guard.clear();
        metrics::set_subscribers(0);
        tracing::info!(closed, "poll event hub shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = PollEventHub::new();
        let (_a, mut rx_a) = hub.subscribe(false);
        let (_b, mut rx_b) = hub.subscribe(true);

        let id = Uuid::new_v4();
        assert_eq!(hub.publish(&PollEvent::PollDeleted(id)), 2);

        let expected = PollEvent::PollDeleted(id).to_json();
        assert_eq!(rx_a.recv().await.unwrap(), expected);
        assert_eq!(rx_b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let hub = PollEventHub::new();
        hub.publish(&PollEvent::PollDeleted(Uuid::new_v4()));

        let (_id, mut rx) = hub.subscribe(false);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_cleaned_up_on_publish() {
        let hub = PollEventHub::new();
        let (_a, rx_a) = hub.subscribe(false);
        let (_b, _rx_b) = hub.subscribe(false);
        drop(rx_a);

        assert_eq!(hub.publish(&PollEvent::PollDeleted(Uuid::new_v4())), 1);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_only_that_observer() {
        let hub = PollEventHub::new();
        let (a, mut rx_a) = hub.subscribe(false);
        let (_b, _rx_b) = hub.subscribe(false);

        hub.unsubscribe(a);
        assert_eq!(hub.subscriber_count(), 1);
        // Sender dropped with the entry
        assert!(rx_a.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_relay_requires_authenticated_observer() {
        let hub = PollEventHub::new();
        let (anon, _rx_anon) = hub.subscribe(false);
        let (user, _rx_user) = hub.subscribe(true);
        let event = PollEvent::PollDeleted(Uuid::new_v4());

        assert_eq!(hub.relay(anon, &event), Err(AppError::Unauthorized));
        assert_eq!(hub.relay(user, &event), Ok(2));
        assert_eq!(hub.relay(SubscriberId::new(), &event), Err(AppError::Unauthorized));
    }

    #[tokio::test]
    async fn test_shutdown_closes_all_queues() {
        let hub = PollEventHub::new();
        let (_a, mut rx) = hub.subscribe(true);

        hub.shutdown();
        assert_eq!(hub.subscriber_count(), 0);
        assert!(rx.recv().await.is_none());
    }
}
