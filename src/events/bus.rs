//! Progress event bus.
//!
//! Synchronous, ordered delivery of [`ProgressEvent`]s to registered
//! listeners, plus a broadcast channel for async consumers.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::event::ProgressEvent;

/// Broadcast channel capacity for async receivers
const CHANNEL_CAPACITY: usize = 256;

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Failure reported by a listener. Never stops delivery to others.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

/// Receives progress notifications on the publishing thread.
///
/// Closures `Fn(&ProgressEvent)` are listeners too.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent) -> Result<(), ListenerError>;
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) -> Result<(), ListenerError> {
        self(event);
        Ok(())
    }
}

/// Listeners that failed while an event was being delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{count} listener(s) failed on {event}", count = .failures.len())]
pub struct PublishError {
    pub event: String,
    /// Listeners that accepted the event
    pub delivered: usize,
    pub failures: Vec<(SubscriptionId, String)>,
}

type Listeners = Vec<(SubscriptionId, Arc<dyn ProgressListener>)>;

/// Ordered registry of progress listeners.
pub struct ProgressEventBus {
    sender: broadcast::Sender<ProgressEvent>,
    listeners: RwLock<Listeners>,
}

impl ProgressEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener. Registering the same `Arc` twice returns the
    /// existing id.
    pub fn subscribe(&self, listener: Arc<dyn ProgressListener>) -> SubscriptionId {
        let mut listeners = self.listeners.write();
        if let Some((id, _)) = listeners.iter().find(|(_, l)| same_listener(l, &listener)) {
            return *id;
        }

        let id = SubscriptionId::new();
        listeners.push((id, listener));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Register a closure.
    pub fn subscribe_fn<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(f))
    }

    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Receiver for async consumers; sees events published after this call.
    pub fn receiver(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Deliver an event to every listener registered right now, in
    /// subscription order.
    ///
    /// A listener that returns an error or panics is skipped over; the rest
    /// still receive the event. Returns the number of listeners that
    /// accepted it.
    pub fn publish(&self, event: &ProgressEvent) -> Result<usize, PublishError> {
        let snapshot: Listeners = self.listeners.read().clone();

        let mut delivered = 0;
        let mut failures = Vec::new();
        for (id, listener) in &snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_progress(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => failures.push((*id, e.0)),
                Err(payload) => failures.push((*id, panic_message(payload.as_ref()))),
            }
        }

        // No async receivers is fine
        let _ = self.sender.send(event.clone());

        if failures.is_empty() {
            Ok(delivered)
        } else {
            Err(PublishError {
                event: event.kind.to_string(),
                delivered,
                failures,
            })
        }
    }
}

impl Default for ProgressEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgressEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressEventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn same_listener(a: &Arc<dyn ProgressListener>, b: &Arc<dyn ProgressListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ProgressKind;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(kind: ProgressKind) -> ProgressEvent {
        ProgressEvent::new(kind, None, 0)
    }

    struct Failing;

    impl ProgressListener for Failing {
        fn on_progress(&self, _: &ProgressEvent) -> Result<(), ListenerError> {
            Err(ListenerError("display gone".into()))
        }
    }

    #[test]
    fn test_bus_creation() {
        let bus = ProgressEventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(&event(ProgressKind::Finished)).unwrap(), 0);
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = ProgressEventBus::new();

        let id = bus.subscribe_fn(|_| {});
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);

        // Double unsubscribe should return false
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let bus = ProgressEventBus::new();
        let listener: Arc<dyn ProgressListener> = Arc::new(|_: &ProgressEvent| {});

        let first = bus.subscribe(listener.clone());
        let second = bus.subscribe(listener);
        assert_eq!(first, second);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_delivery_order() {
        let bus = ProgressEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["a", "b", "c"] {
            let seen = seen.clone();
            bus.subscribe_fn(move |e| seen.lock().push((name, e.kind)));
        }

        bus.publish(&event(ProgressKind::StartDoc)).unwrap();
        bus.publish(&event(ProgressKind::EndDoc)).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                ("a", ProgressKind::StartDoc),
                ("b", ProgressKind::StartDoc),
                ("c", ProgressKind::StartDoc),
                ("a", ProgressKind::EndDoc),
                ("b", ProgressKind::EndDoc),
                ("c", ProgressKind::EndDoc),
            ]
        );
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let bus = ProgressEventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let failing = bus.subscribe(Arc::new(Failing));
        bus.subscribe_fn(|_| panic!("listener bug"));
        let c = counter.clone();
        bus.subscribe_fn(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let err = bus.publish(&event(ProgressKind::Complete)).unwrap_err();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(err.delivered, 1);
        assert_eq!(err.failures.len(), 2);
        assert_eq!(err.failures[0], (failing, "display gone".to_string()));
        assert!(err.failures[1].1.contains("listener bug"));
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let bus = ProgressEventBus::new();
        bus.subscribe_fn(|_| {});
        let other = ProgressEventBus::new().subscribe_fn(|_| {});
        assert!(!bus.unsubscribe(other));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_receiver() {
        let bus = ProgressEventBus::new();
        let mut rx = bus.receiver();

        bus.publish(&event(ProgressKind::StartDoc)).unwrap();
        bus.publish(&event(ProgressKind::EndDoc)).unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, ProgressKind::StartDoc);
        assert_eq!(rx.recv().await.unwrap().kind, ProgressKind::EndDoc);
    }
}
