//! Live-update hub for Parley.
//!
//! A small in-process publish/subscribe service: the API service publishes
//! typed events after commit, WebSocket handlers subscribe per project and
//! forward frames to their client.
//!
//! Delivery to connected subscribers is best-effort and non-blocking (each
//! subscriber owns an unbounded channel drained by its connection task).
//! When a project has no subscriber, events are buffered per project up to
//! [`PENDING_BUFFER_LIMIT`]; the next subscription flushes and clears the
//! buffer. On overflow the oldest event is dropped.
//!
//! # Example
//!
//! ```
//! use hub::{Hub, ServerEvent};
//!
//! let hub = Hub::new();
//! hub.publish(7, ServerEvent::project_updated(7, Some(true), None));
//!
//! // The event was buffered; a later subscriber receives it first.
//! let (subscription, mut rx) = hub.subscribe(7);
//! assert!(rx.try_recv().is_ok());
//! hub.unsubscribe(subscription);
//! ```

mod event;

pub use event::ServerEvent;

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::mpsc;

/// Maximum buffered events per project while no subscriber is connected.
pub const PENDING_BUFFER_LIMIT: usize = 256;

/// Handle identifying one subscription; pass back to [`Hub::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    project_id: i64,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
    pending: HashMap<i64, VecDeque<ServerEvent>>,
}

/// The process-wide live-update hub.
#[derive(Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event for a project.
    ///
    /// Sends to every current subscriber of the project without blocking.
    /// With no subscriber connected, the event is queued in the project's
    /// pending buffer (oldest dropped on overflow).
    pub fn publish(&self, project_id: i64, event: ServerEvent) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut delivered = false;
        state.subscribers.retain(|_, sub| {
            if sub.project_id != project_id {
                return true;
            }
            match sub.tx.send(event.clone()) {
                Ok(()) => {
                    delivered = true;
                    true
                }
                // Receiver gone; the connection task died without
                // unsubscribing.
                Err(_) => false,
            }
        });

        if !delivered {
            let buffer = state.pending.entry(project_id).or_default();
            if buffer.len() >= PENDING_BUFFER_LIMIT {
                buffer.pop_front();
                tracing::warn!(
                    project_id,
                    "live-update buffer overflow, dropping oldest event"
                );
            }
            buffer.push_back(event);
        }
    }

    /// Subscribe to a project's events.
    ///
    /// Any buffered events are flushed into the returned channel first, in
    /// publish order, and the buffer is cleared.
    pub fn subscribe(&self, project_id: i64) -> (SubscriptionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(buffer) = state.pending.remove(&project_id) {
            for event in buffer {
                // The receiver is still in scope; this cannot fail.
                let _ = tx.send(event);
            }
        }

        state.next_id += 1;
        let id = state.next_id;
        state.subscribers.insert(id, Subscriber { project_id, tx });

        (SubscriptionId(id), rx)
    }

    /// Drop a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.subscribers.remove(&id.0);
    }

    /// Number of connected subscribers for a project.
    pub fn subscriber_count(&self, project_id: i64) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .subscribers
            .values()
            .filter(|s| s.project_id == project_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::models::{Message, MessageKind, MessageStatus};

    fn message(id: i64) -> Message {
        Message {
            id,
            conversation_id: 1,
            project_id: 7,
            sender_id: 0,
            receiver_id: 2,
            content: format!("m{}", id),
            kind: MessageKind::User,
            status: MessageStatus::Pending,
            created_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_delivers_to_matching_subscribers_only() {
        let hub = Hub::new();
        let (sub_a, mut rx_a) = hub.subscribe(7);
        let (sub_b, mut rx_b) = hub.subscribe(8);

        hub.publish(7, ServerEvent::NewMessage(message(1)));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());

        hub.unsubscribe(sub_a);
        hub.unsubscribe(sub_b);
    }

    #[test]
    fn test_buffers_without_subscriber_and_flushes_in_order() {
        let hub = Hub::new();
        hub.publish(7, ServerEvent::NewMessage(message(1)));
        hub.publish(7, ServerEvent::NewMessage(message(2)));

        let (sub, mut rx) = hub.subscribe(7);
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());

        match (first, second) {
            (ServerEvent::NewMessage(a), ServerEvent::NewMessage(b)) => {
                assert_eq!(a.id, 1);
                assert_eq!(b.id, 2);
            }
            other => panic!("unexpected events: {:?}", other),
        }

        // Buffer is cleared by the flush; resubscribing gets nothing.
        hub.unsubscribe(sub);
        let (sub, mut rx) = hub.subscribe(7);
        assert!(rx.try_recv().is_err());
        hub.unsubscribe(sub);
    }

    #[test]
    fn test_buffer_overflow_drops_oldest() {
        let hub = Hub::new();
        for id in 0..(PENDING_BUFFER_LIMIT as i64 + 5) {
            hub.publish(7, ServerEvent::NewMessage(message(id)));
        }

        let (sub, mut rx) = hub.subscribe(7);
        let first = rx.try_recv().unwrap();
        match first {
            ServerEvent::NewMessage(m) => assert_eq!(m.id, 5),
            other => panic!("unexpected event: {:?}", other),
        }
        hub.unsubscribe(sub);
    }

    #[test]
    fn test_dead_subscribers_are_pruned() {
        let hub = Hub::new();
        let (_sub, rx) = hub.subscribe(7);
        drop(rx);

        // Send fails, the dead subscriber is removed, the event lands in
        // the buffer instead.
        hub.publish(7, ServerEvent::NewMessage(message(1)));
        assert_eq!(hub.subscriber_count(7), 0);

        let (sub, mut rx) = hub.subscribe(7);
        assert!(rx.try_recv().is_ok());
        hub.unsubscribe(sub);
    }
}
