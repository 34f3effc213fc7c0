#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Session event bus for the Cadre client.
//!
//! UI surfaces (route guards, shell chrome, page components) observe session
//! transitions by subscribing here instead of binding to mutable session
//! state. Internally the bus uses `tokio::broadcast` with a bounded replay
//! ring so a subscriber that mounts late (e.g. a guard created after login
//! resolved) can catch up on the transitions it missed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};
use uuid::Uuid;

/// Identifier assigned to each event emitted by the session layer.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring. Session transitions
/// are rare, so a short ring is plenty.
const DEFAULT_REPLAY_CAPACITY: usize = 64;

/// Why a session ended.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// The user asked to log out.
    UserRequested,
    /// The session could not be recovered after a rejected refresh.
    SessionExpired,
}

/// Typed session transitions surfaced to observers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A login call resolved and the session now carries an identity.
    LoggedIn {
        /// Identifier of the authenticated user.
        user_id: Uuid,
        /// Display name for UI chrome.
        display_name: String,
    },
    /// The access token was replaced in place; the user is unchanged.
    TokenRefreshed {
        /// Expiry of the replacement token, when known.
        expires_at: Option<DateTime<Utc>>,
    },
    /// The session was cleared.
    LoggedOut {
        /// What ended the session.
        reason: LogoutReason,
    },
}

impl SessionEvent {
    /// Machine-friendly discriminator for log lines and subscribers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LoggedIn { .. } => "logged_in",
            Self::TokenRefreshed { .. } => "token_refreshed",
            Self::LoggedOut { .. } => "logged_out",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned at publish time.
    pub id: EventId,
    /// When the transition was published.
    pub timestamp: DateTime<Utc>,
    /// The transition itself.
    pub event: SessionEvent,
}

/// Shared session event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel uses the same capacity as the in-memory replay
    /// buffer, ensuring dropped events impact both structures consistently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(std::sync::atomic::AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default in-memory buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a new event to the bus, assigning it a sequential identifier.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn publish(&self, event: SessionEvent) -> EventId {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.buffer.lock().expect("event buffer mutex poisoned");
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying any buffered events newer than `since_id`.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.buffer.lock().expect("event buffer mutex poisoned");
            for item in buffer.iter() {
                if item.id > since {
                    backlog.push_back(item.clone());
                }
            }
        }

        let receiver = self.sender.subscribe();
        EventStream { backlog, receiver }
    }

    /// Returns the last assigned identifier, if any events have been published.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.buffer.lock().expect("event buffer mutex poisoned");
        buffer.back().map(|event| event.id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields events either from the replay backlog or from
/// the live broadcast channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => self.receiver.recv().await.ok(),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refreshed(minute: i64) -> SessionEvent {
        SessionEvent::TokenRefreshed {
            expires_at: Utc::now().checked_add_signed(chrono::Duration::minutes(minute)),
        }
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for i in 0..5 {
            last_id = bus.publish(refreshed(i));
        }
        assert_eq!(last_id, 5);

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(event) = stream.next().await {
                received.push(event);
            }
        }

        assert_eq!(received.len(), 3);
        assert_eq!(received.first().unwrap().id, 3);
        assert_eq!(received.last().unwrap().id, 5);
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest_when_full() {
        let bus = EventBus::with_capacity(4);
        for i in 0..6 {
            let _ = bus.publish(refreshed(i));
        }

        assert_eq!(bus.last_event_id(), Some(6));

        let mut stream = bus.subscribe(Some(0));
        let first = stream.next().await.expect("backlog entry");
        // Events 1 and 2 fell off the ring.
        assert_eq!(first.id, 3);
    }

    #[tokio::test]
    async fn live_subscriber_sees_login_then_logout() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe(None);

        let user_id = Uuid::new_v4();
        let _ = bus.publish(SessionEvent::LoggedIn {
            user_id,
            display_name: "Alice".to_string(),
        });
        let _ = bus.publish(SessionEvent::LoggedOut {
            reason: LogoutReason::SessionExpired,
        });

        let first = stream.next().await.expect("login event");
        assert_eq!(first.event.kind(), "logged_in");
        let second = stream.next().await.expect("logout event");
        assert!(matches!(
            second.event,
            SessionEvent::LoggedOut {
                reason: LogoutReason::SessionExpired
            }
        ));
    }

    #[test]
    fn envelope_serialises_with_tagged_event() {
        let envelope = EventEnvelope {
            id: 7,
            timestamp: Utc::now(),
            event: SessionEvent::LoggedOut {
                reason: LogoutReason::UserRequested,
            },
        };
        let value = serde_json::to_value(&envelope).expect("envelope JSON");
        assert_eq!(value["event"]["type"], "logged_out");
        assert_eq!(value["event"]["reason"], "user_requested");
    }
}
