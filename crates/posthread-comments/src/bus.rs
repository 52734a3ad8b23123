//! Per-post fan-out of comment events to live subscribers.
//!
//! Each subscriber owns a bounded `tokio::sync::mpsc` queue. Publishing never
//! waits: a full queue loses the event for that subscriber only, and the loss
//! is counted in [`NotificationBus::dropped_events`].
//!
//! The registry is a `HashMap<post_id, Vec<slot>>` behind one `RwLock`.
//! Subscribing and unsubscribing take the write lock; publishing clones the
//! target senders under the read lock and sends after releasing it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::comment::Comment;

/// Queue capacity per subscriber when none is configured.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CommentCreated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommentCreated => "comment_created",
        }
    }
}

/// An event delivered to subscribers of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub post_id: Uuid,
    pub comment: Comment,
}

impl CommentEvent {
    pub fn created(comment: Comment) -> Self {
        Self {
            kind: EventKind::CommentCreated,
            post_id: comment.post_id,
            comment,
        }
    }
}

/// Outcome of one [`NotificationBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

struct Slot {
    id: u64,
    tx: mpsc::Sender<Arc<CommentEvent>>,
}

type Registry = HashMap<Uuid, Vec<Slot>>;

struct BusInner {
    registry: RwLock<Registry>,
    buffer: usize,
    next_id: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl BusInner {
    // Every mutation leaves the map consistent, so a poisoned lock is still
    // safe to use.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, post_id: Uuid, subscription_id: u64) -> bool {
        let mut registry = self.write();
        let Some(slots) = registry.get_mut(&post_id) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|slot| slot.id != subscription_id);
        let removed = slots.len() != before;
        let remaining = slots.len();
        if remaining == 0 {
            registry.remove(&post_id);
        }
        if removed {
            tracing::debug!(post_id = %post_id, subscribers = remaining, "subscription removed");
        }
        removed
    }
}

/// Registry of live comment subscriptions.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl NotificationBus {
    /// Creates a bus whose subscribers each buffer up to `buffer` events.
    /// A zero buffer is raised to one.
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: RwLock::new(HashMap::new()),
                buffer: buffer.max(1),
                next_id: AtomicU64::new(1),
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Registers a subscriber for `post_id`.
    ///
    /// The subscription stays registered until it is dropped or passed to
    /// [`NotificationBus::unsubscribe`].
    pub fn subscribe(&self, post_id: Uuid) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);

        let subscribers = {
            let mut registry = self.inner.write();
            let slots = registry.entry(post_id).or_default();
            slots.push(Slot { id, tx });
            slots.len()
        };
        tracing::debug!(post_id = %post_id, subscribers, "subscription added");

        Subscription {
            post_id,
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Removes exactly this subscription and closes its stream.
    ///
    /// Safe to call more than once for the same subscription.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inner.remove(subscription.post_id, subscription.id)
    }

    /// Sends `event` to every current subscriber of its post without waiting.
    pub fn publish(&self, event: CommentEvent) -> PublishReport {
        let post_id = event.post_id;
        let targets: Vec<mpsc::Sender<Arc<CommentEvent>>> = {
            let registry = self.inner.read();
            match registry.get(&post_id) {
                Some(slots) => slots.iter().map(|slot| slot.tx.clone()).collect(),
                None => return PublishReport::default(),
            }
        };

        tracing::debug!(
            post_id = %post_id,
            subscribers = targets.len(),
            event_type = event.kind.as_str(),
            "publishing comment event"
        );

        let event = Arc::new(event);
        let mut report = PublishReport::default();
        for tx in targets {
            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    tracing::warn!(post_id = %post_id, "subscriber queue full, dropping event");
                }
                // The subscription is being torn down.
                Err(TrySendError::Closed(_)) => {}
            }
        }

        self.inner
            .delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.inner
            .dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
        report
    }

    pub fn subscriber_count(&self, post_id: Uuid) -> usize {
        self.inner.read().get(&post_id).map_or(0, Vec::len)
    }

    /// Number of posts with at least one subscriber.
    pub fn active_posts(&self) -> usize {
        self.inner.read().len()
    }

    /// Total events enqueued to subscribers since the bus was created.
    pub fn delivered_events(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }

    /// Total events lost to full subscriber queues.
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

/// A live stream of events for one post.
///
/// Dropping the subscription unregisters it.
pub struct Subscription {
    post_id: Uuid,
    id: u64,
    rx: mpsc::Receiver<Arc<CommentEvent>>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn post_id(&self) -> Uuid {
        self.post_id
    }

    /// Waits for the next event. Returns `None` once unsubscribed and
    /// drained.
    pub async fn recv(&mut self) -> Option<Arc<CommentEvent>> {
        self.rx.recv().await
    }

    /// Returns the next buffered event, if any.
    pub fn try_recv(&mut self) -> Option<Arc<CommentEvent>> {
        self.rx.try_recv().ok()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("post_id", &self.post_id)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.post_id, self.id);
        }
    }
}
